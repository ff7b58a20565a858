//! Survey analyses: mention parsing, frequency tables, bucketing,
//! cross-tabulation and the per-page reports built on top of them.

pub mod bucket;
pub mod crosstab;
pub mod frequency;
pub mod multi;
pub mod overview;
pub mod report;

pub use bucket::{OTHER_LABEL, bucket};
pub use crosstab::{CrossTab, cross_tab};
pub use frequency::{CategoryCount, Thresholds, Tier, aggregate, classify};
pub use multi::{Delimiters, parse_multi};
pub use report::{Report, ReportSpec, run_report};
