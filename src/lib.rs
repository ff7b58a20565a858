/*!
# Comedores Comunitarios dashboard

Survey dashboard for the community dining halls programme. Responses are pulled
from a Google Sheets form export (or a local CSV / snapshot file), cleaned once
per cache window and rendered as filterable report pages.

## Architecture

### Data layer
- **cell**, **table**: typed cells and the in-memory response table
- **columns**: tolerant lookup of logical columns across renamed form headers
- **loader**, **saving**: CSV reader and gzip+bincode snapshots
- **sheets**, **source**: remote sheet client and source selection
- **cache**: TTL cache held by the server state

### Analysis layer
- **analysis**: multi-value parsing, frequency tables, "Otros" bucketing,
  severity/priority tiers, cross-tabulation and per-page reports
- **filters**: sidebar filters by comedor, barrio, comuna, nodo and nicho

### Presentation layer (feature `web`)
- **graph**: SVG bar, pie and waffle charts
- **downloader**: CSV and XLSX exports
- **app**: axum routes and handlebars pages

## Configuration

Settings come from environment variables, see [`config::Settings`].
*/

pub mod analysis;
pub mod cache;
pub mod cell;
pub mod columns;
pub mod config;
pub mod downloader;
pub mod error;
pub mod filters;
pub mod loader;
pub mod saving;
pub mod source;
pub mod table;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod graph;
#[cfg(feature = "web")]
pub mod sheets;

pub use cell::Value;
pub use columns::ColumnCatalog;
pub use error::{DashboardError, NoData};
pub use table::Table;
