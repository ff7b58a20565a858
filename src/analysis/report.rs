//! Page definitions: which column each dashboard page analyses and how.
//!
//! A [`ReportSpec`] bundles the logical column, how its cells split into
//! mentions, how many categories the chart keeps, and the tier profile used to
//! colour the table. [`run_report`] turns a (possibly filtered) table into the
//! numbers a page shows.

use super::bucket::bucket;
use super::crosstab::{CrossTab, Insights, cross_tab, normalize_answer};
use super::frequency::{
    CategoryCount, Thresholds, Tier, aggregate, classify, percentage, tier_summary,
};
use super::multi::{Delimiters, parse_multi, parse_single};
use crate::columns::{self, ColumnCatalog};
use crate::error::NoData;
use crate::cell::Value;
use crate::table::Table;
use serde::Serialize;
use std::ops::RangeInclusive;

/// Bounds of the "categories to show" control on report pages.
pub const TOP_N_RANGE: RangeInclusive<usize> = 3..=20;
/// Bounds of the "maximum categories" control on the variable explorer.
pub const VARIABLE_MAX_RANGE: RangeInclusive<usize> = 5..=25;
/// Categories kept per side before cross-tabulating.
pub const CROSS_TOP_N: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChartKind {
    Bar,
    Pie,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSpec {
    pub key: &'static str,
    pub title: &'static str,
    pub column: &'static str,
    /// `None` for single-valued columns.
    pub delimiters: Option<Delimiters>,
    pub top_n: usize,
    pub thresholds: Option<Thresholds>,
    pub chart: ChartKind,
}

/// The six category pages of the dashboard.
pub fn builtin_reports() -> Vec<ReportSpec> {
    vec![
        ReportSpec {
            key: "tipos",
            title: "Distribución de tipos de comedores",
            column: columns::TIPO_COMEDOR,
            delimiters: None,
            top_n: 15,
            thresholds: None,
            chart: ChartKind::Pie,
        },
        ReportSpec {
            key: "problematicas",
            title: "Problemáticas",
            column: columns::PROBLEMATICAS,
            delimiters: Some(Delimiters::Comma),
            top_n: 7,
            thresholds: Some(Thresholds::severity()),
            chart: ChartKind::Bar,
        },
        ReportSpec {
            key: "necesidades",
            title: "Necesidades",
            column: columns::NECESIDADES,
            delimiters: Some(Delimiters::Comma),
            top_n: 6,
            thresholds: Some(Thresholds::priority()),
            chart: ChartKind::Bar,
        },
        ReportSpec {
            key: "enfoques",
            title: "Enfoques diferenciales/étnicos",
            column: columns::ENFOQUES,
            delimiters: Some(Delimiters::Comma),
            top_n: 7,
            thresholds: None,
            chart: ChartKind::Bar,
        },
        ReportSpec {
            key: "etapa-vital",
            title: "Etapa vital",
            column: columns::ETAPA_VITAL,
            delimiters: Some(Delimiters::Comma),
            top_n: 15,
            thresholds: None,
            chart: ChartKind::Bar,
        },
        ReportSpec {
            key: "otras-categorias",
            title: "Otras categorías",
            column: columns::OTRAS_CATEGORIAS,
            delimiters: Some(Delimiters::Comma),
            top_n: 8,
            thresholds: None,
            chart: ChartKind::Bar,
        },
    ]
}

pub fn find_report(key: &str) -> Option<ReportSpec> {
    builtin_reports().into_iter().find(|r| r.key == key)
}

/// Report definition for one column of the variable explorer.
///
/// `max_categories` counts the remainder bucket, so 15 shows 14 categories plus
/// "Otros".
pub fn variable_report(key: &str, catalog: &ColumnCatalog, max_categories: usize) -> Option<ReportSpec> {
    let column = columns::ACTIVITY_COLUMNS.iter().find(|c| **c == key)?;
    let entry = catalog.entry(column)?;
    let max = max_categories.clamp(*VARIABLE_MAX_RANGE.start(), *VARIABLE_MAX_RANGE.end());
    Some(ReportSpec {
        key: entry.key,
        title: entry.label,
        column: entry.key,
        delimiters: (*column == columns::TEMAS_EJECUTADOS).then_some(Delimiters::Extended),
        top_n: max - 1,
        thresholds: None,
        chart: ChartKind::Bar,
    })
}

pub fn clamp_top_n(n: usize) -> usize {
    n.clamp(*TOP_N_RANGE.start(), *TOP_N_RANGE.end())
}

/// One category of a report's full distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub label: String,
    pub count: usize,
    pub percentage: f64,
    pub tier: Option<Tier>,
    pub tier_label: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierCount {
    pub tier: Tier,
    pub label: &'static str,
    pub categories: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub key: String,
    pub title: String,
    pub column: String,
    pub chart_kind: ChartKind,
    pub top_n: usize,
    pub total_records: usize,
    pub records_with_data: usize,
    pub total_mentions: usize,
    pub unique_categories: usize,
    pub rows: Vec<ReportRow>,
    pub chart: CategoryCount,
    pub tiers: Vec<TierCount>,
    pub top3_share: f64,
    pub top5_share: f64,
}

impl Report {
    /// Mentions per record that answered the question.
    pub fn mentions_per_record(&self) -> f64 {
        if self.records_with_data == 0 {
            0.0
        } else {
            self.total_mentions as f64 / self.records_with_data as f64
        }
    }

    pub fn top(&self) -> Option<&ReportRow> {
        self.rows.first()
    }
}

/// Computes one report page over `table`.
///
/// `top_n_override` replaces the definition's chart size and is clamped to
/// [`TOP_N_RANGE`].
pub fn run_report(
    table: &Table,
    catalog: &ColumnCatalog,
    spec: &ReportSpec,
    top_n_override: Option<usize>,
) -> Result<Report, NoData> {
    if table.is_empty() {
        return Err(NoData::EmptyTable);
    }
    let column = catalog
        .resolve(table, spec.column)
        .ok_or_else(|| NoData::ColumnNotFound {
            column: catalog.label(spec.column).to_string(),
        })?;
    let values = table
        .column_values(column)
        .ok_or_else(|| NoData::ColumnNotFound {
            column: column.to_string(),
        })?;

    let records_with_data = values.iter().filter(|v| v.is_present()).count();
    if records_with_data == 0 {
        return Err(NoData::EmptyColumn {
            column: column.to_string(),
        });
    }

    let tokens = match spec.delimiters {
        Some(delimiters) => parse_multi(values.iter().copied(), delimiters),
        None => parse_single(values.iter().copied()),
    };
    if tokens.is_empty() {
        return Err(NoData::NoTokens {
            column: column.to_string(),
        });
    }

    let counts = aggregate(&tokens);
    let total_mentions = counts.total();
    let top_n = top_n_override.map(clamp_top_n).unwrap_or(spec.top_n);

    let rows: Vec<ReportRow> = counts
        .iter()
        .map(|(label, count)| {
            let tier = spec
                .thresholds
                .as_ref()
                .and_then(|t| classify(count, total_mentions, t));
            ReportRow {
                label: label.to_string(),
                count,
                percentage: percentage(count, total_mentions),
                tier,
                tier_label: match (&spec.thresholds, tier) {
                    (Some(t), Some(tier)) => Some(t.label(tier)),
                    _ => None,
                },
            }
        })
        .collect();

    let tiers = spec
        .thresholds
        .as_ref()
        .map(|t| {
            tier_summary(&counts, t)
                .into_iter()
                .map(|(tier, categories)| TierCount {
                    tier,
                    label: t.label(tier),
                    categories,
                })
                .collect()
        })
        .unwrap_or_default();

    let head_share = |k: usize| percentage(counts.iter().take(k).map(|(_, c)| c).sum(), total_mentions);

    log::debug!(
        "report {}: {} mentions across {} categories in {}",
        spec.key,
        total_mentions,
        counts.len(),
        column
    );

    Ok(Report {
        key: spec.key.to_string(),
        title: spec.title.to_string(),
        column: column.to_string(),
        chart_kind: spec.chart,
        top_n,
        total_records: table.len(),
        records_with_data,
        total_mentions,
        unique_categories: counts.len(),
        chart: bucket(&counts, top_n),
        top3_share: head_share(3),
        top5_share: head_share(5),
        rows,
        tiers,
    })
}

/// Cross-tabulation of two catalog columns.
#[derive(Debug, Clone, Serialize)]
pub struct CrossReport {
    pub var1: String,
    pub var2: String,
    pub label1: String,
    pub label2: String,
    pub column1: String,
    pub column2: String,
    pub tab: CrossTab,
    pub insights: Option<Insights>,
}

/// Cross-tabulates two logical columns, keeping [`CROSS_TOP_N`] categories per side.
pub fn run_cross(
    table: &Table,
    catalog: &ColumnCatalog,
    var1: &str,
    var2: &str,
) -> Result<CrossReport, NoData> {
    if table.is_empty() {
        return Err(NoData::EmptyTable);
    }
    let resolve = |key: &str| {
        catalog
            .resolve(table, key)
            .ok_or_else(|| NoData::ColumnNotFound {
                column: catalog.label(key).to_string(),
            })
    };
    let column1 = resolve(var1)?;
    let column2 = resolve(var2)?;
    let (Some(idx1), Some(idx2)) = (table.column_index(column1), table.column_index(column2)) else {
        return Err(NoData::NoCompletePairs);
    };

    let answer = |v: &Value| v.as_text().map(|s| normalize_answer(&s));
    let pairs = table
        .rows()
        .iter()
        .map(|row| (answer(&row[idx1]), answer(&row[idx2])));
    let tab = cross_tab(pairs, CROSS_TOP_N, CROSS_TOP_N);
    if tab.is_empty() {
        return Err(NoData::NoCompletePairs);
    }

    Ok(CrossReport {
        var1: var1.to_string(),
        var2: var2.to_string(),
        label1: catalog.label(var1).to_string(),
        label2: catalog.label(var2).to_string(),
        column1: column1.to_string(),
        column2: column2.to_string(),
        insights: tab.insights(),
        tab,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn survey() -> Table {
        let rows = vec![
            vec!["Comunitario", "Agua, Luz", "Sí", "Alimentos"],
            vec!["Comunitario", "Agua", "si", "Alimentos, Gas"],
            vec!["Institucional", "Seguridad, Agua", "No", ""],
            vec!["Comunitario", "nan", "NO", "Gas"],
        ];
        Table::new(
            vec![
                "TIPO DE COMEDOR".into(),
                "PROBLEMÁTICAS".into(),
                "¿Ha articulado con alguna institución?".into(),
                "NECESIDADES".into(),
            ],
            rows.into_iter()
                .map(|r| r.into_iter().map(Value::from_raw).collect())
                .collect(),
        )
    }

    #[test]
    fn test_run_report_problematicas() {
        let table = survey();
        let spec = find_report("problematicas").unwrap();
        let report = run_report(&table, ColumnCatalog::default_ref(), &spec, None).unwrap();

        assert_eq!(report.column, "PROBLEMÁTICAS");
        assert_eq!(report.total_records, 4);
        assert_eq!(report.records_with_data, 3);
        assert_eq!(report.total_mentions, 5);
        assert_eq!(report.rows[0].label, "Agua");
        assert_eq!(report.rows[0].count, 3);
        assert_eq!(report.rows[0].tier, Some(Tier::Critical));
        assert_eq!(report.rows[0].tier_label, Some("Crítico"));
        assert_eq!(report.chart.total(), 5);
        assert_eq!(report.tiers.len(), 4);
        assert!((report.top3_share - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_top_n_override_is_clamped() {
        let table = survey();
        let spec = find_report("problematicas").unwrap();
        let report = run_report(&table, ColumnCatalog::default_ref(), &spec, Some(1)).unwrap();
        assert_eq!(report.top_n, 3);
        assert_eq!(report.chart.len(), 3);
        assert_eq!(clamp_top_n(50), 20);
    }

    #[test]
    fn test_single_valued_report() {
        let table = survey();
        let spec = find_report("tipos").unwrap();
        let report = run_report(&table, ColumnCatalog::default_ref(), &spec, None).unwrap();
        assert_eq!(report.chart_kind, ChartKind::Pie);
        assert_eq!(report.chart.get("Comunitario"), Some(3));
        assert!(report.tiers.is_empty());
        assert!(report.rows.iter().all(|r| r.tier.is_none()));
    }

    #[test]
    fn test_no_data_reasons() {
        let catalog = ColumnCatalog::default_ref();
        let spec = find_report("enfoques").unwrap();
        assert_eq!(
            run_report(&Table::default(), catalog, &spec, None).unwrap_err(),
            NoData::EmptyTable
        );
        assert!(matches!(
            run_report(&survey(), catalog, &spec, None),
            Err(NoData::ColumnNotFound { .. })
        ));

        let blank = Table::new(vec!["ENFOQUES DIFERENCIALES".into()], vec![vec![Value::Missing]]);
        assert!(matches!(
            run_report(&blank, catalog, &spec, None),
            Err(NoData::EmptyColumn { .. })
        ));

        let commas = Table::new(
            vec!["ENFOQUES DIFERENCIALES".into()],
            vec![vec![Value::Text(", ,".into())]],
        );
        assert!(matches!(
            run_report(&commas, catalog, &spec, None),
            Err(NoData::NoTokens { .. })
        ));
    }

    #[test]
    fn test_variable_report() {
        let catalog = ColumnCatalog::default_ref();
        let spec = variable_report(columns::TEMAS_EJECUTADOS, catalog, 15).unwrap();
        assert_eq!(spec.top_n, 14);
        assert_eq!(spec.delimiters, Some(Delimiters::Extended));
        let spec = variable_report(columns::COMERCIAL, catalog, 100).unwrap();
        assert_eq!(spec.top_n, 24);
        assert_eq!(spec.delimiters, None);
        assert!(variable_report(columns::BARRIO, catalog, 15).is_none());
    }

    #[test]
    fn test_run_cross_normalizes_answers() {
        let table = survey();
        let cross = run_cross(
            &table,
            ColumnCatalog::default_ref(),
            columns::TIPO_COMEDOR,
            columns::ARTICULACION_INSTITUCION,
        )
        .unwrap();
        assert_eq!(cross.tab.cols(), &["Sí".to_string(), "No".to_string()]);
        assert_eq!(cross.tab.count("Comunitario", "Sí"), 2);
        assert_eq!(cross.tab.total(), 4);
        assert_eq!(cross.insights.unwrap().top.count, 2);
    }

    #[test]
    fn test_run_cross_without_pairs() {
        let table = Table::new(
            vec!["BARRIO".into(), "COMUNA".into()],
            vec![vec![Value::Text("Centro".into()), Value::Missing]],
        );
        let err = run_cross(
            &table,
            ColumnCatalog::default_ref(),
            columns::BARRIO,
            columns::COMUNA,
        )
        .unwrap_err();
        assert_eq!(err, NoData::NoCompletePairs);
    }
}
