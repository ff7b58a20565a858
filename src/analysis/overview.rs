use super::frequency::{CategoryCount, aggregate, percentage};
use super::multi::parse_single;
use crate::cell::Value;
use crate::columns::{self, ColumnCatalog};
use crate::table::Table;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub name: String,
    pub missing: usize,
    pub completeness: f64,
    pub unique: usize,
    pub numeric: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub total_records: usize,
    pub total_columns: usize,
    pub columns: Vec<ColumnStats>,
}

/// Per-column completeness of the table.
pub fn summary_stats(table: &Table) -> SummaryStats {
    let columns = table
        .columns()
        .iter()
        .map(|name| {
            let values = table.column_values(name).unwrap_or_default();
            let present: Vec<_> = values.iter().filter(|v| v.is_present()).collect();
            let unique: HashSet<String> = present.iter().map(|v| v.to_label()).collect();
            ColumnStats {
                name: name.clone(),
                missing: values.len() - present.len(),
                completeness: percentage(present.len(), values.len()),
                unique: unique.len(),
                numeric: !present.is_empty()
                    && present.iter().all(|v| matches!(v, Value::Number(_))),
            }
        })
        .collect();

    SummaryStats {
        total_records: table.len(),
        total_columns: table.columns().len(),
        columns,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityReport {
    pub total_records: usize,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl QualityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.warnings.is_empty()
    }
}

/// Columns every analysis depends on.
pub const CRITICAL_COLUMNS: [&str; 4] = [
    columns::TIPO_COMEDOR,
    columns::NOMBRE_COMEDOR,
    columns::BARRIO,
    columns::COMUNA,
];

/// Checks missing critical columns, sparse columns, duplicated site names and
/// non-numeric codes.
pub fn quality_report(table: &Table, catalog: &ColumnCatalog) -> QualityReport {
    let mut report = QualityReport {
        total_records: table.len(),
        ..Default::default()
    };

    for key in CRITICAL_COLUMNS {
        let label = catalog.label(key);
        let Some(column) = catalog.resolve(table, key) else {
            report.issues.push(format!("Columna crítica '{}' no encontrada", label));
            continue;
        };
        let missing = table.len() - table.present_count(column);
        let pct = percentage(missing, table.len());
        if pct > 50.0 {
            report.issues.push(format!(
                "Columna crítica '{}' tiene {:.1}% de datos faltantes",
                column, pct
            ));
        } else if pct > 20.0 {
            report
                .warnings
                .push(format!("Columna '{}' tiene {:.1}% de datos faltantes", column, pct));
        }
    }

    if let Some(column) = catalog.resolve(table, columns::NOMBRE_COMEDOR) {
        let names = parse_single(table.column_values(column).unwrap_or_default());
        let mut seen = HashSet::new();
        let duplicates = names.iter().filter(|n| !seen.insert(n.as_str())).count();
        if duplicates > 0 {
            report.warnings.push(format!(
                "Se encontraron {} nombres de comedores duplicados",
                duplicates
            ));
        }
    }

    for key in columns::NUMERIC_COLUMNS {
        let Some(column) = catalog.resolve(table, key) else {
            continue;
        };
        let errors = table
            .column_values(column)
            .unwrap_or_default()
            .iter()
            .filter(|v| v.is_present() && v.as_number().is_none())
            .count();
        if errors > 0 {
            report.warnings.push(format!(
                "Columna '{}': {} valores no pueden convertirse a número",
                column, errors
            ));
        }
    }

    if report.is_clean() {
        report
            .recommendations
            .push("Los datos están en buen estado general".to_string());
    } else {
        if !report.issues.is_empty() {
            report
                .recommendations
                .push("Revisar y corregir los problemas críticos identificados".to_string());
        }
        if !report.warnings.is_empty() {
            report
                .recommendations
                .push("Considerar limpiar los datos según las advertencias".to_string());
        }
    }

    report
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneDistribution {
    pub key: &'static str,
    pub label: &'static str,
    pub column: String,
    pub counts: CategoryCount,
    /// Zone with the most sites and its count.
    pub leader: Option<(String, usize)>,
}

/// Site counts per comuna, barrio, nodo and nicho, for the zones present.
pub fn geographic_distribution(table: &Table, catalog: &ColumnCatalog) -> Vec<ZoneDistribution> {
    [columns::COMUNA, columns::BARRIO, columns::NODO, columns::NICHO]
        .into_iter()
        .filter_map(|key| {
            let column = catalog.resolve(table, key)?;
            let counts = aggregate(parse_single(table.column_values(column)?));
            let leader = counts.entries().first().cloned();
            Some(ZoneDistribution {
                key,
                label: catalog.entry(key).map(|e| e.label).unwrap_or(key),
                column: column.to_string(),
                counts,
                leader,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    #[serde(rename = "creciente")]
    Growing,
    #[serde(rename = "decreciente")]
    Shrinking,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Growing => "creciente",
            Trend::Shrinking => "decreciente",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalTrends {
    /// Sites linked per year, ascending by year.
    pub per_year: Vec<(i64, usize)>,
    pub first_year: i64,
    pub last_year: i64,
    pub active_years: i64,
    pub busiest_year: i64,
    pub busiest_count: usize,
    pub yearly_mean: f64,
    pub trend: Trend,
}

/// Linkage years of the sites. `None` when the column is absent or has no numeric years.
pub fn temporal_trends(table: &Table, catalog: &ColumnCatalog) -> Option<TemporalTrends> {
    let column = catalog.resolve(table, columns::ANIO_VINCULACION)?;
    let mut per_year: BTreeMap<i64, usize> = BTreeMap::new();
    for value in table.column_values(column)? {
        if let Some(year) = value.as_number() {
            *per_year.entry(year.trunc() as i64).or_default() += 1;
        }
    }

    let (&first_year, &first_count) = per_year.iter().next()?;
    let (&last_year, &last_count) = per_year.iter().next_back()?;
    // Earliest year wins ties.
    let (busiest_year, busiest_count) = per_year
        .iter()
        .fold((first_year, 0), |best, (&y, &c)| if c > best.1 { (y, c) } else { best });
    let total: usize = per_year.values().sum();

    Some(TemporalTrends {
        yearly_mean: total as f64 / per_year.len() as f64,
        per_year: per_year.into_iter().collect(),
        first_year,
        last_year,
        active_years: last_year - first_year + 1,
        busiest_year,
        busiest_count,
        trend: if last_count > first_count {
            Trend::Growing
        } else {
            Trend::Shrinking
        },
    })
}

/// Everything the landing page and `/api/overview` show about the dataset.
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub summary: SummaryStats,
    pub quality: QualityReport,
    pub geography: Vec<ZoneDistribution>,
    pub timeline: Option<TemporalTrends>,
}

pub fn overview(table: &Table, catalog: &ColumnCatalog) -> Overview {
    Overview {
        summary: summary_stats(table),
        quality: quality_report(table, catalog),
        geography: geographic_distribution(table, catalog),
        timeline: temporal_trends(table, catalog),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sites() -> Table {
        let raw = vec![
            vec!["TIPO DE COMEDOR", "NOMBRE DEL COMEDOR", "BARRIO", "COMUNA", "AÑO DE VINCULACIÓN AL PROGRAMA"],
            vec!["Comunitario", "La Esperanza", "Centro", "3", "2019"],
            vec!["Comunitario", "Sol Naciente", "Centro", "3", "2020"],
            vec!["Institucional", "La Esperanza", "Norte", "5", "2020"],
            vec!["Comunitario", "Los Pinos", "", "", "2022"],
        ];
        let mut table = Table::from_raw_rows(
            raw.into_iter()
                .map(|r| r.into_iter().map(String::from).collect())
                .collect(),
        )
        .unwrap();
        table.coerce_numeric_columns(&["COMUNA".into(), "AÑO DE VINCULACIÓN AL PROGRAMA".into()]);
        table
    }

    #[test]
    fn test_summary_stats() {
        let stats = summary_stats(&sites());
        assert_eq!(stats.total_records, 4);
        assert_eq!(stats.total_columns, 5);
        let barrio = stats.columns.iter().find(|c| c.name == "BARRIO").unwrap();
        assert_eq!(barrio.missing, 1);
        assert_eq!(barrio.completeness, 75.0);
        assert_eq!(barrio.unique, 2);
        assert!(!barrio.numeric);
        assert!(stats.columns.iter().find(|c| c.name == "COMUNA").unwrap().numeric);
    }

    #[test]
    fn test_quality_report_flags_duplicates_and_sparse_columns() {
        let report = quality_report(&sites(), ColumnCatalog::default_ref());
        assert!(report.issues.is_empty());
        assert!(report.warnings.iter().any(|w| w.contains("1 nombres de comedores duplicados")));
        assert!(report.warnings.iter().any(|w| w.starts_with("Columna 'BARRIO' tiene 25.0%")));
        assert_eq!(report.recommendations.len(), 1);
    }

    #[test]
    fn test_quality_report_missing_critical_column() {
        let table = Table::new(vec!["BARRIO".into()], vec![vec![Value::Text("Centro".into())]]);
        let report = quality_report(&table, ColumnCatalog::default_ref());
        assert_eq!(report.issues.len(), 3);
        assert!(report.issues[0].contains("no encontrada"));
        assert!(!report.is_clean());
    }

    #[test]
    fn test_geographic_distribution() {
        let geo = geographic_distribution(&sites(), ColumnCatalog::default_ref());
        let keys: Vec<&str> = geo.iter().map(|z| z.key).collect();
        assert_eq!(keys, vec![columns::COMUNA, columns::BARRIO]);
        assert_eq!(geo[0].leader, Some(("3".to_string(), 2)));
    }

    #[test]
    fn test_temporal_trends() {
        let trends = temporal_trends(&sites(), ColumnCatalog::default_ref()).unwrap();
        assert_eq!(trends.per_year, vec![(2019, 1), (2020, 2), (2022, 1)]);
        assert_eq!(trends.first_year, 2019);
        assert_eq!(trends.active_years, 4);
        assert_eq!(trends.busiest_year, 2020);
        assert_eq!(trends.trend, Trend::Shrinking);
        assert!((trends.yearly_mean - 4.0 / 3.0).abs() < 1e-9);
        assert!(temporal_trends(&Table::default(), ColumnCatalog::default_ref()).is_none());
    }
}
