use crate::columns::{self, ColumnCatalog};
use crate::table::Table;
use serde::{Deserialize, Serialize};

/// Sidebar filters. Each one narrows the table to rows whose column label equals
/// the chosen value; `None`, an empty string, "Todos" and "Todas" mean no filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filters {
    pub comedor: Option<String>,
    pub barrio: Option<String>,
    pub comuna: Option<String>,
    pub nodo: Option<String>,
    pub nicho: Option<String>,
}

/// Filterable columns: query key, logical column, and the "no filter" option label.
pub const FILTER_COLUMNS: [(&str, &str, &str); 5] = [
    ("comedor", columns::NOMBRE_COMEDOR, "Todos"),
    ("barrio", columns::BARRIO, "Todos"),
    ("comuna", columns::COMUNA, "Todas"),
    ("nodo", columns::NODO, "Todos"),
    ("nicho", columns::NICHO, "Todos"),
];

pub fn is_all_option(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value == "Todos" || value == "Todas"
}

impl Filters {
    fn value(&self, key: &str) -> Option<&str> {
        let value = match key {
            "comedor" => self.comedor.as_deref(),
            "barrio" => self.barrio.as_deref(),
            "comuna" => self.comuna.as_deref(),
            "nodo" => self.nodo.as_deref(),
            "nicho" => self.nicho.as_deref(),
            _ => None,
        };
        value.filter(|v| !is_all_option(v)).map(str::trim)
    }

    /// Active `(query key, value)` pairs.
    pub fn active(&self) -> Vec<(&'static str, &str)> {
        FILTER_COLUMNS
            .into_iter()
            .filter_map(|(key, _, _)| self.value(key).map(|v| (key, v)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.active().is_empty()
    }

    /// Returns the rows matching every active filter. Filters whose column
    /// cannot be resolved are ignored.
    pub fn apply(&self, table: &Table, catalog: &ColumnCatalog) -> Table {
        let mut checks: Vec<(usize, &str)> = Vec::new();
        for (key, logical, _) in FILTER_COLUMNS {
            let Some(wanted) = self.value(key) else {
                continue;
            };
            match catalog.resolve(table, logical).and_then(|c| table.column_index(c)) {
                Some(idx) => checks.push((idx, wanted)),
                None => log::debug!("filter {} ignored: column not present", key),
            }
        }
        if checks.is_empty() {
            return table.clone();
        }
        table.filter_rows(|row| {
            checks
                .iter()
                .all(|(idx, wanted)| row[*idx].is_present() && row[*idx].to_label() == *wanted)
        })
    }

    /// Query string for links that keep the current filters, starting with `&`
    /// when non-empty.
    pub fn query_suffix(&self) -> String {
        self.active()
            .into_iter()
            .map(|(k, v)| format!("&{}={}", k, urlencoding::encode(v)))
            .collect()
    }
}

/// Choices offered by one filter control.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOptions {
    pub key: &'static str,
    pub label: &'static str,
    pub all_option: &'static str,
    pub values: Vec<String>,
    pub selected: Option<String>,
}

/// Filter controls for the columns present in `table`, with their sorted values.
pub fn options(table: &Table, catalog: &ColumnCatalog, current: &Filters) -> Vec<FilterOptions> {
    FILTER_COLUMNS
        .into_iter()
        .filter_map(|(key, logical, all)| {
            let column = catalog.resolve(table, logical)?;
            Some(FilterOptions {
                key,
                label: catalog.entry(logical).map(|e| e.label).unwrap_or(key),
                all_option: all,
                values: table.unique_labels(column),
                selected: current.value(key).map(str::to_string),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Value;

    fn table() -> Table {
        let mut t = Table::new(
            vec!["NOMBRE DEL COMEDOR".into(), "BARRIO".into(), "COMUNA".into()],
            vec![
                vec!["Uno".into(), "Centro".into(), "3".into()],
                vec!["Dos".into(), "Centro".into(), "4".into()],
                vec!["Tres".into(), "Norte".into(), "3".into()],
                vec!["Cuatro".into(), Value::Missing, Value::Missing],
            ],
        );
        t.coerce_numeric_columns(&["COMUNA".into()]);
        t
    }

    #[test]
    fn test_all_options_mean_no_filter() {
        let filters = Filters {
            barrio: Some("Todos".into()),
            comuna: Some("Todas".into()),
            nodo: Some("".into()),
            ..Default::default()
        };
        assert!(filters.is_empty());
        assert_eq!(filters.apply(&table(), ColumnCatalog::default_ref()).len(), 4);
    }

    #[test]
    fn test_filters_narrow_rows() {
        let catalog = ColumnCatalog::default_ref();
        let base = table();
        let by_barrio = Filters {
            barrio: Some("Centro".into()),
            ..Default::default()
        };
        assert_eq!(by_barrio.apply(&base, catalog).len(), 2);

        // Numeric columns match on their label.
        let both = Filters {
            barrio: Some("Centro".into()),
            comuna: Some("3".into()),
            ..Default::default()
        };
        let filtered = both.apply(&base, catalog);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.get(0, "NOMBRE DEL COMEDOR"), Some(&Value::Text("Uno".into())));
        assert_eq!(base.len(), 4);
    }

    #[test]
    fn test_unresolved_filter_is_ignored() {
        let filters = Filters {
            nicho: Some("7".into()),
            ..Default::default()
        };
        assert_eq!(filters.apply(&table(), ColumnCatalog::default_ref()).len(), 4);
    }

    #[test]
    fn test_options_and_query_suffix() {
        let filters = Filters {
            barrio: Some("Centro Sur".into()),
            ..Default::default()
        };
        let opts = options(&table(), ColumnCatalog::default_ref(), &filters);
        let keys: Vec<&str> = opts.iter().map(|o| o.key).collect();
        assert_eq!(keys, vec!["comedor", "barrio", "comuna"]);
        assert_eq!(opts[2].all_option, "Todas");
        assert_eq!(opts[2].values, vec!["3", "4"]);
        assert_eq!(opts[1].selected.as_deref(), Some("Centro Sur"));
        assert_eq!(filters.query_suffix(), "&barrio=Centro%20Sur");
    }
}
