use crate::cell::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// In-memory snapshot of the survey sheet.
///
/// Column names are unique (see [`make_headers_unique`]) and every row has exactly
/// one value per column. Rows are never edited after cleaning; filtering produces a
/// new table.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// Makes duplicated headers unique by suffixing later occurrences.
///
/// The first occurrence keeps its name; the next ones become `NAME_1`, `NAME_2`, ...
/// in source order.
pub fn make_headers_unique(headers: &[String]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut taken: BTreeSet<String> = headers.iter().cloned().collect();
    let mut unique = Vec::with_capacity(headers.len());

    for header in headers {
        match seen.get_mut(header.as_str()) {
            None => {
                seen.insert(header.as_str(), 0);
                unique.push(header.clone());
            }
            Some(count) => {
                // Skip suffixes that collide with a literal header of the same name.
                let mut candidate;
                loop {
                    *count += 1;
                    candidate = format!("{}_{}", header, count);
                    if !taken.contains(&candidate) {
                        break;
                    }
                }
                taken.insert(candidate.clone());
                unique.push(candidate);
            }
        }
    }

    unique
}

impl Table {
    /// Builds a table from already-typed rows. Rows are padded or truncated to the
    /// header width and headers are made unique.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let columns = make_headers_unique(&headers);
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Missing);
                row
            })
            .collect();
        Table { columns, rows }
    }

    /// Builds a table from the raw values grid of a sheet: the first row holds the
    /// headers, the rest are records.
    pub fn from_raw_rows(raw: Vec<Vec<String>>) -> Option<Self> {
        let mut iter = raw.into_iter();
        let headers: Vec<String> = iter
            .next()?
            .into_iter()
            .map(|h| h.trim_end_matches(['\r', '\n']).to_string())
            .collect();
        if headers.is_empty() {
            return None;
        }
        let rows = iter
            .map(|row| row.iter().map(|raw| Value::from_raw(raw)).collect())
            .collect();
        Some(Table::new(headers, rows))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Values of one column in row order; `None` when the column does not exist.
    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Number of non-missing values in a column.
    pub fn present_count(&self, name: &str) -> usize {
        self.column_values(name)
            .map(|values| values.iter().filter(|v| v.is_present()).count())
            .unwrap_or(0)
    }

    /// Distinct labels of a column, sorted, missing values excluded.
    pub fn unique_labels(&self, name: &str) -> Vec<String> {
        let Some(values) = self.column_values(name) else {
            return Vec::new();
        };
        let set: BTreeSet<String> = values
            .into_iter()
            .filter(|v| v.is_present())
            .map(|v| v.to_label())
            .collect();
        set.into_iter().collect()
    }

    /// Returns a new table holding the rows for which `keep` returns true.
    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[Value]) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| keep(row))
                .cloned()
                .collect(),
        }
    }

    /// Drops rows where every value is missing.
    pub fn drop_empty_rows(&mut self) {
        self.rows.retain(|row| row.iter().any(Value::is_present));
    }

    /// Coerces the named columns to numbers; unparseable cells become missing.
    /// Unknown column names are ignored.
    pub fn coerce_numeric_columns(&mut self, names: &[String]) {
        let indices: Vec<usize> = names.iter().filter_map(|n| self.column_index(n)).collect();
        for row in &mut self.rows {
            for &idx in &indices {
                let value = std::mem::take(&mut row[idx]);
                row[idx] = value.coerce_numeric();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_make_headers_unique() {
        let headers: Vec<String> = ["NOMBRE", "BARRIO", "NOMBRE", "NOMBRE"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            make_headers_unique(&headers),
            vec!["NOMBRE", "BARRIO", "NOMBRE_1", "NOMBRE_2"]
        );
    }

    #[test]
    fn test_make_headers_unique_avoids_existing_suffix() {
        let headers: Vec<String> = ["A", "A_1", "A"].iter().map(|s| s.to_string()).collect();
        assert_eq!(make_headers_unique(&headers), vec!["A", "A_1", "A_2"]);
    }

    #[test]
    fn test_duplicate_headers_keep_their_data() {
        let table = Table::from_raw_rows(raw(&[
            &["NOMBRE", "NOMBRE"],
            &["Comedor Uno", "Responsable Uno"],
            &["Comedor Dos", "Responsable Dos"],
        ]))
        .unwrap();

        assert_eq!(table.columns(), &["NOMBRE".to_string(), "NOMBRE_1".to_string()]);
        assert_eq!(
            table.get(1, "NOMBRE"),
            Some(&Value::Text("Comedor Dos".into()))
        );
        assert_eq!(
            table.get(0, "NOMBRE_1"),
            Some(&Value::Text("Responsable Uno".into()))
        );
    }

    #[test]
    fn test_ragged_rows_are_padded_and_truncated() {
        let table = Table::from_raw_rows(raw(&[&["A", "B"], &["1"], &["1", "2", "3"]])).unwrap();
        assert_eq!(table.rows()[0], vec![Value::Text("1".into()), Value::Missing]);
        assert_eq!(table.rows()[1].len(), 2);
    }

    #[test]
    fn test_cleaning() {
        let mut table = Table::from_raw_rows(raw(&[
            &["COMUNA", "BARRIO"],
            &["3", "Centro"],
            &["", "nan"],
            &["sin dato", "Norte"],
        ]))
        .unwrap();
        table.drop_empty_rows();
        table.coerce_numeric_columns(&["COMUNA".to_string(), "NOPE".to_string()]);

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "COMUNA"), Some(&Value::Number(3.0)));
        assert_eq!(table.get(1, "COMUNA"), Some(&Value::Missing));
        assert_eq!(table.unique_labels("COMUNA"), vec!["3"]);
        assert_eq!(table.present_count("BARRIO"), 2);
    }

    #[test]
    fn test_filter_rows_leaves_original_untouched() {
        let table = Table::from_raw_rows(raw(&[&["BARRIO"], &["Centro"], &["Norte"]])).unwrap();
        let idx = table.column_index("BARRIO").unwrap();
        let filtered = table.filter_rows(|row| row[idx].to_label() == "Norte");
        assert_eq!(filtered.len(), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_empty_grid() {
        assert!(Table::from_raw_rows(Vec::new()).is_none());
        assert!(Table::from_raw_rows(vec![vec![]]).is_none());
    }
}
