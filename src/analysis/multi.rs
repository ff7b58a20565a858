use crate::cell::{Value, is_null_marker};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref EXTENDED_SPLIT: Regex = Regex::new(r"[,;\n]").unwrap();
}

/// Separators used by multi-select survey answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Delimiters {
    /// Comma only; the form's checkbox questions export this way.
    #[default]
    Comma,
    /// Comma, semicolon and newline; free-text answers listing several items.
    Extended,
}

impl Delimiters {
    fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        match self {
            Delimiters::Comma => text.split(',').collect(),
            Delimiters::Extended => EXTENDED_SPLIT.split(text).collect(),
        }
    }
}

/// Flattens a column of multi-select cells into individual mentions.
///
/// Output keeps row order, then split order within the cell. Missing cells,
/// null markers and empty pieces contribute nothing. Duplicates are kept: a
/// category mentioned twice in one cell counts twice.
pub fn parse_multi<'a, I>(values: I, delimiters: Delimiters) -> Vec<String>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut tokens = Vec::new();
    for value in values {
        let Some(text) = value.as_text() else {
            continue;
        };
        if is_null_marker(text.trim()) {
            continue;
        }
        for piece in delimiters.split(&text) {
            let piece = piece.trim();
            if !is_null_marker(piece) {
                tokens.push(piece.to_string());
            }
        }
    }
    tokens
}

/// Single-valued counterpart of [`parse_multi`]: one token per present cell.
pub fn parse_single<'a, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Value>,
{
    values
        .into_iter()
        .filter_map(Value::as_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !is_null_marker(s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(raw: &[&str]) -> Vec<Value> {
        raw.iter().map(|s| Value::Text(s.to_string())).collect()
    }

    #[test]
    fn test_parse_multi_skips_blanks_and_null_markers() {
        let values = cells(&["a, b", "", "nan", "c"]);
        assert_eq!(parse_multi(&values, Delimiters::Comma), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_multi_keeps_duplicates_and_order() {
        let values = vec![
            Value::Text("Agua, Luz, Agua".into()),
            Value::Missing,
            Value::Text(" Gas ,, None".into()),
        ];
        assert_eq!(
            parse_multi(&values, Delimiters::Comma),
            vec!["Agua", "Luz", "Agua", "Gas"]
        );
    }

    #[test]
    fn test_extended_delimiters() {
        let values = cells(&["Huerta; Cocina\nLectura, Deporte"]);
        assert_eq!(
            parse_multi(&values, Delimiters::Extended),
            vec!["Huerta", "Cocina", "Lectura", "Deporte"]
        );
        // Comma mode leaves semicolons alone.
        assert_eq!(
            parse_multi(&values, Delimiters::Comma),
            vec!["Huerta; Cocina\nLectura", "Deporte"]
        );
    }

    #[test]
    fn test_numbers_are_rendered_as_labels() {
        let values = vec![Value::Number(3.0), Value::Number(2.5)];
        assert_eq!(parse_multi(&values, Delimiters::Comma), vec!["3", "2.5"]);
        assert_eq!(parse_single(&values), vec!["3", "2.5"]);
    }

    #[test]
    fn test_parse_single_keeps_commas() {
        let values = cells(&["Sí, siempre", "nan"]);
        assert_eq!(parse_single(&values), vec!["Sí, siempre"]);
    }
}
