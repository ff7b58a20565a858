use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw strings that the survey export uses for "no answer".
pub const NULL_MARKERS: [&str; 2] = ["nan", "None"];

/// A single survey cell.
///
/// Source sheets mix free text, numeric codes and blanks in the same column, so
/// every cell is parsed once into this sum type and all later code goes through
/// the coercion helpers below instead of re-inspecting strings.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Missing,
    Text(String),
    Number(f64),
}

impl Value {
    /// Parses a raw cell as text.
    ///
    /// Surrounding whitespace is removed and null markers become `Missing`.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if is_null_marker(trimmed) {
            Value::Missing
        } else {
            Value::Text(trimmed.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn is_present(&self) -> bool {
        !self.is_missing()
    }

    /// Text form of the cell, if any. Numbers are rendered with [`Value::to_label`].
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Missing => None,
            Value::Text(s) => Some(s.clone()),
            Value::Number(_) => Some(self.to_label()),
        }
    }

    /// Numeric form of the cell. Text that does not parse yields `None`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Missing => None,
            Value::Number(n) => Some(*n),
            Value::Text(s) => parse_number(s),
        }
    }

    /// Converts text to `Number` where possible; unparseable text becomes `Missing`.
    pub fn coerce_numeric(self) -> Self {
        match self {
            Value::Text(s) => match parse_number(&s) {
                Some(n) => Value::Number(n),
                None => Value::Missing,
            },
            other => other,
        }
    }

    /// Label used in filters, charts and exports.
    ///
    /// Whole numbers print without a fractional part (`3.0` -> `"3"`), which keeps
    /// zone codes such as COMUNA readable after numeric coercion.
    pub fn to_label(&self) -> String {
        match self {
            Value::Missing => String::new(),
            Value::Text(s) => s.clone(),
            Value::Number(n) => format_number(*n),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_label())
    }
}

impl From<&str> for Value {
    fn from(raw: &str) -> Self {
        Value::from_raw(raw)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        if n.is_nan() {
            Value::Missing
        } else {
            Value::Number(n)
        }
    }
}

pub fn is_null_marker(s: &str) -> bool {
    s.is_empty() || NULL_MARKERS.contains(&s)
}

fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Sheets exports sometimes use a decimal comma.
    let normalized = trimmed.replace(',', ".");
    match normalized.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => None,
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_trims_and_drops_null_markers() {
        assert_eq!(Value::from_raw("  Barrio Sur "), Value::Text("Barrio Sur".into()));
        assert_eq!(Value::from_raw(""), Value::Missing);
        assert_eq!(Value::from_raw("   "), Value::Missing);
        assert_eq!(Value::from_raw("nan"), Value::Missing);
        assert_eq!(Value::from_raw("None"), Value::Missing);
        // The null set is case-sensitive.
        assert_eq!(Value::from_raw("NONE"), Value::Text("NONE".into()));
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::from_raw("12").coerce_numeric(), Value::Number(12.0));
        assert_eq!(Value::from_raw("2,5").coerce_numeric(), Value::Number(2.5));
        assert_eq!(Value::from_raw("doce").coerce_numeric(), Value::Missing);
        assert_eq!(Value::Missing.coerce_numeric(), Value::Missing);
        assert_eq!(Value::Text("7".into()).as_number(), Some(7.0));
        assert_eq!(Value::Text("siete".into()).as_number(), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(Value::Number(3.0).to_label(), "3");
        assert_eq!(Value::Number(2.5).to_label(), "2.5");
        assert_eq!(Value::Missing.to_label(), "");
        assert_eq!(Value::Number(2019.0).as_text(), Some("2019".to_string()));
        assert_eq!(Value::from(f64::NAN), Value::Missing);
    }
}
