use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored cell value.
///
/// Serialized untagged so previews and write results carry plain JSON
/// numbers, strings and booleans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    /// Only produced when loading cells that were booleans in the source file
    Boolean(bool),
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Text(String::new())
    }
}

impl CellValue {
    /// Infer the stored type for an incoming value.
    ///
    /// Numbers stay numeric. Strings become numeric when their trimmed form is
    /// non-empty and parses fully as a finite number; everything else is kept
    /// as its string representation.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Number(n) => match n.as_f64() {
                Some(f) => CellValue::Number(f),
                None => CellValue::Text(n.to_string()),
            },
            Value::String(s) => CellValue::from_input(s),
            Value::Null => CellValue::Text(String::new()),
            Value::Bool(b) => CellValue::Text(b.to_string()),
            other => CellValue::Text(other.to_string()),
        }
    }

    /// Infer the stored type for free-form text input (e.g. a form field)
    pub fn from_input(input: &str) -> Self {
        match parse_number(input) {
            Some(n) => CellValue::Number(n),
            None => CellValue::Text(input.to_string()),
        }
    }
}

fn parse_number(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_infer_numeric_strings() {
        assert_eq!(CellValue::infer(&json!("42")), CellValue::Number(42.0));
        assert_eq!(CellValue::infer(&json!(" 3.5 ")), CellValue::Number(3.5));
        assert_eq!(CellValue::infer(&json!("-1e3")), CellValue::Number(-1000.0));
        assert_eq!(CellValue::infer(&json!(100)), CellValue::Number(100.0));
    }

    #[test]
    fn test_infer_text() {
        assert_eq!(CellValue::infer(&json!("abc")), CellValue::Text("abc".into()));
        assert_eq!(CellValue::infer(&json!("")), CellValue::Text(String::new()));
        assert_eq!(CellValue::infer(&json!("   ")), CellValue::Text("   ".into()));
        assert_eq!(CellValue::infer(&json!("12abc")), CellValue::Text("12abc".into()));
        assert_eq!(CellValue::infer(&json!("inf")), CellValue::Text("inf".into()));
        assert_eq!(CellValue::infer(&json!("NaN")), CellValue::Text("NaN".into()));
    }

    #[test]
    fn test_infer_other_json() {
        assert_eq!(CellValue::infer(&json!(true)), CellValue::Text("true".into()));
        assert_eq!(CellValue::infer(&Value::Null), CellValue::Text(String::new()));
        assert_eq!(CellValue::infer(&json!([1, 2])), CellValue::Text("[1,2]".into()));
    }

    #[test]
    fn test_serializes_untagged() {
        let row = vec![
            CellValue::Number(100.0),
            CellValue::Text("x".into()),
            CellValue::Boolean(false),
        ];
        assert_eq!(serde_json::to_value(&row).unwrap(), json!([100.0, "x", false]));
    }
}
