//! Decoding of loosely-typed upstream values (`"1"`, `1`, `true`, `"yes"`).
//!
//! Upstream scanners are inconsistent about how they encode flags and
//! counters. Everything is decoded here once so adapters only ever work with
//! typed values.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Boolean interpretation of a flag-like value.
pub fn flag(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "y"
        ),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Whether a value signals a finding: a non-empty list, a non-empty string or
/// any other truthy non-boolean value. Plain booleans are status flags rather
/// than findings and never count.
pub fn indicator(v: &Value) -> bool {
    match v {
        Value::Null | Value::Bool(_) => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => a.iter().any(|e| !e.is_null()),
        other => flag(other),
    }
}

/// Non-negative counter from an integer, float or numeric string.
pub fn count(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64),
        Value::Bool(b) => Some(u64::from(*b)),
        _ => None,
    }
}

/// Float from a number or numeric string.
pub fn float(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Flatten a value into display strings: strings stay as-is, arrays are
/// expanded, anything else is rendered as compact JSON.
pub fn strings(v: &Value) -> Vec<String> {
    match v {
        Value::Null => Vec::new(),
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        Value::String(s) => vec![s.clone()],
        Value::Array(a) => a.iter().flat_map(strings).collect(),
        other => vec![other.to_string()],
    }
}

/// Serde adapter for fields that should be a `bool` but arrive loosely typed.
pub fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    Ok(flag(&v))
}

/// Serde adapter for optional loosely-typed counters.
pub fn deserialize_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    Ok(count(&v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flags() {
        assert!(flag(&json!(true)));
        assert!(flag(&json!(1)));
        assert!(flag(&json!("1")));
        assert!(flag(&json!("Yes")));
        assert!(!flag(&json!("0")));
        assert!(!flag(&json!(false)));
        assert!(!flag(&json!(null)));
        assert!(!flag(&json!([])));
    }

    #[test]
    fn indicators_ignore_booleans() {
        assert!(indicator(&json!(["eval.base64.encoded"])));
        assert!(indicator(&json!("injected iframe")));
        assert!(indicator(&json!(3)));
        assert!(indicator(&json!({"a": 1})));
        assert!(!indicator(&json!(true)));
        assert!(!indicator(&json!(false)));
        assert!(!indicator(&json!("  ")));
        assert!(!indicator(&json!([])));
        assert!(!indicator(&json!([null])));
        assert!(!indicator(&json!(0)));
    }

    #[test]
    fn counters() {
        assert_eq!(count(&json!(3)), Some(3));
        assert_eq!(count(&json!("12")), Some(12));
        assert_eq!(count(&json!(2.0)), Some(2));
        assert_eq!(count(&json!(-1)), None);
        assert_eq!(count(&json!("n/a")), None);
        assert_eq!(float(&json!("99.980")), Some(99.98));
    }

    #[test]
    fn flatten_strings() {
        assert_eq!(strings(&json!(["a", ["b"], null])), vec!["a".to_string(), "b".to_string()]);
        assert!(strings(&json!("")).is_empty());
    }
}
