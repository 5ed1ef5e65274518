//! Runtime values read from entities, and coercion of filter literals into them.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};

use crate::ast::Literal;
use crate::error::{QueryError, QueryResult};

/// Declared type of a registered field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Number,
    Bool,
    Date,
    /// A closed set of string variants, matched case-insensitively
    Enum(&'static [&'static str]),
}

impl ValueType {
    /// Whether `> >= < <=` make sense for this type.
    pub fn is_ordered(&self) -> bool {
        matches!(self, ValueType::String | ValueType::Number | ValueType::Date)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Bool => "bool",
            ValueType::Date => "date",
            ValueType::Enum(_) => "enum",
        }
    }

    /// Converts a filter literal into a value of this type.
    ///
    /// `null` is accepted for every type; whether the operator allows it is
    /// the compiler's concern.
    pub fn coerce(&self, field: &str, literal: &Literal) -> QueryResult<Value> {
        let coerced = match (self, literal) {
            (_, Literal::Null) => Some(Value::Null),
            (ValueType::String, Literal::String(s)) => Some(Value::String(s.clone())),
            (ValueType::Number, Literal::Number(n)) => Some(Value::Number(*n)),
            (ValueType::Number, Literal::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Value::Number),
            (ValueType::Bool, Literal::Bool(b)) => Some(Value::Bool(*b)),
            (ValueType::Bool, Literal::String(s)) => {
                if s.eq_ignore_ascii_case("true") {
                    Some(Value::Bool(true))
                } else if s.eq_ignore_ascii_case("false") {
                    Some(Value::Bool(false))
                } else {
                    None
                }
            }
            (ValueType::Date, Literal::String(s)) => parse_date(s).map(Value::Date),
            (ValueType::Enum(variants), Literal::String(s)) => variants
                .iter()
                .find(|v| v.eq_ignore_ascii_case(s))
                .map(|v| Value::Enum(v.to_string())),
            _ => None,
        };

        coerced.ok_or_else(|| QueryError::type_mismatch(field, self, literal.describe()))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Enum(variants) => write!(f, "one of [{}]", variants.join(", ")),
            other => f.write_str(other.name()),
        }
    }
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// A field value as returned by a registered accessor.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Number(f64),
    Bool(bool),
    Date(DateTime<Utc>),
    Enum(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// Compares two values of the same kind. Enum and string values compare
    /// by text. Other mixed kinds, NaN and `Null` against a non-null value are
    /// incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (
                Value::String(a) | Value::Enum(a),
                Value::String(b) | Value::Enum(b),
            ) => Some(a.cmp(b)),
            // -0 equals 0
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total order used for sorting: `Null` first, then by kind, then by value.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        self.compare(other)
            .unwrap_or_else(|| self.rank().cmp(&other.rank()))
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::Date(_) => 3,
            Value::String(_) => 4,
            Value::Enum(_) => 5,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::String(s) | Value::Enum(s) => serde_json::Value::String(s.clone()),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    serde_json::Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Date(d) => serde_json::Value::String(d.to_rfc3339()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: ValueType = ValueType::Enum(&["Active", "Pending", "Disabled"]);

    #[test]
    fn test_number_accepts_numeric_strings() {
        let v = ValueType::Number
            .coerce("age", &Literal::String(" 42 ".to_string()))
            .unwrap();
        assert_eq!(v, Value::Number(42.0));
    }

    #[test]
    fn test_number_rejects_words() {
        let err = ValueType::Number
            .coerce("age", &Literal::String("old".to_string()))
            .unwrap_err();
        assert_eq!(
            err,
            QueryError::TypeMismatch {
                field: "age".to_string(),
                expected: "number".to_string(),
                got: "string 'old'".to_string(),
            }
        );
    }

    #[test]
    fn test_string_rejects_numbers() {
        assert!(ValueType::String
            .coerce("name", &Literal::Number(5.0))
            .is_err());
    }

    #[test]
    fn test_enum_matches_case_insensitively() {
        let v = STATUS
            .coerce("status", &Literal::String("active".to_string()))
            .unwrap();
        assert_eq!(v, Value::Enum("Active".to_string()));

        let err = STATUS
            .coerce("status", &Literal::String("archived".to_string()))
            .unwrap_err();
        match err {
            QueryError::TypeMismatch { expected, .. } => {
                assert_eq!(expected, "one of [Active, Pending, Disabled]")
            }
            other => panic!("Expected type mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_date_formats() {
        let day = parse_date("2024-03-01").unwrap();
        assert_eq!(day.to_rfc3339(), "2024-03-01T00:00:00+00:00");

        let ts = parse_date("2024-03-01T10:30:00+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T08:30:00+00:00");

        assert!(parse_date("yesterday").is_none());
    }

    #[test]
    fn test_null_coerces_for_every_type() {
        for ty in [ValueType::String, ValueType::Number, ValueType::Bool, STATUS] {
            assert_eq!(ty.coerce("f", &Literal::Null).unwrap(), Value::Null);
        }
    }

    #[test]
    fn test_sort_order_puts_null_first() {
        assert_eq!(Value::Null.sort_cmp(&Value::Number(1.0)), Ordering::Less);
        assert_eq!(Value::from(2).sort_cmp(&Value::from(10)), Ordering::Less);
        assert_eq!(Value::Null.compare(&Value::from("a")), None);
    }

    #[test]
    fn test_number_comparison() {
        assert_eq!(Value::Number(-0.0).compare(&Value::Number(0.0)), Some(Ordering::Equal));
        assert_eq!(Value::Number(f64::NAN).compare(&Value::Number(1.0)), None);
        assert_eq!(Value::Number(f64::NAN).sort_cmp(&Value::Number(1.0)), Ordering::Equal);
    }

    #[test]
    fn test_enum_and_string_compare_by_text() {
        let status = Value::Enum("active".to_string());
        assert_eq!(status.compare(&Value::from("active")), Some(Ordering::Equal));
        assert_eq!(Value::from("pending").compare(&status), Some(Ordering::Greater));
        assert_eq!(status.compare(&Value::from(1)), None);
    }

    #[test]
    fn test_json_numbers() {
        assert_eq!(Value::from(18).to_json(), serde_json::json!(18));
        assert_eq!(Value::from(1.5).to_json(), serde_json::json!(1.5));
    }
}
