//! Operand values: what the grammar accepts and what gets bound.

use crate::error::{SmqlError, SmqlResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::Value;

/// Dynamic value type for parameter bindings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    List(Vec<BindValue>),
}

impl BindValue {
    /// Convert a JSON operand. Objects have no SQL counterpart.
    pub fn from_json(value: &Value) -> Option<Self> {
        Some(match value {
            Value::Null => BindValue::Null,
            Value::Bool(b) => BindValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => BindValue::Int(i),
                None => BindValue::Float(n.as_f64()?),
            },
            Value::String(s) => BindValue::String(s.clone()),
            Value::Array(items) => {
                BindValue::List(items.iter().map(Self::from_json).collect::<Option<_>>()?)
            }
            Value::Object(_) => return None,
        })
    }
}

impl std::fmt::Display for BindValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindValue::Null => write!(f, "NULL"),
            BindValue::Bool(b) => write!(f, "{}", b),
            BindValue::Int(i) => write!(f, "{}", i),
            BindValue::Float(x) => write!(f, "{}", x),
            BindValue::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            BindValue::Timestamp(t) => write!(f, "'{}'", t.to_rfc3339()),
            BindValue::List(items) => {
                let items: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "({})", items.join(", "))
            }
        }
    }
}

impl From<bool> for BindValue {
    fn from(v: bool) -> Self {
        BindValue::Bool(v)
    }
}

impl From<i64> for BindValue {
    fn from(v: i64) -> Self {
        BindValue::Int(v)
    }
}

impl From<i32> for BindValue {
    fn from(v: i32) -> Self {
        BindValue::Int(v as i64)
    }
}

impl From<f64> for BindValue {
    fn from(v: f64) -> Self {
        BindValue::Float(v)
    }
}

impl From<&str> for BindValue {
    fn from(v: &str) -> Self {
        BindValue::String(v.to_string())
    }
}

impl From<String> for BindValue {
    fn from(v: String) -> Self {
        BindValue::String(v)
    }
}

impl From<DateTime<Utc>> for BindValue {
    fn from(v: DateTime<Utc>) -> Self {
        BindValue::Timestamp(v)
    }
}

/// Structural class of a JSON operand a grammar rule accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Null,
    True,
    False,
    Bool,
    Number,
    /// Non-negative integer
    Count,
    String,
    Array,
    Object,
    /// Two-element array
    Pair,
    /// Non-empty array of objects
    ObjectList,
    /// `[start, end-or-duration]`: a string, then a string or a number
    TimeSpan,
    /// One or two objects: sub-query, then conditions on its row
    SubQuery,
}

impl Shape {
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Shape::Null => value.is_null(),
            Shape::True => value == &Value::Bool(true),
            Shape::False => value == &Value::Bool(false),
            Shape::Bool => value.is_boolean(),
            Shape::Number => value.is_number(),
            Shape::Count => value.is_u64(),
            Shape::String => value.is_string(),
            Shape::Array => value.is_array(),
            Shape::Object => value.is_object(),
            Shape::Pair => value.as_array().is_some_and(|a| a.len() == 2),
            Shape::ObjectList => value
                .as_array()
                .is_some_and(|a| !a.is_empty() && a.iter().all(Value::is_object)),
            Shape::TimeSpan => value.as_array().is_some_and(|a| {
                a.len() == 2 && a[0].is_string() && (a[1].is_string() || a[1].is_number())
            }),
            Shape::SubQuery => value
                .as_array()
                .is_some_and(|a| (1..=2).contains(&a.len()) && a.iter().all(Value::is_object)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Shape::Null => "null",
            Shape::True => "true",
            Shape::False => "false",
            Shape::Bool => "boolean",
            Shape::Number => "number",
            Shape::Count => "non-negative integer",
            Shape::String => "string",
            Shape::Array => "array",
            Shape::Object => "object",
            Shape::Pair => "[a, b]",
            Shape::ObjectList => "object list",
            Shape::TimeSpan => "[start, end|seconds]",
            Shape::SubQuery => "[subquery, conditions]",
        }
    }
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a timestamp leniently. Values without an offset are taken as UTC.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(input) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S%.f %z") {
        return Some(t.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(input, format) {
            return Some(t.and_utc());
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
}

/// Bind `value` for `column`, parsing strings as timestamps when
/// `chronological` is set.
pub fn bind_for(column: &str, value: &Value, chronological: bool) -> SmqlResult<BindValue> {
    match value {
        Value::String(s) if chronological => parse_timestamp(s)
            .map(BindValue::Timestamp)
            .ok_or_else(|| SmqlError::invalid_value(column, format!("'{}' is not a timestamp", s))),
        other => BindValue::from_json(other).ok_or_else(|| {
            SmqlError::invalid_value(column, format!("{} cannot be bound as a parameter", other))
        }),
    }
}

/// Resolve `[start, end-or-duration]` into a start/end pair. The second
/// element is either a timestamp or a number of seconds after `start`.
pub fn time_span(column: &str, span: &[Value]) -> SmqlResult<(DateTime<Utc>, DateTime<Utc>)> {
    let start = match span.first() {
        Some(Value::String(s)) => parse_timestamp(s)
            .ok_or_else(|| SmqlError::invalid_value(column, format!("'{}' is not a timestamp", s)))?,
        other => {
            return Err(SmqlError::invalid_value(
                column,
                format!("unexpected start value {:?}", other),
            ));
        }
    };
    let end = match span.get(1) {
        Some(Value::String(s)) => parse_timestamp(s)
            .ok_or_else(|| SmqlError::invalid_value(column, format!("'{}' is not a timestamp", s)))?,
        Some(Value::Number(n)) => {
            let seconds = n
                .as_f64()
                .ok_or_else(|| SmqlError::invalid_value(column, "duration out of range"))?;
            let delta = TimeDelta::try_milliseconds((seconds * 1000.0).round() as i64)
                .ok_or_else(|| SmqlError::invalid_value(column, "duration out of range"))?;
            start
                .checked_add_signed(delta)
                .ok_or_else(|| SmqlError::invalid_value(column, "duration out of range"))?
        }
        other => {
            return Err(SmqlError::invalid_value(
                column,
                format!("unexpected type for end value {:?}", other),
            ));
        }
    };
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_bind_value_from_json() {
        assert_eq!(BindValue::from_json(&json!(1)), Some(BindValue::Int(1)));
        assert_eq!(BindValue::from_json(&json!(1.5)), Some(BindValue::Float(1.5)));
        assert_eq!(
            BindValue::from_json(&json!(["a", 2])),
            Some(BindValue::List(vec!["a".into(), 2i64.into()]))
        );
        assert_eq!(BindValue::from_json(&json!({"a": 1})), None);
        assert_eq!(BindValue::from_json(&json!([{"a": 1}])), None);
    }

    #[test]
    fn test_shapes() {
        assert!(Shape::Pair.accepts(&json!([1, 2])));
        assert!(!Shape::Pair.accepts(&json!([1, 2, 3])));
        assert!(Shape::ObjectList.accepts(&json!([{}, {"a": 1}])));
        assert!(!Shape::ObjectList.accepts(&json!([])));
        assert!(Shape::TimeSpan.accepts(&json!(["2011-01-01", 3600])));
        assert!(!Shape::TimeSpan.accepts(&json!([1, 3600])));
        assert!(Shape::SubQuery.accepts(&json!([{"limit:": 1}])));
        assert!(!Shape::SubQuery.accepts(&json!([{}, {}, {}])));
        assert!(Shape::Count.accepts(&json!(10)));
        assert!(!Shape::Count.accepts(&json!(-1)));
        assert!(Shape::True.accepts(&json!(true)));
        assert!(!Shape::True.accepts(&json!(false)));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2011, 5, 4, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2011-05-04T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2011-05-04T14:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2011-05-04 12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2011-05-04 12:30"), Some(expected));
        assert_eq!(
            parse_timestamp("2011-05-04"),
            Some(Utc.with_ymd_and_hms(2011, 5, 4, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_bind_for_chronological() {
        let v = bind_for("updated_at", &json!("2011-05-04"), true).unwrap();
        assert!(matches!(v, BindValue::Timestamp(_)));
        let v = bind_for("title", &json!("2011-05-04"), false).unwrap();
        assert_eq!(v, BindValue::String("2011-05-04".to_string()));
        assert!(bind_for("updated_at", &json!("soon"), true).is_err());
    }

    #[test]
    fn test_time_span_with_duration() {
        let (start, end) = time_span("at", &[json!("2011-05-04 12:00"), json!(5400)]).unwrap();
        assert_eq!(end - start, TimeDelta::minutes(90));
    }

    #[test]
    fn test_time_span_with_end() {
        let (start, end) =
            time_span("at", &[json!("2011-05-04 12:00"), json!("2011-05-05 12:00")]).unwrap();
        assert_eq!(end - start, TimeDelta::days(1));
    }
}
