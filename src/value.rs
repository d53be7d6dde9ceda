//! Application-side value model.
//!
//! A superset of JSON: adds `DateTime` (what the wire cannot carry) and
//! `Undefined` (an absent member, dropped from objects on the way out).
//! Wire values are plain `serde_json::Value`; the schema-agnostic deep
//! conversions between the two live here so every fallback path in the
//! codec shares one definition.

use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use serde_json::Value as Json;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent member. Dropped from objects/records on encode; never produced
    /// by decode.
    Undefined,
    Null,
    Bool(bool),
    Float64(f64),
    Int64(i64),
    String(String),
    DateTime(DateTime<Utc>),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl Value {
    /// Null or undefined: the codec passes both through untouched.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    /// Short name used in issue messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Float64(_) => "float64",
            Value::Int64(_) => "int64",
            Value::String(_) => "string",
            Value::DateTime(_) => "datetime",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn object<I, K>(entries: I) -> Value
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn array<I: IntoIterator<Item = Value>>(items: I) -> Value {
        Value::Array(items.into_iter().collect())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float64(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

// --------------------------- Wire boundary -------------------------------- //

/// Epoch milliseconds for the wire. Sub-millisecond precision is truncated,
/// matching what the wire can represent.
pub fn datetime_to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Schema-agnostic deep conversion to wire JSON: dates become epoch-ms
/// numbers, `Undefined` object members are dropped, `Undefined` array slots
/// become null (arrays keep their length).
pub fn deep_to_wire(value: &Value) -> Json {
    match value {
        Value::Undefined | Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Float64(n) => float_to_wire(*n),
        Value::Int64(n) => Json::Number((*n).into()),
        Value::String(s) => Json::String(s.clone()),
        Value::DateTime(dt) => Json::Number(datetime_to_millis(dt).into()),
        Value::Array(items) => Json::Array(items.iter().map(deep_to_wire).collect()),
        Value::Object(fields) => Json::Object(
            fields
                .iter()
                .filter(|(_, v)| !matches!(v, Value::Undefined))
                .map(|(k, v)| (k.clone(), deep_to_wire(v)))
                .collect(),
        ),
    }
}

/// Whole finite floats are emitted as JSON integers, the same canonical form
/// JavaScript's JSON serialization produces. Keeps encode(decode(y)) == y
/// for integer-valued wire numbers checked against a float64 validator.
pub fn float_to_wire(n: f64) -> Json {
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= i64::MAX as f64 {
        Json::Number((n as i64).into())
    } else {
        serde_json::Number::from_f64(n)
            .map(Json::Number)
            .unwrap_or(Json::Null)
    }
}

/// Schema-agnostic structural conversion from wire JSON. No date
/// reconstruction: without a schema a number is just a number.
pub fn from_wire_raw(wire: &Json) -> Value {
    match wire {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int64(i)
            } else {
                Value::Float64(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::Array(items.iter().map(from_wire_raw).collect()),
        Json::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), from_wire_raw(v)))
                .collect(),
        ),
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_to_wire_drops_undefined_members() {
        let v = Value::object([("a", Value::Int64(1)), ("b", Value::Undefined)]);
        assert_eq!(deep_to_wire(&v), json!({"a": 1}));
    }

    #[test]
    fn deep_to_wire_converts_dates_to_millis() {
        let dt = millis_to_datetime(1_704_067_200_000).unwrap();
        let v = Value::object([("at", Value::DateTime(dt))]);
        assert_eq!(deep_to_wire(&v), json!({"at": 1_704_067_200_000_i64}));
    }

    #[test]
    fn undefined_array_slot_becomes_null() {
        let v = Value::array([Value::Int64(1), Value::Undefined]);
        assert_eq!(deep_to_wire(&v), json!([1, null]));
    }

    #[test]
    fn raw_decode_keeps_numbers_as_numbers() {
        let v = from_wire_raw(&json!({"n": 1_704_067_200_000_i64, "f": 1.5}));
        let Value::Object(fields) = v else { panic!("object expected") };
        assert_eq!(fields["n"], Value::Int64(1_704_067_200_000));
        assert_eq!(fields["f"], Value::Float64(1.5));
    }

    #[test]
    fn raw_decode_round_trips_structures() {
        let wire = json!({"a": [1, "x", true, null], "b": {"c": 2.5}});
        assert_eq!(deep_to_wire(&from_wire_raw(&wire)), wire);
    }
}
