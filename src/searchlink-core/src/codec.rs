//! Value codec
//!
//! One mapping from host values to the two wire forms the service speaks:
//! JSON request bodies and query-string tokens. Each direction is an ordered
//! list of rules; the first rule that accepts a value converts it, and a value
//! no rule accepts is an [`EncodeError`]. Responses are decoded as plain JSON
//! with no type coercion.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone};
use serde::Serialize;
use serde_json::{Map, Number, Value as Json};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::EncodeError;

/// A host value on its way to the wire
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    /// Text that has not been validated as UTF-8
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<FixedOffset>),
    List(Vec<Value>),
    /// Unordered members; encoded as a list in unspecified order
    Set(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Already-structured JSON, passed through as is
    Json(Json),
}

/// A rule returns `None` when it does not apply to the value
type Rule<T> = fn(&Value) -> Option<Result<T, EncodeError>>;

static JSON_RULES: &[Rule<Json>] = &[
    json_date,
    json_datetime,
    json_timestamp,
    json_bytes,
    json_set,
    json_list,
    json_map,
    json_float,
    json_passthrough,
];

static QUERY_RULES: &[Rule<String>] = &[
    query_text,
    query_bytes,
    query_bool,
    query_integer,
    query_float,
    query_list,
    query_date,
    query_datetime,
    query_timestamp,
    query_json,
];

impl Value {
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(bytes.into())
    }

    pub fn set<I, T>(members: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::Set(members.into_iter().map(Into::into).collect())
    }

    /// Adapt any serde-serializable value (documents, mappings, settings).
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, EncodeError> {
        serde_json::to_value(value)
            .map(Value::Json)
            .map_err(|e| EncodeError::Json {
                kind: "serializable value",
                reason: e.to_string(),
            })
    }

    /// Human-readable name of this value's kind, used in encoding errors
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::UInt(_) => "unsigned integer",
            Value::Float(f) if !f.is_finite() => "non-finite float",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::DateTime(_) => "date-time",
            Value::Timestamp(_) => "timestamp",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Json(Json::Null) => "JSON null",
            Value::Json(Json::Bool(_)) => "JSON bool",
            Value::Json(Json::Number(_)) => "JSON number",
            Value::Json(Json::String(_)) => "JSON string",
            Value::Json(Json::Array(_)) => "JSON array",
            Value::Json(Json::Object(_)) => "JSON object",
        }
    }

    /// Encode as a JSON value for a request body.
    pub fn to_json(&self) -> Result<Json, EncodeError> {
        JSON_RULES
            .iter()
            .find_map(|rule| rule(self))
            .unwrap_or_else(|| {
                Err(EncodeError::Json {
                    kind: self.kind(),
                    reason: "no JSON representation".to_string(),
                })
            })
    }

    /// Encode as a single query-string token (before URL escaping).
    pub fn to_query(&self) -> Result<String, EncodeError> {
        QUERY_RULES
            .iter()
            .find_map(|rule| rule(self))
            .unwrap_or(Err(EncodeError::QueryString { kind: self.kind() }))
    }
}

/// Serialize a value into a JSON request body.
pub fn encode_body(value: &Value) -> Result<Vec<u8>, EncodeError> {
    let json = value.to_json()?;
    serde_json::to_vec(&json).map_err(|e| EncodeError::Json {
        kind: value.kind(),
        reason: e.to_string(),
    })
}

/// Parse a response body. The service's own JSON typing is authoritative.
pub fn decode(raw: &[u8]) -> serde_json::Result<Json> {
    serde_json::from_slice(raw)
}

/// ISO-8601 form of a date, with a synthetic midnight.
pub fn iso_date(date: &NaiveDate) -> String {
    format!("{}T00:00:00", date.format("%Y-%m-%d"))
}

/// ISO-8601 form of a date-time without offset; fractional seconds only when non-zero.
pub fn iso_datetime(datetime: &NaiveDateTime) -> String {
    datetime.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

pub fn iso_timestamp(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Shortest decimal form that parses back to the same `f64` and still reads as a float.
fn float_token(value: f64) -> String {
    format!("{value:?}")
}

fn bool_token(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

fn join_tokens<I>(items: I) -> Result<String, EncodeError>
where
    I: IntoIterator<Item = Result<String, EncodeError>>,
{
    Ok(items.into_iter().collect::<Result<Vec<_>, _>>()?.join(","))
}

fn json_date(value: &Value) -> Option<Result<Json, EncodeError>> {
    match value {
        Value::Date(d) => Some(Ok(Json::String(iso_date(d)))),
        _ => None,
    }
}

fn json_datetime(value: &Value) -> Option<Result<Json, EncodeError>> {
    match value {
        Value::DateTime(dt) => Some(Ok(Json::String(iso_datetime(dt)))),
        _ => None,
    }
}

fn json_timestamp(value: &Value) -> Option<Result<Json, EncodeError>> {
    match value {
        Value::Timestamp(ts) => Some(Ok(Json::String(iso_timestamp(ts)))),
        _ => None,
    }
}

fn json_bytes(value: &Value) -> Option<Result<Json, EncodeError>> {
    match value {
        Value::Bytes(b) => Some(Ok(Json::String(String::from_utf8_lossy(b).into_owned()))),
        _ => None,
    }
}

fn json_set(value: &Value) -> Option<Result<Json, EncodeError>> {
    match value {
        Value::Set(members) => Some(json_array(members)),
        _ => None,
    }
}

fn json_list(value: &Value) -> Option<Result<Json, EncodeError>> {
    match value {
        Value::List(items) => Some(json_array(items)),
        _ => None,
    }
}

fn json_array(items: &[Value]) -> Result<Json, EncodeError> {
    items
        .iter()
        .map(Value::to_json)
        .collect::<Result<Vec<_>, _>>()
        .map(Json::Array)
}

fn json_map(value: &Value) -> Option<Result<Json, EncodeError>> {
    let Value::Map(entries) = value else {
        return None;
    };
    let mut object = Map::with_capacity(entries.len());
    for (key, item) in entries {
        match item.to_json() {
            Ok(json) => {
                object.insert(key.clone(), json);
            }
            Err(e) => return Some(Err(e)),
        }
    }
    Some(Ok(Json::Object(object)))
}

fn json_float(value: &Value) -> Option<Result<Json, EncodeError>> {
    match value {
        // from_f64 refuses NaN and infinities, which then fall through
        Value::Float(f) => Number::from_f64(*f).map(|n| Ok(Json::Number(n))),
        _ => None,
    }
}

fn json_passthrough(value: &Value) -> Option<Result<Json, EncodeError>> {
    let json = match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::UInt(u) => Json::from(*u),
        Value::Text(s) => Json::String(s.clone()),
        Value::Json(j) => j.clone(),
        _ => return None,
    };
    Some(Ok(json))
}

fn query_text(value: &Value) -> Option<Result<String, EncodeError>> {
    match value {
        Value::Text(s) => Some(Ok(s.clone())),
        _ => None,
    }
}

fn query_bytes(value: &Value) -> Option<Result<String, EncodeError>> {
    match value {
        Value::Bytes(b) => Some(Ok(String::from_utf8_lossy(b).into_owned())),
        _ => None,
    }
}

fn query_bool(value: &Value) -> Option<Result<String, EncodeError>> {
    match value {
        Value::Bool(b) => Some(Ok(bool_token(*b))),
        _ => None,
    }
}

fn query_integer(value: &Value) -> Option<Result<String, EncodeError>> {
    match value {
        Value::Int(i) => Some(Ok(i.to_string())),
        Value::UInt(u) => Some(Ok(u.to_string())),
        _ => None,
    }
}

fn query_float(value: &Value) -> Option<Result<String, EncodeError>> {
    match value {
        Value::Float(f) if f.is_finite() => Some(Ok(float_token(*f))),
        _ => None,
    }
}

fn query_list(value: &Value) -> Option<Result<String, EncodeError>> {
    match value {
        Value::List(items) => Some(join_tokens(items.iter().map(Value::to_query))),
        _ => None,
    }
}

fn query_date(value: &Value) -> Option<Result<String, EncodeError>> {
    match value {
        Value::Date(d) => Some(Ok(iso_date(d))),
        _ => None,
    }
}

fn query_datetime(value: &Value) -> Option<Result<String, EncodeError>> {
    match value {
        Value::DateTime(dt) => Some(Ok(iso_datetime(dt))),
        _ => None,
    }
}

fn query_timestamp(value: &Value) -> Option<Result<String, EncodeError>> {
    match value {
        Value::Timestamp(ts) => Some(Ok(iso_timestamp(ts))),
        _ => None,
    }
}

fn query_json(value: &Value) -> Option<Result<String, EncodeError>> {
    let Value::Json(json) = value else {
        return None;
    };
    match json {
        Json::String(s) => Some(Ok(s.clone())),
        Json::Bool(b) => Some(Ok(bool_token(*b))),
        Json::Number(n) => Some(Ok(number_token(n))),
        Json::Array(items) => Some(join_tokens(
            items.iter().map(|item| Value::Json(item.clone()).to_query()),
        )),
        Json::Null | Json::Object(_) => None,
    }
}

fn number_token(number: &Number) -> String {
    if let Some(i) = number.as_i64() {
        i.to_string()
    } else if let Some(u) = number.as_u64() {
        u.to_string()
    } else {
        number.as_f64().map(float_token).unwrap_or_else(|| number.to_string())
    }
}

macro_rules! value_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(i64::from(v))
            }
        })*
    };
}

macro_rules! value_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::UInt(u64::from(v))
            }
        })*
    };
}

value_from_signed!(i8, i16, i32, i64);
value_from_unsigned!(u8, u16, u32, u64);

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::UInt(v as u64)
    }
}

impl From<isize> for Value {
    fn from(v: isize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Value {
    fn from(v: DateTime<Tz>) -> Self {
        Value::Timestamp(v.fixed_offset())
    }
}

impl From<Json> for Value {
    fn from(v: Json) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Clone + Into<Value>> From<&[T]> for Value {
    fn from(v: &[T]) -> Self {
        Value::List(v.iter().cloned().map(Into::into).collect())
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Value {
    fn from((a, b): (A, B)) -> Self {
        Value::List(vec![a.into(), b.into()])
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for Value {
    fn from((a, b, c): (A, B, C)) -> Self {
        Value::List(vec![a.into(), b.into(), c.into()])
    }
}

impl<T: Into<Value>> From<BTreeSet<T>> for Value {
    fn from(v: BTreeSet<T>) -> Self {
        Value::set(v)
    }
}

impl<T: Into<Value>> From<HashSet<T>> for Value {
    fn from(v: HashSet<T>) -> Self {
        Value::set(v)
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(v: BTreeMap<String, T>) -> Self {
        Value::Map(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode_str(value: impl Into<Value>) -> String {
        String::from_utf8(encode_body(&value.into()).unwrap()).unwrap()
    }

    #[test]
    fn test_query_scalars() {
        assert_eq!(Value::from(true).to_query().unwrap(), "true");
        assert_eq!(Value::from(false).to_query().unwrap(), "false");
        assert_eq!(Value::from(4).to_query().unwrap(), "4");
        assert_eq!(Value::from(4u64).to_query().unwrap(), "4");
        assert_eq!(Value::from(-12i64).to_query().unwrap(), "-12");
        assert_eq!(Value::from(4.5).to_query().unwrap(), "4.5");
        assert_eq!(Value::from("hi there").to_query().unwrap(), "hi there");
    }

    #[test]
    fn test_query_float_round_trips() {
        for f in [3.14, 0.1 + 0.2, 1.0, 1e-7, 123456789.123456789, -2.5e300] {
            let token = Value::from(f).to_query().unwrap();
            assert_eq!(token.parse::<f64>().unwrap(), f, "token {token} lost precision");
        }
        // Integral floats keep reading as floats
        assert_eq!(Value::from(1.0).to_query().unwrap(), "1.0");
    }

    #[test]
    fn test_query_lists_join_with_commas() {
        let mixed = Value::List(vec![1.into(), "a".into(), true.into()]);
        assert_eq!(mixed.to_query().unwrap(), "1,a,true");

        let tuple = Value::from(("4", "hi", "thomas"));
        assert_eq!(tuple.to_query().unwrap(), "4,hi,thomas");

        let nested = Value::from(vec![vec![1, 2], vec![3]]);
        assert_eq!(nested.to_query().unwrap(), "1,2,3");

        assert_eq!(Value::from(json!(["x", 2, false])).to_query().unwrap(), "x,2,false");
    }

    #[test]
    fn test_query_dates() {
        let dt = NaiveDate::from_ymd_opt(2000, 1, 2)
            .unwrap()
            .and_hms_opt(12, 34, 56)
            .unwrap();
        assert_eq!(Value::from(dt).to_query().unwrap(), "2000-01-02T12:34:56");

        let d = NaiveDate::from_ymd_opt(2000, 1, 2).unwrap();
        assert_eq!(Value::from(d).to_query().unwrap(), "2000-01-02T00:00:00");

        let with_micros = NaiveDate::from_ymd_opt(2000, 1, 2)
            .unwrap()
            .and_hms_micro_opt(12, 34, 56, 250_000)
            .unwrap();
        assert_eq!(
            Value::from(with_micros).to_query().unwrap(),
            "2000-01-02T12:34:56.250"
        );
    }

    #[test]
    fn test_query_unsupported_kinds() {
        let err = Value::Null.to_query().unwrap_err();
        assert_eq!(err, EncodeError::QueryString { kind: "null" });

        let mut map = BTreeMap::new();
        map.insert("a".to_string(), 1);
        assert_eq!(Value::from(map).to_query().unwrap_err().kind(), "map");

        assert_eq!(Value::set([1, 2]).to_query().unwrap_err().kind(), "set");
        assert_eq!(
            Value::from(f64::NAN).to_query().unwrap_err().kind(),
            "non-finite float"
        );
        assert_eq!(
            Value::from(json!({"a": 1})).to_query().unwrap_err().kind(),
            "JSON object"
        );

        // One bad member poisons the whole list
        let list = Value::List(vec![1.into(), Value::Null]);
        assert!(list.to_query().is_err());
    }

    #[test]
    fn test_json_encoding() {
        assert_eq!(encode_str("abc"), r#""abc""#);
        assert_eq!(encode_str("☃"), "\"☃\"");
        assert_eq!(encode_str(123), "123");
        assert_eq!(encode_str(12.25), "12.25");
        assert_eq!(encode_str(true), "true");
        assert_eq!(encode_str(false), "false");
        assert_eq!(
            encode_str(NaiveDate::from_ymd_opt(2011, 12, 30).unwrap()),
            r#""2011-12-30T00:00:00""#
        );
        assert_eq!(
            encode_str(
                NaiveDate::from_ymd_opt(2011, 12, 30)
                    .unwrap()
                    .and_hms_opt(11, 59, 32)
                    .unwrap()
            ),
            r#""2011-12-30T11:59:32""#
        );
        assert_eq!(encode_str(vec![1, 2, 3]), "[1,2,3]");
        assert_eq!(encode_str((1, 2, 3)), "[1,2,3]");
        assert_eq!(encode_str(json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn test_json_timestamp_keeps_offset() {
        let ts = DateTime::parse_from_rfc3339("2011-12-30T11:59:32+02:00").unwrap();
        assert_eq!(encode_str(ts), r#""2011-12-30T11:59:32+02:00""#);
    }

    #[test]
    fn test_json_set_becomes_list() {
        let mut doc = BTreeMap::new();
        doc.insert("hi".to_string(), Value::set([1]));
        assert_eq!(encode_str(doc), r#"{"hi":[1]}"#);
    }

    #[test]
    fn test_json_nested_dates_are_converted() {
        let mut doc = BTreeMap::new();
        doc.insert(
            "born".to_string(),
            Value::from(NaiveDate::from_ymd_opt(1990, 5, 17).unwrap()),
        );
        doc.insert("name".to_string(), Value::from("Horace"));
        assert_eq!(
            Value::from(doc).to_json().unwrap(),
            json!({"born": "1990-05-17T00:00:00", "name": "Horace"})
        );
    }

    #[test]
    fn test_json_bytes_are_normalised_to_text() {
        let value = Value::bytes(vec![b'o', b'k', 0xff]);
        assert_eq!(value.to_json().unwrap(), json!("ok\u{fffd}"));
    }

    #[test]
    fn test_json_rejects_non_finite_floats() {
        let err = Value::from(f64::INFINITY).to_json().unwrap_err();
        assert!(matches!(err, EncodeError::Json { kind: "non-finite float", .. }));

        let nested = Value::from(vec![Value::Float(1.0), Value::Float(f64::NAN)]);
        assert!(encode_body(&nested).is_err());
    }

    #[test]
    fn test_json_preserves_type_category() {
        let mut doc = BTreeMap::new();
        doc.insert("s".to_string(), Value::from("7"));
        doc.insert("b".to_string(), Value::from(true));
        doc.insert("i".to_string(), Value::from(7));
        doc.insert("f".to_string(), Value::from(7.5));
        let parsed = decode(&encode_body(&Value::from(doc)).unwrap()).unwrap();

        assert!(parsed["s"].is_string());
        assert!(parsed["b"].is_boolean());
        assert!(parsed["i"].is_number());
        assert!(parsed["f"].is_number());
    }

    #[test]
    fn test_from_serialize() {
        #[derive(Serialize)]
        struct Person {
            name: String,
            age: u32,
        }

        let value = Value::from_serialize(&Person {
            name: "Horace".to_string(),
            age: 28,
        })
        .unwrap();
        assert_eq!(value.to_json().unwrap(), json!({"name": "Horace", "age": 28}));
    }

    #[test]
    fn test_decode_is_pass_through() {
        let decoded = decode(br#"{"when": "2011-12-30T11:59:32", "n": "42"}"#).unwrap();
        // No heuristic coercion of date-looking or number-looking strings
        assert_eq!(decoded, json!({"when": "2011-12-30T11:59:32", "n": "42"}));
        assert!(decode(b"<html>").is_err());
    }
}
