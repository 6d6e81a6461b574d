use reqwest::Method;
use searchlink_core::codec::{self, Value};
use searchlink_core::EncodeError;
use std::collections::BTreeMap;

/// One path component. Empty text and [`Segment::Absent`] are dropped when the
/// path is joined; the integer zero never is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Int(i64),
    Absent,
}

impl Segment {
    fn render(&self) -> Option<String> {
        match self {
            Segment::Text(s) if s.is_empty() => None,
            Segment::Text(s) => Some(s.clone()),
            Segment::Int(n) => Some(n.to_string()),
            Segment::Absent => None,
        }
    }
}

impl From<&str> for Segment {
    fn from(s: &str) -> Self {
        Segment::Text(s.to_string())
    }
}

impl From<String> for Segment {
    fn from(s: String) -> Self {
        Segment::Text(s)
    }
}

impl From<&String> for Segment {
    fn from(s: &String) -> Self {
        Segment::Text(s.clone())
    }
}

impl From<i64> for Segment {
    fn from(n: i64) -> Self {
        Segment::Int(n)
    }
}

impl From<i32> for Segment {
    fn from(n: i32) -> Self {
        Segment::Int(i64::from(n))
    }
}

impl From<u32> for Segment {
    fn from(n: u32) -> Self {
        Segment::Int(i64::from(n))
    }
}

impl From<u64> for Segment {
    fn from(n: u64) -> Self {
        Segment::Text(n.to_string())
    }
}

impl<T: Into<Segment>> From<Option<T>> for Segment {
    fn from(value: Option<T>) -> Self {
        value.map_or(Segment::Absent, Into::into)
    }
}

/// Query-string parameters, encoded in key order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams(BTreeMap<String, Value>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// URL-encoded `name=value&...` form, without the leading `?`.
    pub fn encode(&self) -> Result<String, EncodeError> {
        let mut pairs = Vec::with_capacity(self.0.len());
        for (name, value) in &self.0 {
            let token = value.to_query()?;
            pairs.push(format!(
                "{}={}",
                urlencoding::encode(name),
                urlencoding::encode(&token)
            ));
        }
        Ok(pairs.join("&"))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    /// Sent exactly as given, e.g. newline-delimited bulk records
    Raw(Vec<u8>),
    /// Encoded to JSON by the codec before sending
    Json(Value),
}

/// A fully resolved call: verb, path segments, query parameters and body.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: Vec<Segment>,
    pub query: QueryParams,
    pub body: Body,
}

impl Request {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            path: Vec::new(),
            query: QueryParams::new(),
            body: Body::Empty,
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    pub fn segment(mut self, segment: impl Into<Segment>) -> Self {
        self.path.push(segment.into());
        self
    }

    pub fn query(mut self, params: QueryParams) -> Self {
        self.query = params;
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(name, value);
        self
    }

    pub fn json(mut self, body: impl Into<Value>) -> Self {
        self.body = Body::Json(body.into());
        self
    }

    pub fn raw(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Body::Raw(body.into());
        self
    }

    /// Path plus query string, to be appended to an endpoint's base URL.
    pub fn path_and_query(&self) -> Result<String, EncodeError> {
        let mut target = join_path(&self.path);
        if !self.query.is_empty() {
            target.push('?');
            target.push_str(&self.query.encode()?);
        }
        Ok(target)
    }

    /// Wire body, or `None` when there is nothing to send.
    pub fn encoded_body(&self) -> Result<Option<Vec<u8>>, EncodeError> {
        match &self.body {
            Body::Empty => Ok(None),
            Body::Raw(bytes) if bytes.is_empty() => Ok(None),
            Body::Raw(bytes) => Ok(Some(bytes.clone())),
            Body::Json(value) => codec::encode_body(value).map(Some),
        }
    }
}

/// Join segments with `/`, escaping each one; always starts with `/`.
pub fn join_path(segments: &[Segment]) -> String {
    let joined = segments
        .iter()
        .filter_map(Segment::render)
        .map(|s| urlencoding::encode(&s).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("/{joined}")
}

/// Comma-join index or type names, leaving out the `_all` wildcard.
pub fn concat(items: &[&str]) -> String {
    items
        .iter()
        .filter(|item| **item != "_all")
        .copied()
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_join_path_drops_empty_but_keeps_zero() {
        let path = vec![
            Segment::from("index"),
            Segment::from(""),
            Segment::from(None::<&str>),
            Segment::from(0),
        ];
        assert_eq!(join_path(&path), "/index/0");
    }

    #[test]
    fn test_join_path_escapes_each_segment() {
        let path = vec![Segment::from("my index"), Segment::from("a/b"), Segment::from("ü")];
        assert_eq!(join_path(&path), "/my%20index/a%2Fb/%C3%BC");
    }

    #[test]
    fn test_join_path_of_nothing_is_root() {
        assert_eq!(join_path(&[]), "/");
        assert_eq!(join_path(&[Segment::Absent]), "/");
    }

    #[test]
    fn test_query_encoding() {
        let params = QueryParams::new()
            .with("refresh", true)
            .with("routing", "a b")
            .with("fields", vec!["name", "age"])
            .with("boost", 1.5);
        assert_eq!(
            params.encode().unwrap(),
            "boost=1.5&fields=name%2Cage&refresh=true&routing=a%20b"
        );
    }

    #[test]
    fn test_path_and_query() {
        let request = Request::get()
            .segment("test-index")
            .segment("test-type")
            .segment(7)
            .param("timestamp", NaiveDate::from_ymd_opt(2000, 1, 2).unwrap());
        assert_eq!(
            request.path_and_query().unwrap(),
            "/test-index/test-type/7?timestamp=2000-01-02T00%3A00%3A00"
        );
    }

    #[test]
    fn test_unencodable_param_fails_before_sending() {
        let request = Request::get().segment("x").param("bad", json!({"a": 1}));
        let err = request.path_and_query().unwrap_err();
        assert_eq!(err, EncodeError::QueryString { kind: "JSON object" });
    }

    #[test]
    fn test_encoded_body() {
        assert_eq!(Request::get().encoded_body().unwrap(), None);
        assert_eq!(Request::post().raw(Vec::new()).encoded_body().unwrap(), None);
        assert_eq!(
            Request::post().raw("a\n").encoded_body().unwrap(),
            Some(b"a\n".to_vec())
        );
        assert_eq!(
            Request::post().json(json!({"q": 1})).encoded_body().unwrap(),
            Some(br#"{"q":1}"#.to_vec())
        );
        assert!(Request::post().json(f64::NAN).encoded_body().is_err());
    }

    #[test]
    fn test_concat_drops_all() {
        assert_eq!(concat(&["a", "_all", "b"]), "a,b");
        assert_eq!(concat(&["_all"]), "");
        assert_eq!(concat(&[]), "");
    }
}
