//! Header value representation: spec §3 allows `string|structured` values.

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

/// One header value: either the plain string Mongrel2 delivers, or a
/// structured value decoded from a nested tnetstring dict/list (used by
/// filter option payloads, per spec §4.1).
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Str(String),
    Json(JsonValue),
}

impl HeaderValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Str(s) => Some(s.as_str()),
            HeaderValue::Json(JsonValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<String> for HeaderValue {
    fn from(s: String) -> Self {
        HeaderValue::Str(s)
    }
}

impl From<&str> for HeaderValue {
    fn from(s: &str) -> Self {
        HeaderValue::Str(s.to_string())
    }
}

/// Insertion-ordered header map, case-sensitive as delivered (spec §3).
pub type Headers = IndexMap<String, HeaderValue>;

pub fn get<'a>(headers: &'a Headers, key: &str) -> Option<&'a str> {
    headers.get(key).and_then(HeaderValue::as_str)
}
