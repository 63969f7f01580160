//! Request envelope decoding and the request taxonomy (spec §3, §4.2).

use crate::error::{Mongrel2Error, Result};
use crate::headers::{HeaderValue, Headers};
use crate::registry::{Registry, VariantKind};
use crate::tnetstring::{self, Value as TValue};
use crate::websocket::Frame as WsFrame;
use bytes::Bytes;
use serde_json::Value as JsonValue;

/// The decoded form of one inbound frame, common to every variant.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    pub sender_id: String,
    pub conn_id: u64,
    pub path: String,
    pub headers: Headers,
    pub body: Bytes,
    pub raw: Bytes,
}

impl RequestEnvelope {
    pub fn header(&self, key: &str) -> Option<&str> {
        crate::headers::get(&self.headers, key)
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub envelope: RequestEnvelope,
}

#[derive(Debug, Clone)]
pub struct JsonRequest {
    pub envelope: RequestEnvelope,
    pub json: JsonValue,
    pub is_disconnect: bool,
}

#[derive(Debug, Clone)]
pub struct XmlRequest {
    pub envelope: RequestEnvelope,
    pub xml: String,
}

#[derive(Debug, Clone)]
pub struct WebSocketRequest {
    pub envelope: RequestEnvelope,
    pub flags: u8,
    pub frame: WsFrame,
}

/// The tagged union spec §3 describes, discriminated on `METHOD`. `Unknown`
/// covers a well-formed but unregistered token with no default override
/// (spec §4.8: dispatch logs an error and replies nothing).
#[derive(Debug, Clone)]
pub enum Request {
    Http(HttpRequest),
    Json(JsonRequest),
    Xml(XmlRequest),
    WebSocket(WebSocketRequest),
    Unknown(RequestEnvelope),
}

impl Request {
    pub fn envelope(&self) -> &RequestEnvelope {
        match self {
            Request::Http(r) => &r.envelope,
            Request::Json(r) => &r.envelope,
            Request::Xml(r) => &r.envelope,
            Request::WebSocket(r) => &r.envelope,
            Request::Unknown(envelope) => envelope,
        }
    }

    pub fn is_disconnect(&self) -> bool {
        matches!(self, Request::Json(r) if r.is_disconnect)
    }
}

fn is_method_token(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn tvalue_to_json(value: &TValue) -> JsonValue {
    match value {
        TValue::String(b) => JsonValue::String(String::from_utf8_lossy(b).into_owned()),
        TValue::Int(n) => {
            // serde_json::Number has no arbitrary-precision constructor in
            // the default feature set; fall back through the widest exact
            // integer types before lossy f64.
            let s = n.to_string();
            if let Ok(i) = s.parse::<i64>() {
                JsonValue::Number(i.into())
            } else if let Ok(u) = s.parse::<u64>() {
                JsonValue::Number(u.into())
            } else {
                s.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::Null)
            }
        }
        TValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        TValue::Bool(b) => JsonValue::Bool(*b),
        TValue::Null => JsonValue::Null,
        TValue::Dict(d) => {
            let mut map = serde_json::Map::new();
            for (k, v) in d {
                map.insert(k.clone(), tvalue_to_json(v));
            }
            JsonValue::Object(map)
        }
        TValue::List(items) => JsonValue::Array(items.iter().map(tvalue_to_json).collect()),
    }
}

fn headers_from_tnetstring_dict(dict: &indexmap::IndexMap<String, TValue>) -> Result<Headers> {
    let mut headers = Headers::new();
    for (key, value) in dict {
        let hv = match value {
            TValue::String(b) => HeaderValue::Str(String::from_utf8_lossy(b).into_owned()),
            other => HeaderValue::Json(tvalue_to_json(other)),
        };
        headers.insert(key.clone(), hv);
    }
    Ok(headers)
}

fn headers_from_json_object(json: JsonValue) -> Result<Headers> {
    let obj = match json {
        JsonValue::Object(obj) => obj,
        _ => return Err(Mongrel2Error::BadRequest("headers JSON is not an object".into())),
    };
    let mut headers = Headers::new();
    for (key, value) in obj {
        let hv = match value {
            JsonValue::String(s) => HeaderValue::Str(s),
            other => HeaderValue::Json(other),
        };
        headers.insert(key, hv);
    }
    Ok(headers)
}

/// Split `rest` into `(sender_id, conn_id, path, remainder)` at the first
/// three spaces.
fn split_envelope_prefix(rest: &[u8]) -> Result<(&str, &str, &str, &[u8])> {
    let s = std::str::from_utf8(rest)
        .map_err(|_| Mongrel2Error::BadRequest("frame prefix is not utf8".into()))?;
    let mut parts = s.splitn(4, ' ');
    let sender_id = parts.next().ok_or_else(|| Mongrel2Error::BadRequest("missing sender_id".into()))?;
    let conn_id = parts.next().ok_or_else(|| Mongrel2Error::BadRequest("missing conn_id".into()))?;
    let path = parts.next().ok_or_else(|| Mongrel2Error::BadRequest("missing path".into()))?;
    let remainder_str = parts.next().ok_or_else(|| Mongrel2Error::BadRequest("missing body".into()))?;
    // recover the byte offset of `remainder_str` within the original frame
    let offset = rest.len() - remainder_str.len();
    Ok((sender_id, conn_id, path, &rest[offset..]))
}

/// Decode one wire frame into a typed [`Request`] (spec §4.2).
pub fn decode_envelope(raw: &[u8], registry: &Registry) -> Result<Request> {
    let raw_bytes = Bytes::copy_from_slice(raw);
    let (sender_id, conn_id_str, path, rest) = split_envelope_prefix(raw)?;
    let conn_id: u64 = conn_id_str
        .parse()
        .map_err(|_| Mongrel2Error::BadRequest(format!("conn_id not a non-negative integer: {}", conn_id_str)))?;

    let (headers_payload, rest) = tnetstring::decode(rest)?;
    let (body_value, _) = tnetstring::decode(rest)?;

    let headers = match &headers_payload {
        TValue::Dict(dict) => headers_from_tnetstring_dict(dict)?,
        TValue::String(s) => {
            let json: JsonValue = serde_json::from_slice(s)
                .map_err(|e| Mongrel2Error::BadRequest(format!("headers string is not JSON: {}", e)))?;
            headers_from_json_object(json)?
        }
        _ => return Err(Mongrel2Error::BadRequest("headers payload is neither a dict nor a string".into())),
    };

    let body = match body_value {
        TValue::String(b) => b,
        _ => return Err(Mongrel2Error::BadRequest("body payload is not a string".into())),
    };

    // Every real Mongrel2 request carries a METHOD header; a frame missing
    // one entirely cannot be classified and is fatal (spec §7). A method
    // token that's present but unregistered and has no default override is
    // not fatal — it resolves to `VariantKind::Unknown` and is swallowed by
    // dispatch (spec §4.8). A *present but malformed* token is fatal either way.
    let method = headers
        .get("METHOD")
        .and_then(HeaderValue::as_str)
        .ok_or_else(|| Mongrel2Error::UnhandledMethod(String::new()))?;
    if !is_method_token(method) {
        return Err(Mongrel2Error::UnhandledMethod(method.to_string()));
    }
    let kind = registry.classify(method);

    let envelope = RequestEnvelope {
        sender_id: sender_id.to_string(),
        conn_id,
        path: path.to_string(),
        headers,
        body,
        raw: raw_bytes,
    };

    build_request(kind, envelope)
}

fn build_request(kind: VariantKind, envelope: RequestEnvelope) -> Result<Request> {
    match kind {
        VariantKind::Http => Ok(Request::Http(HttpRequest { envelope })),
        VariantKind::Json => {
            let json: JsonValue = if envelope.body.is_empty() {
                JsonValue::Null
            } else {
                serde_json::from_slice(&envelope.body)
                    .map_err(|e| Mongrel2Error::BadRequest(format!("JSON body invalid: {}", e)))?
            };
            let is_disconnect = is_disconnect_notice(&json);
            Ok(Request::Json(JsonRequest { envelope, json, is_disconnect }))
        }
        VariantKind::Xml => {
            let xml = String::from_utf8_lossy(&envelope.body).into_owned();
            Ok(Request::Xml(XmlRequest { envelope, xml }))
        }
        VariantKind::WebSocket => {
            let flags_hex = envelope
                .header("FLAGS")
                .ok_or_else(|| Mongrel2Error::BadRequest("WEBSOCKET request missing FLAGS header".into()))?;
            let flags = u8::from_str_radix(flags_hex, 16)
                .map_err(|_| Mongrel2Error::BadRequest(format!("FLAGS header not hex: {}", flags_hex)))?;
            let frame = WsFrame::parse(&envelope.body)?;
            Ok(Request::WebSocket(WebSocketRequest { envelope, flags, frame }))
        }
        VariantKind::Unknown => Ok(Request::Unknown(envelope)),
    }
}

/// Recognise `{"type":"disconnect"}` (spec §4.3, §6).
fn is_disconnect_notice(json: &JsonValue) -> bool {
    match json {
        JsonValue::Object(obj) => {
            obj.len() == 1 && obj.get("type").and_then(JsonValue::as_str) == Some("disconnect")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_get_round_trip_scenario() {
        let registry = Registry::new();
        // headers = {"METHOD":"GET","PATH":"/"}
        let frame = b"abc 42 / 26:6:METHOD,3:GET,4:PATH,1:/,}0:,";
        let req = decode_envelope(frame, &registry).expect("decode");
        let env = req.envelope();
        assert_eq!(env.sender_id, "abc");
        assert_eq!(env.conn_id, 42);
        assert_eq!(env.path, "/");
        assert!(matches!(req, Request::Http(_)));
    }

    #[test]
    fn missing_method_header_is_fatal() {
        let registry = Registry::new();
        let frame = b"abc 42 / 11:4:PATH,1:/,}0:,";
        let err = decode_envelope(frame, &registry).unwrap_err();
        assert!(matches!(err, Mongrel2Error::UnhandledMethod(_)));
    }

    #[test]
    fn disconnect_notice_is_tagged() {
        let registry = Registry::new();
        // headers = {"METHOD":"JSON"}, body = {"type":"disconnect"}
        let headers = b"16:6:METHOD,4:JSON,}";
        let body_json = br#"{"type":"disconnect"}"#;
        let body_tn = format!("{}:{},", body_json.len(), String::from_utf8_lossy(body_json));
        let frame = format!(
            "abc 1 / {}{}",
            String::from_utf8_lossy(headers),
            body_tn
        );
        let req = decode_envelope(frame.as_bytes(), &registry).expect("decode");
        assert!(req.is_disconnect());
    }

    #[test]
    fn unregistered_method_with_no_default_override_is_unknown() {
        let registry = Registry::new();
        let headers = b"15:6:METHOD,3:FOO,}";
        let frame = format!("abc 1 / {}0:,", String::from_utf8_lossy(headers));
        let req = decode_envelope(frame.as_bytes(), &registry).expect("decode");
        assert!(matches!(req, Request::Unknown(_)));
    }

    #[test]
    fn bad_method_token_errors() {
        let registry = Registry::new();
        let headers = b"16:6:METHOD,4:FO O,}";
        let frame = format!("abc 1 / {}0:,", String::from_utf8_lossy(headers));
        let err = decode_envelope(frame.as_bytes(), &registry).unwrap_err();
        assert!(matches!(err, Mongrel2Error::UnhandledMethod(_)));
    }
}
