//! HTTP response builder (spec §4.4).

use crate::error::{Mongrel2Error, Result};
use crate::reason_phrase::reason_phrase;
use bytes::{BufMut, Bytes, BytesMut};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use std::io::{Read, Seek, SeekFrom};

pub static SERVER_HEADER: Lazy<String> =
    Lazy::new(|| format!("mongrel2-handler/{}", env!("CARGO_PKG_VERSION")));

/// A body that either already knows its length or can report one via
/// seek/tell (spec §4.4, §9's "SizedBody capability").
pub enum Body {
    Bytes(Bytes),
    Stream(Box<dyn SeekRead>),
}

pub trait SeekRead: Read + Seek + Send {}
impl<T: Read + Seek + Send> SeekRead for T {}

impl Body {
    pub fn empty() -> Self {
        Body::Bytes(Bytes::new())
    }

    /// Content-Length resolution protocol (spec §4.4): a direct length if
    /// the body exposes one, else the seek/tell difference, restoring the
    /// original stream position.
    pub fn content_length(&mut self) -> Result<u64> {
        match self {
            Body::Bytes(b) => Ok(b.len() as u64),
            Body::Stream(s) => {
                let p = s.stream_position().map_err(|e| Mongrel2Error::Response(e.to_string()))?;
                let end = s.seek(SeekFrom::End(0)).map_err(|e| Mongrel2Error::Response(e.to_string()))?;
                s.seek(SeekFrom::Start(p)).map_err(|e| Mongrel2Error::Response(e.to_string()))?;
                Ok(end.saturating_sub(p))
            }
        }
    }

    /// Read the whole body without disturbing a stream's eventual replay
    /// position beyond what a single full read implies.
    pub fn read_all(&mut self) -> Result<Bytes> {
        match self {
            Body::Bytes(b) => Ok(b.clone()),
            Body::Stream(s) => {
                let mut buf = Vec::new();
                s.read_to_end(&mut buf).map_err(|e| Mongrel2Error::Response(e.to_string()))?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        Body::Bytes(b)
    }
}

impl From<Vec<u8>> for Body {
    fn from(b: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(b))
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Bytes(Bytes::from(s.into_bytes()))
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Body::Bytes(Bytes::copy_from_slice(s.as_bytes()))
    }
}

/// Case-insensitive, insertion-ordered header map, as spec §3 requires for
/// `HTTPResponse::headers`. Keys keep whatever casing the caller set; a
/// lowercased shadow index resolves lookups case-insensitively.
#[derive(Default, Clone)]
pub struct ResponseHeaders {
    entries: IndexMap<String, String>,
}

impl ResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_key(&self, name: &str) -> Option<&str> {
        self.entries
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let key = self.find_key(name)?.to_string();
        self.entries.get(&key).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set a header, replacing any existing entry regardless of casing and
    /// preserving that entry's original position.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if let Some(existing_key) = self.find_key(&name).map(str::to_string) {
            self.entries.insert(existing_key, value.into());
        } else {
            self.entries.insert(name, value.into());
        }
    }

    pub fn remove(&mut self, name: &str) {
        if let Some(key) = self.find_key(name).map(str::to_string) {
            self.entries.shift_remove(&key);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// One HTTP response, built incrementally then serialised (spec §3, §4.4).
pub struct HttpResponse {
    pub sender_id: String,
    pub conn_id: u64,
    status: Option<u16>,
    pub headers: ResponseHeaders,
    pub body: Body,
}

impl HttpResponse {
    pub fn new(sender_id: impl Into<String>, conn_id: u64) -> Self {
        let mut headers = ResponseHeaders::new();
        headers.set("Server", SERVER_HEADER.as_str());
        HttpResponse {
            sender_id: sender_id.into(),
            conn_id,
            status: None,
            headers,
            body: Body::empty(),
        }
    }

    pub fn is_handled(&self) -> bool {
        self.status.is_some()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    /// `reset` returns the response to its just-constructed state.
    pub fn reset(&mut self) {
        self.status = None;
        self.headers.clear();
        self.headers.set("Server", SERVER_HEADER.as_str());
        self.body = Body::empty();
    }

    fn category(&self) -> u16 {
        self.status.map(|s| s / 100).unwrap_or(0)
    }

    pub fn is_informational(&self) -> bool {
        self.category() == 1
    }
    pub fn is_successful(&self) -> bool {
        self.category() == 2
    }
    pub fn is_redirect(&self) -> bool {
        self.category() == 3
    }
    pub fn is_clienterror(&self) -> bool {
        self.category() == 4
    }
    pub fn is_servererror(&self) -> bool {
        self.category() == 5
    }

    pub fn set_keepalive(&mut self, keepalive: bool) {
        self.headers.set("Connection", if keepalive { "keep-alive" } else { "close" });
    }

    pub fn is_keepalive(&self) -> bool {
        self.headers
            .get("Connection")
            .map(|v| v.to_ascii_lowercase().contains("keep-alive"))
            .unwrap_or(false)
    }

    /// `HTTP/1.1 SSS REASON\r\n`. Defaults status to 200 (with a warning)
    /// if still unset.
    fn status_line(&mut self) -> String {
        let status = match self.status {
            Some(s) => s,
            None => {
                log::warn!("HttpResponse serialised with no status set; defaulting to 200");
                self.status = Some(200);
                200
            }
        };
        format!("HTTP/1.1 {:03} {}\r\n", status, reason_phrase(status))
    }

    /// Full serialisation: status line, headers (with `Date` and
    /// `Content-Length` auto-populated if absent), a blank line, then body.
    pub fn to_bytes(&mut self) -> Result<Bytes> {
        let status_line = self.status_line();

        if !self.headers.contains("Date") {
            self.headers.set("Date", httpdate::fmt_http_date(std::time::SystemTime::now()));
        }
        if !self.headers.contains("Content-Length") {
            let len = self.body.content_length()?;
            let mut buf = itoa::Buffer::new();
            self.headers.set("Content-Length", buf.format(len));
        }

        let mut out = BytesMut::new();
        out.put_slice(status_line.as_bytes());
        for (name, value) in self.headers.iter() {
            out.put_slice(name.as_bytes());
            out.put_slice(b": ");
            out.put_slice(value.as_bytes());
            out.put_slice(b"\r\n");
        }
        out.put_slice(b"\r\n");
        out.put_slice(&self.body.read_all()?);
        Ok(out.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn default_handler_204_serialises_expected_status_line() {
        let mut resp = HttpResponse::new("abc", 42);
        resp.set_status(204);
        let bytes = resp.to_bytes().expect("serialise");
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(text.contains("Server: mongrel2-handler/"));
        assert!(text.contains("Content-Length: 0\r\n"));
        assert!(text.contains("Date: "));
    }

    #[test]
    fn unset_status_defaults_to_200() {
        let mut resp = HttpResponse::new("abc", 1);
        let bytes = resp.to_bytes().expect("serialise");
        assert!(String::from_utf8(bytes.to_vec()).unwrap().starts_with("HTTP/1.1 200 OK\r\n"));
    }

    #[test]
    fn content_length_from_seek_tell_preserves_position() {
        let data = vec![0u8; 1034];
        let mut cursor = Cursor::new(data);
        cursor.set_position(10);
        let mut body = Body::Stream(Box::new(cursor));
        let len = body.content_length().expect("length");
        assert_eq!(len, 1024);
        if let Body::Stream(s) = &mut body {
            assert_eq!(s.stream_position().unwrap(), 10);
        }
    }

    #[test]
    fn exactly_one_category_is_true_across_the_range() {
        for status in 100u16..=599 {
            let mut resp = HttpResponse::new("abc", 1);
            resp.set_status(status);
            let flags = [
                resp.is_informational(),
                resp.is_successful(),
                resp.is_redirect(),
                resp.is_clienterror(),
                resp.is_servererror(),
            ];
            assert_eq!(flags.iter().filter(|f| **f).count(), 1, "status {}", status);
        }
    }

    #[test]
    fn keepalive_toggle_round_trips() {
        let mut resp = HttpResponse::new("abc", 1);
        resp.set_keepalive(true);
        assert!(resp.is_keepalive());
        resp.set_keepalive(false);
        assert!(!resp.is_keepalive());
    }

    #[test]
    fn reset_matches_a_fresh_response() {
        let mut resp = HttpResponse::new("abc", 42);
        resp.set_status(500);
        resp.headers.set("X-Trace", "1");
        resp.body = Body::from("oops");
        resp.reset();

        let mut fresh = HttpResponse::new("abc", 42);
        assert_eq!(resp.status(), fresh.status());
        assert_eq!(
            resp.headers.iter().collect::<Vec<_>>(),
            fresh.headers.iter().collect::<Vec<_>>()
        );
        assert_eq!(resp.body.content_length().unwrap(), fresh.body.content_length().unwrap());
    }
}
