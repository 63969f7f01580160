//! The user-supplied handler capability set (spec §4.8, Design Notes §9).

use crate::request::{HttpRequest, JsonRequest, WebSocketRequest, XmlRequest};
use crate::response::HttpResponse;
use crate::websocket::{WebSocketResponse, CLOSE_POLICY_VIOLATION};

/// Application logic for one Mongrel2 handler. Every method has a
/// spec-mandated default so a handler only needs to override what it
/// actually cares about.
pub trait Handler {
    /// Default: 204 No Content.
    fn handle(&mut self, req: &HttpRequest) -> Option<HttpResponse> {
        let mut resp = HttpResponse::new(req.envelope.sender_id.clone(), req.envelope.conn_id);
        resp.set_status(204);
        Some(resp)
    }

    /// Default: no reply.
    fn handle_json(&mut self, _req: &JsonRequest) -> Option<HttpResponse> {
        None
    }

    /// Default: no reply.
    fn handle_xml(&mut self, _req: &XmlRequest) -> Option<HttpResponse> {
        None
    }

    /// Default: close with 1008 Policy Violation.
    fn handle_websocket(&mut self, _req: &WebSocketRequest) -> Option<WebSocketResponse> {
        Some(WebSocketResponse::make_close_frame(CLOSE_POLICY_VIOLATION))
    }

    /// Default: no-op.
    fn handle_disconnect(&mut self, _req: &JsonRequest) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::Headers;
    use crate::request::RequestEnvelope;
    use bytes::Bytes;

    struct DefaultHandler;
    impl Handler for DefaultHandler {}

    fn envelope() -> RequestEnvelope {
        RequestEnvelope {
            sender_id: "abc".into(),
            conn_id: 1,
            path: "/".into(),
            headers: Headers::new(),
            body: Bytes::new(),
            raw: Bytes::new(),
        }
    }

    #[test]
    fn default_handle_returns_204() {
        let mut h = DefaultHandler;
        let req = HttpRequest { envelope: envelope() };
        let resp = h.handle(&req).expect("response");
        assert_eq!(resp.status(), Some(204));
    }

    #[test]
    fn default_handle_websocket_closes_with_policy_violation() {
        let mut h = DefaultHandler;
        let frame = crate::websocket::Frame { fin: true, opcode: crate::websocket::OPCODE_PING, payload: Bytes::new() };
        let req = WebSocketRequest { envelope: envelope(), flags: 0x89, frame };
        let resp = h.handle_websocket(&req).expect("close response");
        match resp {
            WebSocketResponse::Close { status_code, .. } => assert_eq!(status_code, CLOSE_POLICY_VIOLATION),
            _ => panic!("expected a close response"),
        }
    }

    #[test]
    fn default_handle_json_and_xml_and_disconnect_are_inert() {
        let mut h = DefaultHandler;
        let json_req = JsonRequest { envelope: envelope(), json: serde_json::Value::Null, is_disconnect: false };
        assert!(h.handle_json(&json_req).is_none());
        let xml_req = XmlRequest { envelope: envelope(), xml: String::new() };
        assert!(h.handle_xml(&xml_req).is_none());
        h.handle_disconnect(&json_req);
    }
}
