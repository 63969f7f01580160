//! The `Connection` seam (spec §4.7): owns the two transport endpoints and
//! turns raw frames into typed requests / typed responses into frames.

use crate::error::{Mongrel2Error, Result};
use crate::registry::Registry;
use crate::reply::{encode_close, encode_reply, ConnIds};
use crate::request::{self, Request};
use crate::response::HttpResponse;
use crate::transport::Transport;
use crate::websocket::WebSocketResponse;
use parking_lot::Mutex;

/// One reply: either an HTTP response, a WebSocket frame/close, or the
/// bare "close these connections" command (spec §4.6, §4.7).
pub enum Reply<'a> {
    Http(&'a mut HttpResponse),
    WebSocket { sender_id: &'a str, conn_id: u64, response: &'a WebSocketResponse },
    Close { sender_id: &'a str, conn_ids: &'a ConnIds },
}

pub struct Connection {
    pub app_id: String,
    pub send_spec: String,
    pub recv_spec: String,
    recv_transport: Mutex<Option<Box<dyn Transport>>>,
    send_transport: Mutex<Option<Box<dyn Transport>>>,
    registry: Registry,
}

impl Connection {
    /// `open(app_id, send_spec, recv_spec)` — spec §4.7. The actual socket
    /// construction (bind/connect, identity subscription) lives in the
    /// `Transport` the caller provides; `Connection` only sequences it.
    pub fn open(
        app_id: impl Into<String>,
        send_spec: impl Into<String>,
        recv_spec: impl Into<String>,
        recv_transport: Box<dyn Transport>,
        send_transport: Box<dyn Transport>,
        registry: Registry,
    ) -> Self {
        Connection {
            app_id: app_id.into(),
            send_spec: send_spec.into(),
            recv_spec: recv_spec.into(),
            recv_transport: Mutex::new(Some(recv_transport)),
            send_transport: Mutex::new(Some(send_transport)),
            registry,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.recv_transport.lock().is_none()
    }

    /// Block until one request frame arrives; decode and return it typed.
    pub fn receive(&self) -> Result<Request> {
        let mut guard = self.recv_transport.lock();
        let transport = guard.as_mut().ok_or(Mongrel2Error::ConnectionClosed)?;
        let raw = transport.recv()?;
        request::decode_envelope(&raw, &self.registry)
    }

    /// Serialise and send one reply. Never blocks beyond transport send
    /// semantics (spec §4.7).
    pub fn reply(&self, reply: Reply<'_>) -> Result<()> {
        let mut guard = self.send_transport.lock();
        let transport = guard.as_mut().ok_or(Mongrel2Error::ConnectionClosed)?;
        let frame = match reply {
            Reply::Http(resp) => {
                let conn_ids: ConnIds = smallvec::smallvec![resp.conn_id];
                let payload = resp.to_bytes()?;
                encode_reply(&resp.sender_id, &conn_ids, &payload)
            }
            Reply::WebSocket { sender_id, conn_id, response } => {
                let conn_ids: ConnIds = smallvec::smallvec![conn_id];
                let payload = response.to_frame().encode();
                encode_reply(sender_id, &conn_ids, &payload)
            }
            Reply::Close { sender_id, conn_ids } => encode_close(sender_id, conn_ids),
        };
        transport.send(frame)
    }

    /// Broadcast one payload to several connections in a single transport
    /// write (spec §4.6, §5).
    pub fn reply_broadcast_http(&self, mut resp: HttpResponse, conn_ids: &ConnIds) -> Result<()> {
        let mut guard = self.send_transport.lock();
        let transport = guard.as_mut().ok_or(Mongrel2Error::ConnectionClosed)?;
        let payload = resp.to_bytes()?;
        let frame = encode_reply(&resp.sender_id, conn_ids, &payload);
        transport.send(frame)
    }

    /// Return a new `Connection` with the same identity/specs, opened on
    /// fresh sockets (spec §4.7, used by restart).
    pub fn dup(&self) -> Result<Connection> {
        let recv_guard = self.recv_transport.lock();
        let send_guard = self.send_transport.lock();
        let recv_transport = recv_guard
            .as_ref()
            .ok_or(Mongrel2Error::ConnectionClosed)?
            .try_clone()?;
        let send_transport = send_guard
            .as_ref()
            .ok_or(Mongrel2Error::ConnectionClosed)?
            .try_clone()?;
        Ok(Connection {
            app_id: self.app_id.clone(),
            send_spec: self.send_spec.clone(),
            recv_spec: self.recv_spec.clone(),
            recv_transport: Mutex::new(Some(recv_transport)),
            send_transport: Mutex::new(Some(send_transport)),
            registry: self.registry.clone(),
        })
    }

    /// Idempotent; subsequent `receive`/`reply` calls fail cleanly.
    pub fn close(&self) {
        self.recv_transport.lock().take();
        self.send_transport.lock().take();
    }
}
