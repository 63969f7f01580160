//! Signal-driven run loop (spec §4.8, §5, §6).
//!
//! Signal handlers only set atomic flags; the loop inspects them between
//! frames (spec §9 "Signal handlers and the loop"). `HUP` restarts the
//! connection, `TERM`/`INT` request a graceful stop after the in-flight
//! reply is sent, `USR1` is a no-op checkpoint that's only logged.

use crate::connection::{Connection, Reply};
use crate::error::{Mongrel2Error, Result};
use crate::handler::Handler;
use crate::request::Request;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};

static SHOULD_RESTART: AtomicBool = AtomicBool::new(false);
static SHOULD_STOP: AtomicBool = AtomicBool::new(false);
static SHOULD_CHECKPOINT: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sighup(_: libc::c_int) {
    SHOULD_RESTART.store(true, Ordering::SeqCst);
}

extern "C" fn on_term(_: libc::c_int) {
    SHOULD_STOP.store(true, Ordering::SeqCst);
}

extern "C" fn on_usr1(_: libc::c_int) {
    SHOULD_CHECKPOINT.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
fn install_signal_handlers() -> Result<()> {
    use nix::sys::signal::{signal, SigHandler, Signal};
    unsafe {
        signal(Signal::SIGHUP, SigHandler::Handler(on_sighup))
            .map_err(|e| Mongrel2Error::Transport(format!("sigaction(SIGHUP): {}", e)))?;
        signal(Signal::SIGTERM, SigHandler::Handler(on_term))
            .map_err(|e| Mongrel2Error::Transport(format!("sigaction(SIGTERM): {}", e)))?;
        signal(Signal::SIGINT, SigHandler::Handler(on_term))
            .map_err(|e| Mongrel2Error::Transport(format!("sigaction(SIGINT): {}", e)))?;
        signal(Signal::SIGUSR1, SigHandler::Handler(on_usr1))
            .map_err(|e| Mongrel2Error::Transport(format!("sigaction(SIGUSR1): {}", e)))?;
    }
    Ok(())
}

#[cfg(unix)]
fn restore_default_signal_handlers() {
    use nix::sys::signal::{signal, SigHandler, Signal};
    for sig in [Signal::SIGHUP, Signal::SIGTERM, Signal::SIGINT, Signal::SIGUSR1] {
        // best-effort; if this fails there is nothing more we can do on exit.
        let _ = unsafe { signal(sig, SigHandler::SigDfl) };
    }
}

fn reset_flags() {
    SHOULD_RESTART.store(false, Ordering::SeqCst);
    SHOULD_STOP.store(false, Ordering::SeqCst);
    SHOULD_CHECKPOINT.store(false, Ordering::SeqCst);
}

/// Owns the handler's [`Connection`] across restarts and runs the
/// receive-dispatch-reply loop (spec §4.8).
pub struct Runner<H: Handler> {
    conn: Connection,
    handler: H,
}

impl<H: Handler> Runner<H> {
    pub fn new(conn: Connection, handler: H) -> Self {
        Runner { conn, handler }
    }

    /// `run()` — spec §4.8. Installs signal handlers, loops until the
    /// connection is closed or a stop is requested, restores default signal
    /// dispositions on the way out.
    #[cfg(unix)]
    pub fn run(&mut self) -> Result<()> {
        install_signal_handlers()?;
        reset_flags();
        let outcome = self.run_inner();
        restore_default_signal_handlers();
        outcome
    }

    fn run_inner(&mut self) -> Result<()> {
        while !self.conn.is_closed() {
            if SHOULD_STOP.swap(false, Ordering::SeqCst) {
                info!("shutdown requested, stopping run loop");
                self.shutdown();
                break;
            }
            if SHOULD_RESTART.swap(false, Ordering::SeqCst) {
                info!("restart requested, swapping connection");
                self.restart()?;
                continue;
            }
            if SHOULD_CHECKPOINT.swap(false, Ordering::SeqCst) {
                info!("checkpoint signal received");
            }

            let req = match self.conn.receive() {
                Ok(req) => req,
                Err(Mongrel2Error::ConnectionClosed) => break,
                Err(Mongrel2Error::Transport(msg)) => {
                    if self.conn.is_closed() {
                        break;
                    }
                    warn!("transport error, retrying: {}", msg);
                    continue;
                }
                Err(e) => {
                    // per-frame decode errors: log, drop the frame, continue
                    warn!("dropping frame: {}", e);
                    continue;
                }
            };

            debug!(
                "received {} {}",
                req.envelope().sender_id,
                req.envelope().conn_id
            );

            if let Some(resp) = self.dispatch(req) {
                if !self.conn.is_closed() {
                    if let Err(e) = self.send(resp) {
                        warn!("reply failed: {}", e);
                    }
                }
            }
        }
        Ok(())
    }

    /// `dispatch(req)` — spec §4.8. Total over every variant; disconnect
    /// notices short-circuit before the variant switch.
    fn dispatch(&mut self, req: Request) -> Option<ReplyPayload> {
        if req.is_disconnect() {
            if let Request::Json(json_req) = &req {
                self.handler.handle_disconnect(json_req);
            }
            return None;
        }
        match req {
            Request::Http(http_req) => self.handler.handle(&http_req).map(ReplyPayload::Http),
            Request::Json(json_req) => self.handler.handle_json(&json_req).map(ReplyPayload::Http),
            Request::Xml(xml_req) => self.handler.handle_xml(&xml_req).map(ReplyPayload::Http),
            Request::WebSocket(ws_req) => {
                let sender_id = ws_req.envelope.sender_id.clone();
                let conn_id = ws_req.envelope.conn_id;
                self.handler
                    .handle_websocket(&ws_req)
                    .map(|response| ReplyPayload::WebSocket { sender_id, conn_id, response })
            }
            Request::Unknown(envelope) => {
                error!(
                    "unknown METHOD from {} conn {}, dropping",
                    envelope.sender_id, envelope.conn_id
                );
                None
            }
        }
    }

    /// `restart()` — spec §4.8: swap in `conn.dup()`, close the original.
    pub fn restart(&mut self) -> Result<()> {
        let fresh = self.conn.dup()?;
        let old = std::mem::replace(&mut self.conn, fresh);
        old.close();
        Ok(())
    }

    /// `shutdown()` — spec §4.8: close the connection so the loop observes
    /// `closed` on its next check.
    pub fn shutdown(&self) {
        self.conn.close();
    }
}

/// The reply half of dispatch, bridged into [`Connection::reply`]'s
/// borrow-based [`Reply`] enum.
enum ReplyPayload {
    Http(crate::response::HttpResponse),
    WebSocket { sender_id: String, conn_id: u64, response: crate::websocket::WebSocketResponse },
}

impl<H: Handler> Runner<H> {
    fn send(&self, payload: ReplyPayload) -> Result<()> {
        match payload {
            ReplyPayload::Http(mut resp) => self.conn.reply(Reply::Http(&mut resp)),
            ReplyPayload::WebSocket { sender_id, conn_id, response } => {
                self.conn.reply(Reply::WebSocket { sender_id: &sender_id, conn_id, response: &response })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use crate::registry::Registry;
    use crate::transport::{InMemoryTransport, Transport};
    use bytes::Bytes;

    struct EchoHandler;
    impl Handler for EchoHandler {}

    fn runner_with_peers() -> (Runner<EchoHandler>, Box<dyn Transport>, Box<dyn Transport>) {
        let (handler_recv, driver_send) = InMemoryTransport::pair();
        let (driver_recv, handler_send) = InMemoryTransport::pair();
        let conn = Connection::open(
            "app",
            "tcp://send",
            "tcp://recv",
            Box::new(handler_recv),
            Box::new(handler_send),
            Registry::new(),
        );
        (Runner::new(conn, EchoHandler), Box::new(driver_send), Box::new(driver_recv))
    }

    #[test]
    fn dispatch_replies_204_for_default_http_handler() {
        let (mut runner, _send, _recv) = runner_with_peers();
        let registry = Registry::new();
        let frame = b"abc 42 / 26:6:METHOD,3:GET,4:PATH,1:/,}0:,";
        let req = crate::request::decode_envelope(frame, &registry).unwrap();
        let resp = runner.dispatch(req).expect("some reply");
        assert!(runner.send(resp).is_ok());
    }

    #[test]
    fn dispatch_swallows_unknown_method() {
        let (mut runner, _send, _recv) = runner_with_peers();
        let registry = Registry::new();
        let headers = b"15:6:METHOD,3:FOO,}";
        let frame = format!("abc 1 / {}0:,", String::from_utf8_lossy(headers));
        let req = crate::request::decode_envelope(frame.as_bytes(), &registry).unwrap();
        assert!(runner.dispatch(req).is_none());
    }

    #[test]
    fn restart_swaps_connection_and_closes_the_old_one() {
        let (mut runner, _send, _recv) = runner_with_peers();
        let old_app_id = runner.conn.app_id.clone();
        runner.restart().expect("restart");
        assert_eq!(runner.conn.app_id, old_app_id);
        assert!(!runner.conn.is_closed());
    }

    #[test]
    fn shutdown_closes_the_connection() {
        let (runner, _send, _recv) = runner_with_peers();
        runner.shutdown();
        assert!(runner.conn.is_closed());
        let _ = Bytes::new();
    }
}
