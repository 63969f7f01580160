//! Handler-side runtime for the Mongrel2 web server.
//!
//! Covers the wire-protocol tnetstring codec, request envelope decoding and
//! taxonomy, the HTTP response builder, the WebSocket frame codec, the
//! reply envelope encoder, the [`Connection`](connection::Connection)
//! abstraction, and the signal-driven handler run loop. The ZeroMQ
//! PULL/PUB binding itself is out of scope (see [`transport`]); plug in a
//! real one by implementing [`transport::Transport`].

pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod headers;
pub mod reason_phrase;
pub mod registry;
pub mod reply;
pub mod request;
pub mod response;
pub mod runloop;
pub mod tnetstring;
pub mod transport;
pub mod websocket;

pub use connection::{Connection, Reply};
pub use error::{Mongrel2Error, Result};
pub use handler::Handler;
pub use registry::{Registry, VariantKind};
pub use request::{HttpRequest, JsonRequest, Request, RequestEnvelope, WebSocketRequest, XmlRequest};
pub use response::{Body, HttpResponse};
pub use runloop::Runner;
pub use transport::Transport;
pub use websocket::{Frame as WebSocketFrame, WebSocketResponse};
