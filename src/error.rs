use std::fmt;

/// Every failure mode a Mongrel2 handler can hit, from wire decode through
/// transport I/O. See spec §7 for the policy attached to each kind.
#[derive(Debug)]
pub enum Mongrel2Error {
    /// Malformed tnetstring: bad length prefix, wrong terminator, or a
    /// type-tag mismatch.
    TNetstring(String),
    /// Envelope parsed but the headers blob was neither a dict nor a JSON
    /// object.
    BadRequest(String),
    /// `METHOD` absent, not `^\w+$`, or has no registered variant and no
    /// default.
    UnhandledMethod(String),
    /// A response body exposes neither a length nor a seek/tell pair.
    Response(String),
    /// `receive`/`reply` called after `Connection::close`.
    ConnectionClosed,
    /// The underlying transport failed while the connection was still open.
    Transport(String),
}

impl fmt::Display for Mongrel2Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mongrel2Error::TNetstring(msg) => write!(f, "malformed tnetstring: {}", msg),
            Mongrel2Error::BadRequest(msg) => write!(f, "bad request: {}", msg),
            Mongrel2Error::UnhandledMethod(method) => {
                write!(f, "unhandled method: {}", method)
            }
            Mongrel2Error::Response(msg) => write!(f, "response error: {}", msg),
            Mongrel2Error::ConnectionClosed => write!(f, "connection closed"),
            Mongrel2Error::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

impl std::error::Error for Mongrel2Error {}

pub type Result<T> = std::result::Result<T, Mongrel2Error>;
