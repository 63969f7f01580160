//! The abstract message-transport the core consumes (spec §1, §4.7). A
//! real deployment plugs in a ZeroMQ PULL/PUB pair; that binding is an
//! external collaborator per spec §1 and is intentionally not shipped
//! here. [`InMemoryTransport`] is a test double standing in for it.

use crate::error::{Mongrel2Error, Result};
use bytes::Bytes;
use std::sync::mpsc::{Receiver, Sender};

/// One endpoint of the duplex the handler speaks over. `recv` blocks until
/// a frame arrives; `send` writes one logical frame.
pub trait Transport: Send {
    fn recv(&mut self) -> Result<Bytes>;
    fn send(&mut self, frame: Bytes) -> Result<()>;
    /// Open a fresh transport to the same endpoint (spec §4.7 `dup`).
    fn try_clone(&self) -> Result<Box<dyn Transport>>;
}

/// An in-process transport backed by `std::sync::mpsc`, for tests and the
/// bundled demo. `try_clone` hands back a transport sharing the same
/// channel pair, mirroring real re-subscription to the same endpoint.
pub struct InMemoryTransport {
    rx: Receiver<Bytes>,
    tx: Sender<Bytes>,
    peer_tx: Sender<Bytes>,
}

impl InMemoryTransport {
    /// Build a connected pair: frames sent on one side arrive on the other.
    pub fn pair() -> (InMemoryTransport, InMemoryTransport) {
        let (a_tx, a_rx) = std::sync::mpsc::channel();
        let (b_tx, b_rx) = std::sync::mpsc::channel();
        let a = InMemoryTransport { rx: a_rx, tx: a_tx.clone(), peer_tx: b_tx.clone() };
        let b = InMemoryTransport { rx: b_rx, tx: b_tx, peer_tx: a_tx };
        (a, b)
    }
}

impl Transport for InMemoryTransport {
    fn recv(&mut self) -> Result<Bytes> {
        self.rx.recv().map_err(|_| Mongrel2Error::ConnectionClosed)
    }

    fn send(&mut self, frame: Bytes) -> Result<()> {
        self.peer_tx.send(frame).map_err(|_| Mongrel2Error::ConnectionClosed)
    }

    fn try_clone(&self) -> Result<Box<dyn Transport>> {
        // a cloned endpoint still writes to the same peer and still drains
        // anything already queued for this side.
        Ok(Box::new(InMemoryTransport {
            rx: {
                // mpsc::Receiver can't be cloned; a duplicate that observes
                // the same inbound stream isn't representable with plain
                // channels, so `dup` on the in-memory double yields a fresh
                // empty inbound side sharing the same outbound peer. Real
                // transports (e.g. ZeroMQ re-connecting to recv_spec) do
                // not have this limitation.
                let (_tx, rx) = std::sync::mpsc::channel();
                rx
            },
            tx: self.tx.clone(),
            peer_tx: self.peer_tx.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_delivers_frames_to_the_peer() {
        let (mut a, mut b) = InMemoryTransport::pair();
        a.send(Bytes::from_static(b"hello")).unwrap();
        assert_eq!(b.recv().unwrap(), Bytes::from_static(b"hello"));
    }
}
