//! Transports carry envelopes between the router and one peer
//!
//! Outbound traffic goes through `Transport::send`. Inbound traffic is wired
//! at construction time: every transport is built around an `InboundSink`
//! that forwards raw JSON values, and finally a closed signal, into the
//! router's single inbound entry point.

mod channel;
mod stdio;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::protocol::Envelope;
use crate::router::RouterRequest;

pub use channel::{ChannelTransport, PanelPort};
pub use stdio::{MAX_LINE_BYTES, StdioTransport};

/// A peer the router exchanges messages with
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Peer {
    /// Named presentation endpoint, e.g. "sidebar"
    Endpoint(String),
    /// The core engine process
    Engine,
}

impl Peer {
    pub fn endpoint(name: impl Into<String>) -> Self {
        Peer::Endpoint(name.into())
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::Endpoint(name) => write!(f, "endpoint:{}", name),
            Peer::Engine => write!(f, "engine"),
        }
    }
}

/// Process-unique transport identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportId(u64);

impl TransportId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Outbound half of a duplex channel to one peer
pub trait Transport: Send + Sync {
    fn id(&self) -> TransportId;

    /// Queue an envelope for delivery; never waits on the peer
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError>;

    fn is_alive(&self) -> bool;
}

/// Inbound half: delivers raw messages from one transport to the router
#[derive(Clone)]
pub struct InboundSink {
    peer: Peer,
    transport_id: TransportId,
    tx: mpsc::UnboundedSender<RouterRequest>,
}

impl InboundSink {
    pub(crate) fn new(peer: Peer, tx: mpsc::UnboundedSender<RouterRequest>) -> Self {
        Self {
            peer,
            transport_id: TransportId::next(),
            tx,
        }
    }

    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    pub fn transport_id(&self) -> TransportId {
        self.transport_id
    }

    /// Hand a raw inbound message to the router; false once the router is gone
    pub fn deliver(&self, raw: Value) -> bool {
        self.tx
            .send(RouterRequest::Inbound {
                peer: self.peer.clone(),
                transport_id: self.transport_id,
                raw,
            })
            .is_ok()
    }

    /// Report that the transport died
    pub fn closed(&self) {
        let _ = self.tx.send(RouterRequest::TransportClosed {
            peer: self.peer.clone(),
            transport_id: self.transport_id,
        });
    }
}

impl fmt::Debug for InboundSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundSink")
            .field("peer", &self.peer)
            .field("transport_id", &self.transport_id)
            .finish()
    }
}
