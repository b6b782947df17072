//! Requests accepted by the Router actor

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::dispatch::{Handler, HandlerError};
use crate::protocol::RouterFailure;
use crate::transport::{Peer, Transport, TransportId};

/// Callback for inbound notifications of one kind
///
/// Runs on the router task and must not block.
pub type NotificationListener = Arc<dyn Fn(&Peer, Value) + Send + Sync>;

/// Result delivered to a request's resolver
pub type RequestOutcome = Result<Value, RouterFailure>;

/// How a handler invocation ended
pub enum HandlerOutcome {
    Completed(Result<Value, HandlerError>),
    /// The handler panicked; carries the panic message
    Panicked(String),
}

/// Requests to the Router task
pub enum RouterRequest {
    /// Create an endpoint (detached until a transport attaches)
    Register { name: String },

    /// Tear an endpoint down, failing its pending requests
    Deregister { name: String },

    /// Attach (or replace) an endpoint's transport and flush its outbox
    Attach { name: String, transport: Arc<dyn Transport> },

    /// Mark an endpoint not ready; outbound messages queue
    Detach { name: String },

    /// Install the engine transport, failing requests owned by any previous one
    AttachEngine { transport: Arc<dyn Transport> },

    DetachEngine,

    /// Outbound request
    Request {
        correlation_id: String,
        target: Peer,
        kind: String,
        payload: Value,
        timeout: Option<Duration>,
        reply_tx: oneshot::Sender<RequestOutcome>,
    },

    /// Outbound fire-and-forget message
    Notify { target: Peer, kind: String, payload: Value },

    /// Notification to every attached endpoint
    Broadcast { kind: String, payload: Value },

    /// Raw message received by a transport
    Inbound {
        peer: Peer,
        transport_id: TransportId,
        raw: Value,
    },

    /// A transport died
    TransportClosed { peer: Peer, transport_id: TransportId },

    /// A handler finished; the response goes back to `peer`
    HandlerDone {
        peer: Peer,
        correlation_id: String,
        kind: String,
        outcome: HandlerOutcome,
    },

    /// Internal: a request's timeout elapsed
    Timeout { correlation_id: String },

    /// Caller no longer wants the response
    Cancel { correlation_id: String },

    /// Listen for inbound notifications of a kind
    AddListener {
        kind: String,
        listener: NotificationListener,
    },

    /// Handler consulted first for requests originated by the engine
    AddEngineHandler { handler: Arc<dyn Handler> },

    GetMetrics {
        reply_tx: oneshot::Sender<RouterMetrics>,
    },

    /// Fail everything pending and stop
    Shutdown,
}

/// Router metrics snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterMetrics {
    pub registered_endpoints: usize,
    pub attached_endpoints: usize,
    pub engine_attached: bool,
    pub pending_requests: usize,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub unmatched_responses: u64,
    pub malformed_messages: u64,
    pub request_timeouts: u64,
    pub handler_faults: u64,
    pub ignored_notifications: u64,
}
