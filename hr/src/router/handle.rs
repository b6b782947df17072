//! Handles for talking to the Router task

use std::sync::Arc;
use std::time::Duration;

use eyre::{Result, eyre};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::messages::{RequestOutcome, RouterMetrics, RouterRequest};
use crate::dispatch::Handler;
use crate::protocol::{RouterFailure, new_correlation_id};
use crate::transport::{ChannelTransport, InboundSink, PanelPort, Peer, Transport};

/// Cloneable handle to a running Router
#[derive(Clone)]
pub struct RouterHandle {
    tx: mpsc::UnboundedSender<RouterRequest>,
}

impl RouterHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<RouterRequest>) -> Self {
        Self { tx }
    }

    fn send(&self, req: RouterRequest) -> Result<()> {
        self.tx.send(req).map_err(|_| eyre!("Router channel closed"))
    }

    /// Issue a request and return a reply that can be awaited or cancelled
    ///
    /// `timeout` overrides the router's default request timeout.
    pub fn send_request(&self, target: Peer, kind: &str, payload: Value, timeout: Option<Duration>) -> PendingReply {
        let correlation_id = new_correlation_id();
        debug!(%correlation_id, %target, %kind, "send_request: called");
        let (reply_tx, reply_rx) = oneshot::channel();

        // If the router is gone the sender is dropped and wait() reports Shutdown
        let _ = self.tx.send(RouterRequest::Request {
            correlation_id: correlation_id.clone(),
            target,
            kind: kind.to_string(),
            payload,
            timeout,
            reply_tx,
        });

        PendingReply {
            correlation_id,
            rx: reply_rx,
            tx: self.tx.clone(),
        }
    }

    /// Issue a request with the default timeout and wait for its outcome
    pub async fn request(&self, target: Peer, kind: &str, payload: Value) -> RequestOutcome {
        self.send_request(target, kind, payload, None).wait().await
    }

    pub fn notify(&self, target: Peer, kind: &str, payload: Value) -> Result<()> {
        debug!(%target, %kind, "notify: called");
        self.send(RouterRequest::Notify {
            target,
            kind: kind.to_string(),
            payload,
        })
    }

    /// Notify every attached endpoint
    pub fn broadcast(&self, kind: &str, payload: Value) -> Result<()> {
        debug!(%kind, "broadcast: called");
        self.send(RouterRequest::Broadcast {
            kind: kind.to_string(),
            payload,
        })
    }

    /// Register a named endpoint; it stays detached until a transport attaches
    pub fn register(&self, name: &str) -> Result<EndpointHandle> {
        debug!(%name, "register: called");
        self.send(RouterRequest::Register { name: name.to_string() })?;
        Ok(EndpointHandle {
            name: name.to_string(),
            router: self.clone(),
        })
    }

    pub fn deregister(&self, name: &str) -> Result<()> {
        self.send(RouterRequest::Deregister { name: name.to_string() })
    }

    pub fn mark_attached(&self, name: &str, transport: Arc<dyn Transport>) -> Result<()> {
        self.send(RouterRequest::Attach {
            name: name.to_string(),
            transport,
        })
    }

    pub fn mark_detached(&self, name: &str) -> Result<()> {
        self.send(RouterRequest::Detach { name: name.to_string() })
    }

    pub fn attach_engine(&self, transport: Arc<dyn Transport>) -> Result<()> {
        self.send(RouterRequest::AttachEngine { transport })
    }

    pub fn detach_engine(&self) -> Result<()> {
        self.send(RouterRequest::DetachEngine)
    }

    /// Attach an in-process engine and return its side of the channel
    pub fn connect_engine_channel(&self) -> Result<PanelPort> {
        let (transport, port) = ChannelTransport::pair(self.inbound_sink(Peer::Engine));
        self.attach_engine(transport)?;
        Ok(port)
    }

    /// Call `listener` for every inbound notification of `kind`
    pub fn on_notification<F>(&self, kind: &str, listener: F) -> Result<()>
    where
        F: Fn(&Peer, Value) + Send + Sync + 'static,
    {
        self.send(RouterRequest::AddListener {
            kind: kind.to_string(),
            listener: Arc::new(listener),
        })
    }

    /// Serve engine-originated requests of `handler.kind()` ahead of the dispatch table
    pub fn on_engine_request(&self, handler: Arc<dyn Handler>) -> Result<()> {
        self.send(RouterRequest::AddEngineHandler { handler })
    }

    pub fn cancel(&self, correlation_id: &str) -> Result<()> {
        self.send(RouterRequest::Cancel {
            correlation_id: correlation_id.to_string(),
        })
    }

    pub async fn metrics(&self) -> Result<RouterMetrics> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RouterRequest::GetMetrics { reply_tx })?;
        reply_rx.await.map_err(|_| eyre!("Router dropped metrics request"))
    }

    /// Fail every pending request and stop the router
    pub fn shutdown(&self) -> Result<()> {
        self.send(RouterRequest::Shutdown)
    }

    /// Inbound half for a new transport to `peer`
    pub fn inbound_sink(&self, peer: Peer) -> InboundSink {
        InboundSink::new(peer, self.tx.clone())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// An outstanding request
pub struct PendingReply {
    correlation_id: String,
    rx: oneshot::Receiver<RequestOutcome>,
    tx: mpsc::UnboundedSender<RouterRequest>,
}

impl PendingReply {
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Wait for the outcome; resolves exactly once
    pub async fn wait(self) -> RequestOutcome {
        self.rx.await.unwrap_or(Err(RouterFailure::Shutdown))
    }

    /// Withdraw the request; a late response is discarded
    pub fn cancel(self) {
        let _ = self.tx.send(RouterRequest::Cancel {
            correlation_id: self.correlation_id,
        });
    }
}

/// A registered endpoint
#[derive(Clone)]
pub struct EndpointHandle {
    name: String,
    router: RouterHandle,
}

impl EndpointHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn peer(&self) -> Peer {
        Peer::endpoint(&self.name)
    }

    /// Attach a transport; anything queued while detached is flushed first
    pub fn attach(&self, transport: Arc<dyn Transport>) -> Result<()> {
        self.router.mark_attached(&self.name, transport)
    }

    pub fn detach(&self) -> Result<()> {
        self.router.mark_detached(&self.name)
    }

    /// Attach an in-process panel and return its port
    pub fn connect_channel(&self) -> Result<PanelPort> {
        let (transport, port) = ChannelTransport::pair(self.router.inbound_sink(self.peer()));
        self.attach(transport)?;
        Ok(port)
    }

    /// Sink for building a custom transport to this endpoint
    pub fn inbound_sink(&self) -> InboundSink {
        self.router.inbound_sink(self.peer())
    }

    pub fn notify(&self, kind: &str, payload: Value) -> Result<()> {
        self.router.notify(self.peer(), kind, payload)
    }

    pub async fn request(&self, kind: &str, payload: Value) -> RequestOutcome {
        self.router.request(self.peer(), kind, payload).await
    }

    pub fn deregister(self) -> Result<()> {
        self.router.deregister(&self.name)
    }
}

impl std::fmt::Debug for EndpointHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointHandle").field("name", &self.name).finish()
    }
}
