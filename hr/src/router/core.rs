//! Main Router task implementation

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use eyre::Result;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::config::RouterConfig;
use super::handle::RouterHandle;
use super::host_exec::HostExecutor;
use super::messages::{HandlerOutcome, NotificationListener, RequestOutcome, RouterMetrics, RouterRequest};
use super::pending::{PendingRequest, PendingTable, Resolver};
use super::registry::{Delivery, EndpointRegistry};
use crate::dispatch::{DispatchTable, Handler, HostContext, NoticeLevel};
use crate::protocol::{Direction, Envelope, RouterFailure, decode_response, new_correlation_id, success_payload};
use crate::transport::{Peer, Transport, TransportId};

/// The Router correlates and dispatches every message of one host session
pub struct Router {
    config: RouterConfig,
    tx: mpsc::UnboundedSender<RouterRequest>,
    rx: mpsc::UnboundedReceiver<RouterRequest>,
    table: DispatchTable,
    context: HostContext,
    host_exec: HostExecutor,
}

impl Router {
    /// Create a Router; starts the host execution thread
    pub fn new(config: RouterConfig, table: DispatchTable, context: HostContext) -> Result<Self> {
        debug!(kinds = table.len(), "Router::new: called");
        let (tx, rx) = mpsc::unbounded_channel();
        let host_exec = HostExecutor::start()?;
        Ok(Self {
            config,
            tx,
            rx,
            table,
            context,
            host_exec,
        })
    }

    pub fn handle(&self) -> RouterHandle {
        RouterHandle::new(self.tx.clone())
    }

    /// Run the Router on a new task and return a handle to it
    pub fn spawn(self) -> RouterHandle {
        let handle = self.handle();
        tokio::spawn(self.run());
        handle
    }

    /// Run the Router task
    ///
    /// This consumes the Router and runs until shutdown is requested.
    pub async fn run(self) {
        let Router {
            config,
            tx,
            mut rx,
            table,
            context,
            host_exec,
        } = self;

        let mut state = RouterState {
            registry: EndpointRegistry::new(config.outbox_capacity),
            pending: PendingTable::new(),
            engine: None,
            listeners: HashMap::new(),
            engine_handlers: HashMap::new(),
            metrics: RouterMetrics::default(),
            config,
            tx,
            table,
            context,
            host_exec,
        };

        info!("Router started");

        while let Some(req) = rx.recv().await {
            if !state.handle(req) {
                break;
            }
        }

        info!(
            messages_sent = state.metrics.messages_sent,
            messages_received = state.metrics.messages_received,
            "Router stopped"
        );
    }
}

struct RouterState {
    config: RouterConfig,
    tx: mpsc::UnboundedSender<RouterRequest>,
    table: DispatchTable,
    context: HostContext,
    host_exec: HostExecutor,
    registry: EndpointRegistry,
    pending: PendingTable,
    engine: Option<Arc<dyn Transport>>,
    listeners: HashMap<String, Vec<NotificationListener>>,
    engine_handlers: HashMap<String, Arc<dyn Handler>>,
    metrics: RouterMetrics,
}

impl RouterState {
    /// Process one request; false stops the loop
    fn handle(&mut self, req: RouterRequest) -> bool {
        match req {
            RouterRequest::Register { name } => {
                self.registry.register(&name);
            }

            RouterRequest::Deregister { name } => {
                if self.registry.deregister(&name) {
                    self.fail_owned_by(&Peer::Endpoint(name), RouterFailure::TransportClosed);
                }
            }

            RouterRequest::Attach { name, transport } => {
                let transport_id = transport.id();
                match self.registry.mark_attached(&name, transport) {
                    Ok(flushed) => {
                        self.metrics.messages_sent += flushed as u64;
                        info!(endpoint = %name, %transport_id, flushed, "Endpoint attached");
                    }
                    Err(_) => self.endpoint_lost(&name),
                }
            }

            RouterRequest::Detach { name } => {
                self.registry.mark_detached(&name);
            }

            RouterRequest::AttachEngine { transport } => {
                info!(transport_id = %transport.id(), "Engine attached");
                if self.engine.replace(transport).is_some() {
                    self.fail_owned_by(&Peer::Engine, RouterFailure::TransportClosed);
                }
            }

            RouterRequest::DetachEngine => {
                if self.engine.take().is_some() {
                    info!("Engine detached");
                    self.fail_owned_by(&Peer::Engine, RouterFailure::TransportClosed);
                }
            }

            RouterRequest::Request {
                correlation_id,
                target,
                kind,
                payload,
                timeout,
                reply_tx,
            } => {
                debug!(%correlation_id, %target, %kind, "Outbound request");
                let refused = match &target {
                    Peer::Engine if !self.engine_live() => Some(RouterFailure::BridgeNotReady),
                    Peer::Endpoint(name) if !self.registry.is_registered(name) => {
                        Some(RouterFailure::UnknownEndpoint { name: name.clone() })
                    }
                    _ => None,
                };
                if let Some(failure) = refused {
                    debug!(%correlation_id, %failure, "Request refused");
                    let _ = reply_tx.send(Err(failure));
                    return true;
                }

                let timeout = timeout.unwrap_or_else(|| self.config.request_timeout());
                let tracked = self.track(PendingRequest {
                    correlation_id: correlation_id.clone(),
                    kind: kind.clone(),
                    owner: target.clone(),
                    created_at: Instant::now(),
                    timeout,
                    resolver: Resolver::Caller(reply_tx),
                });
                if tracked {
                    self.deliver(&target, Envelope::request(kind, correlation_id, payload));
                }
            }

            RouterRequest::Notify { target, kind, payload } => {
                self.deliver(&target, Envelope::notification(kind, payload));
            }

            RouterRequest::Broadcast { kind, payload } => {
                self.broadcast(kind, payload);
            }

            RouterRequest::Inbound {
                peer,
                transport_id,
                raw,
            } => {
                self.metrics.messages_received += 1;
                if !self.is_current(&peer, transport_id) {
                    debug!(%peer, %transport_id, "Dropping message from stale transport");
                    return true;
                }
                self.on_inbound(peer, raw);
            }

            RouterRequest::TransportClosed { peer, transport_id } => {
                if !self.is_current(&peer, transport_id) {
                    debug!(%peer, %transport_id, "Stale transport closed");
                    return true;
                }
                match peer {
                    Peer::Engine => self.engine_lost(),
                    Peer::Endpoint(name) => {
                        info!(endpoint = %name, %transport_id, "Endpoint transport closed");
                        self.endpoint_lost(&name);
                    }
                }
            }

            RouterRequest::HandlerDone {
                peer,
                correlation_id,
                kind,
                outcome,
            } => {
                let payload = self.finish_handler(&kind, outcome);
                self.deliver(&peer, Envelope::response(kind, correlation_id, payload));
            }

            RouterRequest::Timeout { correlation_id } => {
                if let Some(pending) = self.pending.remove_expired(&correlation_id) {
                    warn!(%correlation_id, kind = %pending.kind, owner = %pending.owner, "Request timed out");
                    self.metrics.request_timeouts += 1;
                    let timeout = pending.timeout;
                    self.resolve(pending, Err(RouterFailure::Timeout(timeout)));
                }
            }

            RouterRequest::Cancel { correlation_id } => {
                if let Some(pending) = self.pending.remove(&correlation_id) {
                    debug!(%correlation_id, kind = %pending.kind, "Request cancelled");
                    self.resolve(pending, Err(RouterFailure::Cancelled));
                }
            }

            RouterRequest::AddListener { kind, listener } => {
                debug!(%kind, "Adding notification listener");
                self.listeners.entry(kind).or_default().push(listener);
            }

            RouterRequest::AddEngineHandler { handler } => {
                debug!(kind = handler.kind(), "Adding engine request handler");
                self.engine_handlers.insert(handler.kind().to_string(), handler);
            }

            RouterRequest::GetMetrics { reply_tx } => {
                let mut metrics = self.metrics.clone();
                metrics.registered_endpoints = self.registry.len();
                metrics.attached_endpoints = self.registry.attached_count();
                metrics.engine_attached = self.engine_live();
                metrics.pending_requests = self.pending.len();
                let _ = reply_tx.send(metrics);
            }

            RouterRequest::Shutdown => {
                let pending = self.pending.drain_all();
                info!(pending = pending.len(), "Router shutting down");
                for entry in pending {
                    self.resolve(entry, Err(RouterFailure::Shutdown));
                }
                return false;
            }
        }
        true
    }

    fn engine_live(&self) -> bool {
        self.engine.as_ref().is_some_and(|t| t.is_alive())
    }

    /// True if `transport_id` is the peer's currently attached transport
    fn is_current(&self, peer: &Peer, transport_id: TransportId) -> bool {
        match peer {
            Peer::Engine => self.engine.as_ref().map(|t| t.id()) == Some(transport_id),
            Peer::Endpoint(name) => self.registry.transport_id(name) == Some(transport_id),
        }
    }

    fn on_inbound(&mut self, peer: Peer, raw: Value) {
        let envelope = match Envelope::from_value(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(%peer, error = %e, "Dropping malformed message");
                self.metrics.malformed_messages += 1;
                return;
            }
        };

        let direction = match envelope.direction {
            Some(direction) => direction,
            None => self.infer_direction(&peer, &envelope),
        };
        debug!(%peer, kind = %envelope.kind, correlation_id = %envelope.correlation_id, ?direction, "Inbound message");

        match direction {
            Direction::Response => self.on_response(peer, envelope),
            Direction::Request => self.on_request(peer, envelope),
            Direction::Notification => self.on_notification(peer, envelope),
        }
    }

    /// Direction of a message that does not carry one
    ///
    /// A live correlation id makes it a response. A kind with a listener, or
    /// an engine kind in the broadcast set, is a notification, and so is any
    /// kind nothing here can serve: unmarked traffic never draws an
    /// unsupported-kind reply.
    fn infer_direction(&self, peer: &Peer, envelope: &Envelope) -> Direction {
        if self.pending.contains(&envelope.correlation_id) {
            return Direction::Response;
        }
        let kind = envelope.kind.as_str();
        let listened = self.listeners.contains_key(kind)
            || (*peer == Peer::Engine && self.config.broadcasts_from_engine(kind));
        if listened || !self.serves(peer, kind) {
            Direction::Notification
        } else {
            Direction::Request
        }
    }

    /// True if a request of `kind` from `peer` has a handler or an engine relay
    fn serves(&self, peer: &Peer, kind: &str) -> bool {
        match peer {
            Peer::Engine => self.engine_handlers.contains_key(kind) || self.table.has(kind),
            Peer::Endpoint(_) => self.table.has(kind) || self.config.forwards_to_engine(kind),
        }
    }

    fn on_response(&mut self, peer: Peer, envelope: Envelope) {
        match self.pending.remove_answered_by(&envelope.correlation_id, &peer) {
            Some(pending) => self.resolve(pending, decode_response(envelope.data)),
            None => {
                warn!(
                    %peer,
                    correlation_id = %envelope.correlation_id,
                    kind = %envelope.kind,
                    "Discarding unmatched response"
                );
                self.metrics.unmatched_responses += 1;
            }
        }
    }

    fn on_request(&mut self, peer: Peer, envelope: Envelope) {
        let handler = match &peer {
            Peer::Engine => self
                .engine_handlers
                .get(&envelope.kind)
                .cloned()
                .or_else(|| self.table.get(&envelope.kind)),
            Peer::Endpoint(_) => self.table.get(&envelope.kind),
        };
        if let Some(handler) = handler {
            self.run_handler(handler, peer, envelope);
            return;
        }

        if let Peer::Endpoint(name) = &peer
            && self.config.forwards_to_engine(&envelope.kind)
        {
            let name = name.clone();
            self.relay_to_engine(name, envelope);
            return;
        }

        debug!(%peer, kind = %envelope.kind, "Unsupported request kind");
        let failure = RouterFailure::Unsupported {
            kind: envelope.kind.clone(),
        };
        self.deliver(
            &peer,
            Envelope::response(envelope.kind, envelope.correlation_id, failure.to_payload()),
        );
    }

    fn on_notification(&mut self, peer: Peer, envelope: Envelope) {
        let mut handled = false;

        if let Some(listeners) = self.listeners.get(&envelope.kind) {
            for listener in listeners {
                let data = envelope.data.clone();
                let result = std::panic::catch_unwind(AssertUnwindSafe(|| listener(&peer, data)));
                if let Err(panic) = result {
                    error!(kind = %envelope.kind, message = %panic_message(panic.as_ref()), "Notification listener panicked");
                }
            }
            handled = true;
        }

        if peer == Peer::Engine && self.config.broadcasts_from_engine(&envelope.kind) {
            self.broadcast(envelope.kind.clone(), envelope.data);
            handled = true;
        }

        if !handled {
            debug!(%peer, kind = %envelope.kind, "Ignoring notification with no listener");
            self.metrics.ignored_notifications += 1;
        }
    }

    fn relay_to_engine(&mut self, endpoint: String, envelope: Envelope) {
        if !self.engine_live() {
            debug!(%endpoint, kind = %envelope.kind, "Engine not ready, refusing relay");
            let failure = RouterFailure::BridgeNotReady;
            self.deliver(
                &Peer::Endpoint(endpoint),
                Envelope::response(envelope.kind, envelope.correlation_id, failure.to_payload()),
            );
            return;
        }

        let relay_id = new_correlation_id();
        debug!(
            %endpoint,
            kind = %envelope.kind,
            original = %envelope.correlation_id,
            %relay_id,
            "Relaying request to engine"
        );
        let timeout = self.config.request_timeout();
        let tracked = self.track(PendingRequest {
            correlation_id: relay_id.clone(),
            kind: envelope.kind.clone(),
            owner: Peer::Engine,
            created_at: Instant::now(),
            timeout,
            resolver: Resolver::Relay {
                endpoint,
                correlation_id: envelope.correlation_id,
            },
        });
        if tracked {
            self.deliver(&Peer::Engine, Envelope::request(envelope.kind, relay_id, envelope.data));
        }
    }

    /// Enter a pending request and arm its timeout
    fn track(&mut self, request: PendingRequest) -> bool {
        let correlation_id = request.correlation_id.clone();
        let timeout = request.timeout;

        if let Err(rejected) = self.pending.insert(request) {
            warn!(%correlation_id, "Correlation id already outstanding");
            self.resolve(rejected, Err(RouterFailure::DuplicateId { id: correlation_id }));
            return false;
        }

        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(RouterRequest::Timeout { correlation_id });
        });
        true
    }

    /// Deliver a request outcome to whoever is waiting for it
    fn resolve(&mut self, pending: PendingRequest, outcome: RequestOutcome) {
        debug!(
            correlation_id = %pending.correlation_id,
            kind = %pending.kind,
            elapsed_ms = pending.created_at.elapsed().as_millis() as u64,
            ok = outcome.is_ok(),
            "Resolving request"
        );
        match pending.resolver {
            Resolver::Caller(reply_tx) => {
                if reply_tx.send(outcome).is_err() {
                    debug!(correlation_id = %pending.correlation_id, "Caller gone, outcome discarded");
                }
            }
            Resolver::Relay {
                endpoint,
                correlation_id,
            } => {
                let payload = match outcome {
                    Ok(data) => success_payload(data),
                    Err(failure) => failure.to_payload(),
                };
                self.deliver(
                    &Peer::Endpoint(endpoint),
                    Envelope::response(pending.kind, correlation_id, payload),
                );
            }
        }
    }

    fn deliver(&mut self, peer: &Peer, envelope: Envelope) {
        match peer {
            Peer::Engine => {
                let Some(engine) = self.engine.clone() else {
                    warn!(kind = %envelope.kind, "No engine attached, dropping message");
                    return;
                };
                match engine.send(&envelope) {
                    Ok(()) => self.metrics.messages_sent += 1,
                    Err(e) => {
                        warn!(error = %e, kind = %envelope.kind, "Engine send failed");
                        self.engine_lost();
                    }
                }
            }
            Peer::Endpoint(name) => match self.registry.send(name, envelope) {
                Delivery::Sent => self.metrics.messages_sent += 1,
                Delivery::Queued => debug!(endpoint = %name, "Queued for detached endpoint"),
                Delivery::Unknown => {}
                Delivery::Failed => self.endpoint_lost(name),
            },
        }
    }

    fn broadcast(&mut self, kind: String, payload: Value) {
        let envelope = Envelope::notification(kind, payload);
        let attached = self.registry.attached_count();
        debug!(kind = %envelope.kind, attached, "Broadcasting");

        let failed = self.registry.broadcast(&envelope);
        self.metrics.messages_sent += attached.saturating_sub(failed.len()) as u64;
        for name in failed {
            self.endpoint_lost(&name);
        }
    }

    fn engine_lost(&mut self) {
        if self.engine.take().is_some() {
            warn!("Engine transport lost");
        }
        self.fail_owned_by(&Peer::Engine, RouterFailure::TransportClosed);
    }

    fn endpoint_lost(&mut self, name: &str) {
        if self.registry.is_attached(name) {
            self.registry.mark_detached(name);
        }
        self.fail_owned_by(&Peer::endpoint(name), RouterFailure::TransportClosed);
    }

    fn fail_owned_by(&mut self, peer: &Peer, failure: RouterFailure) {
        let drained = self.pending.drain_owned_by(peer);
        if drained.is_empty() {
            return;
        }
        warn!(%peer, count = drained.len(), %failure, "Failing pending requests");
        for pending in drained {
            self.resolve(pending, Err(failure.clone()));
        }
    }

    fn run_handler(&mut self, handler: Arc<dyn Handler>, peer: Peer, envelope: Envelope) {
        let Envelope {
            kind,
            correlation_id,
            data,
            ..
        } = envelope;
        let on_host_thread = handler.may_block_host_thread();
        debug!(%peer, %kind, %correlation_id, on_host_thread, "Dispatching request");

        let tx = self.tx.clone();
        let ctx = self.context.clone();
        let job = async move {
            let outcome = match AssertUnwindSafe(handler.handle(data, &ctx)).catch_unwind().await {
                Ok(result) => HandlerOutcome::Completed(result),
                Err(panic) => HandlerOutcome::Panicked(panic_message(panic.as_ref())),
            };
            let _ = tx.send(RouterRequest::HandlerDone {
                peer,
                correlation_id,
                kind,
                outcome,
            });
        }
        .boxed();

        if on_host_thread {
            self.on_host_thread(job);
        } else {
            tokio::spawn(job);
        }
    }

    fn on_host_thread(&self, job: BoxFuture<'static, ()>) {
        if let Err(job) = self.host_exec.spawn(job) {
            warn!("Host execution thread gone, running job on the runtime");
            tokio::spawn(job);
        }
    }

    /// Turn a handler outcome into a response payload, surfacing faults to the user
    fn finish_handler(&mut self, kind: &str, outcome: HandlerOutcome) -> Value {
        match outcome {
            HandlerOutcome::Completed(Ok(data)) => success_payload(data),
            HandlerOutcome::Completed(Err(e)) => {
                let declared = e.is_declared();
                let failure = RouterFailure::Handler {
                    kind: kind.to_string(),
                    message: e.to_string(),
                };
                if declared {
                    debug!(%kind, error = %e, "Handler declined request");
                } else {
                    warn!(%kind, error = %e, "Handler failed");
                    self.metrics.handler_faults += 1;
                    self.show_error(&failure);
                }
                failure.to_payload()
            }
            HandlerOutcome::Panicked(message) => {
                error!(%kind, %message, "Handler panicked");
                self.metrics.handler_faults += 1;
                let failure = RouterFailure::Handler {
                    kind: kind.to_string(),
                    message,
                };
                self.show_error(&failure);
                failure.to_payload()
            }
        }
    }

    fn show_error(&self, failure: &RouterFailure) {
        let ctx = self.context.clone();
        let message = failure.to_string();
        self.on_host_thread(
            async move {
                if let Err(e) = ctx.host().show_notice(NoticeLevel::Error, &message).await {
                    debug!(error = %e, "Failed to show error notice");
                }
            }
            .boxed(),
        );
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
