//! Endpoint registry
//!
//! Named presentation endpoints with a FIFO outbox that holds messages while
//! the endpoint is detached. Owned by the router task, so it needs no locking.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::protocol::Envelope;
use crate::transport::{Transport, TransportError, TransportId};

struct Endpoint {
    transport: Option<Arc<dyn Transport>>,
    outbox: VecDeque<Envelope>,
    attached: bool,
}

impl Endpoint {
    fn new() -> Self {
        Self {
            transport: None,
            outbox: VecDeque::new(),
            attached: false,
        }
    }

    /// Stop delivery; the transport stays so its inbound traffic is still current
    fn detach(&mut self) {
        self.attached = false;
    }

    /// Send queued messages in order; stops at the first failure, keeping it queued
    fn flush(&mut self) -> Result<usize, TransportError> {
        let Some(transport) = self.transport.clone() else {
            return Ok(0);
        };
        let mut flushed = 0;
        while let Some(envelope) = self.outbox.pop_front() {
            if let Err(e) = transport.send(&envelope) {
                self.outbox.push_front(envelope);
                return Err(e);
            }
            flushed += 1;
        }
        Ok(flushed)
    }
}

/// Outcome of an addressed send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to a live transport
    Sent,
    /// Held in the outbox until the endpoint attaches
    Queued,
    /// No endpoint with that name; nothing happened
    Unknown,
    /// The transport refused the message; the endpoint is now detached
    Failed,
}

pub struct EndpointRegistry {
    endpoints: HashMap<String, Endpoint>,
    outbox_capacity: usize,
}

impl EndpointRegistry {
    pub fn new(outbox_capacity: usize) -> Self {
        Self {
            endpoints: HashMap::new(),
            outbox_capacity: outbox_capacity.max(1),
        }
    }

    /// Create an endpoint; returns false if it already existed
    pub fn register(&mut self, name: &str) -> bool {
        if self.endpoints.contains_key(name) {
            debug!(endpoint = %name, "EndpointRegistry::register: already registered");
            return false;
        }
        info!(endpoint = %name, "Registered endpoint");
        self.endpoints.insert(name.to_string(), Endpoint::new());
        true
    }

    /// Destroy an endpoint and discard its outbox
    pub fn deregister(&mut self, name: &str) -> bool {
        match self.endpoints.remove(name) {
            Some(endpoint) => {
                info!(endpoint = %name, dropped = endpoint.outbox.len(), "Deregistered endpoint");
                true
            }
            None => {
                warn!(endpoint = %name, "Deregister of unknown endpoint");
                false
            }
        }
    }

    /// Attach a transport (replacing any previous one) and flush the outbox
    ///
    /// Unknown names are registered first. On a flush failure the endpoint
    /// is left detached with the unsent messages still queued.
    pub fn mark_attached(&mut self, name: &str, transport: Arc<dyn Transport>) -> Result<usize, TransportError> {
        self.register(name);
        let Some(endpoint) = self.endpoints.get_mut(name) else {
            return Ok(0);
        };

        debug!(
            endpoint = %name,
            transport_id = %transport.id(),
            queued = endpoint.outbox.len(),
            "EndpointRegistry::mark_attached: called"
        );
        endpoint.transport = Some(transport);
        endpoint.attached = true;

        match endpoint.flush() {
            Ok(flushed) => {
                if flushed > 0 {
                    debug!(endpoint = %name, flushed, "Flushed outbox");
                }
                Ok(flushed)
            }
            Err(e) => {
                warn!(endpoint = %name, error = %e, "Outbox flush failed, detaching");
                endpoint.detach();
                Err(e)
            }
        }
    }

    pub fn mark_detached(&mut self, name: &str) -> bool {
        match self.endpoints.get_mut(name) {
            Some(endpoint) => {
                debug!(endpoint = %name, "EndpointRegistry::mark_detached: called");
                endpoint.detach();
                true
            }
            None => {
                warn!(endpoint = %name, "Detach of unknown endpoint");
                false
            }
        }
    }

    /// Addressed send; a no-op with a warning for unknown names
    pub fn send(&mut self, name: &str, envelope: Envelope) -> Delivery {
        let capacity = self.outbox_capacity;
        let Some(endpoint) = self.endpoints.get_mut(name) else {
            warn!(endpoint = %name, kind = %envelope.kind, "Send to unknown endpoint ignored");
            return Delivery::Unknown;
        };

        if !endpoint.attached || !endpoint.outbox.is_empty() {
            if endpoint.outbox.len() >= capacity {
                let dropped = endpoint.outbox.pop_front();
                warn!(
                    endpoint = %name,
                    capacity,
                    dropped_kind = ?dropped.map(|e| e.kind),
                    "Outbox full, dropping oldest message"
                );
            }
            endpoint.outbox.push_back(envelope);
            if !endpoint.attached {
                return Delivery::Queued;
            }
            return match endpoint.flush() {
                Ok(_) => Delivery::Sent,
                Err(_) => {
                    endpoint.detach();
                    Delivery::Failed
                }
            };
        }

        let Some(transport) = endpoint.transport.as_ref() else {
            endpoint.outbox.push_back(envelope);
            return Delivery::Queued;
        };
        match transport.send(&envelope) {
            Ok(()) => Delivery::Sent,
            Err(e) => {
                warn!(endpoint = %name, error = %e, "Send failed, detaching endpoint");
                endpoint.outbox.push_back(envelope);
                endpoint.detach();
                Delivery::Failed
            }
        }
    }

    /// Send to every attached endpoint; returns names whose transport failed
    pub fn broadcast(&mut self, envelope: &Envelope) -> Vec<String> {
        let attached: Vec<String> = self
            .endpoints
            .iter()
            .filter(|(_, e)| e.attached)
            .map(|(name, _)| name.clone())
            .collect();

        let mut failed = Vec::new();
        for name in attached {
            if self.send(&name, envelope.clone()) == Delivery::Failed {
                failed.push(name);
            }
        }
        failed
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.endpoints.contains_key(name)
    }

    pub fn is_attached(&self, name: &str) -> bool {
        self.endpoints.get(name).is_some_and(|e| e.attached)
    }

    /// Id of the transport most recently attached, kept while detached
    pub fn transport_id(&self, name: &str) -> Option<TransportId> {
        self.endpoints
            .get(name)
            .and_then(|e| e.transport.as_ref())
            .map(|t| t.id())
    }

    pub fn outbox_len(&self, name: &str) -> usize {
        self.endpoints.get(name).map_or(0, |e| e.outbox.len())
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn attached_count(&self) -> usize {
        self.endpoints.values().filter(|e| e.attached).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct RecordingTransport {
        id: TransportId,
        sent: Mutex<Vec<Envelope>>,
        alive: AtomicBool,
    }

    impl RecordingTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: TransportId::next(),
                sent: Mutex::new(Vec::new()),
                alive: AtomicBool::new(true),
            })
        }

        fn kill(&self) {
            self.alive.store(false, Ordering::SeqCst);
        }

        fn sent_data(&self) -> Vec<serde_json::Value> {
            self.sent.lock().unwrap().iter().map(|e| e.data.clone()).collect()
        }
    }

    impl Transport for RecordingTransport {
        fn id(&self) -> TransportId {
            self.id
        }

        fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
            if !self.is_alive() {
                return Err(TransportError::Closed);
            }
            self.sent.lock().unwrap().push(envelope.clone());
            Ok(())
        }

        fn is_alive(&self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }
    }

    fn msg(n: i64) -> Envelope {
        Envelope::notification("update", json!(n))
    }

    #[test]
    fn test_send_to_unknown_endpoint_is_noop() {
        let mut registry = EndpointRegistry::new(10);
        assert_eq!(registry.send("ghost", msg(1)), Delivery::Unknown);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_detached_sends_flush_in_order() {
        let mut registry = EndpointRegistry::new(10);
        registry.register("sidebar");
        assert_eq!(registry.send("sidebar", msg(1)), Delivery::Queued);
        assert_eq!(registry.send("sidebar", msg(2)), Delivery::Queued);
        assert_eq!(registry.outbox_len("sidebar"), 2);

        let transport = RecordingTransport::new();
        assert_eq!(registry.mark_attached("sidebar", transport.clone()).unwrap(), 2);
        assert_eq!(registry.send("sidebar", msg(3)), Delivery::Sent);

        assert_eq!(transport.sent_data(), vec![json!(1), json!(2), json!(3)]);
        assert_eq!(registry.outbox_len("sidebar"), 0);
    }

    #[test]
    fn test_broadcast_reaches_only_attached() {
        let mut registry = EndpointRegistry::new(10);
        let sidebar = RecordingTransport::new();
        registry.mark_attached("sidebar", sidebar.clone()).unwrap();
        registry.register("overlay");

        let failed = registry.broadcast(&msg(7));
        assert!(failed.is_empty());
        assert_eq!(sidebar.sent_data(), vec![json!(7)]);
        assert_eq!(registry.outbox_len("overlay"), 0);
    }

    #[test]
    fn test_failed_send_detaches_and_keeps_message() {
        let mut registry = EndpointRegistry::new(10);
        let transport = RecordingTransport::new();
        registry.mark_attached("sidebar", transport.clone()).unwrap();
        transport.kill();

        assert_eq!(registry.send("sidebar", msg(1)), Delivery::Failed);
        assert!(!registry.is_attached("sidebar"));
        assert_eq!(registry.outbox_len("sidebar"), 1);

        // A fresh transport receives the kept message
        let replacement = RecordingTransport::new();
        registry.mark_attached("sidebar", replacement.clone()).unwrap();
        assert_eq!(replacement.sent_data(), vec![json!(1)]);
    }

    #[test]
    fn test_outbox_drops_oldest_when_full() {
        let mut registry = EndpointRegistry::new(2);
        registry.register("overlay");
        for n in 1..=3 {
            registry.send("overlay", msg(n));
        }

        let transport = RecordingTransport::new();
        registry.mark_attached("overlay", transport.clone()).unwrap();
        assert_eq!(transport.sent_data(), vec![json!(2), json!(3)]);
    }

    #[test]
    fn test_reattach_replaces_transport() {
        let mut registry = EndpointRegistry::new(10);
        let first = RecordingTransport::new();
        let second = RecordingTransport::new();

        registry.mark_attached("sidebar", first.clone()).unwrap();
        registry.mark_attached("sidebar", second.clone()).unwrap();
        assert_eq!(registry.transport_id("sidebar"), Some(second.id()));

        registry.send("sidebar", msg(1));
        assert!(first.sent_data().is_empty());
        assert_eq!(second.sent_data(), vec![json!(1)]);
    }

    #[test]
    fn test_detach_keeps_transport_identity() {
        let mut registry = EndpointRegistry::new(10);
        let transport = RecordingTransport::new();
        registry.mark_attached("sidebar", transport.clone()).unwrap();

        assert!(registry.mark_detached("sidebar"));
        assert!(!registry.is_attached("sidebar"));
        assert_eq!(registry.transport_id("sidebar"), Some(transport.id()));

        // Hidden panels get nothing until reattached
        assert_eq!(registry.send("sidebar", msg(1)), Delivery::Queued);
        assert!(transport.sent_data().is_empty());
    }

    #[test]
    fn test_deregister_discards_outbox() {
        let mut registry = EndpointRegistry::new(10);
        registry.register("overlay");
        registry.send("overlay", msg(1));
        assert!(registry.deregister("overlay"));
        assert!(!registry.deregister("overlay"));
        assert_eq!(registry.send("overlay", msg(2)), Delivery::Unknown);
    }

    proptest! {
        #[test]
        fn prop_detached_sends_arrive_fifo(count in 1usize..200, detach_at in 0usize..200) {
            let mut registry = EndpointRegistry::new(1000);
            let transport = RecordingTransport::new();
            registry.register("sidebar");

            for n in 0..count {
                if n == detach_at {
                    registry.mark_attached("sidebar", transport.clone()).unwrap();
                    registry.mark_detached("sidebar");
                }
                registry.send("sidebar", msg(n as i64));
            }
            registry.mark_attached("sidebar", transport.clone()).unwrap();

            let expected: Vec<_> = (0..count).map(|n| json!(n)).collect();
            prop_assert_eq!(transport.sent_data(), expected);
        }
    }
}
