//! In-process transport to an embedded panel

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use super::{InboundSink, Transport, TransportError, TransportId};
use crate::protocol::{Envelope, new_correlation_id};

/// Router side of an in-process panel channel
///
/// Envelopes are passed as values, not bytes. The transport dies when the
/// panel drops its `PanelPort`.
pub struct ChannelTransport {
    id: TransportId,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl ChannelTransport {
    /// Create a connected transport/port pair
    ///
    /// Must be called inside a Tokio runtime: a watcher task reports the
    /// port being dropped as transport death.
    pub fn pair(sink: InboundSink) -> (Arc<Self>, PanelPort) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = sink.transport_id();

        let watch_tx = tx.clone();
        let watch_sink = sink.clone();
        tokio::spawn(async move {
            watch_tx.closed().await;
            debug!(transport_id = %watch_sink.transport_id(), peer = %watch_sink.peer(), "Panel port dropped");
            watch_sink.closed();
        });

        (Arc::new(Self { id, tx }), PanelPort { rx, sink })
    }
}

impl Transport for ChannelTransport {
    fn id(&self) -> TransportId {
        self.id
    }

    fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        self.tx.send(envelope.clone()).map_err(|_| TransportError::Closed)
    }

    fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Panel side of an in-process channel
#[derive(Debug)]
pub struct PanelPort {
    rx: mpsc::UnboundedReceiver<Envelope>,
    sink: InboundSink,
}

impl PanelPort {
    /// Next envelope routed to this panel
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }

    /// Post a raw message to the router
    pub fn post(&self, raw: Value) -> bool {
        self.sink.deliver(raw)
    }

    /// Post a request and return its correlation id
    pub fn request(&self, kind: &str, data: Value) -> String {
        let id = new_correlation_id();
        self.post_envelope(&Envelope::request(kind, id.clone(), data));
        id
    }

    pub fn notify(&self, kind: &str, data: Value) {
        self.post_envelope(&Envelope::notification(kind, data));
    }

    /// Answer a request routed to this panel
    pub fn respond(&self, to: &Envelope, data: Value) {
        self.post_envelope(&Envelope::response(to.kind.clone(), to.correlation_id.clone(), data));
    }

    fn post_envelope(&self, envelope: &Envelope) {
        match serde_json::to_value(envelope) {
            Ok(raw) => {
                self.post(raw);
            }
            Err(e) => debug!(error = %e, "PanelPort: failed to encode envelope"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::RouterRequest;
    use crate::transport::Peer;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_send_reaches_port_in_order() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let (transport, mut port) = ChannelTransport::pair(InboundSink::new(Peer::endpoint("sidebar"), tx));

        for i in 0..3 {
            transport.send(&Envelope::notification("tick", json!(i))).unwrap();
        }
        for i in 0..3 {
            assert_eq!(port.recv().await.unwrap().data, json!(i));
        }
        assert!(transport.is_alive());
    }

    #[tokio::test]
    async fn test_dropping_port_kills_transport() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = InboundSink::new(Peer::endpoint("overlay"), tx);
        let expected_id = sink.transport_id();
        let (transport, port) = ChannelTransport::pair(sink);

        drop(port);
        assert!(!transport.is_alive());
        assert!(matches!(
            transport.send(&Envelope::notification("x", Value::Null)),
            Err(TransportError::Closed)
        ));

        let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        match closed {
            RouterRequest::TransportClosed { transport_id, .. } => assert_eq!(transport_id, expected_id),
            _ => panic!("expected TransportClosed"),
        }
    }

    #[tokio::test]
    async fn test_port_request_posts_envelope() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_transport, port) = ChannelTransport::pair(InboundSink::new(Peer::endpoint("sidebar"), tx));

        let id = port.request("readFile", json!({"filepath": "/a.txt"}));
        match rx.recv().await.unwrap() {
            RouterRequest::Inbound { raw, .. } => {
                assert_eq!(raw["messageId"], id);
                assert_eq!(raw["messageType"], "readFile");
                assert_eq!(raw["direction"], "request");
            }
            _ => panic!("expected inbound"),
        }
    }
}
