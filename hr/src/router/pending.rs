//! Pending-request table

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use super::messages::RequestOutcome;
use crate::transport::Peer;

/// Where a request's outcome goes
pub(crate) enum Resolver {
    /// A local caller awaiting a `PendingReply`
    Caller(oneshot::Sender<RequestOutcome>),
    /// An endpoint request relayed to the engine; answer it under its own id
    Relay { endpoint: String, correlation_id: String },
}

pub(crate) struct PendingRequest {
    pub correlation_id: String,
    pub kind: String,
    /// Peer expected to answer
    pub owner: Peer,
    pub created_at: Instant,
    pub timeout: Duration,
    pub resolver: Resolver,
}

/// Outstanding requests keyed by correlation id
///
/// Entries leave only through `remove*`/`drain*`, and each removed entry
/// is resolved by the router exactly once.
#[derive(Default)]
pub(crate) struct PendingTable {
    entries: HashMap<String, PendingRequest>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entry; an id already outstanding is handed back
    pub fn insert(&mut self, request: PendingRequest) -> Result<(), PendingRequest> {
        if self.entries.contains_key(&request.correlation_id) {
            return Err(request);
        }
        self.entries.insert(request.correlation_id.clone(), request);
        Ok(())
    }

    pub fn contains(&self, correlation_id: &str) -> bool {
        self.entries.contains_key(correlation_id)
    }

    pub fn remove(&mut self, correlation_id: &str) -> Option<PendingRequest> {
        self.entries.remove(correlation_id)
    }

    /// Remove an entry only if `peer` is the one expected to answer it
    pub fn remove_answered_by(&mut self, correlation_id: &str, peer: &Peer) -> Option<PendingRequest> {
        match self.entries.get(correlation_id) {
            Some(entry) if &entry.owner == peer => self.entries.remove(correlation_id),
            _ => None,
        }
    }

    /// Remove an entry whose timeout has elapsed
    pub fn remove_expired(&mut self, correlation_id: &str) -> Option<PendingRequest> {
        match self.entries.get(correlation_id) {
            Some(entry) if entry.created_at.elapsed() >= entry.timeout => self.entries.remove(correlation_id),
            _ => None,
        }
    }

    /// Remove every entry owned by `peer`
    pub fn drain_owned_by(&mut self, peer: &Peer) -> Vec<PendingRequest> {
        let ids: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| &entry.owner == peer)
            .map(|(id, _)| id.clone())
            .collect();
        ids.iter().filter_map(|id| self.entries.remove(id)).collect()
    }

    pub fn drain_all(&mut self) -> Vec<PendingRequest> {
        self.entries.drain().map(|(_, entry)| entry).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, owner: Peer) -> (PendingRequest, oneshot::Receiver<RequestOutcome>) {
        let (tx, rx) = oneshot::channel();
        (
            PendingRequest {
                correlation_id: id.to_string(),
                kind: "test".to_string(),
                owner,
                created_at: Instant::now(),
                timeout: Duration::from_secs(1),
                resolver: Resolver::Caller(tx),
            },
            rx,
        )
    }

    #[test]
    fn test_insert_rejects_duplicate_id() {
        let mut table = PendingTable::new();
        let (a, _rx_a) = entry("1", Peer::Engine);
        let (b, _rx_b) = entry("1", Peer::Engine);

        assert!(table.insert(a).is_ok());
        assert!(table.insert(b).is_err());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_remove_answered_by_checks_owner() {
        let mut table = PendingTable::new();
        let (a, _rx) = entry("1", Peer::endpoint("sidebar"));
        table.insert(a).ok();

        assert!(table.remove_answered_by("1", &Peer::Engine).is_none());
        assert!(table.contains("1"));
        assert!(table.remove_answered_by("1", &Peer::endpoint("sidebar")).is_some());
        assert!(table.remove("1").is_none());
    }

    #[test]
    fn test_remove_expired_ignores_fresh_entries() {
        let mut table = PendingTable::new();
        let (mut fresh, _rx1) = entry("fresh", Peer::Engine);
        fresh.timeout = Duration::from_secs(60);
        let (mut stale, _rx2) = entry("stale", Peer::Engine);
        stale.timeout = Duration::ZERO;
        table.insert(fresh).ok();
        table.insert(stale).ok();

        assert!(table.remove_expired("fresh").is_none());
        assert!(table.remove_expired("stale").is_some());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_drain_owned_by() {
        let mut table = PendingTable::new();
        let mut receivers = Vec::new();
        for (id, owner) in [("1", Peer::Engine), ("2", Peer::endpoint("sidebar")), ("3", Peer::Engine)] {
            let (e, rx) = entry(id, owner);
            table.insert(e).ok();
            receivers.push(rx);
        }

        let drained = table.drain_owned_by(&Peer::Engine);
        assert_eq!(drained.len(), 2);
        assert_eq!(table.len(), 1);
        assert_eq!(table.drain_all().len(), 1);
        assert_eq!(table.len(), 0);
    }
}
