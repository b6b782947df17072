//! Reload coalescing

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::router::{RequestOutcome, RouterHandle};

/// Something that can reload configuration, normally the engine bridge
#[async_trait]
pub trait ReloadTarget: Send + Sync {
    async fn reload(&self) -> RequestOutcome;
}

/// Folds bursts of change signals into single reloads
///
/// At most one reload is in flight. Changes inside the debounce window are
/// absorbed; changes while a reload runs set one deferred follow-up.
#[derive(Clone)]
pub struct ConfigReloader {
    tx: mpsc::UnboundedSender<()>,
}

impl ConfigReloader {
    /// Start the coalescing task
    pub fn spawn(target: Arc<dyn ReloadTarget>, router: RouterHandle, refresh_kind: String, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx, target, router, refresh_kind, debounce));
        Self { tx }
    }

    /// Signal a configuration change; false once the task is gone
    pub fn notify_change(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<()>,
    target: Arc<dyn ReloadTarget>,
    router: RouterHandle,
    refresh_kind: String,
    debounce: Duration,
) {
    info!(debounce_ms = debounce.as_millis() as u64, "ConfigReloader started");
    let mut open = true;

    while open && rx.recv().await.is_some() {
        loop {
            tokio::time::sleep(debounce).await;
            let absorbed = drain(&mut rx);
            debug!(absorbed, "Reloading configuration");

            let mut deferred = false;
            let mut reload = target.reload();
            let outcome = loop {
                tokio::select! {
                    outcome = &mut reload => break outcome,
                    change = rx.recv(), if open => match change {
                        Some(()) => deferred = true,
                        None => open = false,
                    },
                }
            };

            match outcome {
                Ok(result) => {
                    info!(%refresh_kind, "Configuration reloaded");
                    if let Err(e) = router.broadcast(&refresh_kind, result) {
                        warn!(error = %e, "Failed to broadcast refresh");
                        return;
                    }
                }
                Err(failure) => warn!(%failure, "Configuration reload failed"),
            }

            if !deferred {
                break;
            }
            debug!("Running deferred reload");
        }
    }

    debug!("ConfigReloader stopped");
}

/// Consume queued change signals; returns how many
fn drain(rx: &mut mpsc::UnboundedReceiver<()>) -> usize {
    let mut count = 0;
    while rx.try_recv().is_ok() {
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DispatchTable, HostContext};
    use crate::protocol::RouterFailure;
    use crate::router::{Router, RouterConfig};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingTarget {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CountingTarget {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReloadTarget for CountingTarget {
        async fn reload(&self) -> RequestOutcome {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            Ok(json!({"reloaded": true, "count": n}))
        }
    }

    struct FailingTarget;

    #[async_trait]
    impl ReloadTarget for FailingTarget {
        async fn reload(&self) -> RequestOutcome {
            Err(RouterFailure::BridgeNotReady)
        }
    }

    fn router(temp: &TempDir) -> RouterHandle {
        Router::new(
            RouterConfig::default(),
            DispatchTable::standard(),
            HostContext::headless(temp.path()),
        )
        .unwrap()
        .spawn()
    }

    #[tokio::test]
    async fn test_rapid_changes_trigger_one_reload() {
        let temp = TempDir::new().unwrap();
        let target = CountingTarget::new(Duration::from_millis(10));
        let reloader = ConfigReloader::spawn(
            target.clone(),
            router(&temp),
            "configUpdate".to_string(),
            Duration::from_millis(50),
        );

        for _ in 0..3 {
            assert!(reloader.notify_change());
        }
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(target.calls(), 1);
    }

    #[tokio::test]
    async fn test_change_during_reload_is_deferred_once() {
        let temp = TempDir::new().unwrap();
        let target = CountingTarget::new(Duration::from_millis(300));
        let reloader = ConfigReloader::spawn(
            target.clone(),
            router(&temp),
            "configUpdate".to_string(),
            Duration::from_millis(20),
        );

        reloader.notify_change();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(target.calls(), 1);

        // Reload in flight: several changes collapse into one follow-up
        for _ in 0..4 {
            reloader.notify_change();
        }
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(target.calls(), 2);
    }

    #[tokio::test]
    async fn test_successful_reload_broadcasts_refresh() {
        let temp = TempDir::new().unwrap();
        let router = router(&temp);
        let mut port = router.register("sidebar").unwrap().connect_channel().unwrap();
        let target = CountingTarget::new(Duration::ZERO);
        let reloader = ConfigReloader::spawn(target, router, "configUpdate".to_string(), Duration::from_millis(10));

        reloader.notify_change();
        let message = tokio::time::timeout(Duration::from_secs(5), port.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.kind, "configUpdate");
        assert_eq!(message.data["reloaded"], true);
    }

    #[tokio::test]
    async fn test_failed_reload_does_not_broadcast() {
        let temp = TempDir::new().unwrap();
        let router = router(&temp);
        let mut port = router.register("sidebar").unwrap().connect_channel().unwrap();
        let reloader = ConfigReloader::spawn(
            Arc::new(FailingTarget),
            router.clone(),
            "configUpdate".to_string(),
            Duration::from_millis(10),
        );

        reloader.notify_change();
        tokio::time::sleep(Duration::from_millis(200)).await;
        router.metrics().await.unwrap();
        assert!(port.try_recv().is_none());
    }
}
