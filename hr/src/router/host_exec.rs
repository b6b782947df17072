//! Dedicated execution context for handlers that touch editor state

use std::thread;

use eyre::{Context, Result};
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Runs jobs one at a time, in submission order, on a dedicated thread
///
/// The thread drives its own single-threaded runtime, so jobs may await
/// I/O without touching the router's runtime.
#[derive(Clone)]
pub struct HostExecutor {
    tx: mpsc::UnboundedSender<BoxFuture<'static, ()>>,
}

impl HostExecutor {
    pub fn start() -> Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<BoxFuture<'static, ()>>();

        thread::Builder::new()
            .name("host-exec".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!(error = %e, "Failed to build host execution runtime");
                        return;
                    }
                };
                runtime.block_on(async move {
                    while let Some(job) = rx.recv().await {
                        job.await;
                    }
                });
                debug!("host-exec: all senders dropped, exiting");
            })
            .context("Failed to spawn host execution thread")?;

        Ok(Self { tx })
    }

    /// Queue a job; hands it back if the host thread is gone
    pub fn spawn(&self, job: BoxFuture<'static, ()>) -> Result<(), BoxFuture<'static, ()>> {
        self.tx.send(job).map_err(|e| e.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_jobs_run_in_order_on_host_thread() {
        let executor = HostExecutor::start().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        for n in 0..5u64 {
            let log = log.clone();
            executor
                .spawn(
                    async move {
                        // Later jobs are quicker; serialization keeps the order
                        tokio::time::sleep(Duration::from_millis(10 * (5 - n))).await;
                        let name = thread::current().name().map(str::to_string);
                        log.lock().unwrap().push((n, name));
                    }
                    .boxed(),
                )
                .ok()
                .unwrap();
        }

        let (done_tx, done_rx) = oneshot::channel();
        executor
            .spawn(
                async move {
                    let _ = done_tx.send(());
                }
                .boxed(),
            )
            .ok()
            .unwrap();
        done_rx.await.unwrap();

        let log = log.lock().unwrap();
        let order: Vec<u64> = log.iter().map(|(n, _)| *n).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
        assert!(log.iter().all(|(_, name)| name.as_deref() == Some("host-exec")));
    }
}
