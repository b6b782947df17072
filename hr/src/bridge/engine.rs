//! Engine subprocess lifecycle

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eyre::{Context, Result, eyre};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::config::EngineConfig;
use crate::dispatch::Handler;
use crate::router::{RequestOutcome, RouterHandle};
use crate::transport::{Peer, StdioTransport, Transport};
use crate::watcher::ReloadTarget;

struct EngineProcess {
    child: Child,
    transport: Arc<StdioTransport>,
}

/// Bridge to the core engine process
///
/// Requests issued while no engine channel is live fail immediately with
/// "bridge not ready". When the process exits, every request it owned
/// fails with a transport failure.
pub struct CoreBridge {
    config: EngineConfig,
    router: RouterHandle,
    process: Mutex<Option<EngineProcess>>,
}

impl CoreBridge {
    pub fn new(config: EngineConfig, router: RouterHandle) -> Self {
        Self {
            config,
            router,
            process: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Spawn the engine and attach it to the router; a live engine is left alone
    pub async fn start(&self) -> Result<()> {
        debug!("CoreBridge::start: called");
        let mut slot = self.process.lock().await;
        if let Some(process) = slot.as_ref()
            && process.transport.is_alive()
        {
            debug!("CoreBridge::start: engine already running");
            return Ok(());
        }

        let process = self.spawn_process()?;
        self.router.attach_engine(process.transport.clone())?;
        *slot = Some(process);
        Ok(())
    }

    /// Detach and kill the engine, failing its pending requests
    pub async fn stop(&self) -> Result<()> {
        debug!("CoreBridge::stop: called");
        let mut slot = self.process.lock().await;
        let Some(mut process) = slot.take() else {
            return Ok(());
        };

        self.router.detach_engine()?;
        if let Err(e) = process.child.kill().await {
            warn!(error = %e, "Failed to kill engine process");
        }
        info!(transport_id = %process.transport.id(), "Engine stopped");
        Ok(())
    }

    pub async fn restart(&self) -> Result<()> {
        info!("Restarting engine");
        self.stop().await?;
        self.start().await
    }

    pub async fn is_ready(&self) -> bool {
        self.process
            .lock()
            .await
            .as_ref()
            .is_some_and(|process| process.transport.is_alive())
    }

    /// Request to the engine; `timeout` overrides the router default
    pub async fn request(&self, kind: &str, payload: Value, timeout: Option<Duration>) -> RequestOutcome {
        self.router.send_request(Peer::Engine, kind, payload, timeout).wait().await
    }

    pub fn notify(&self, kind: &str, payload: Value) -> Result<()> {
        self.router.notify(Peer::Engine, kind, payload)
    }

    /// Serve engine-originated requests of `handler.kind()`
    pub fn on_spontaneous(&self, handler: Arc<dyn Handler>) -> Result<()> {
        self.router.on_engine_request(handler)
    }

    fn spawn_process(&self) -> Result<EngineProcess> {
        let command = self
            .config
            .command
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| eyre!("No engine command configured"))?;

        let mut cmd = Command::new(command);
        cmd.args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .context(format!("Failed to spawn engine: {}", command))?;
        let stdin = child.stdin.take().ok_or_else(|| eyre!("Engine stdin not captured"))?;
        let stdout = child.stdout.take().ok_or_else(|| eyre!("Engine stdout not captured"))?;
        let pid = child.id();

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr, pid));
        }

        let transport = StdioTransport::spawn(stdout, stdin, self.router.inbound_sink(Peer::Engine));
        info!(?pid, %command, transport_id = %transport.id(), "Engine started");

        Ok(EngineProcess { child, transport })
    }
}

#[async_trait]
impl ReloadTarget for CoreBridge {
    async fn reload(&self) -> RequestOutcome {
        debug!(kind = %self.config.reload_kind, "CoreBridge::reload: called");
        self.request(&self.config.reload_kind, Value::Null, None).await
    }
}

async fn forward_stderr(stderr: ChildStderr, pid: Option<u32>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(?pid, %line, "engine stderr");
    }
}
