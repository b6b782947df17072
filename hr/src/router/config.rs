//! Router configuration

use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Default request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Messages held per detached endpoint before the oldest are dropped
    #[serde(rename = "outbox-capacity", default = "default_outbox_capacity")]
    pub outbox_capacity: usize,

    /// Request kinds relayed from endpoints to the engine (`prefix/` entries match by prefix)
    #[serde(rename = "engine-pass-through", default = "default_engine_pass_through")]
    pub engine_pass_through: Vec<String>,

    /// Engine notification kinds re-broadcast to every attached endpoint
    #[serde(rename = "engine-broadcast", default = "default_engine_broadcast")]
    pub engine_broadcast: Vec<String>,
}

fn default_request_timeout_secs() -> u64 {
    debug!("default_request_timeout_secs: called");
    30
}

fn default_outbox_capacity() -> usize {
    debug!("default_outbox_capacity: called");
    1000
}

fn default_engine_pass_through() -> Vec<String> {
    debug!("default_engine_pass_through: called");
    [
        "config/",
        "llm/",
        "history/",
        "context/",
        "index/",
        "autocomplete/",
        "conversation/",
        "tools/",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_engine_broadcast() -> Vec<String> {
    debug!("default_engine_broadcast: called");
    [
        "configUpdate",
        "configError",
        "indexProgress",
        "refreshSubmenuItems",
        "didChangeAvailableProfiles",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for RouterConfig {
    fn default() -> Self {
        debug!("RouterConfig::default: called");
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            outbox_capacity: default_outbox_capacity(),
            engine_pass_through: default_engine_pass_through(),
            engine_broadcast: default_engine_broadcast(),
        }
    }
}

impl RouterConfig {
    /// Get the default request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reject values the router cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(eyre!("request-timeout-secs must be at least 1"));
        }
        Ok(())
    }

    /// True if an endpoint request of this kind is relayed to the engine
    pub fn forwards_to_engine(&self, kind: &str) -> bool {
        self.engine_pass_through.iter().any(|entry| {
            if entry.ends_with('/') {
                kind.starts_with(entry.as_str())
            } else {
                kind == entry
            }
        })
    }

    /// True if an engine notification of this kind goes to every endpoint
    pub fn broadcasts_from_engine(&self, kind: &str) -> bool {
        self.engine_broadcast.iter().any(|k| k == kind)
    }
}
