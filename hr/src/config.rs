//! HostRouter configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::bridge::EngineConfig;
use crate::dispatch::{IdeSettings, ListingConfig, TelemetryConfig};
use crate::router::RouterConfig;
use crate::watcher::WatcherConfig;

/// Main HostRouter configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Correlation, timeouts and engine relay rules
    pub router: RouterConfig,

    /// Core engine process
    pub engine: EngineConfig,

    /// Configuration file watching
    pub watcher: WatcherConfig,

    /// Workspace listing policy
    pub listing: ListingConfig,

    /// Values returned by the settings query
    pub ide: IdeSettings,

    pub telemetry: TelemetryConfig,

    /// Log level when `--log-level` is not given
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .hostrouter.yml
        let local_config = PathBuf::from(".hostrouter.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/hostrouter/hostrouter.yml
        if let Some(user_config) = user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.router.validate().context("Invalid router section")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Render as YAML for `hr config`
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }
}

/// `<config_dir>/hostrouter/hostrouter.yml`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("hostrouter").join("hostrouter.yml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.router.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.router.outbox_capacity, 1000);
        assert_eq!(config.listing.max_files, 10_000);
        assert!(!config.engine.is_configured());
        assert!(config.watcher.enabled);
        assert!(config.telemetry.enabled);
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
router:
  request-timeout-secs: 5
  outbox-capacity: 10
  engine-pass-through: ["llm/"]

engine:
  command: node
  args: ["engine.js"]
  reload-kind: reloadConfig

watcher:
  debounce-ms: 200
  refresh-kind: refresh

listing:
  max-files: 500
  extra-ignore-dirs: [vendor]

telemetry:
  enabled: false

log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.router.request_timeout_secs, 5);
        assert_eq!(config.router.outbox_capacity, 10);
        assert!(config.router.forwards_to_engine("llm/chat"));
        assert!(!config.router.forwards_to_engine("history/list"));
        assert_eq!(config.engine.command.as_deref(), Some("node"));
        assert_eq!(config.engine.reload_kind, "reloadConfig");
        assert_eq!(config.watcher.debounce_ms, 200);
        assert_eq!(config.watcher.refresh_kind, "refresh");
        assert_eq!(config.listing.max_files, 500);
        assert!(!config.telemetry.enabled);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
engine:
  command: ./engine
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        // Specified value
        assert_eq!(config.engine.command.as_deref(), Some("./engine"));

        // Defaults for unspecified
        assert_eq!(config.engine.reload_kind, "config/reload");
        assert_eq!(config.router.request_timeout_secs, 30);
        assert_eq!(config.watcher.refresh_kind, "configUpdate");
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.yml");
        fs::write(&path, "router:\n  request-timeout-secs: 7\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.router.request_timeout_secs, 7);
    }

    #[test]
    fn test_load_explicit_missing_path_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_rejects_zero_timeout() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("zero.yml");
        fs::write(&path, "router:\n  request-timeout-secs: 0\n").unwrap();

        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    #[serial]
    fn test_load_prefers_project_local_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".hostrouter.yml"), "log-level: trace\n").unwrap();

        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(temp.path()).unwrap();
        let loaded = Config::load(None);
        std::env::set_current_dir(previous).unwrap();

        assert_eq!(loaded.unwrap().log_level.as_deref(), Some("trace"));
    }

    #[test]
    #[serial]
    fn test_broken_local_file_falls_through() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".hostrouter.yml"), "router: [not, a, map").unwrap();

        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(temp.path()).unwrap();
        let loaded = Config::load(None);
        std::env::set_current_dir(previous).unwrap();

        assert!(loaded.is_ok());
    }

    #[test]
    fn test_yaml_output_round_trips() {
        let config = Config::default();
        let yaml = config.to_yaml().unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.router.request_timeout_secs, config.router.request_timeout_secs);
        assert_eq!(parsed.watcher.config_dirs, config.watcher.config_dirs);
    }
}
