//! Watcher configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::dispatch::DEFAULT_RC_FILES;

/// Which files count as configuration and how changes are propagated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Hidden per-workspace directories holding configuration files
    #[serde(rename = "config-dirs", default = "default_config_dirs")]
    pub config_dirs: Vec<String>,

    /// Configuration filenames recognized inside `config-dirs`
    #[serde(rename = "config-files", default = "default_config_files")]
    pub config_files: Vec<String>,

    /// Root-level rc filenames
    #[serde(rename = "rc-files", default = "default_rc_files")]
    pub rc_files: Vec<String>,

    /// Window in which further changes are folded into one reload
    #[serde(rename = "debounce-ms", default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Notification broadcast to endpoints after a successful reload
    #[serde(rename = "refresh-kind", default = "default_refresh_kind")]
    pub refresh_kind: String,
}

fn default_enabled() -> bool {
    true
}

fn default_config_dirs() -> Vec<String> {
    [".continue", ".pearai", ".dropstone"].iter().map(|s| s.to_string()).collect()
}

fn default_config_files() -> Vec<String> {
    ["config.json", "config.ts"].iter().map(|s| s.to_string()).collect()
}

fn default_rc_files() -> Vec<String> {
    DEFAULT_RC_FILES.iter().map(|s| s.to_string()).collect()
}

fn default_debounce_ms() -> u64 {
    50
}

fn default_refresh_kind() -> String {
    "configUpdate".to_string()
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            config_dirs: default_config_dirs(),
            config_files: default_config_files(),
            rc_files: default_rc_files(),
            debounce_ms: default_debounce_ms(),
            refresh_kind: default_refresh_kind(),
        }
    }
}

impl WatcherConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// True for an rc file, or a config file inside one of the config dirs
    pub fn is_config_path(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if self.rc_files.iter().any(|rc| rc == name) {
            return true;
        }
        if !self.config_files.iter().any(|f| f == name) {
            return false;
        }
        path.parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .is_some_and(|dir| self.config_dirs.iter().any(|d| d == dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WatcherConfig::default();
        assert!(config.enabled);
        assert_eq!(config.debounce(), Duration::from_millis(50));
        assert_eq!(config.refresh_kind, "configUpdate");
        assert!(config.rc_files.contains(&".continuerc.json".to_string()));
    }

    #[test]
    fn test_recognizes_all_filename_variants() {
        let config = WatcherConfig::default();
        assert!(config.is_config_path(Path::new("/ws/.continue/config.json")));
        assert!(config.is_config_path(Path::new("/ws/.continue/config.ts")));
        assert!(config.is_config_path(Path::new("/ws/.pearai/config.json")));
        assert!(config.is_config_path(Path::new("/ws/.dropstone/config.ts")));
        assert!(config.is_config_path(Path::new("/ws/.continuerc.json")));
        assert!(config.is_config_path(Path::new("/ws/.dropstonerc.json")));
    }

    #[test]
    fn test_ignores_unrelated_files() {
        let config = WatcherConfig::default();
        assert!(!config.is_config_path(Path::new("/ws/config.json")));
        assert!(!config.is_config_path(Path::new("/ws/.continue/settings.json")));
        assert!(!config.is_config_path(Path::new("/ws/src/.continue.rs")));
        assert!(!config.is_config_path(Path::new("/")));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: WatcherConfig = serde_yaml::from_str("debounce-ms: 10\nenabled: false").unwrap();
        assert!(!config.enabled);
        assert_eq!(config.debounce_ms, 10);
        assert_eq!(config.config_files, vec!["config.json", "config.ts"]);
    }
}
