//! Engine process configuration

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How to launch the core engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Executable to run; no engine is started when unset
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(rename = "working-dir", default)]
    pub working_dir: Option<PathBuf>,

    /// Extra environment for the engine process
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Request kind sent to the engine when configuration files change
    #[serde(rename = "reload-kind", default = "default_reload_kind")]
    pub reload_kind: String,
}

fn default_reload_kind() -> String {
    "config/reload".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            working_dir: None,
            env: HashMap::new(),
            reload_kind: default_reload_kind(),
        }
    }
}

impl EngineConfig {
    pub fn is_configured(&self) -> bool {
        self.command.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.reload_kind, "config/reload");
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
command: node
args: ["out/engine.js", "--stdio"]
working-dir: /opt/engine
env:
  ENGINE_LOG: debug
"#;
        let config: EngineConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.is_configured());
        assert_eq!(config.args, vec!["out/engine.js", "--stdio"]);
        assert_eq!(config.working_dir, Some(PathBuf::from("/opt/engine")));
        assert_eq!(config.env.get("ENGINE_LOG").map(String::as_str), Some("debug"));
        assert_eq!(config.reload_kind, "config/reload");
    }

    #[test]
    fn test_blank_command_is_not_configured() {
        let config = EngineConfig {
            command: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(!config.is_configured());
    }
}
