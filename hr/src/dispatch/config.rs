//! Configuration consumed by the built-in handlers

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Directory names whose whole subtree is skipped by workspace listings
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    ".git",
    ".vscode",
    ".idea",
    ".vs",
    "venv",
    ".venv",
    "env",
    ".env",
    "node_modules",
    "dist",
    "build",
    "target",
    "out",
    "bin",
    ".pytest_cache",
    ".vscode-test",
    ".pearai",
    "__pycache__",
    "site-packages",
    ".gradle",
    ".cache",
    "gems",
];

/// File name suffixes skipped by workspace listings
pub const DEFAULT_IGNORE_FILETYPES: &[&str] = &[
    ".DS_Store",
    "-lock.json",
    ".lock",
    ".log",
    ".ttf",
    ".png",
    ".jpg",
    ".jpeg",
    ".gif",
    ".mp4",
    ".svg",
    ".ico",
    ".pdf",
    ".zip",
    ".gz",
    ".tar",
    ".dmg",
    ".tgz",
    ".rar",
    ".7z",
    ".exe",
    ".dll",
    ".obj",
    ".o",
    ".o.d",
    ".a",
    ".lib",
    ".so",
    ".dylib",
    ".ncb",
    ".sdf",
    ".woff",
    ".woff2",
    ".eot",
    ".cur",
    ".avi",
    ".mpg",
    ".mpeg",
    ".mov",
    ".mp3",
    ".mkv",
    ".webm",
    ".jar",
    ".onnx",
    ".parquet",
    ".pqt",
    ".wav",
    ".webp",
    ".db",
    ".sqlite",
    ".wasm",
    ".plist",
    ".profraw",
    ".gcda",
    ".gcno",
    "go.sum",
];

/// Workspace listing policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Maximum number of entries a listing returns
    #[serde(rename = "max-files")]
    pub max_files: usize,

    /// Directory names pruned in addition to the built-in set
    #[serde(rename = "extra-ignore-dirs")]
    pub extra_ignore_dirs: Vec<String>,

    /// File suffixes skipped in addition to the built-in set
    #[serde(rename = "extra-ignore-extensions")]
    pub extra_ignore_extensions: Vec<String>,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            max_files: 10_000,
            extra_ignore_dirs: Vec::new(),
            extra_ignore_extensions: Vec::new(),
        }
    }
}

impl ListingConfig {
    /// True if a directory with this name is pruned along with its subtree
    pub fn is_ignored_dir(&self, name: &str) -> bool {
        DEFAULT_IGNORE_DIRS.contains(&name) || self.extra_ignore_dirs.iter().any(|d| d == name)
    }

    /// True if a file with this name is skipped
    pub fn is_ignored_file(&self, name: &str) -> bool {
        DEFAULT_IGNORE_FILETYPES.iter().any(|suffix| name.ends_with(suffix))
            || self.extra_ignore_extensions.iter().any(|suffix| name.ends_with(suffix.as_str()))
    }
}

/// Settings reported to panels by the settings query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdeSettings {
    #[serde(rename = "remote-config-server-url")]
    pub remote_config_server_url: Option<String>,

    /// Minutes between remote config syncs
    #[serde(rename = "remote-config-sync-period")]
    pub remote_config_sync_period: u64,

    #[serde(rename = "user-token")]
    pub user_token: String,

    #[serde(rename = "enable-control-server-beta")]
    pub enable_control_server_beta: bool,
}

impl IdeSettings {
    /// Wire form, camelCase as panels expect it
    pub fn to_wire(&self) -> Value {
        json!({
            "remoteConfigServerUrl": self.remote_config_server_url,
            "remoteConfigSyncPeriod": self.remote_config_sync_period,
            "userToken": self.user_token,
            "enableControlServerBeta": self.enable_control_server_beta,
        })
    }
}

/// Telemetry toggle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
