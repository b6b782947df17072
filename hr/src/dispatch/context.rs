//! HostContext - explicit host state handed to every handler

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::config::{IdeSettings, ListingConfig};
use super::host::{EditorHost, HeadlessHost};

/// Root-level rc files recognized in each workspace
pub const DEFAULT_RC_FILES: &[&str] = &[".continuerc.json", ".dropstonerc.json"];

/// Execution context for handlers
///
/// Carries the workspace roots and the editor capability object, so
/// handlers can be exercised without a running editor.
#[derive(Clone)]
pub struct HostContext {
    workspace_dirs: Vec<PathBuf>,
    host: Arc<dyn EditorHost>,
    listing: ListingConfig,
    ide_settings: IdeSettings,
    telemetry_enabled: bool,
    rc_files: Vec<String>,
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl HostContext {
    /// Create a context with default policy for the given workspace roots
    pub fn new(workspace_dirs: Vec<PathBuf>, host: Arc<dyn EditorHost>) -> Self {
        debug!(?workspace_dirs, "HostContext::new: called");
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            workspace_dirs,
            host,
            listing: ListingConfig::default(),
            ide_settings: IdeSettings::default(),
            telemetry_enabled: true,
            rc_files: DEFAULT_RC_FILES.iter().map(|s| s.to_string()).collect(),
            config_dir: home.join(".continue"),
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("hostrouter"),
        }
    }

    /// Headless context rooted at a single directory
    pub fn headless(root: impl Into<PathBuf>) -> Self {
        Self::new(vec![root.into()], Arc::new(HeadlessHost::new()))
    }

    pub fn with_listing(mut self, listing: ListingConfig) -> Self {
        self.listing = listing;
        self
    }

    pub fn with_ide_settings(mut self, settings: IdeSettings) -> Self {
        self.ide_settings = settings;
        self
    }

    pub fn with_telemetry(mut self, enabled: bool) -> Self {
        self.telemetry_enabled = enabled;
        self
    }

    pub fn with_rc_files(mut self, rc_files: Vec<String>) -> Self {
        self.rc_files = rc_files;
        self
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn workspace_dirs(&self) -> &[PathBuf] {
        &self.workspace_dirs
    }

    /// First workspace root, used for relative paths and git queries
    pub fn primary_workspace(&self) -> Option<&Path> {
        self.workspace_dirs.first().map(PathBuf::as_path)
    }

    pub fn host(&self) -> &dyn EditorHost {
        self.host.as_ref()
    }

    pub fn listing(&self) -> &ListingConfig {
        &self.listing
    }

    pub fn ide_settings(&self) -> &IdeSettings {
        &self.ide_settings
    }

    pub fn telemetry_enabled(&self) -> bool {
        self.telemetry_enabled
    }

    pub fn rc_files(&self) -> &[String] {
        &self.rc_files
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Resolve a path or `file://` URI sent by a peer
    ///
    /// Relative paths are taken against the primary workspace root.
    pub fn resolve_path(&self, raw: &str) -> PathBuf {
        let stripped = raw.strip_prefix("file://").unwrap_or(raw);
        let path = Path::new(stripped);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.primary_workspace() {
            Some(root) => root.join(path),
            None => path.to_path_buf(),
        }
    }
}

impl fmt::Debug for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostContext")
            .field("workspace_dirs", &self.workspace_dirs)
            .field("listing", &self.listing)
            .field("telemetry_enabled", &self.telemetry_enabled)
            .field("config_dir", &self.config_dir)
            .finish()
    }
}
