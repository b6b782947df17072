//! Filesystem watcher for configuration files

use std::path::PathBuf;

use eyre::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use super::config::WatcherConfig;
use super::reloader::ConfigReloader;

/// Watches workspace roots and their hidden config dirs
///
/// Dropping the watcher stops event delivery.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    watched: Vec<PathBuf>,
}

impl ConfigWatcher {
    pub fn start(config: &WatcherConfig, workspace_dirs: &[PathBuf], reloader: ConfigReloader) -> Result<Self> {
        debug!(roots = workspace_dirs.len(), "ConfigWatcher::start: called");
        let filter = config.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if is_config_change(&event, &filter) {
                    debug!(paths = ?event.paths, kind = ?event.kind, "Configuration file changed");
                    reloader.notify_change();
                }
            }
            Err(e) => warn!(error = %e, "Config watcher error"),
        })
        .context("Failed to create config watcher")?;

        let mut watched = Vec::new();
        for root in workspace_dirs {
            let mut candidates = vec![root.clone()];
            candidates.extend(config.config_dirs.iter().map(|dir| root.join(dir)));

            for path in candidates.into_iter().filter(|p| p.is_dir()) {
                match watcher.watch(&path, RecursiveMode::NonRecursive) {
                    Ok(()) => watched.push(path),
                    Err(e) => warn!(path = %path.display(), error = %e, "Failed to watch directory"),
                }
            }
        }

        info!(watched = watched.len(), "Config watcher started");
        Ok(Self {
            _watcher: watcher,
            watched,
        })
    }

    /// Directories currently watched
    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }
}

fn is_config_change(event: &Event, config: &WatcherConfig) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|p| config.is_config_path(p))
}
