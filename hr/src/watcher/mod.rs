//! Configuration change propagation
//!
//! `ConfigWatcher` turns filesystem events on recognized configuration
//! files into change signals; `ConfigReloader` coalesces them into at most
//! one in-flight reload and broadcasts the result to attached endpoints.

mod config;
mod config_watcher;
mod reloader;

pub use config::WatcherConfig;
pub use config_watcher::ConfigWatcher;
pub use reloader::{ConfigReloader, ReloadTarget};
