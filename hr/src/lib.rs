//! HostRouter - message routing for an editor-integration host
//!
//! A host session connects three kinds of peers: named presentation
//! endpoints (panels), a single core engine subprocess, and the host's own
//! capability handlers. Every message is an envelope carrying a kind and a
//! correlation id; the router pairs responses with requests, dispatches
//! inbound requests to handlers, and keeps per-endpoint FIFO outboxes for
//! panels that are not attached yet.
//!
//! # Modules
//!
//! - [`protocol`] - Wire envelope and response/failure payloads
//! - [`transport`] - In-process and line-delimited stdio transports
//! - [`router`] - The router actor and its handles
//! - [`dispatch`] - Handler trait, host context and built-in capabilities
//! - [`bridge`] - Core engine subprocess lifecycle
//! - [`watcher`] - Configuration file watching and reload coalescing
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod bridge;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod protocol;
pub mod router;
pub mod transport;
pub mod watcher;

// Re-export commonly used types
pub use bridge::{CoreBridge, EngineConfig, run_echo_engine};
pub use config::Config;
pub use dispatch::{DispatchTable, EditorHost, Handler, HandlerError, HeadlessHost, HostContext};
pub use protocol::{Direction, Envelope, RouterFailure};
pub use router::{EndpointHandle, PendingReply, Router, RouterConfig, RouterHandle, RouterMetrics};
pub use transport::{ChannelTransport, PanelPort, Peer, StdioTransport, Transport};
pub use watcher::{ConfigReloader, ConfigWatcher, ReloadTarget, WatcherConfig};
