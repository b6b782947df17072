//! Core engine bridge
//!
//! Owns the engine subprocess and plugs its stdio into the router as the
//! engine peer. The bridge never restarts the engine on its own; callers
//! decide when to `restart()`.

mod config;
mod echo;
mod engine;

pub use config::EngineConfig;
pub use echo::run_echo_engine;
pub use engine::CoreBridge;
