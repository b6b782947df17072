//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// HostRouter - message router between editor host, panels and core engine
#[derive(Parser)]
#[command(
    name = "hr",
    about = "Routes messages between an editor host, its panels and a core engine process",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/hostrouter/logs/hostrouter.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level or filter directive (overrides config)
    #[arg(short, long, global = true, help = "Log level (error, warn, info, debug, trace)")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run a host session with this process's stdio as the panel channel
    Serve {
        /// Workspace root (repeatable; defaults to the current directory)
        #[arg(short, long = "workspace", value_name = "DIR")]
        workspaces: Vec<PathBuf>,

        /// Endpoint name for the stdio panel
        #[arg(short, long, default_value = "sidebar")]
        panel: String,

        /// Don't start the core engine
        #[arg(long)]
        no_engine: bool,
    },

    /// Print the workspace listing
    List {
        /// Directory to list (defaults to the current directory)
        #[arg(value_name = "DIR")]
        dir: Option<PathBuf>,

        /// List folders instead of files
        #[arg(long)]
        folders: bool,

        /// Maximum entries (defaults to listing.max-files)
        #[arg(short, long)]
        max: Option<usize>,
    },

    /// Print the effective configuration
    Config,

    /// Internal: minimal engine that echoes request payloads
    #[command(hide = true)]
    EchoEngine,
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    log_dir().join("hostrouter.log")
}

/// Directory holding log files
pub fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hostrouter")
        .join("logs")
}
