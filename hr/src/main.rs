//! HostRouter - editor host message router
//!
//! CLI entry point for running a host session and its helper commands.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use eyre::{Context, Result};
use tracing::{info, warn};

use hostrouter::cli::{Cli, Command, log_dir};
use hostrouter::config::Config;
use hostrouter::dispatch::builtin::{WalkTarget, walk_workspace};
use hostrouter::dispatch::{DispatchTable, EditorHost, HeadlessHost, HostContext};
use hostrouter::router::Router;
use hostrouter::transport::StdioTransport;
use hostrouter::watcher::{ConfigReloader, ConfigWatcher};
use hostrouter::{CoreBridge, run_echo_engine};

fn setup_logging(level: &str, file_name: &str) -> Result<()> {
    // Create log directory
    let log_dir = log_dir();
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Write to log file, never stdout: stdout carries protocol traffic
    let log_file = fs::File::create(log_dir.join(file_name)).context("Failed to create log file")?;
    let filter = tracing_subscriber::EnvFilter::try_new(level).context(format!("Invalid log level: {}", level))?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();

    info!("Logging initialized (level: {})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging: flag > config > info
    let level = cli
        .log_level
        .clone()
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    let log_file = if matches!(cli.command, Some(Command::EchoEngine)) {
        "echo-engine.log"
    } else {
        "hostrouter.log"
    };
    setup_logging(&level, log_file).context("Failed to setup logging")?;

    // Dispatch command
    match cli.command {
        Some(Command::Serve {
            workspaces,
            panel,
            no_engine,
        }) => cmd_serve(&config, workspaces, &panel, no_engine).await,
        Some(Command::List { dir, folders, max }) => cmd_list(&config, dir, folders, max),
        Some(Command::Config) => cmd_config(&config),
        Some(Command::EchoEngine) => cmd_echo_engine(&config).await,
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Resolve workspace roots, defaulting to the current directory
fn resolve_workspaces(workspaces: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let workspaces = if workspaces.is_empty() {
        vec![std::env::current_dir().context("Failed to get current directory")?]
    } else {
        workspaces
    };
    workspaces
        .into_iter()
        .map(|dir| {
            dir.canonicalize()
                .context(format!("Workspace not found: {}", dir.display()))
        })
        .collect()
}

/// Run a host session over this process's stdio
async fn cmd_serve(config: &Config, workspaces: Vec<PathBuf>, panel: &str, no_engine: bool) -> Result<()> {
    let workspaces = resolve_workspaces(workspaces)?;
    info!(?workspaces, %panel, no_engine, "Starting host session");

    let host: Arc<dyn EditorHost> = Arc::new(HeadlessHost::new());
    let context = HostContext::new(workspaces.clone(), host)
        .with_listing(config.listing.clone())
        .with_ide_settings(config.ide.clone())
        .with_telemetry(config.telemetry.enabled)
        .with_rc_files(config.watcher.rc_files.clone());
    let router = Router::new(config.router.clone(), DispatchTable::standard(), context)
        .context("Failed to create router")?
        .spawn();

    // The panel talks over our own stdin/stdout
    let endpoint = router.register(panel)?;
    let panel_transport = StdioTransport::spawn(tokio::io::stdin(), tokio::io::stdout(), endpoint.inbound_sink());
    endpoint.attach(panel_transport.clone())?;

    let bridge = Arc::new(CoreBridge::new(config.engine.clone(), router.clone()));
    if !no_engine && config.engine.is_configured() {
        bridge.start().await.context("Failed to start engine")?;
    } else {
        info!("Running without core engine");
    }

    let _watcher = if config.watcher.enabled && bridge.is_ready().await {
        let reloader = ConfigReloader::spawn(
            bridge.clone(),
            router.clone(),
            config.watcher.refresh_kind.clone(),
            config.watcher.debounce(),
        );
        match ConfigWatcher::start(&config.watcher, &workspaces, reloader) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!(error = %e, "Config watcher unavailable");
                None
            }
        }
    } else {
        None
    };

    let interrupted = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            info!("Interrupted");
            true
        }
        _ = panel_transport.closed() => {
            info!("Panel input closed");
            false
        }
    };

    if let Ok(metrics) = router.metrics().await {
        info!(
            sent = metrics.messages_sent,
            received = metrics.messages_received,
            timeouts = metrics.request_timeouts,
            faults = metrics.handler_faults,
            "Session metrics"
        );
    }
    bridge.stop().await?;
    router.shutdown()?;

    if interrupted {
        // The blocking stdin reader would otherwise keep the runtime alive
        std::process::exit(0);
    }
    Ok(())
}

/// Print the workspace listing
fn cmd_list(config: &Config, dir: Option<PathBuf>, folders: bool, max: Option<usize>) -> Result<()> {
    let root = match dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    if !root.is_dir() {
        return Err(eyre::eyre!("Not a directory: {}", root.display()));
    }

    let target = if folders { WalkTarget::Folders } else { WalkTarget::Files };
    let limit = max.unwrap_or(config.listing.max_files);
    let entries = walk_workspace(&root, &config.listing, target, limit);
    info!(root = %root.display(), count = entries.len(), "Listed workspace");

    for entry in &entries {
        println!("{}", display_path(&root, entry).display());
    }
    Ok(())
}

fn display_path<'a>(root: &Path, entry: &'a Path) -> &'a Path {
    entry.strip_prefix(root).unwrap_or(entry)
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}

/// Run the echo engine on this process's stdio
async fn cmd_echo_engine(config: &Config) -> Result<()> {
    run_echo_engine(tokio::io::stdin(), tokio::io::stdout(), &config.engine.reload_kind).await
}
