// ABOUTME: CLI entry point for folder-replicator
// ABOUTME: Parses arguments, sets up logging and signals, then runs the mirror loop

use anyhow::Context;
use clap::Parser;
use folder_replicator::config::{CliOverrides, FileConfig, MirrorConfig};
use folder_replicator::daemon;
use folder_replicator::mirror::{ChangeLogger, Reconciler, SyncScheduler};
use std::future::Future;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "folder-replicator")]
#[command(about = "Keep a replica folder in sync with a source folder", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the source folder
    source: Option<PathBuf>,
    /// Path to the replica folder
    replica: Option<PathBuf>,
    /// Sync interval in seconds
    sync_interval: Option<u64>,
    /// Path to the change log file
    log: Option<PathBuf>,
    /// TOML config file providing any of the positional values and options
    #[arg(long)]
    config: Option<PathBuf>,
    /// Set the log level (error, warn, info, debug, trace)
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
    /// Run a single sync pass and exit
    #[arg(long, conflicts_with = "daemon")]
    once: bool,
    /// Print the pass report as JSON (with --once)
    #[arg(long, requires = "once")]
    json: bool,
    /// Log failed passes and keep polling instead of exiting
    #[arg(long)]
    keep_going: bool,
    /// Never delete replica files missing from the source
    #[arg(long)]
    no_delete: bool,
    /// Keep empty folders in the replica
    #[arg(long)]
    no_prune: bool,
    /// Don't echo change records to the console
    #[arg(long)]
    quiet: bool,
    /// Run as a background daemon (detaches from terminal)
    #[arg(long)]
    daemon: bool,
    /// Stop a running daemon
    #[arg(long, conflicts_with_all = ["daemon", "daemon_status"])]
    stop: bool,
    /// Show status of the daemon
    #[arg(long)]
    daemon_status: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // 1. RUST_LOG environment variable has highest precedence
    // 2. --log-level flag is used if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level.clone()));
    // Diagnostics go to stderr so stdout stays clean for --json
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    // Daemon control commands don't need a mirror configuration
    if cli.stop {
        if daemon::stop_daemon()? {
            println!("Daemon stopped");
        } else {
            println!("No daemon was running");
        }
        return Ok(());
    }
    if cli.daemon_status {
        return daemon::print_status();
    }

    let file_config = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let config = MirrorConfig::resolve(
        file_config,
        CliOverrides {
            source: cli.source.clone(),
            replica: cli.replica.clone(),
            interval_secs: cli.sync_interval,
            log_file: cli.log.clone(),
            keep_going: cli.keep_going,
            no_delete: cli.no_delete,
            no_prune: cli.no_prune,
            quiet: cli.quiet,
        },
    )?;

    // Fail on a missing source before detaching so the operator sees it
    Reconciler::new(&config.source, &config.replica, config.reconcile_config())
        .check_source()
        .context("Cannot start sync")?;

    // Fork before the runtime starts any threads
    if cli.daemon {
        daemon::daemonize()?;
        tracing::info!("Daemon started (PID: {})", std::process::id());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let result = runtime.block_on(run(config, cli.once, cli.json));

    if cli.daemon {
        if let Err(e) = daemon::cleanup() {
            tracing::warn!("Failed to clean up daemon PID file: {}", e);
        }
    }

    result
}

async fn run(config: MirrorConfig, once: bool, json: bool) -> anyhow::Result<()> {
    tracing::info!("Source: {}", config.source.display());
    tracing::info!("Replica: {}", config.replica.display());
    tracing::info!("Change log: {}", config.log_file.display());

    let reconciler = Reconciler::new(&config.source, &config.replica, config.reconcile_config());
    let logger = ChangeLogger::for_file(&config.log_file, config.echo);
    let mut scheduler = SyncScheduler::new(reconciler, logger, config.scheduler_config());

    if once {
        tracing::info!("Running single sync pass...");
        let report = scheduler.run_once().await?;

        if json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?
            );
        } else {
            let s = report.summary();
            println!();
            println!("========================================");
            println!("Sync pass complete");
            println!("========================================");
            println!("  Folders created: {}", s.dirs_created);
            println!("  Files added: {}", s.files_added);
            println!("  Files removed: {}", s.files_removed);
            println!("  Files updated: {}", s.files_updated);
            println!("  Empty folders removed: {}", s.dirs_removed);
        }
        return Ok(());
    }

    println!();
    println!("========================================");
    println!("Starting folder mirror");
    println!("========================================");
    println!("  Sync interval: {}s", config.interval.as_secs());
    println!("  Press Ctrl+C to stop");
    println!();

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);

    // Handlers are registered before the first pass so an early signal is not lost
    let signals = shutdown_signals().context("Failed to install signal handlers")?;
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        signals.await;
        tracing::info!("Received shutdown signal");
        let _ = signal_tx.send(());
    });

    let summary = scheduler.run(shutdown_rx).await?;
    drop(shutdown_tx);

    println!(
        "Sync stopped after {} passes ({} changes, {} failed passes)",
        summary.passes, summary.changes, summary.failed_passes
    );
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
#[cfg(unix)]
fn shutdown_signals() -> std::io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    })
}

/// Resolves on Ctrl+C.
#[cfg(not(unix))]
fn shutdown_signals() -> std::io::Result<impl Future<Output = ()>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    })
}
