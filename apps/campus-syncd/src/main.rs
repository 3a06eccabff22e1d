//! # campus-syncd
//!
//! Keeps the on-device cache in step with the remote document store.
//!
//! ## Commands
//! ```text
//! campus-syncd [--config sync.toml] [--database campus.db] <COMMAND>
//!
//!   run              periodic sync until Ctrl+C / SIGTERM (mode-dependent)
//!   once [--role R]  one pass with retries, then exit
//!   status           cached row counts per entity
//!   config [--write] print the effective config, or write a template
//! ```
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show debug messages
//! - `RUST_LOG=campus_sync=trace` - Trace the sync engine only
//! - Default: INFO level

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use campus_core::Role;
use campus_db::{Database, DbConfig};
use campus_sync::{
    HttpRemoteStore, PassStatus, Registration, SyncConfig, SyncConstraints, SyncMode,
    SyncOrchestrator, SyncScheduler, TcpProbe, TracingEmitter, UnitContext, UnitRegistry,
};

#[derive(Debug, Parser)]
#[command(name = "campus-syncd", version, about = "Offline-first sync for Campus")]
struct Cli {
    /// Config file (default: platform config dir/sync.toml)
    #[arg(long, global = true, env = "CAMPUS_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite cache path, overriding the config file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run according to the configured sync mode
    Run,

    /// Run a single pass and exit
    Once {
        /// Role requesting the sync
        #[arg(long)]
        role: Option<Role>,
    },

    /// Show cached row counts
    Status,

    /// Show the effective configuration
    Config {
        /// Write a starter config file (offline mode) instead
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Run) {
        Command::Config { write } => show_config(cli.config, write),
        Command::Status => {
            let config = load_config(cli.config, cli.database)?;
            show_status(&config).await
        }
        Command::Once { role } => {
            let config = load_config(cli.config, cli.database)?;
            run_once(&config, role).await
        }
        Command::Run => {
            let config = load_config(cli.config, cli.database)?;
            run(&config).await
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: Option<PathBuf>, database: Option<PathBuf>) -> anyhow::Result<SyncConfig> {
    let mut config = SyncConfig::load(path).context("Failed to load sync config")?;
    if database.is_some() {
        config.database.path = database;
    }

    info!(
        device_id = %config.device_id(),
        mode = %config.mode(),
        "Configuration loaded"
    );
    Ok(config)
}

async fn open_database(config: &SyncConfig) -> anyhow::Result<Database> {
    let path = config
        .database_path()
        .context("No database path configured and no platform data dir")?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    Ok(Database::new(DbConfig::new(path)).await?)
}

/// Wires the remote client, cache, probe and units into a scheduler.
fn build_scheduler(config: &SyncConfig, db: Database) -> anyhow::Result<SyncScheduler> {
    let remote = HttpRemoteStore::from_settings(&config.remote)?;

    let probe_addr = config
        .probe_addr()
        .context("No connectivity probe address could be derived")?;
    let probe = Arc::new(TcpProbe::new(probe_addr, config.probe_timeout()));

    let ctx = UnitContext::new(Arc::new(remote), Arc::new(db))
        .with_fetch_timeout(config.unit_timeout());

    let mut orchestrator = SyncOrchestrator::new(UnitRegistry::standard(), ctx, probe.clone())
        .with_emitter(Arc::new(TracingEmitter));
    if let Some(max) = config.sync.max_concurrent_units {
        orchestrator = orchestrator.with_max_concurrency(max);
    }

    let scheduler = SyncScheduler::new(Arc::new(orchestrator), probe, config.retry_policy())
        .with_retry_on_partial_failure(config.sync.retry_on_partial_failure);

    Ok(scheduler)
}

async fn run(config: &SyncConfig) -> anyhow::Result<()> {
    match config.mode() {
        SyncMode::Offline => {
            info!("Sync mode is offline, nothing to do");
            Ok(())
        }
        SyncMode::Manual => {
            info!("Sync mode is manual, running a single pass");
            run_once(config, None).await
        }
        SyncMode::Periodic => {
            let db = open_database(config).await?;
            let scheduler = build_scheduler(config, db.clone())?;

            let constraints = SyncConstraints {
                requires_network: config.sync.requires_network,
            };
            if scheduler.run_periodic(config.sync_interval(), constraints).await
                == Registration::KeptExisting
            {
                warn!("Periodic sync was already registered");
            }

            shutdown_signal().await;
            info!("Shutdown signal received, cancelling sync");

            scheduler.cancel_all().await;
            db.close().await;
            info!("Shutdown complete");
            Ok(())
        }
    }
}

async fn run_once(config: &SyncConfig, role: Option<Role>) -> anyhow::Result<()> {
    if !config.is_sync_enabled() {
        bail!("Sync is disabled (mode = {})", config.mode());
    }

    let db = open_database(config).await?;
    let scheduler = build_scheduler(config, db.clone())?;

    let result = tokio::select! {
        result = scheduler.run_once(role) => result,
        _ = shutdown_signal() => {
            scheduler.cancel_all().await;
            None
        }
    };
    db.close().await;

    let Some(result) = result else {
        bail!("Sync cancelled");
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    match result.status {
        PassStatus::Success => Ok(()),
        status => bail!(
            "Sync finished with {} ({} entities failed)",
            status,
            result.failed_entities().len()
        ),
    }
}

async fn show_status(config: &SyncConfig) -> anyhow::Result<()> {
    let db = open_database(config).await?;

    let migrations = db.migration_status().await?;
    println!("migrations: {}", migrations);
    for (kind, count) in db.cache_counts().await? {
        println!("{:<12} {}", kind.to_string(), count);
    }

    db.close().await;
    Ok(())
}

fn show_config(path: Option<PathBuf>, write: bool) -> anyhow::Result<()> {
    if write {
        let written = SyncConfig::template().save(path)?;
        println!("Wrote {}", written.display());
        return Ok(());
    }

    let config = SyncConfig::load(path)?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
