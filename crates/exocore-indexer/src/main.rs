//! Exocore state indexer binary.
//!
//! Wires the configuration, the chain source, the store and the registrar
//! together and runs one operator command.
//!
//! # Startup Sequence
//!
//! 1. Parse the command line
//! 2. Load configuration from `exocore-indexer.yaml` (or `--config`)
//! 3. Initialize structured logging (tracing)
//! 4. Build the chain source (local snapshots or remote REST gateway)
//! 5. Connect to `PostgreSQL` unless the command runs in memory
//! 6. Run the command and log the result
//!
//! # Commands
//!
//! - `migrate` -- apply pending migrations
//! - `genesis [--file PATH]` -- load a genesis document
//! - `replay [--genesis PATH] [--blocks PATH] [--from HEIGHT] [--dry-run]`
//!   -- replay a newline-delimited JSON block feed
//! - `refresh-validators [--height H]` -- save the validator set at a height

mod config;
mod error;
mod replay;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use exocore_db::{MemoryStore, PostgresPool, Store};
use exocore_modules::Registrar;
use exocore_source::{ChainSource, LocalSource, RemoteSource, Sources};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{IndexerConfig, LogFormat, LoggingConfig, SourceConfig, SourceKind};

/// Indexes Exocore chain state into `PostgreSQL`.
#[derive(Debug, Parser)]
#[command(name = "exocore-indexer", version, about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(
        long,
        short,
        env = "EXOCORE_INDEXER_CONFIG",
        default_value = "exocore-indexer.yaml"
    )]
    config: PathBuf,

    /// Command to run.
    #[command(subcommand)]
    command: Command,
}

/// Operator commands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending database migrations.
    Migrate,

    /// Load a genesis document.
    Genesis {
        /// Genesis JSON file. Defaults to `replay.genesis_path`.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Replay a block feed, optionally after loading genesis.
    Replay {
        /// Genesis JSON file loaded before the first block.
        #[arg(long)]
        genesis: Option<PathBuf>,

        /// Newline-delimited JSON block records.
        #[arg(long)]
        blocks: Option<PathBuf>,

        /// Skip records below this height.
        #[arg(long)]
        from: Option<i64>,

        /// Write to an in-memory store instead of `PostgreSQL`.
        #[arg(long)]
        dry_run: bool,
    },

    /// Fetch the validator set at a height and save it with its powers.
    RefreshValidators {
        /// Height to read. Defaults to the source's latest height.
        #[arg(long)]
        height: Option<i64>,
    },
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, connections or the command fail.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Parse the command line.
    let cli = Cli::parse();

    // 2. Load configuration.
    let config = IndexerConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    // 3. Initialize structured logging.
    init_tracing(&config.logging);
    info!("exocore-indexer starting");
    if cli.config.exists() {
        info!(path = %cli.config.display(), "Configuration loaded");
    } else {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    // 4-6. Build what the command needs and run it.
    match cli.command {
        Command::Migrate => migrate(&config).await,
        Command::Genesis { file } => {
            let path = file
                .or_else(|| config.replay.genesis_path.clone())
                .context("no genesis file: pass --file or set replay.genesis_path")?;
            let source = chain_source(&config.source).await?;
            let pool = connect(&config).await?;
            let result = load_genesis(pool.store(), &source, &path).await;
            pool.close().await;
            result
        }
        Command::Replay {
            genesis,
            blocks,
            from,
            dry_run,
        } => {
            let plan = ReplayPlan {
                genesis: genesis.or_else(|| config.replay.genesis_path.clone()),
                blocks: blocks
                    .or_else(|| config.replay.blocks_path.clone())
                    .context("no block feed: pass --blocks or set replay.blocks_path")?,
                from: from.or(config.replay.start_height),
            };
            let source = chain_source(&config.source).await?;
            if dry_run {
                info!("Dry run, writing to an in-memory store");
                run_replay(MemoryStore::new(), &source, &plan).await
            } else {
                let pool = connect(&config).await?;
                let result = run_replay(pool.store(), &source, &plan).await;
                pool.close().await;
                result
            }
        }
        Command::RefreshValidators { height } => {
            let source = chain_source(&config.source).await?;
            let height = match height {
                Some(height) => height,
                None => source
                    .latest_height()
                    .await
                    .context("querying the latest height")?,
            };
            let pool = connect(&config).await?;
            let result = refresh_validators(pool.store(), &source, height).await;
            pool.close().await;
            result
        }
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    match logging.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}

/// Build the configured chain source.
async fn chain_source(config: &SourceConfig) -> anyhow::Result<ChainSource> {
    match config.kind {
        SourceKind::Local => {
            let source = match &config.snapshot_path {
                Some(path) => LocalSource::load(path)
                    .await
                    .with_context(|| format!("loading snapshots from {}", path.display()))?,
                None => {
                    tracing::warn!("No snapshot_path configured, local source is empty");
                    LocalSource::new(Vec::new())
                }
            };
            info!(kind = "local", "Chain source ready");
            Ok(ChainSource::Local(source))
        }
        SourceKind::Remote => {
            let source = RemoteSource::new(&config.remote_config())
                .context("building the REST client")?;
            info!(kind = "remote", rest_url = %config.rest_url, "Chain source ready");
            Ok(ChainSource::Remote(source))
        }
    }
}

/// Connect to `PostgreSQL`, applying migrations when configured to.
async fn connect(config: &IndexerConfig) -> anyhow::Result<PostgresPool> {
    let pool = PostgresPool::connect(&config.database.pool_config())
        .await
        .context("connecting to PostgreSQL")?;
    if config.database.run_migrations {
        pool.run_migrations().await.context("running migrations")?;
    }
    Ok(pool)
}

async fn migrate(config: &IndexerConfig) -> anyhow::Result<()> {
    let pool = PostgresPool::connect(&config.database.pool_config())
        .await
        .context("connecting to PostgreSQL")?;
    let result = pool.run_migrations().await.context("running migrations");
    pool.close().await;
    result?;
    info!("Migrations applied");
    Ok(())
}

async fn load_genesis<S: Store + Clone + 'static>(
    store: S,
    source: &ChainSource,
    path: &Path,
) -> anyhow::Result<()> {
    let registrar = Registrar::new(store, &Sources::new(source));
    let doc = replay::load_genesis(path).await?;
    replay::apply_genesis(&registrar, &doc).await?;
    info!(chain_id = %doc.chain_id, height = doc.initial_height, "Genesis loaded");
    Ok(())
}

/// Inputs of one replay after merging flags and configuration.
#[derive(Debug)]
struct ReplayPlan {
    genesis: Option<PathBuf>,
    blocks: PathBuf,
    from: Option<i64>,
}

async fn run_replay<S: Store + Clone + 'static>(
    store: S,
    source: &ChainSource,
    plan: &ReplayPlan,
) -> anyhow::Result<()> {
    let registrar = Registrar::new(store, &Sources::new(source));

    if let Some(path) = &plan.genesis {
        let doc = replay::load_genesis(path).await?;
        replay::apply_genesis(&registrar, &doc).await?;
        info!(chain_id = %doc.chain_id, "Genesis loaded");
    }

    let file = tokio::fs::File::open(&plan.blocks)
        .await
        .with_context(|| format!("opening {}", plan.blocks.display()))?;
    info!(path = %plan.blocks.display(), from = ?plan.from, "Replaying blocks");
    let summary = replay::replay_blocks(&registrar, BufReader::new(file), plan.from).await?;
    info!(
        applied = summary.applied,
        skipped = summary.skipped,
        last_height = ?summary.last_height,
        "Replay complete"
    );
    Ok(())
}

async fn refresh_validators<S: Store + Clone + 'static>(
    store: S,
    source: &ChainSource,
    height: i64,
) -> anyhow::Result<()> {
    let registrar = Registrar::new(store, &Sources::new(source));
    let count = registrar
        .dogfood()
        .refresh_validators(height)
        .await
        .with_context(|| format!("refreshing validators at height {height}"))?;
    info!(height, validators = count, "Validator set refreshed");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn replay_flags_parse() {
        let cli = Cli::try_parse_from([
            "exocore-indexer",
            "--config",
            "custom.yaml",
            "replay",
            "--blocks",
            "blocks.ndjson",
            "--from",
            "120",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("custom.yaml"));
        match cli.command {
            Command::Replay {
                genesis,
                blocks,
                from,
                dry_run,
            } => {
                assert!(genesis.is_none());
                assert_eq!(blocks, Some(PathBuf::from("blocks.ndjson")));
                assert_eq!(from, Some(120));
                assert!(dry_run);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn refresh_validators_height_is_optional() {
        let cli = Cli::try_parse_from(["exocore-indexer", "refresh-validators"]).unwrap();
        assert!(matches!(cli.command, Command::RefreshValidators { height: None }));
    }
}
