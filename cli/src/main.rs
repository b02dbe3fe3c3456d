mod args;
mod commands;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::Parser;
use draftstore::{DraftEngine, DraftError, EngineConfig, SqliteKV};
use tracing::info;

use crate::args::Cli;

/// Environment variable naming an engine config file
const CONFIG_ENV: &str = "DRAFT_CONFIG";

/// Appended to the database path to name the fallback database
const FALLBACK_SUFFIX: &str = ".fallback";

fn load_config() -> Result<EngineConfig, DraftError> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => EngineConfig::from_reader(BufReader::new(File::open(path)?)),
        None => Ok(EngineConfig::default()),
    }
}

fn fallback_path(db: &Path) -> PathBuf {
    let mut name = db.as_os_str().to_os_string();
    name.push(FALLBACK_SUFFIX);
    PathBuf::from(name)
}

/// Engine over `db`, with a quota-bounded fallback database next to it so
/// writes the primary rejects outlive the process
fn open_engine(
    db: &Path,
    config: EngineConfig,
) -> Result<DraftEngine<SqliteKV, SqliteKV>, rusqlite::Error> {
    let primary = SqliteKV::new(db)?;
    let fallback = SqliteKV::with_quota(fallback_path(db), config.fallback_quota_bytes)?;
    Ok(DraftEngine::with_config(primary, fallback, config))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing; stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config()?;
    let exercise = commands::load_exercise(&cli.exercise)?;

    let engine = open_engine(&cli.db, config)?;
    info!(db = %cli.db.display(), key = %exercise.draft_key(), "opened draft store");

    let output = commands::run(&engine, &exercise, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
