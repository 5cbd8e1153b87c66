use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use clearbook::{EngineConfig, SessionStores, StatementSession, TracingNotifier};
use clearbook_core::StatementId;
use clearbook_storage::SqliteStore;
use tracing_subscriber::EnvFilter;

/// Auto-categorize a bank statement and print where its reconciliation stands.
#[derive(Debug, Parser)]
#[command(name = "clearbook", version)]
struct Cli {
    /// SQLite ledger file
    db: PathBuf,

    /// Statement to open
    statement_id: i64,

    /// Engine config (thresholds, keyword table)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let store = SqliteStore::open(&cli.db)
        .await
        .with_context(|| format!("Failed to open ledger {}", cli.db.display()))?;
    let statement_id = StatementId(cli.statement_id);
    let mut session = StatementSession::open(
        statement_id,
        SessionStores::shared(Arc::new(store)),
        config,
        Arc::new(TracingNotifier),
    )
    .await
    .with_context(|| format!("Failed to open statement {statement_id}"))?;

    let report = session
        .auto_categorize_all()
        .await
        .context("Auto-categorization failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    println!("{}", serde_json::to_string_pretty(&session.summary())?);

    let reconciliation = session.reconciliation();
    tracing::info!(
        "Cleared balance {} against ending balance {} (difference {})",
        reconciliation.cleared_balance(),
        session.statement().ending_balance,
        reconciliation.difference()
    );
    Ok(())
}
