use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::Gemini;
use threadlens_analyzer::replay::{FileEventSource, LoggingReplySink, SnapshotThreadFetcher};
use threadlens_analyzer::Analyzer;
use threadlens_common::Config;
use threadlens_store::AnalysisStore;

/// Analyze a recorded discussion thread from an event feed and a thread
/// snapshot. Platform adapters (live event feed, reply posting) live
/// outside this repository; this binary drives the pipeline end-to-end
/// from files.
#[derive(Parser)]
#[command(name = "threadlens-analyzer")]
struct Args {
    /// JSON-lines file of trigger events
    #[arg(long)]
    events: PathBuf,

    /// JSON file with the thread snapshot (array of nodes)
    #[arg(long)]
    thread: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("threadlens_analyzer=info".parse()?),
        )
        .init();

    info!("ThreadLens analyzer starting...");

    let args = Args::parse();
    let config = Config::from_env();
    config.log_redacted();

    let store = AnalysisStore::open(&config.db_path, &config.db_passphrase).await?;
    store.migrate().await?;

    let backend = Arc::new(Gemini::new(&config.gemini_api_key, &config.gemini_model));
    let fetcher = Arc::new(SnapshotThreadFetcher::load(&args.thread)?);
    let sink = Arc::new(LoggingReplySink::new());
    let source = FileEventSource::load(&args.events)?;

    let mut analyzer = Analyzer::new(backend, fetcher, sink, store)
        .with_trigger_phrases(config.trigger_phrases.clone());
    if let Some(n) = config.fact_check_concurrency {
        analyzer = analyzer.with_fact_check_concurrency(n);
    }
    if let Some(secs) = config.fact_check_timeout_secs {
        analyzer = analyzer.with_fact_check_timeout(Duration::from_secs(secs));
    }

    analyzer.run(&source).await?;

    info!("Event feed drained, shutting down");
    Ok(())
}
