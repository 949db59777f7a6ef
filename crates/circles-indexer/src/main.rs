//! `circles-indexer [EVENTS_FILE]`
//!
//! The positional argument overrides `CIRCLES_EVENTS_FILE`.

use anyhow::{Context, Result};
use circles_indexer::{
    profile_resolver, spawn_source_watcher, EventFeed, IndexerConfig, IndexerRuntime,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = IndexerConfig::from_env().context("invalid configuration")?;
    if let Some(path) = std::env::args().nth(1) {
        config.events_file = PathBuf::from(path);
    }

    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    config.validate()?;
    info!(
        events = %config.events_file.display(),
        fetch_profiles = config.fetch_profiles,
        "Starting Circles indexer"
    );

    let resolver = profile_resolver(&config).context("failed to build profile resolver")?;
    let runtime = IndexerRuntime::new(&config, resolver);
    let watcher = spawn_source_watcher(runtime.bus());

    let mut feed = EventFeed::open(&config.events_file)
        .await
        .with_context(|| format!("failed to open {}", config.events_file.display()))?;
    let summary = runtime.replay(&mut feed).await?;

    if let Some(path) = &config.dump_file {
        let written = runtime.dump(path).await?;
        info!(records = written, path = %path.display(), "Ledger dumped");
    }

    // Dropping the runtime closes the bus and ends the watcher.
    drop(runtime);
    let sources = watcher.await.context("source watcher panicked")?;

    info!(
        read = summary.events_read,
        applied = summary.events_applied,
        skipped = summary.skipped_out_of_order,
        records_written = summary.stats.records_written,
        sources = sources.len(),
        "Replay complete"
    );
    for (kind, count) in &summary.counts {
        info!(entity = kind, count, "Ledger records");
    }

    Ok(())
}
