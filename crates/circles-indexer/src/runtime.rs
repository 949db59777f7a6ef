//! # Indexer Runtime
//!
//! Wires the projection engine and replays a feed through it.
//!
//! ```text
//! EventFeed ──→ ProjectionService ──→ InMemoryEntityStore
//!                      │
//!                      └──→ BusRegistrar ──→ SubscriptionBus ──→ source watcher
//! ```

use crate::config::IndexerConfig;
use crate::feed::{EventFeed, FeedError};
use circles_profiles::{CachedProfileResolver, ProfileError};
use circles_projection::{
    BusRegistrar, EntityRecord, InMemoryEntityStore, ProjectionApi, ProjectionError,
    ProjectionService, ProjectionStats,
};
use shared_bus::{SubscriptionBus, SubscriptionFilter};
use shared_types::{NoopProfileResolver, ProfileResolver, SubscriptionRequest};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("Projection failed at feed line {line}: {source}")]
    Projection {
        line: usize,
        #[source]
        source: ProjectionError,
    },

    #[error("Failed to write ledger dump: {0}")]
    Dump(#[from] std::io::Error),

    #[error("Failed to encode ledger record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Outcome of a replay.
#[derive(Debug, Clone, Default)]
pub struct ReplaySummary {
    pub events_read: u64,
    pub events_applied: u64,
    pub skipped_out_of_order: u64,
    pub stats: ProjectionStats,
    /// Record count per entity kind
    pub counts: BTreeMap<&'static str, usize>,
    pub sources_registered: usize,
}

/// Builds the profile resolver the configuration asks for.
pub fn profile_resolver(config: &IndexerConfig) -> Result<Arc<dyn ProfileResolver>, ProfileError> {
    if !config.fetch_profiles {
        info!("Profile fetching disabled");
        return Ok(Arc::new(NoopProfileResolver));
    }
    Ok(Arc::new(CachedProfileResolver::from_config(&config.profiles)?))
}

/// Logs every source registration until the bus is dropped.
pub fn spawn_source_watcher(bus: &SubscriptionBus) -> JoinHandle<Vec<SubscriptionRequest>> {
    let mut subscription = bus.subscribe(SubscriptionFilter::all());
    tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(request) = subscription.recv().await {
            info!(
                kind = %request.kind,
                address = %request.address,
                from_block = request.from_block,
                "Watching new source"
            );
            seen.push(request);
        }
        seen
    })
}

pub struct IndexerRuntime {
    service: ProjectionService,
    store: Arc<InMemoryEntityStore>,
    bus: Arc<SubscriptionBus>,
}

impl IndexerRuntime {
    pub fn new(config: &IndexerConfig, resolver: Arc<dyn ProfileResolver>) -> Self {
        let store = Arc::new(InMemoryEntityStore::new());
        let bus = Arc::new(SubscriptionBus::new());
        let service = ProjectionService::new(
            store.clone(),
            resolver,
            Arc::new(BusRegistrar::new(bus.clone())),
            config.projection.clone(),
        );
        Self {
            service,
            store,
            bus,
        }
    }

    pub fn bus(&self) -> &SubscriptionBus {
        &self.bus
    }

    pub fn store(&self) -> &Arc<InMemoryEntityStore> {
        &self.store
    }

    /// Applies every event of `feed` in order.
    ///
    /// Out-of-order events are logged and skipped; any other projection
    /// failure stops the replay.
    pub async fn replay<R: AsyncBufRead + Unpin>(
        &self,
        feed: &mut EventFeed<R>,
    ) -> Result<ReplaySummary, RuntimeError> {
        let mut summary = ReplaySummary::default();

        while let Some(envelope) = feed.next_event().await? {
            summary.events_read += 1;
            match self.service.process(envelope).await {
                Ok(_) => summary.events_applied += 1,
                Err(ProjectionError::OutOfOrder { last, received }) => {
                    warn!(line = feed.line(), ?last, ?received, "Skipping out-of-order event");
                    summary.skipped_out_of_order += 1;
                }
                Err(source) => {
                    return Err(RuntimeError::Projection {
                        line: feed.line(),
                        source,
                    })
                }
            }
            if summary.events_read % 10_000 == 0 {
                info!(events = summary.events_read, "Replay progress");
            }
        }

        summary.stats = self.service.stats().await;
        summary.counts = self.store.counts();
        summary.sources_registered = self.bus.registered_count();
        Ok(summary)
    }

    /// Writes every stored record as one JSON object per line.
    pub async fn dump(&self, path: &Path) -> Result<usize, RuntimeError> {
        let records: Vec<EntityRecord> = self.store.dump();
        let mut out = Vec::new();
        for record in &records {
            serde_json::to_writer(&mut out, record)?;
            out.push(b'\n');
        }
        let mut file = tokio::fs::File::create(path).await?;
        file.write_all(&out).await?;
        file.flush().await?;
        Ok(records.len())
    }
}
