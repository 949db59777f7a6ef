//! # Projection Service
//!
//! The event dispatcher. One event at a time:
//!
//! 1. Reject a position that does not strictly follow the last one.
//! 2. Declare the read set and load it concurrently.
//! 3. Run the handler against the snapshot.
//! 4. Commit the dirty records in one `save_all`, then publish
//!    subscription requests.
//!
//! The commit is all-or-nothing and the position only advances after it,
//! so an event whose commit failed can be processed again.

use crate::domain::{EventPosition, ProjectionError};
use crate::events::EventEnvelope;
use crate::handlers;
use crate::ports::inbound::ProjectionApi;
use crate::ports::outbound::{EntityStore, SourceRegistrar};
use crate::snapshot::{load, read_set};
use async_trait::async_trait;
use shared_types::{Address, ProfileResolver, SubscriptionRequest};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// Default minimum remaining lifetime of a V2 trust grant, in seconds.
pub const DEFAULT_UNTRUST_GRACE_SECS: u64 = 3_600;

/// Projection configuration.
#[derive(Debug, Clone)]
pub struct ProjectionConfig {
    /// Recipient whose settlement legs are classified as `MetriFee`.
    pub metri_fee_collector: Option<Address>,
    /// A V2 trust expiring sooner than this after its block counts as untrust.
    pub untrust_grace_secs: u64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            metri_fee_collector: None,
            untrust_grace_secs: DEFAULT_UNTRUST_GRACE_SECS,
        }
    }
}

/// Result of applying one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub records_written: usize,
    pub subscriptions: Vec<SubscriptionRequest>,
}

/// Running counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionStats {
    pub events_processed: u64,
    pub records_written: u64,
    pub subscriptions_requested: u64,
    pub rejected_out_of_order: u64,
}

#[derive(Debug, Default)]
struct DispatchState {
    last: Option<EventPosition>,
    stats: ProjectionStats,
}

/// The projection engine.
pub struct ProjectionService {
    store: Arc<dyn EntityStore>,
    resolver: Arc<dyn ProfileResolver>,
    registrar: Arc<dyn SourceRegistrar>,
    config: ProjectionConfig,
    /// Held for the whole of `process`; serializes events.
    state: Mutex<DispatchState>,
}

impl ProjectionService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        resolver: Arc<dyn ProfileResolver>,
        registrar: Arc<dyn SourceRegistrar>,
        config: ProjectionConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            registrar,
            config,
            state: Mutex::new(DispatchState::default()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    pub async fn stats(&self) -> ProjectionStats {
        self.state.lock().await.stats.clone()
    }
}

#[async_trait]
impl ProjectionApi for ProjectionService {
    #[instrument(
        skip(self, envelope),
        fields(
            event = envelope.event.name(),
            block = envelope.block_number,
            tx = %envelope.transaction_hash,
            log_index = envelope.log_index,
        )
    )]
    async fn process(&self, envelope: EventEnvelope) -> Result<ProcessOutcome, ProjectionError> {
        let mut state = self.state.lock().await;

        let position = envelope.position();
        if let Some(last) = state.last {
            if position <= last {
                warn!(?last, received = ?position, "Rejecting out-of-order event");
                state.stats.rejected_out_of_order += 1;
                return Err(ProjectionError::OutOfOrder {
                    last,
                    received: position,
                });
            }
        }

        let reads = read_set(&envelope);
        let mut snapshot = load(
            self.store.as_ref(),
            self.resolver.as_ref(),
            reads,
            &envelope.transaction_hash,
        )
        .await?;

        handlers::apply(&mut snapshot, &envelope, &self.config)?;

        let changes = snapshot.into_changes();
        let records_written = changes.records.len();
        self.store.save_all(changes.records).await?;
        for request in &changes.subscriptions {
            self.registrar.register(request.clone()).await;
        }

        state.last = Some(position);
        state.stats.events_processed += 1;
        state.stats.records_written += records_written as u64;
        state.stats.subscriptions_requested += changes.subscriptions.len() as u64;

        debug!(
            records = records_written,
            subscriptions = changes.subscriptions.len(),
            "Event applied"
        );

        Ok(ProcessOutcome {
            records_written,
            subscriptions: changes.subscriptions,
        })
    }

    async fn last_position(&self) -> Option<EventPosition> {
        self.state.lock().await.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{BusRegistrar, InMemoryEntityStore};
    use crate::domain::{
        balance_id, erc1155_token_id, EntityKey, EntityRecord, StoreError, Transfer,
    };
    use crate::events::CirclesEvent;
    use shared_bus::SubscriptionBus;
    use shared_types::{NoopProfileResolver, SignedAmount, SourceKind, TxHash, U256};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Store whose next commit fails while the flag is set.
    struct FailingCommitStore {
        inner: InMemoryEntityStore,
        fail_next: AtomicBool,
    }

    #[async_trait]
    impl EntityStore for FailingCommitStore {
        async fn load(&self, key: &EntityKey) -> Result<Option<EntityRecord>, StoreError> {
            self.inner.load(key).await
        }

        async fn save(&self, record: EntityRecord) -> Result<(), StoreError> {
            self.inner.save(record).await
        }

        async fn save_all(&self, records: Vec<EntityRecord>) -> Result<(), StoreError> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(StoreError::Unavailable("disk full".into()));
            }
            self.inner.save_all(records).await
        }

        async fn transfers_in_transaction(
            &self,
            tx: &TxHash,
        ) -> Result<Vec<Transfer>, StoreError> {
            self.inner.transfers_in_transaction(tx).await
        }
    }

    fn service() -> (ProjectionService, Arc<InMemoryEntityStore>, Arc<SubscriptionBus>) {
        let store = Arc::new(InMemoryEntityStore::new());
        let bus = Arc::new(SubscriptionBus::new());
        let service = ProjectionService::new(
            store.clone(),
            Arc::new(NoopProfileResolver),
            Arc::new(BusRegistrar::new(bus.clone())),
            ProjectionConfig::default(),
        );
        (service, store, bus)
    }

    fn at(block_number: u64, log_index: u32, event: CirclesEvent) -> EventEnvelope {
        EventEnvelope {
            block_number,
            block_timestamp: 1_700_000_000 + block_number,
            transaction_hash: TxHash::new([block_number as u8; 32]),
            transaction_index: 0,
            log_index,
            source: Address::new([0xcc; 20]),
            event,
        }
    }

    fn register(avatar: u8) -> CirclesEvent {
        CirclesEvent::RegisterHuman {
            avatar: Address::new([avatar; 20]),
            inviter: Address::ZERO,
        }
    }

    #[tokio::test]
    async fn test_out_of_order_rejected_without_side_effects() {
        let (service, store, _bus) = service();
        service.process(at(5, 2, register(1))).await.unwrap();
        let before = store.len();

        let err = service.process(at(5, 1, register(2))).await.unwrap_err();
        assert!(matches!(err, ProjectionError::OutOfOrder { .. }));
        assert!(service.process(at(5, 2, register(2))).await.is_err());

        assert_eq!(store.len(), before);
        assert_eq!(service.stats().await.rejected_out_of_order, 2);
        assert_eq!(
            service.last_position().await,
            Some(EventPosition {
                block_number: 5,
                transaction_index: 0,
                log_index: 2
            })
        );
    }

    #[tokio::test]
    async fn test_failed_commit_can_be_retried_once() {
        let store = Arc::new(FailingCommitStore {
            inner: InMemoryEntityStore::new(),
            fail_next: AtomicBool::new(true),
        });
        let service = ProjectionService::new(
            store.clone(),
            Arc::new(NoopProfileResolver),
            Arc::new(BusRegistrar::new(Arc::new(SubscriptionBus::new()))),
            ProjectionConfig::default(),
        );
        let to = Address::new([7; 20]);
        let id = U256::from(42u64);
        let mint = at(
            3,
            0,
            CirclesEvent::TransferSingle {
                operator: to,
                from: Address::ZERO,
                to,
                id,
                value: U256::from(100u64),
            },
        );

        let err = service.process(mint.clone()).await.unwrap_err();
        assert!(matches!(err, ProjectionError::Store(StoreError::Unavailable(_))));
        assert!(store.inner.is_empty());
        assert_eq!(service.last_position().await, None);

        service.process(mint).await.unwrap();

        let token_id = erc1155_token_id(&id);
        let token = store.inner.token(&token_id).await.unwrap().unwrap();
        assert_eq!(token.total_supply, U256::from(100u64));
        let balance = store
            .inner
            .balance(&balance_id(&to, &token_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(balance.balance, SignedAmount::positive(U256::from(100u64)));
    }

    #[tokio::test]
    async fn test_subscription_published_before_process_returns() {
        let (service, _store, bus) = service();
        let outcome = service.process(at(1, 0, register(7))).await.unwrap();

        assert_eq!(outcome.subscriptions.len(), 1);
        assert_eq!(outcome.subscriptions[0].kind, SourceKind::SafeAccount);
        assert!(bus.is_registered(SourceKind::SafeAccount, &Address::new([7; 20])));
    }
}
