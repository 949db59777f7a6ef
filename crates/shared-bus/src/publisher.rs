//! # Subscription Publisher
//!
//! Publishing side of the bus.

use crate::filter::SubscriptionFilter;
use crate::registry::IssuedSources;
use crate::subscriber::{RequestStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{Address, SourceKind, SubscriptionRequest};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// What happened to a published request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Broadcast to this many live subscribers (possibly zero).
    Delivered(usize),
    /// The source was already requested earlier; nothing was sent.
    Duplicate,
}

/// Trait for publishing subscription requests to the bus.
#[async_trait]
pub trait SubscriptionPublisher: Send + Sync {
    /// Publish a request. Repeats of an issued `(kind, address)` are dropped.
    async fn publish(&self, request: SubscriptionRequest) -> PublishOutcome;

    /// Total distinct requests accepted.
    fn requests_published(&self) -> u64;
}

/// In-memory subscription bus over `tokio::sync::broadcast`.
pub struct SubscriptionBus {
    sender: broadcast::Sender<SubscriptionRequest>,

    /// Sources already broadcast.
    issued: Mutex<IssuedSources>,

    /// Accepted request count.
    requests_published: AtomicU64,

    capacity: usize,
}

impl SubscriptionBus {
    /// Create a bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus with the given per-subscriber buffer.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            issued: Mutex::new(IssuedSources::new()),
            requests_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to requests matching a filter.
    #[must_use]
    pub fn subscribe(&self, filter: SubscriptionFilter) -> Subscription {
        debug!(kinds = ?filter.kinds, "New source subscriber");
        Subscription::new(self.sender.subscribe(), filter)
    }

    /// Stream adapter over [`Self::subscribe`].
    #[must_use]
    pub fn request_stream(&self, filter: SubscriptionFilter) -> RequestStream {
        RequestStream::new(self.subscribe(filter))
    }

    /// Returns true if the source has already been requested.
    #[must_use]
    pub fn is_registered(&self, kind: SourceKind, address: &Address) -> bool {
        self.issued.lock().first_block(kind, address).is_some()
    }

    /// Number of distinct sources requested so far.
    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.issued.lock().len()
    }

    /// Number of repeat requests that were dropped.
    #[must_use]
    pub fn duplicate_count(&self) -> u64 {
        self.issued.lock().duplicates()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SubscriptionBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriptionPublisher for SubscriptionBus {
    async fn publish(&self, request: SubscriptionRequest) -> PublishOutcome {
        if !self.issued.lock().check_and_insert(&request) {
            debug!(
                kind = %request.kind,
                address = %request.address,
                "Source already registered"
            );
            return PublishOutcome::Duplicate;
        }

        self.requests_published.fetch_add(1, Ordering::Relaxed);
        let kind = request.kind;
        let address = request.address;

        match self.sender.send(request) {
            Ok(receivers) => {
                debug!(kind = %kind, address = %address, receivers, "Source registered");
                PublishOutcome::Delivered(receivers)
            }
            Err(_) => {
                // Still counts as issued: a watcher attaching later reads
                // the registry, not the channel.
                warn!(kind = %kind, address = %address, "Source registered with no subscribers");
                PublishOutcome::Delivered(0)
            }
        }
    }

    fn requests_published(&self) -> u64 {
        self.requests_published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: SourceKind, byte: u8) -> SubscriptionRequest {
        SubscriptionRequest::new(kind, Address::new([byte; 20]), 1)
    }

    #[tokio::test]
    async fn test_publish_no_subscribers() {
        let bus = SubscriptionBus::new();
        let outcome = bus.publish(request(SourceKind::PersonalToken, 1)).await;

        assert_eq!(outcome, PublishOutcome::Delivered(0));
        assert_eq!(bus.requests_published(), 1);
        assert!(bus.is_registered(SourceKind::PersonalToken, &Address::new([1; 20])));
    }

    #[tokio::test]
    async fn test_publish_with_subscriber() {
        let bus = SubscriptionBus::new();
        let _sub = bus.subscribe(SubscriptionFilter::all());

        let outcome = bus.publish(request(SourceKind::SafeAccount, 2)).await;
        assert_eq!(outcome, PublishOutcome::Delivered(1));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_dropped() {
        let bus = SubscriptionBus::new();
        let _sub = bus.subscribe(SubscriptionFilter::all());

        bus.publish(request(SourceKind::WrappedErc20, 3)).await;
        let outcome = bus.publish(request(SourceKind::WrappedErc20, 3)).await;

        assert_eq!(outcome, PublishOutcome::Duplicate);
        assert_eq!(bus.requests_published(), 1);
        assert_eq!(bus.duplicate_count(), 1);
        assert_eq!(bus.registered_count(), 1);
    }
}
