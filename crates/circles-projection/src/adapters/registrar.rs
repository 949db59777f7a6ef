//! Source registrar backed by the shared subscription bus.

use crate::ports::SourceRegistrar;
use async_trait::async_trait;
use shared_bus::{PublishOutcome, SubscriptionBus, SubscriptionPublisher};
use shared_types::SubscriptionRequest;
use std::sync::Arc;
use tracing::{debug, info};

/// Publishes registrations onto a [`SubscriptionBus`].
pub struct BusRegistrar {
    bus: Arc<SubscriptionBus>,
}

impl BusRegistrar {
    #[must_use]
    pub fn new(bus: Arc<SubscriptionBus>) -> Self {
        Self { bus }
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<SubscriptionBus> {
        &self.bus
    }
}

#[async_trait]
impl SourceRegistrar for BusRegistrar {
    async fn register(&self, request: SubscriptionRequest) {
        let kind = request.kind;
        let address = request.address;
        match self.bus.publish(request).await {
            PublishOutcome::Delivered(receivers) => {
                info!(kind = %kind, address = %address, receivers, "Registered event source");
            }
            PublishOutcome::Duplicate => {
                debug!(kind = %kind, address = %address, "Event source already registered");
            }
        }
    }
}
