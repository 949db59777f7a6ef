//! Inbound Ports (Driving Ports)
//!
//! The API the indexer runtime uses to feed events into the projection.

use crate::domain::{EventPosition, ProjectionError};
use crate::events::EventEnvelope;
use crate::service::ProcessOutcome;
use async_trait::async_trait;

/// Projection engine API.
#[async_trait]
pub trait ProjectionApi: Send + Sync {
    /// Apply one event. Events must arrive in strictly increasing position.
    async fn process(&self, envelope: EventEnvelope) -> Result<ProcessOutcome, ProjectionError>;

    /// Position of the last applied event, if any.
    async fn last_position(&self) -> Option<EventPosition>;
}
