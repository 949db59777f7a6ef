use super::entities::EventPosition;
use super::keys::EntityKey;
use thiserror::Error;

/// Failures of the entity store adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Record under {key} has unexpected type {found}")]
    TypeMismatch { key: EntityKey, found: &'static str },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Event out of order: last processed {last:?}, received {received:?}")]
    OutOfOrder {
        last: EventPosition,
        received: EventPosition,
    },

    /// A handler touched a key its loader did not declare.
    #[error("Undeclared read of {0}")]
    UndeclaredRead(EntityKey),
}
