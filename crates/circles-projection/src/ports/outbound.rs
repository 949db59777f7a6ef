//! Outbound Ports (Driven Ports)
//!
//! Collaborators the projection depends on. Profile resolution uses
//! [`shared_types::ProfileResolver`].

use crate::domain::{
    Avatar, AvatarBalance, EntityKey, EntityRecord, StoreError, Token, Transfer, TrustRelation,
};
use async_trait::async_trait;
use shared_types::{Address, SubscriptionRequest, TxHash};

/// Persistent entity storage.
///
/// Reads and writes issued by one caller are causally ordered; a read that
/// follows a completed `save` observes it.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Point lookup.
    async fn load(&self, key: &EntityKey) -> Result<Option<EntityRecord>, StoreError>;

    /// Upsert.
    async fn save(&self, record: EntityRecord) -> Result<(), StoreError>;

    /// Upserts every record or none of them.
    ///
    /// On `Err` the store must be unchanged, so the caller can apply the
    /// same event again.
    async fn save_all(&self, records: Vec<EntityRecord>) -> Result<(), StoreError>;

    /// All transfers sharing a transaction hash, ascending by log index.
    async fn transfers_in_transaction(&self, tx: &TxHash) -> Result<Vec<Transfer>, StoreError>;

    async fn avatar(&self, id: &Address) -> Result<Option<Avatar>, StoreError> {
        let key = EntityKey::Avatar(*id);
        match self.load(&key).await? {
            Some(EntityRecord::Avatar(avatar)) => Ok(Some(avatar)),
            Some(other) => Err(mismatch(key, &other)),
            None => Ok(None),
        }
    }

    async fn token(&self, id: &str) -> Result<Option<Token>, StoreError> {
        let key = EntityKey::Token(id.to_string());
        match self.load(&key).await? {
            Some(EntityRecord::Token(token)) => Ok(Some(token)),
            Some(other) => Err(mismatch(key, &other)),
            None => Ok(None),
        }
    }

    async fn trust_relation(&self, id: &str) -> Result<Option<TrustRelation>, StoreError> {
        let key = EntityKey::Trust(id.to_string());
        match self.load(&key).await? {
            Some(EntityRecord::Trust(trust)) => Ok(Some(trust)),
            Some(other) => Err(mismatch(key, &other)),
            None => Ok(None),
        }
    }

    async fn balance(&self, id: &str) -> Result<Option<AvatarBalance>, StoreError> {
        let key = EntityKey::Balance(id.to_string());
        match self.load(&key).await? {
            Some(EntityRecord::Balance(balance)) => Ok(Some(balance)),
            Some(other) => Err(mismatch(key, &other)),
            None => Ok(None),
        }
    }

    async fn transfer(&self, id: &str) -> Result<Option<Transfer>, StoreError> {
        let key = EntityKey::Transfer(id.to_string());
        match self.load(&key).await? {
            Some(EntityRecord::Transfer(transfer)) => Ok(Some(transfer)),
            Some(other) => Err(mismatch(key, &other)),
            None => Ok(None),
        }
    }
}

pub(crate) fn mismatch(key: EntityKey, found: &EntityRecord) -> StoreError {
    StoreError::TypeMismatch {
        found: found.key().kind(),
        key,
    }
}

/// Receives dynamic event-source registrations.
#[async_trait]
pub trait SourceRegistrar: Send + Sync {
    /// Register a new source. Idempotent per `(kind, address)`.
    async fn register(&self, request: SubscriptionRequest);
}
