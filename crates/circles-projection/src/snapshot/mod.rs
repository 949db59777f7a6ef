//! # Event Snapshot
//!
//! The working set of one event: every record its loader declared, the
//! same-transaction transfers when requested, and any resolved profile.
//!
//! Handlers read and mutate the snapshot synchronously. Mutations are staged
//! as dirty keys and handed to the store only after the handler returns, so
//! no handler ever observes a half-written state of its own event.

pub mod loader;

use crate::domain::{
    Avatar, AvatarBalance, CirclesBacking, EntityKey, EntityRecord, LoadedToken, Profile,
    ProjectionError, Stats, Token, Transaction, Transfer, TrustRelation,
};
use shared_types::{
    Address, ProfileMetadata, ResolvedDigest, SourceKind, SubscriptionRequest, TxHash,
};
use std::collections::{BTreeMap, BTreeSet};

pub use loader::{load, read_set, ProfileLookup, ReadSet};

/// Records staged for commit plus the subscriptions to publish after it.
#[derive(Debug, Default)]
pub struct Changes {
    pub records: Vec<EntityRecord>,
    pub subscriptions: Vec<SubscriptionRequest>,
}

#[derive(Debug, Default)]
pub struct Snapshot {
    /// Declared keys; `None` means "loaded, absent".
    records: BTreeMap<EntityKey, Option<EntityRecord>>,
    dirty: BTreeSet<EntityKey>,
    /// Ids of the transaction's transfers, ascending by log index.
    /// `None` when the loader did not ask for them.
    transaction_transfers: Option<Vec<String>>,
    address_profile: Option<ProfileMetadata>,
    digest: Option<ResolvedDigest>,
    subscriptions: Vec<SubscriptionRequest>,
}

macro_rules! typed_entity {
    ($get:ident, $get_mut:ident, $variant:ident, $ty:ty, $id:ident: $id_ty:ty => $key:expr) => {
        pub fn $get(&self, $id: $id_ty) -> Result<Option<&$ty>, ProjectionError> {
            Ok(match self.record(&$key)? {
                Some(EntityRecord::$variant(entity)) => Some(entity),
                _ => None,
            })
        }

        /// Mutable access; marks the record dirty when present.
        pub fn $get_mut(&mut self, $id: $id_ty) -> Result<Option<&mut $ty>, ProjectionError> {
            Ok(match self.record_mut($key)? {
                Some(EntityRecord::$variant(entity)) => Some(entity),
                _ => None,
            })
        }
    };
}

impl Snapshot {
    pub(crate) fn from_parts(
        records: BTreeMap<EntityKey, Option<EntityRecord>>,
        transfers: Option<Vec<Transfer>>,
        address_profile: Option<ProfileMetadata>,
        digest: Option<ResolvedDigest>,
    ) -> Self {
        let mut snapshot = Self {
            records,
            address_profile,
            digest,
            ..Default::default()
        };
        if let Some(transfers) = transfers {
            let mut ids = Vec::with_capacity(transfers.len());
            for transfer in transfers {
                ids.push(transfer.id.clone());
                snapshot.records.insert(
                    EntityKey::Transfer(transfer.id.clone()),
                    Some(EntityRecord::Transfer(transfer)),
                );
            }
            snapshot.transaction_transfers = Some(ids);
        }
        snapshot
    }

    fn record(&self, key: &EntityKey) -> Result<Option<&EntityRecord>, ProjectionError> {
        self.records
            .get(key)
            .map(Option::as_ref)
            .ok_or_else(|| ProjectionError::UndeclaredRead(key.clone()))
    }

    fn record_mut(&mut self, key: EntityKey) -> Result<Option<&mut EntityRecord>, ProjectionError> {
        match self.records.get_mut(&key) {
            None => Err(ProjectionError::UndeclaredRead(key)),
            Some(slot) => {
                if slot.is_some() {
                    self.dirty.insert(key);
                }
                Ok(slot.as_mut())
            }
        }
    }

    /// Stage a record for commit, replacing whatever is under its key.
    pub fn put(&mut self, record: EntityRecord) {
        let key = record.key();
        self.dirty.insert(key.clone());
        self.records.insert(key, Some(record));
    }

    typed_entity!(avatar, avatar_mut, Avatar, Avatar, id: &Address => EntityKey::Avatar(*id));
    typed_entity!(trust, trust_mut, Trust, TrustRelation, id: &str => EntityKey::Trust(id.to_string()));
    typed_entity!(balance, balance_mut, Balance, AvatarBalance, id: &str => EntityKey::Balance(id.to_string()));
    typed_entity!(transfer, transfer_mut, Transfer, Transfer, id: &str => EntityKey::Transfer(id.to_string()));
    typed_entity!(transaction, transaction_mut, Transaction, Transaction, id: &TxHash => EntityKey::Transaction(*id));
    typed_entity!(profile, profile_mut, Profile, Profile, id: &Address => EntityKey::Profile(*id));
    typed_entity!(backing, backing_mut, CirclesBacking, CirclesBacking, id: &Address => EntityKey::CirclesBacking(*id));

    /// Token lookup resolved to a tagged result.
    pub fn token(&self, id: &str) -> Result<LoadedToken, ProjectionError> {
        Ok(match self.record(&EntityKey::Token(id.to_string()))? {
            Some(EntityRecord::Token(token)) => LoadedToken::Known(token.clone()),
            _ => LoadedToken::Placeholder { id: id.to_string() },
        })
    }

    pub fn put_token(&mut self, token: Token) {
        self.put(EntityRecord::Token(token));
    }

    /// Network counters, created on first use.
    pub fn stats_mut(&mut self) -> Result<&mut Stats, ProjectionError> {
        if self.record(&EntityKey::Stats)?.is_none() {
            self.put(EntityRecord::Stats(Stats::default()));
        }
        match self.record_mut(EntityKey::Stats)? {
            Some(EntityRecord::Stats(stats)) => Ok(stats),
            _ => Err(ProjectionError::UndeclaredRead(EntityKey::Stats)),
        }
    }

    /// Ids of the transaction's transfers loaded for this event.
    pub fn transaction_transfer_ids(&self) -> Result<&[String], ProjectionError> {
        self.transaction_transfers.as_deref().ok_or_else(|| {
            ProjectionError::UndeclaredRead(EntityKey::Transfer("<transaction>".to_string()))
        })
    }

    /// Profile found for the event's address lookup.
    #[must_use]
    pub fn address_profile(&self) -> Option<&ProfileMetadata> {
        self.address_profile.as_ref()
    }

    /// Result of the event's digest lookup.
    #[must_use]
    pub fn digest(&self) -> Option<&ResolvedDigest> {
        self.digest.as_ref()
    }

    /// Queue a source registration for publication after commit.
    pub fn request_source(&mut self, kind: SourceKind, address: Address, from_block: u64) {
        let request = SubscriptionRequest::new(kind, address, from_block);
        if !self.subscriptions.iter().any(|r| r.key() == request.key()) {
            self.subscriptions.push(request);
        }
    }

    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Dirty records in key order, plus queued subscriptions.
    #[must_use]
    pub fn into_changes(mut self) -> Changes {
        let records = std::mem::take(&mut self.dirty)
            .into_iter()
            .filter_map(|key| self.records.remove(&key).flatten())
            .collect();
        Changes {
            records,
            subscriptions: self.subscriptions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AvatarType, ProtocolVersion, Provenance};

    fn declared(keys: Vec<EntityKey>) -> Snapshot {
        Snapshot::from_parts(
            keys.into_iter().map(|k| (k, None)).collect(),
            None,
            None,
            None,
        )
    }

    #[test]
    fn test_undeclared_read_is_an_error() {
        let snap = declared(vec![]);
        let err = snap.avatar(&Address::ZERO).unwrap_err();
        assert!(matches!(err, ProjectionError::UndeclaredRead(EntityKey::Avatar(_))));
    }

    #[test]
    fn test_put_then_mutate_is_committed_once() {
        let id = Address::new([1; 20]);
        let mut snap = declared(vec![EntityKey::Avatar(id)]);
        assert!(snap.avatar(&id).unwrap().is_none());

        snap.put(EntityRecord::Avatar(Avatar::new(
            id,
            AvatarType::Signup,
            ProtocolVersion::V1,
            Provenance::default(),
        )));
        snap.avatar_mut(&id).unwrap().unwrap().trusts_given_count = 4;

        let changes = snap.into_changes();
        assert_eq!(changes.records.len(), 1);
        assert!(matches!(
            &changes.records[0],
            EntityRecord::Avatar(a) if a.trusts_given_count == 4
        ));
    }

    #[test]
    fn test_missing_token_is_placeholder() {
        let snap = declared(vec![EntityKey::Token("42".into())]);
        assert_eq!(
            snap.token("42").unwrap(),
            LoadedToken::Placeholder { id: "42".into() }
        );
    }

    #[test]
    fn test_stats_created_on_first_use() {
        let mut snap = declared(vec![EntityKey::Stats]);
        snap.stats_mut().unwrap().signups += 1;
        snap.stats_mut().unwrap().signups += 1;

        let changes = snap.into_changes();
        assert!(matches!(
            changes.records.as_slice(),
            [EntityRecord::Stats(s)] if s.signups == 2
        ));
    }

    #[test]
    fn test_subscriptions_deduplicated_within_event() {
        let mut snap = declared(vec![]);
        let addr = Address::new([2; 20]);
        snap.request_source(SourceKind::SafeAccount, addr, 1);
        snap.request_source(SourceKind::SafeAccount, addr, 1);
        assert_eq!(snap.into_changes().subscriptions.len(), 1);
    }
}
