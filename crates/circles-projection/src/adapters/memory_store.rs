use crate::domain::{EntityKey, EntityRecord, StoreError, Transfer};
use crate::ports::EntityStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::TxHash;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Default)]
struct Tables {
    records: BTreeMap<EntityKey, EntityRecord>,
    /// Secondary index: transaction hash -> transfer ids.
    transfers_by_tx: BTreeMap<TxHash, BTreeSet<String>>,
}

impl Tables {
    fn insert(&mut self, record: EntityRecord) {
        if let EntityRecord::Transfer(transfer) = &record {
            self.transfers_by_tx
                .entry(transfer.transaction_hash)
                .or_default()
                .insert(transfer.id.clone());
        }
        self.records.insert(record.key(), record);
    }
}

/// In-memory implementation of [`EntityStore`].
///
/// Ordered maps keep iteration deterministic, so two stores fed the same
/// events dump identical record lists.
#[derive(Default)]
pub struct InMemoryEntityStore {
    tables: RwLock<Tables>,
}

impl InMemoryEntityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record, ordered by key.
    #[must_use]
    pub fn dump(&self) -> Vec<EntityRecord> {
        self.tables.read().records.values().cloned().collect()
    }

    /// Record count per entity kind.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let tables = self.tables.read();
        let mut counts = BTreeMap::new();
        for key in tables.records.keys() {
            *counts.entry(key.kind()).or_insert(0) += 1;
        }
        counts
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.read().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.read().records.is_empty()
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn load(&self, key: &EntityKey) -> Result<Option<EntityRecord>, StoreError> {
        Ok(self.tables.read().records.get(key).cloned())
    }

    async fn save(&self, record: EntityRecord) -> Result<(), StoreError> {
        self.tables.write().insert(record);
        Ok(())
    }

    async fn save_all(&self, records: Vec<EntityRecord>) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        for record in records {
            tables.insert(record);
        }
        Ok(())
    }

    async fn transfers_in_transaction(&self, tx: &TxHash) -> Result<Vec<Transfer>, StoreError> {
        let tables = self.tables.read();
        let Some(ids) = tables.transfers_by_tx.get(tx) else {
            return Ok(Vec::new());
        };
        let mut transfers: Vec<Transfer> = ids
            .iter()
            .filter_map(|id| match tables.records.get(&EntityKey::Transfer(id.clone())) {
                Some(EntityRecord::Transfer(transfer)) => Some(transfer.clone()),
                _ => None,
            })
            .collect();
        transfers.sort_by(|a, b| a.log_index.cmp(&b.log_index).then_with(|| a.id.cmp(&b.id)));
        Ok(transfers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Provenance, ProtocolVersion, Stats, TransferType};
    use shared_types::{Address, U256};

    fn transfer(tx: TxHash, log_index: u32) -> Transfer {
        Transfer {
            id: crate::domain::transfer_id(&tx, log_index),
            transaction_hash: tx,
            log_index,
            from: Address::ZERO,
            to: Address::new([1; 20]),
            operator: None,
            value: U256::from(10),
            token: "1".into(),
            transfer_type: TransferType::TransferSingle,
            version: ProtocolVersion::V2,
            is_part_of_stream_or_hub: false,
            demurrage_from_id: None,
            demurrage_to_id: None,
            metri_fee_id: None,
            safe_tx_hash: None,
            provenance: Provenance::default(),
        }
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = InMemoryEntityStore::new();
        store
            .save(EntityRecord::Stats(Stats {
                signups: 2,
                ..Default::default()
            }))
            .await
            .unwrap();

        let loaded = store.load(&EntityKey::Stats).await.unwrap();
        assert!(matches!(loaded, Some(EntityRecord::Stats(s)) if s.signups == 2));
    }

    #[tokio::test]
    async fn test_transfers_by_transaction_sorted() {
        let store = InMemoryEntityStore::new();
        let tx = TxHash::new([1; 32]);
        let other = TxHash::new([2; 32]);

        store.save(EntityRecord::Transfer(transfer(tx, 11))).await.unwrap();
        store.save(EntityRecord::Transfer(transfer(tx, 2))).await.unwrap();
        store.save(EntityRecord::Transfer(transfer(other, 5))).await.unwrap();

        let found = store.transfers_in_transaction(&tx).await.unwrap();
        let logs: Vec<u32> = found.iter().map(|t| t.log_index).collect();
        assert_eq!(logs, vec![2, 11]);
        assert_eq!(store.counts().get("Transfer"), Some(&3));
    }

    #[tokio::test]
    async fn test_save_all_indexes_every_record() {
        let store = InMemoryEntityStore::new();
        let tx = TxHash::new([4; 32]);

        store
            .save_all(vec![
                EntityRecord::Transfer(transfer(tx, 3)),
                EntityRecord::Transfer(transfer(tx, 1)),
                EntityRecord::Stats(Stats::default()),
            ])
            .await
            .unwrap();

        assert_eq!(store.len(), 3);
        let logs: Vec<u32> = store
            .transfers_in_transaction(&tx)
            .await
            .unwrap()
            .iter()
            .map(|t| t.log_index)
            .collect();
        assert_eq!(logs, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_typed_lookup_mismatch() {
        let store = InMemoryEntityStore::new();
        let tx = TxHash::new([3; 32]);
        let t = transfer(tx, 0);
        let id = t.id.clone();
        store.save(EntityRecord::Transfer(t)).await.unwrap();

        assert!(store.transfer(&id).await.unwrap().is_some());
        assert!(store.token(&id).await.unwrap().is_none());
    }
}
