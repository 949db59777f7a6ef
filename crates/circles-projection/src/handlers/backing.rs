//! CirclesBacking lifecycle: initiated by a backer, completed once the
//! liquidity bootstrapping pool exists.

use crate::domain::{CirclesBacking, EntityRecord, ProjectionError};
use crate::events::EventEnvelope;
use crate::snapshot::Snapshot;
use shared_types::Address;
use tracing::debug;

pub fn initiated(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    backer: &Address,
    instance: &Address,
    backing_asset: &Address,
    personal_circles_address: &Address,
) -> Result<(), ProjectionError> {
    let lbp_address = snapshot.backing(instance)?.and_then(|existing| existing.lbp_address);
    snapshot.put(EntityRecord::CirclesBacking(CirclesBacking {
        id: *instance,
        backer: *backer,
        backing_asset: *backing_asset,
        personal_circles_address: *personal_circles_address,
        lbp_address,
        initiated_in: envelope.transaction_hash,
        provenance: envelope.provenance(),
    }));
    Ok(())
}

pub fn completed(
    snapshot: &mut Snapshot,
    instance: &Address,
    lbp: &Address,
) -> Result<(), ProjectionError> {
    match snapshot.backing_mut(instance)? {
        Some(backing) => backing.lbp_address = Some(*lbp),
        None => debug!(instance = %instance, "Completion for unknown backing instance"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntityKey;
    use crate::events::CirclesEvent;
    use shared_types::TxHash;
    use std::collections::BTreeMap;

    #[test]
    fn test_initiate_then_complete() {
        let instance = Address::new([4; 20]);
        let mut records = BTreeMap::new();
        records.insert(EntityKey::CirclesBacking(instance), None);
        let mut snap = Snapshot::from_parts(records, None, None, None);

        let envelope = EventEnvelope {
            block_number: 1,
            block_timestamp: 1,
            transaction_hash: TxHash::new([1; 32]),
            transaction_index: 0,
            log_index: 0,
            source: Address::ZERO,
            event: CirclesEvent::CreateVault {
                group: Address::ZERO,
                vault: Address::ZERO,
            },
        };
        let backer = Address::new([1; 20]);
        initiated(&mut snap, &envelope, &backer, &instance, &Address::new([2; 20]), &Address::new([3; 20]))
            .unwrap();
        completed(&mut snap, &instance, &Address::new([5; 20])).unwrap();

        let backing = snap.backing(&instance).unwrap().unwrap();
        assert_eq!(backing.backer, backer);
        assert_eq!(backing.lbp_address, Some(Address::new([5; 20])));
        assert_eq!(backing.initiated_in, TxHash::new([1; 32]));
    }

    #[test]
    fn test_completion_without_initiation_is_noop() {
        let instance = Address::new([4; 20]);
        let mut records = BTreeMap::new();
        records.insert(EntityKey::CirclesBacking(instance), None);
        let mut snap = Snapshot::from_parts(records, None, None, None);

        completed(&mut snap, &instance, &Address::new([5; 20])).unwrap();
        assert_eq!(snap.dirty_count(), 0);
    }
}
