//! # Trust Graph
//!
//! Directed trust edges with mutuality and V1→V2 migration flags.
//!
//! Mutuality is maintained one hop at a time: writing A→B only ever touches
//! B→A, never anything further out.

use crate::domain::{
    trust_id, Avatar, AvatarType, EntityRecord, ProjectionError, ProtocolVersion, Provenance,
    TrustRelation,
};
use crate::snapshot::Snapshot;
use shared_types::{Address, U256};
use tracing::debug;

/// Trust limit recorded for every V2 edge: 100 CRC in 18-decimal fixed point.
pub fn v2_trust_limit() -> U256 {
    U256::from(100u64) * U256::exp10(18)
}

/// A decoded trust-set event, normalised across protocol versions.
#[derive(Debug, Clone, Copy)]
pub struct TrustChange {
    pub truster: Address,
    pub trustee: Address,
    pub version: ProtocolVersion,
    pub limit: U256,
    pub expiry_time: U256,
    pub untrust: bool,
}

impl TrustChange {
    /// V1 `Trust(canSendTo, user, limit)`: `can_send_to` trusts `user`.
    /// A zero limit revokes.
    #[must_use]
    pub fn v1(can_send_to: Address, user: Address, limit: U256) -> Self {
        Self {
            truster: can_send_to,
            trustee: user,
            version: ProtocolVersion::V1,
            limit,
            expiry_time: U256::MAX,
            untrust: limit.is_zero(),
        }
    }

    /// V2 `Trust(truster, trustee, expiryTime)`. An expiry less than
    /// `grace_secs` past the block timestamp revokes.
    #[must_use]
    pub fn v2(
        truster: Address,
        trustee: Address,
        expiry_time: U256,
        block_timestamp: u64,
        grace_secs: u64,
    ) -> Self {
        let threshold = U256::from(block_timestamp).saturating_add(U256::from(grace_secs));
        Self {
            truster,
            trustee,
            version: ProtocolVersion::V2,
            limit: v2_trust_limit(),
            expiry_time,
            untrust: expiry_time < threshold,
        }
    }
}

pub fn apply(
    snapshot: &mut Snapshot,
    change: TrustChange,
    provenance: Provenance,
) -> Result<(), ProjectionError> {
    if change.truster == change.trustee {
        debug!(avatar = %change.truster, "Ignoring self-trust");
        return Ok(());
    }

    let forward_id = trust_id(&change.truster, &change.trustee, change.version);
    let opposite_id = trust_id(&change.trustee, &change.truster, change.version);
    let forward = snapshot.trust(&forward_id)?.cloned();
    let was_active = forward.as_ref().is_some_and(TrustRelation::is_active);

    if change.untrust {
        return revoke(snapshot, &change, forward, &opposite_id, was_active, provenance);
    }

    let is_mutual = snapshot
        .trust(&opposite_id)?
        .is_some_and(TrustRelation::is_active);
    if is_mutual {
        if let Some(opposite) = snapshot.trust_mut(&opposite_id)? {
            opposite.is_mutual = true;
        }
    }

    let is_new = forward.is_none();
    let is_migrated = forward.as_ref().is_some_and(|edge| edge.is_migrated);
    snapshot.put(EntityRecord::Trust(TrustRelation {
        id: forward_id,
        truster: change.truster,
        trustee: change.trustee,
        limit: change.limit,
        expiry_time: change.expiry_time,
        is_mutual,
        is_migrated,
        version: change.version,
        provenance,
    }));

    if !was_active {
        count_grant(snapshot, &change, provenance)?;
    }

    if change.version == ProtocolVersion::V2 {
        mark_pair_migrated(snapshot, &change.truster, &change.trustee)?;
    }

    if is_new {
        snapshot.stats_mut()?.trusts += 1;
    }
    Ok(())
}

/// Flags both V1 edges between `a` and `b`, in either direction.
fn mark_pair_migrated(
    snapshot: &mut Snapshot,
    a: &Address,
    b: &Address,
) -> Result<(), ProjectionError> {
    for legacy_id in [
        trust_id(a, b, ProtocolVersion::V1),
        trust_id(b, a, ProtocolVersion::V1),
    ] {
        let pending = snapshot
            .trust(&legacy_id)?
            .is_some_and(|legacy| !legacy.is_migrated);
        if pending {
            if let Some(legacy) = snapshot.trust_mut(&legacy_id)? {
                legacy.is_migrated = true;
            }
        }
    }
    Ok(())
}

fn revoke(
    snapshot: &mut Snapshot,
    change: &TrustChange,
    forward: Option<TrustRelation>,
    opposite_id: &str,
    was_active: bool,
    provenance: Provenance,
) -> Result<(), ProjectionError> {
    if let Some(mut edge) = forward {
        edge.limit = U256::zero();
        edge.expiry_time = U256::zero();
        edge.is_mutual = false;
        edge.provenance = provenance;
        snapshot.put(EntityRecord::Trust(edge));
    }

    if let Some(opposite) = snapshot.trust(opposite_id)? {
        if opposite.is_mutual {
            if let Some(opposite) = snapshot.trust_mut(opposite_id)? {
                opposite.is_mutual = false;
            }
        }
    }

    if was_active {
        if let Some(trustee) = snapshot.avatar_mut(&change.trustee)? {
            trustee.trust_revoked();
        }
        if let Some(truster) = snapshot.avatar_mut(&change.truster)? {
            truster.trusts_given_count = truster.trusts_given_count.saturating_sub(1);
        }
    }
    Ok(())
}

/// Counter updates for an edge turning active. A V2 grant to an address
/// with no avatar yet creates an `Invite` avatar for it.
fn count_grant(
    snapshot: &mut Snapshot,
    change: &TrustChange,
    provenance: Provenance,
) -> Result<(), ProjectionError> {
    match snapshot.avatar_mut(&change.trustee)? {
        Some(trustee) => trustee.trust_received(),
        None if change.version == ProtocolVersion::V2 => {
            let mut invited = Avatar::new(
                change.trustee,
                AvatarType::Invite,
                ProtocolVersion::V2,
                provenance,
            );
            invited.invited_by = Some(change.truster);
            invited.trust_received();
            snapshot.put(EntityRecord::Avatar(invited));
        }
        None => {}
    }

    if let Some(truster) = snapshot.avatar_mut(&change.truster)? {
        truster.trusts_given_count += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntityKey;
    use std::collections::BTreeMap;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    fn snapshot_for(a: Address, b: Address, existing: Vec<EntityRecord>) -> Snapshot {
        let mut records: BTreeMap<EntityKey, Option<EntityRecord>> = BTreeMap::new();
        for version in [ProtocolVersion::V1, ProtocolVersion::V2] {
            records.insert(EntityKey::Trust(trust_id(&a, &b, version)), None);
            records.insert(EntityKey::Trust(trust_id(&b, &a, version)), None);
        }
        records.insert(EntityKey::Avatar(a), None);
        records.insert(EntityKey::Avatar(b), None);
        records.insert(EntityKey::Stats, None);
        for record in existing {
            records.insert(record.key(), Some(record));
        }
        Snapshot::from_parts(records, None, None, None)
    }

    #[test]
    fn test_v2_threshold() {
        let near = TrustChange::v2(addr(1), addr(2), U256::from(1_000 + 3_599), 1_000, 3_600);
        let far = TrustChange::v2(addr(1), addr(2), U256::from(1_000 + 3_600), 1_000, 3_600);
        assert!(near.untrust);
        assert!(!far.untrust);
        assert!(!TrustChange::v2(addr(1), addr(2), U256::MAX, u64::MAX, 3_600).untrust);
    }

    #[test]
    fn test_self_trust_ignored() {
        let a = addr(1);
        let mut snap = snapshot_for(a, a, vec![]);
        apply(&mut snap, TrustChange::v1(a, a, U256::from(50)), Provenance::default()).unwrap();
        assert_eq!(snap.dirty_count(), 0);
    }

    #[test]
    fn test_v2_grant_invites_unknown_trustee() {
        let (a, b) = (addr(1), addr(2));
        let mut snap = snapshot_for(a, b, vec![]);
        apply(
            &mut snap,
            TrustChange::v2(a, b, U256::MAX, 0, 3_600),
            Provenance::default(),
        )
        .unwrap();

        let invited = snap.avatar(&b).unwrap().unwrap();
        assert_eq!(invited.avatar_type, AvatarType::Invite);
        assert_eq!(invited.invited_by, Some(a));
        assert_eq!(invited.trusts_received_count, 1);

        let edge = snap.trust(&trust_id(&a, &b, ProtocolVersion::V2)).unwrap().unwrap();
        assert_eq!(edge.limit, v2_trust_limit());
    }

    #[test]
    fn test_v2_grant_marks_v1_edge_migrated() {
        let (a, b) = (addr(1), addr(2));
        let legacy_id = trust_id(&a, &b, ProtocolVersion::V1);
        let legacy = TrustRelation {
            id: legacy_id.clone(),
            truster: a,
            trustee: b,
            limit: U256::from(50),
            expiry_time: U256::MAX,
            is_mutual: false,
            is_migrated: false,
            version: ProtocolVersion::V1,
            provenance: Provenance::default(),
        };
        let mut snap = snapshot_for(a, b, vec![EntityRecord::Trust(legacy)]);
        apply(
            &mut snap,
            TrustChange::v2(a, b, U256::MAX, 0, 3_600),
            Provenance::default(),
        )
        .unwrap();

        assert!(snap.trust(&legacy_id).unwrap().unwrap().is_migrated);
    }

    #[test]
    fn test_v2_grant_marks_reverse_v1_edge_migrated() {
        let (a, b) = (addr(1), addr(2));
        let reverse_id = trust_id(&b, &a, ProtocolVersion::V1);
        let reverse = TrustRelation {
            id: reverse_id.clone(),
            truster: b,
            trustee: a,
            limit: U256::from(50),
            expiry_time: U256::MAX,
            is_mutual: false,
            is_migrated: false,
            version: ProtocolVersion::V1,
            provenance: Provenance::default(),
        };
        let mut snap = snapshot_for(a, b, vec![EntityRecord::Trust(reverse)]);
        apply(
            &mut snap,
            TrustChange::v2(a, b, U256::MAX, 0, 3_600),
            Provenance::default(),
        )
        .unwrap();

        assert!(snap.trust(&reverse_id).unwrap().unwrap().is_migrated);
        assert!(snap.trust(&trust_id(&a, &b, ProtocolVersion::V1)).unwrap().is_none());
    }

    #[test]
    fn test_repeated_grant_counts_once() {
        let (a, b) = (addr(1), addr(2));
        let mut snap = snapshot_for(
            a,
            b,
            vec![
                EntityRecord::Avatar(Avatar::new(a, AvatarType::Signup, ProtocolVersion::V1, Provenance::default())),
                EntityRecord::Avatar(Avatar::new(b, AvatarType::Signup, ProtocolVersion::V1, Provenance::default())),
            ],
        );
        apply(&mut snap, TrustChange::v1(a, b, U256::from(50)), Provenance::default()).unwrap();
        apply(&mut snap, TrustChange::v1(a, b, U256::from(80)), Provenance::default()).unwrap();

        assert_eq!(snap.avatar(&b).unwrap().unwrap().trusts_received_count, 1);
        assert_eq!(snap.avatar(&a).unwrap().unwrap().trusts_given_count, 1);
        assert_eq!(snap.stats_mut().unwrap().trusts, 1);
    }
}
