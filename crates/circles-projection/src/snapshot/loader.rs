//! # Loaders
//!
//! The read phase. [`read_set`] declares, per event, every record the
//! handler may touch; [`load`] fetches them concurrently together with the
//! same-transaction transfers and any profile lookup.

use super::Snapshot;
use crate::domain::{
    balance_id, contract_token_id, erc1155_token_id, trust_id, EntityKey, ProjectionError,
    ProtocolVersion,
};
use crate::events::{CirclesEvent, EventEnvelope};
use crate::ports::EntityStore;
use futures::future::{join, try_join, try_join_all};
use shared_types::{Address, ProfileResolver, TxHash};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Profile lookup to run during the read phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileLookup {
    #[default]
    None,
    /// V1: by avatar address.
    Address(Address),
    /// V2: by name-registry digest.
    Digest(TxHash),
}

/// What the handler for one event needs loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadSet {
    pub keys: BTreeSet<EntityKey>,
    /// Load every transfer of the event's transaction.
    pub transaction_transfers: bool,
    pub profile: ProfileLookup,
}

impl ReadSet {
    fn key(&mut self, key: EntityKey) -> &mut Self {
        self.keys.insert(key);
        self
    }

    fn avatar(&mut self, id: &Address) -> &mut Self {
        self.key(EntityKey::Avatar(*id))
    }

    fn transfers(&mut self) -> &mut Self {
        self.transaction_transfers = true;
        self
    }

    /// Everything a single transfer leg touches.
    fn transfer_leg(&mut self, envelope: &EventEnvelope, from: &Address, to: &Address, token: String) -> &mut Self {
        self.key(EntityKey::Transaction(envelope.transaction_hash));
        for participant in [from, to] {
            if !participant.is_zero() {
                self.key(EntityKey::Balance(balance_id(participant, &token)));
                self.avatar(participant);
            }
        }
        self.key(EntityKey::Token(token))
    }

    fn trust_pair(&mut self, truster: &Address, trustee: &Address, version: ProtocolVersion) -> &mut Self {
        self.key(EntityKey::Trust(trust_id(truster, trustee, version)))
            .key(EntityKey::Trust(trust_id(trustee, truster, version)))
            .avatar(truster)
            .avatar(trustee)
    }
}

/// Declares the read set for an event.
#[must_use]
pub fn read_set(envelope: &EventEnvelope) -> ReadSet {
    let mut set = ReadSet::default();
    set.key(EntityKey::Stats);

    match &envelope.event {
        CirclesEvent::Signup { user, token } => {
            set.avatar(user)
                .key(EntityKey::Token(contract_token_id(token)))
                .key(EntityKey::Profile(*user));
            set.profile = ProfileLookup::Address(*user);
        }
        CirclesEvent::OrganizationSignup { organization } => {
            set.avatar(organization);
        }
        CirclesEvent::HubTrust {
            can_send_to, user, ..
        } => {
            set.trust_pair(can_send_to, user, ProtocolVersion::V1);
        }
        CirclesEvent::HubTransfer { .. }
        | CirclesEvent::StreamCompleted { .. }
        | CirclesEvent::GroupMintSingle { .. }
        | CirclesEvent::GroupMintBatch { .. }
        | CirclesEvent::GroupRedeem { .. }
        | CirclesEvent::GroupRedeemCollateralBurn { .. }
        | CirclesEvent::GroupRedeemCollateralReturn { .. } => {
            set.transfers();
        }
        CirclesEvent::PersonalTransfer { from, to, .. }
        | CirclesEvent::WrapperTransfer { from, to, .. } => {
            set.transfer_leg(envelope, from, to, contract_token_id(&envelope.source));
        }
        CirclesEvent::RegisterHuman { avatar, .. } => {
            set.avatar(avatar);
        }
        CirclesEvent::RegisterOrganization { organization, .. } => {
            set.avatar(organization).key(EntityKey::Profile(*organization));
        }
        CirclesEvent::RegisterGroup { group, .. } => {
            set.avatar(group).key(EntityKey::Profile(*group));
        }
        CirclesEvent::Trust {
            truster, trustee, ..
        } => {
            set.trust_pair(truster, trustee, ProtocolVersion::V2)
                .trust_pair(truster, trustee, ProtocolVersion::V1);
        }
        CirclesEvent::TransferSingle { from, to, id, .. } => {
            set.transfer_leg(envelope, from, to, erc1155_token_id(id));
        }
        CirclesEvent::TransferBatch { from, to, ids, .. } => {
            for id in ids {
                set.transfer_leg(envelope, from, to, erc1155_token_id(id));
            }
        }
        CirclesEvent::PersonalMint { human, .. } => {
            set.avatar(human).transfers();
        }
        CirclesEvent::DiscountCost { account, .. } => {
            set.avatar(account).transfers();
        }
        CirclesEvent::UpdateMetadataDigest {
            avatar,
            metadata_digest,
        } => {
            set.avatar(avatar).key(EntityKey::Profile(*avatar));
            set.profile = ProfileLookup::Digest(*metadata_digest);
        }
        CirclesEvent::Erc20WrapperDeployed {
            avatar,
            erc20_wrapper,
            ..
        } => {
            set.avatar(avatar)
                .key(EntityKey::Token(contract_token_id(erc20_wrapper)));
        }
        CirclesEvent::DepositDemurraged { account, .. }
        | CirclesEvent::WithdrawDemurraged { account, .. }
        | CirclesEvent::DepositInflationary { account, .. }
        | CirclesEvent::WithdrawInflationary { account, .. } => {
            let token = contract_token_id(&envelope.source);
            set.key(EntityKey::Balance(balance_id(account, &token)))
                .key(EntityKey::Token(token));
        }
        CirclesEvent::CreateVault { .. } => {}
        CirclesEvent::ExecutionSuccess { .. } => {
            set.key(EntityKey::Transaction(envelope.transaction_hash))
                .transfers();
        }
        CirclesEvent::CirclesBackingInitiated {
            circles_backing_instance,
            ..
        }
        | CirclesEvent::CirclesBackingCompleted {
            circles_backing_instance,
            ..
        } => {
            set.key(EntityKey::CirclesBacking(*circles_backing_instance));
        }
    }

    set
}

/// Executes a read set. All lookups run concurrently and all complete
/// before the snapshot is returned.
pub async fn load(
    store: &dyn EntityStore,
    resolver: &dyn ProfileResolver,
    read_set: ReadSet,
    transaction: &TxHash,
) -> Result<Snapshot, ProjectionError> {
    let keys: Vec<EntityKey> = read_set.keys.into_iter().collect();

    let records = try_join_all(keys.iter().map(|key| store.load(key)));
    let transfers = async {
        if read_set.transaction_transfers {
            store.transfers_in_transaction(transaction).await.map(Some)
        } else {
            Ok(None)
        }
    };
    let profile = async {
        match read_set.profile {
            ProfileLookup::None => (None, None),
            ProfileLookup::Address(address) => (resolver.resolve_address(&address).await, None),
            ProfileLookup::Digest(digest) => (None, Some(resolver.resolve_digest(&digest).await)),
        }
    };

    let (stored, (address_profile, digest)) = join(try_join(records, transfers), profile).await;
    let (records, transfers) = stored?;

    debug!(
        keys = keys.len(),
        transfers = transfers.as_ref().map_or(0, Vec::len),
        "Read phase complete"
    );

    let records: BTreeMap<EntityKey, _> = keys.into_iter().zip(records).collect();
    Ok(Snapshot::from_parts(records, transfers, address_profile, digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::U256;

    fn envelope(event: CirclesEvent) -> EventEnvelope {
        EventEnvelope {
            block_number: 1,
            block_timestamp: 100,
            transaction_hash: TxHash::new([9; 32]),
            transaction_index: 0,
            log_index: 0,
            source: Address::new([0xcc; 20]),
            event,
        }
    }

    #[test]
    fn test_mint_leg_skips_zero_sentinel() {
        let to = Address::new([1; 20]);
        let set = read_set(&envelope(CirclesEvent::PersonalTransfer {
            from: Address::ZERO,
            to,
            amount: U256::from(5),
        }));
        let token = contract_token_id(&Address::new([0xcc; 20]));

        assert!(set.keys.contains(&EntityKey::Balance(balance_id(&to, &token))));
        assert!(!set.keys.contains(&EntityKey::Balance(balance_id(&Address::ZERO, &token))));
        assert!(!set.keys.contains(&EntityKey::Avatar(Address::ZERO)));
        assert!(set.keys.contains(&EntityKey::Token(token)));
    }

    #[test]
    fn test_v2_trust_declares_both_v1_edges() {
        let truster = Address::new([1; 20]);
        let trustee = Address::new([2; 20]);
        let set = read_set(&envelope(CirclesEvent::Trust {
            truster,
            trustee,
            expiry_time: U256::MAX,
        }));

        assert!(set
            .keys
            .contains(&EntityKey::Trust(trust_id(&truster, &trustee, ProtocolVersion::V1))));
        assert!(set
            .keys
            .contains(&EntityKey::Trust(trust_id(&trustee, &truster, ProtocolVersion::V1))));
        assert!(set
            .keys
            .contains(&EntityKey::Trust(trust_id(&trustee, &truster, ProtocolVersion::V2))));
    }

    #[test]
    fn test_enrichment_events_load_transaction_transfers() {
        let set = read_set(&envelope(CirclesEvent::StreamCompleted {
            operator: Address::ZERO,
            from: Address::ZERO,
            to: Address::ZERO,
            ids: vec![],
            amounts: vec![],
        }));
        assert!(set.transaction_transfers);
        assert_eq!(set.profile, ProfileLookup::None);
    }

    #[test]
    fn test_digest_update_requests_lookup() {
        let digest = TxHash::new([5; 32]);
        let set = read_set(&envelope(CirclesEvent::UpdateMetadataDigest {
            avatar: Address::new([3; 20]),
            metadata_digest: digest,
        }));
        assert_eq!(set.profile, ProfileLookup::Digest(digest));
    }
}
