//! # Transfer Log
//!
//! Primitive value movements. Each leg writes one [`Transfer`], its
//! participant links and the owning [`Transaction`], moves balances and
//! feeds the token registry. Retroactive reclassification lives in
//! [`super::enrichment`].

use super::{balances, tokens};
use crate::domain::{
    batch_leg_id, contract_token_id, erc1155_token_id, transaction_transfer_id, transfer_id,
    AvatarType, EntityRecord, ProjectionError, ProtocolVersion, Transaction, TransactionTransfer,
    Transfer, TransferType,
};
use crate::events::EventEnvelope;
use crate::snapshot::Snapshot;
use shared_types::{Address, U256};
use tracing::warn;

/// One primitive movement of `value` units of `token_id`.
#[derive(Debug, Clone)]
pub struct Leg {
    pub id: String,
    pub from: Address,
    pub to: Address,
    pub operator: Option<Address>,
    pub value: U256,
    pub token_id: String,
    pub transfer_type: TransferType,
    pub version: ProtocolVersion,
}

/// Records one leg against the event's transaction.
pub fn record(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    leg: Leg,
) -> Result<(), ProjectionError> {
    let provenance = envelope.provenance();
    let tx = envelope.transaction_hash;

    if snapshot.transaction(&tx)?.is_none() {
        snapshot.put(EntityRecord::Transaction(Transaction {
            id: tx,
            safe_tx_hash: None,
            provenance,
        }));
    }

    let recipient_type = match leg.version {
        ProtocolVersion::V1 => AvatarType::Signup,
        ProtocolVersion::V2 if leg.to.is_zero() => AvatarType::Unknown,
        ProtocolVersion::V2 => snapshot
            .avatar(&leg.to)?
            .map_or(AvatarType::Unknown, |avatar| avatar.avatar_type),
    };
    tokens::register_movement(
        snapshot,
        tokens::TokenMovement {
            token_id: &leg.token_id,
            value: leg.value,
            from: &leg.from,
            to: &leg.to,
            transfer_type: leg.transfer_type,
            version: leg.version,
            recipient_type,
        },
        provenance,
    )?;

    for participant in [leg.from, leg.to] {
        if participant.is_zero() {
            continue;
        }
        snapshot.put(EntityRecord::TransactionTransfer(TransactionTransfer {
            id: transaction_transfer_id(&leg.id, &participant),
            avatar: participant,
            transaction: tx,
            transfer_id: leg.id.clone(),
        }));
    }

    balances::transfer(
        snapshot,
        &leg.from,
        &leg.to,
        &leg.token_id,
        leg.value,
        envelope.block_timestamp,
    )?;

    snapshot.put(EntityRecord::Transfer(Transfer {
        id: leg.id,
        transaction_hash: tx,
        log_index: envelope.log_index,
        from: leg.from,
        to: leg.to,
        operator: leg.operator,
        value: leg.value,
        token: leg.token_id,
        transfer_type: leg.transfer_type,
        version: leg.version,
        is_part_of_stream_or_hub: false,
        demurrage_from_id: None,
        demurrage_to_id: None,
        metri_fee_id: None,
        safe_tx_hash: None,
        provenance,
    }));

    snapshot.stats_mut()?.transfers += 1;
    Ok(())
}

/// V1 personal-token ERC20 transfer; the token is the emitting contract.
pub fn personal_transfer(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    from: &Address,
    to: &Address,
    amount: U256,
) -> Result<(), ProjectionError> {
    record(
        snapshot,
        envelope,
        Leg {
            id: transfer_id(&envelope.transaction_hash, envelope.log_index),
            from: *from,
            to: *to,
            operator: None,
            value: amount,
            token_id: contract_token_id(&envelope.source),
            transfer_type: TransferType::Transfer,
            version: ProtocolVersion::V1,
        },
    )
}

/// ERC20 transfer on a V2 wrapper contract.
pub fn wrapper_transfer(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    from: &Address,
    to: &Address,
    value: U256,
) -> Result<(), ProjectionError> {
    record(
        snapshot,
        envelope,
        Leg {
            id: transfer_id(&envelope.transaction_hash, envelope.log_index),
            from: *from,
            to: *to,
            operator: None,
            value,
            token_id: contract_token_id(&envelope.source),
            transfer_type: TransferType::Erc20WrapperTransfer,
            version: ProtocolVersion::V2,
        },
    )
}

/// ERC-1155 `TransferSingle` on the V2 hub.
pub fn transfer_single(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    operator: &Address,
    from: &Address,
    to: &Address,
    id: &U256,
    value: U256,
) -> Result<(), ProjectionError> {
    record(
        snapshot,
        envelope,
        Leg {
            id: transfer_id(&envelope.transaction_hash, envelope.log_index),
            from: *from,
            to: *to,
            operator: Some(*operator),
            value,
            token_id: erc1155_token_id(id),
            transfer_type: TransferType::TransferSingle,
            version: ProtocolVersion::V2,
        },
    )
}

/// ERC-1155 `TransferBatch`: one `TransferSingle` leg per `(id, value)` pair.
pub fn transfer_batch(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    operator: &Address,
    from: &Address,
    to: &Address,
    ids: &[U256],
    values: &[U256],
) -> Result<(), ProjectionError> {
    if ids.len() != values.len() {
        warn!(
            tx = %envelope.transaction_hash,
            log_index = envelope.log_index,
            ids = ids.len(),
            values = values.len(),
            "TransferBatch id/value length mismatch, recording the common prefix"
        );
    }

    for (leg, (id, value)) in ids.iter().zip(values).enumerate() {
        record(
            snapshot,
            envelope,
            Leg {
                id: batch_leg_id(&envelope.transaction_hash, envelope.log_index, leg),
                from: *from,
                to: *to,
                operator: Some(*operator),
                value: *value,
                token_id: erc1155_token_id(id),
                transfer_type: TransferType::TransferSingle,
                version: ProtocolVersion::V2,
            },
        )?;
    }
    Ok(())
}
