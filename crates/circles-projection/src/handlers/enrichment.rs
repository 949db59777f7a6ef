//! # Same-Transaction Enrichment
//!
//! Events that reveal more about transfers already written earlier in the
//! same transaction: stream and hub settlements, personal mints, demurrage
//! charges, group treasury operations and safe executions.
//!
//! Protocol ordering puts every enriching log after the transfers it
//! annotates. Only transfers with a strictly lower log index are touched;
//! anything else found under the transaction hash is logged and skipped.

use crate::domain::{
    stream_transfer_id, EntityRecord, ProjectionError, ProtocolVersion, Transaction, Transfer,
    TransferType,
};
use crate::events::EventEnvelope;
use crate::snapshot::Snapshot;
use shared_types::{Address, TxHash, U256};
use tracing::{debug, warn};

/// Transfers of the event's transaction that precede the event.
fn prior_transfers(
    snapshot: &Snapshot,
    envelope: &EventEnvelope,
) -> Result<Vec<Transfer>, ProjectionError> {
    let mut prior = Vec::new();
    for id in snapshot.transaction_transfer_ids()? {
        let Some(transfer) = snapshot.transfer(id)? else {
            continue;
        };
        if transfer.log_index < envelope.log_index {
            prior.push(transfer.clone());
        } else {
            warn!(
                tx = %envelope.transaction_hash,
                transfer = %transfer.id,
                transfer_log_index = transfer.log_index,
                event_log_index = envelope.log_index,
                "Same-transaction transfer does not precede enriching event, skipping"
            );
        }
    }
    Ok(prior)
}

fn is_aggregate(transfer: &Transfer) -> bool {
    transfer.id == stream_transfer_id(&transfer.transaction_hash)
}

// =============================================================================
// STREAM / HUB SETTLEMENT
// =============================================================================

/// The synthetic movement a settlement stands for.
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub from: Address,
    pub to: Address,
    pub operator: Option<Address>,
    pub value: U256,
    pub token: String,
    pub transfer_type: TransferType,
    pub version: ProtocolVersion,
}

/// Flags the settlement's legs and writes the `-stream` aggregate.
///
/// Legs paid to `metri_fee_collector` are typed `MetriFee`; the first one is
/// referenced from the aggregate.
pub fn settle_stream(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    aggregate: Aggregate,
    metri_fee_collector: Option<Address>,
) -> Result<(), ProjectionError> {
    let mut metri_fee_id = None;
    let mut legs = 0usize;

    for prior in prior_transfers(snapshot, envelope)? {
        if is_aggregate(&prior) {
            continue;
        }
        let is_fee = metri_fee_collector.is_some_and(|collector| collector == prior.to);
        if let Some(transfer) = snapshot.transfer_mut(&prior.id)? {
            transfer.is_part_of_stream_or_hub = true;
            if is_fee {
                transfer.transfer_type = TransferType::MetriFee;
                metri_fee_id.get_or_insert_with(|| prior.id.clone());
            }
        }
        legs += 1;
    }

    debug!(
        tx = %envelope.transaction_hash,
        legs,
        value = %aggregate.value,
        "Settlement aggregated"
    );

    let tx = envelope.transaction_hash;
    snapshot.put(EntityRecord::Transfer(Transfer {
        id: stream_transfer_id(&tx),
        transaction_hash: tx,
        log_index: envelope.log_index,
        from: aggregate.from,
        to: aggregate.to,
        operator: aggregate.operator,
        value: aggregate.value,
        token: aggregate.token,
        transfer_type: aggregate.transfer_type,
        version: aggregate.version,
        is_part_of_stream_or_hub: false,
        demurrage_from_id: None,
        demurrage_to_id: None,
        metri_fee_id,
        safe_tx_hash: None,
        provenance: envelope.provenance(),
    }));
    Ok(())
}

// =============================================================================
// RECLASSIFICATION
// =============================================================================

/// Prior transfers minted from the zero-sentinel become `PersonalMint`.
pub fn classify_personal_mint(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
) -> Result<(), ProjectionError> {
    for prior in prior_transfers(snapshot, envelope)? {
        if !prior.from.is_zero() || prior.transfer_type == TransferType::PersonalMint {
            continue;
        }
        if let Some(transfer) = snapshot.transfer_mut(&prior.id)? {
            transfer.transfer_type = TransferType::PersonalMint;
        }
    }
    Ok(())
}

/// The latest burn from `account` becomes `Demurrage`; the account's other
/// movements in the transaction point at it.
pub fn classify_demurrage(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    account: &Address,
) -> Result<(), ProjectionError> {
    let prior = prior_transfers(snapshot, envelope)?;
    let Some(charge) = prior
        .iter()
        .filter(|t| t.to.is_zero() && t.from == *account)
        .max_by_key(|t| t.log_index)
    else {
        debug!(tx = %envelope.transaction_hash, account = %account, "No demurrage burn found");
        return Ok(());
    };
    let charge_id = charge.id.clone();

    if let Some(transfer) = snapshot.transfer_mut(&charge_id)? {
        transfer.transfer_type = TransferType::Demurrage;
    }

    for other in &prior {
        if other.id == charge_id || is_aggregate(other) {
            continue;
        }
        let from_account = other.from == *account;
        let to_account = other.to == *account;
        if !from_account && !to_account {
            continue;
        }
        if let Some(transfer) = snapshot.transfer_mut(&other.id)? {
            if from_account {
                transfer.demurrage_from_id = Some(charge_id.clone());
            }
            if to_account {
                transfer.demurrage_to_id = Some(charge_id.clone());
            }
        }
    }
    Ok(())
}

/// Every prior primitive transfer takes the treasury operation's type.
pub fn classify_group_operation(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    transfer_type: TransferType,
) -> Result<(), ProjectionError> {
    for prior in prior_transfers(snapshot, envelope)? {
        if is_aggregate(&prior) || prior.transfer_type == transfer_type {
            continue;
        }
        if let Some(transfer) = snapshot.transfer_mut(&prior.id)? {
            transfer.transfer_type = transfer_type;
        }
    }
    Ok(())
}

// =============================================================================
// SAFE EXECUTION
// =============================================================================

/// Back-fills the safe transaction hash on the transaction and on its
/// preferred transfer: the settlement or mint if present, else the first.
pub fn execution_success(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    safe_tx_hash: &TxHash,
) -> Result<(), ProjectionError> {
    let tx = envelope.transaction_hash;
    match snapshot.transaction_mut(&tx)? {
        Some(transaction) => transaction.safe_tx_hash = Some(*safe_tx_hash),
        None => snapshot.put(EntityRecord::Transaction(Transaction {
            id: tx,
            safe_tx_hash: Some(*safe_tx_hash),
            provenance: envelope.provenance(),
        })),
    }

    let prior = prior_transfers(snapshot, envelope)?;
    let preferred = prior
        .iter()
        .find(|t| {
            matches!(
                t.transfer_type,
                TransferType::StreamCompleted | TransferType::PersonalMint
            )
        })
        .or_else(|| prior.first());

    if let Some(preferred) = preferred {
        if let Some(transfer) = snapshot.transfer_mut(&preferred.id)? {
            transfer.safe_tx_hash = Some(*safe_tx_hash);
        }
    }
    Ok(())
}
