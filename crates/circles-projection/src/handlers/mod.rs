//! # Handlers
//!
//! The write phase. [`apply`] routes one decoded event to the component
//! handlers, which mutate the [`Snapshot`] synchronously:
//!
//! | Module | Concern |
//! |---|---|
//! | [`avatars`] | Avatar lifecycle, profiles, source subscriptions |
//! | [`tokens`] | Token existence, type and total supply |
//! | [`trust`] | Trust edges, mutuality, migration |
//! | [`balances`] | Per-avatar per-token balances, wrapper reconciliation |
//! | [`transfers`] | Primitive transfer legs |
//! | [`enrichment`] | Same-transaction reclassification |
//! | [`backing`] | CirclesBacking records |

pub mod avatars;
pub mod backing;
pub mod balances;
pub mod enrichment;
pub mod tokens;
pub mod transfers;
pub mod trust;

use crate::domain::{
    contract_token_id, erc1155_token_id, ProjectionError, ProtocolVersion, TransferType,
};
use crate::events::{CirclesEvent, EventEnvelope};
use crate::service::ProjectionConfig;
use crate::snapshot::Snapshot;
use balances::WrapperFlow;
use enrichment::Aggregate;
use shared_types::{Address, U256};
use trust::TrustChange;

/// Applies one event to its loaded snapshot.
pub fn apply(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    config: &ProjectionConfig,
) -> Result<(), ProjectionError> {
    let provenance = envelope.provenance();

    match &envelope.event {
        // Hub V1
        CirclesEvent::Signup { user, token } => avatars::signup(snapshot, envelope, user, token),
        CirclesEvent::OrganizationSignup { organization } => {
            avatars::organization_signup(snapshot, envelope, organization)
        }
        CirclesEvent::HubTrust {
            can_send_to,
            user,
            limit,
        } => trust::apply(snapshot, TrustChange::v1(*can_send_to, *user, *limit), provenance),
        CirclesEvent::HubTransfer { from, to, amount } => enrichment::settle_stream(
            snapshot,
            envelope,
            Aggregate {
                from: *from,
                to: *to,
                operator: None,
                value: *amount,
                token: contract_token_id(&envelope.source),
                transfer_type: TransferType::HubTransfer,
                version: ProtocolVersion::V1,
            },
            config.metri_fee_collector,
        ),
        CirclesEvent::PersonalTransfer { from, to, amount } => {
            transfers::personal_transfer(snapshot, envelope, from, to, *amount)
        }

        // Hub V2
        CirclesEvent::RegisterHuman { avatar, inviter } => {
            avatars::register_human(snapshot, envelope, avatar, inviter)
        }
        CirclesEvent::RegisterOrganization { organization, name } => {
            avatars::register_organization(snapshot, envelope, organization, name)
        }
        CirclesEvent::RegisterGroup {
            group, name, symbol, ..
        } => avatars::register_group(snapshot, envelope, group, name, symbol),
        CirclesEvent::Trust {
            truster,
            trustee,
            expiry_time,
        } => trust::apply(
            snapshot,
            TrustChange::v2(
                *truster,
                *trustee,
                *expiry_time,
                envelope.block_timestamp,
                config.untrust_grace_secs,
            ),
            provenance,
        ),
        CirclesEvent::TransferSingle {
            operator,
            from,
            to,
            id,
            value,
        } => transfers::transfer_single(snapshot, envelope, operator, from, to, id, *value),
        CirclesEvent::TransferBatch {
            operator,
            from,
            to,
            ids,
            values,
        } => transfers::transfer_batch(snapshot, envelope, operator, from, to, ids, values),
        CirclesEvent::StreamCompleted {
            operator,
            from,
            to,
            ids,
            amounts,
        } => enrichment::settle_stream(
            snapshot,
            envelope,
            Aggregate {
                from: *from,
                to: *to,
                operator: Some(*operator),
                value: amounts
                    .iter()
                    .fold(U256::zero(), |total, amount| total.saturating_add(*amount)),
                token: ids.first().map(erc1155_token_id).unwrap_or_default(),
                transfer_type: TransferType::StreamCompleted,
                version: ProtocolVersion::V2,
            },
            config.metri_fee_collector,
        ),
        CirclesEvent::PersonalMint {
            human, end_period, ..
        } => {
            avatars::record_mint(snapshot, envelope, human, *end_period)?;
            enrichment::classify_personal_mint(snapshot, envelope)
        }
        CirclesEvent::DiscountCost { account, .. } => {
            avatars::record_demurrage(snapshot, envelope, account)?;
            enrichment::classify_demurrage(snapshot, envelope, account)
        }

        // Name registry
        CirclesEvent::UpdateMetadataDigest {
            avatar,
            metadata_digest,
        } => avatars::update_metadata_digest(snapshot, envelope, avatar, metadata_digest),

        // ERC20 lift and wrappers
        CirclesEvent::Erc20WrapperDeployed {
            avatar,
            erc20_wrapper,
            circles_type,
        } => avatars::wrapper_deployed(snapshot, envelope, avatar, erc20_wrapper, *circles_type),
        CirclesEvent::WrapperTransfer { from, to, value } => {
            transfers::wrapper_transfer(snapshot, envelope, from, to, *value)
        }
        CirclesEvent::DepositDemurraged {
            account,
            amount,
            inflationary_amount,
        } => wrapper_flow(
            snapshot,
            envelope,
            WrapperFlow::DepositDemurraged,
            account,
            *amount,
            *inflationary_amount,
        ),
        CirclesEvent::WithdrawDemurraged {
            account,
            amount,
            inflationary_amount,
        } => wrapper_flow(
            snapshot,
            envelope,
            WrapperFlow::WithdrawDemurraged,
            account,
            *amount,
            *inflationary_amount,
        ),
        CirclesEvent::DepositInflationary {
            account,
            amount,
            demurraged_amount,
        } => wrapper_flow(
            snapshot,
            envelope,
            WrapperFlow::DepositInflationary,
            account,
            *amount,
            *demurraged_amount,
        ),
        CirclesEvent::WithdrawInflationary {
            account,
            amount,
            demurraged_amount,
        } => wrapper_flow(
            snapshot,
            envelope,
            WrapperFlow::WithdrawInflationary,
            account,
            *amount,
            *demurraged_amount,
        ),

        // Group treasuries
        CirclesEvent::CreateVault { .. } => Ok(()),
        CirclesEvent::GroupMintSingle { .. } => {
            enrichment::classify_group_operation(snapshot, envelope, TransferType::GroupMintSingle)
        }
        CirclesEvent::GroupMintBatch { .. } => {
            enrichment::classify_group_operation(snapshot, envelope, TransferType::GroupMintBatch)
        }
        CirclesEvent::GroupRedeem { .. } => {
            enrichment::classify_group_operation(snapshot, envelope, TransferType::GroupRedeem)
        }
        CirclesEvent::GroupRedeemCollateralBurn { .. } => enrichment::classify_group_operation(
            snapshot,
            envelope,
            TransferType::GroupRedeemCollateralBurn,
        ),
        CirclesEvent::GroupRedeemCollateralReturn { .. } => enrichment::classify_group_operation(
            snapshot,
            envelope,
            TransferType::GroupRedeemCollateralReturn,
        ),

        // Safe accounts
        CirclesEvent::ExecutionSuccess { tx_hash, .. } => {
            enrichment::execution_success(snapshot, envelope, tx_hash)
        }

        // CirclesBacking
        CirclesEvent::CirclesBackingInitiated {
            backer,
            circles_backing_instance,
            backing_asset,
            personal_circles_address,
        } => backing::initiated(
            snapshot,
            envelope,
            backer,
            circles_backing_instance,
            backing_asset,
            personal_circles_address,
        ),
        CirclesEvent::CirclesBackingCompleted {
            circles_backing_instance,
            lbp,
            ..
        } => backing::completed(snapshot, circles_backing_instance, lbp),
    }
}

fn wrapper_flow(
    snapshot: &mut Snapshot,
    envelope: &EventEnvelope,
    flow: WrapperFlow,
    account: &Address,
    amount: U256,
    counterpart: U256,
) -> Result<(), ProjectionError> {
    balances::reconcile_wrapper(
        snapshot,
        flow,
        account,
        &contract_token_id(&envelope.source),
        amount,
        counterpart,
        envelope.block_timestamp,
    )
}
