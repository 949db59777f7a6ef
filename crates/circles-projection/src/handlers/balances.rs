//! # Balance Ledger
//!
//! Per-avatar, per-token balances. Wrapped tokens keep a second ledger
//! (`inflationary_value`) next to the raw balance; deposit and withdraw
//! events on the wrapper reconcile the two.
//!
//! Static-wrapper amounts are inflationary units. Between two holders the
//! raw balance moves at the sender's own balance/inflationary ratio, so a
//! holder who sends everything ends at zero on both sides.

use crate::domain::{balance_id, AvatarBalance, EntityRecord, ProjectionError, TokenType};
use crate::snapshot::Snapshot;
use shared_types::{Address, SignedAmount, U256};

/// Wrapper deposit/withdraw flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperFlow {
    DepositDemurraged,
    WithdrawDemurraged,
    DepositInflationary,
    WithdrawInflationary,
}

fn load_or_default(
    snapshot: &Snapshot,
    avatar: &Address,
    token_id: &str,
) -> Result<AvatarBalance, ProjectionError> {
    let id = balance_id(avatar, token_id);
    Ok(match snapshot.balance(&id)? {
        Some(existing) => existing.clone(),
        None => AvatarBalance {
            id,
            avatar: *avatar,
            token_id: token_id.to_string(),
            balance: SignedAmount::ZERO,
            inflationary_value: SignedAmount::ZERO,
            last_calculated: 0,
        },
    })
}

/// Adds `amount` to the avatar's balance of `token_id`.
///
/// No-op for the zero-sentinel and for empty keys.
pub fn apply_delta(
    snapshot: &mut Snapshot,
    avatar: &Address,
    token_id: &str,
    amount: SignedAmount,
    timestamp: u64,
) -> Result<(), ProjectionError> {
    if avatar.is_zero() || token_id.is_empty() {
        return Ok(());
    }

    let wrapped = snapshot
        .token(token_id)?
        .token_type()
        .is_some_and(|token_type| token_type.is_wrapped());

    let mut record = load_or_default(snapshot, avatar, token_id)?;
    record.balance += amount;
    if wrapped {
        record.inflationary_value += amount;
    }
    record.last_calculated = timestamp;
    snapshot.put(EntityRecord::Balance(record));

    if let Some(owner) = snapshot.avatar_mut(avatar)? {
        owner.balance += amount;
    }
    Ok(())
}

/// Moves `value` of `token_id` from `from` to `to`.
///
/// Mint and burn legs, and every non-static token, move both sides by
/// `value`.
pub fn transfer(
    snapshot: &mut Snapshot,
    from: &Address,
    to: &Address,
    token_id: &str,
    value: U256,
    timestamp: u64,
) -> Result<(), ProjectionError> {
    let is_static =
        snapshot.token(token_id)?.token_type() == Some(TokenType::WrappedStaticToken);
    if !is_static || from.is_zero() || to.is_zero() {
        let amount = SignedAmount::from(value);
        apply_delta(snapshot, to, token_id, amount, timestamp)?;
        return apply_delta(snapshot, from, token_id, -amount, timestamp);
    }

    let demurraged = SignedAmount::from(static_equivalent(snapshot, from, token_id, value)?);
    let inflationary = SignedAmount::from(value);
    move_static(snapshot, to, token_id, demurraged, inflationary, timestamp)?;
    move_static(snapshot, from, token_id, -demurraged, -inflationary, timestamp)
}

/// Raw-balance equivalent of `value` inflationary units held by `holder`.
fn static_equivalent(
    snapshot: &Snapshot,
    holder: &Address,
    token_id: &str,
    value: U256,
) -> Result<U256, ProjectionError> {
    let Some(record) = snapshot.balance(&balance_id(holder, token_id))? else {
        return Ok(value);
    };
    if record.balance.is_negative()
        || record.inflationary_value.is_negative()
        || record.inflationary_value.is_zero()
    {
        return Ok(value);
    }
    Ok(value
        .checked_mul(record.balance.magnitude())
        .map_or(value, |scaled| scaled / record.inflationary_value.magnitude()))
}

fn move_static(
    snapshot: &mut Snapshot,
    avatar: &Address,
    token_id: &str,
    demurraged: SignedAmount,
    inflationary: SignedAmount,
    timestamp: u64,
) -> Result<(), ProjectionError> {
    let mut record = load_or_default(snapshot, avatar, token_id)?;
    record.balance += demurraged;
    record.inflationary_value += inflationary;
    record.last_calculated = timestamp;
    snapshot.put(EntityRecord::Balance(record));

    if let Some(owner) = snapshot.avatar_mut(avatar)? {
        owner.balance += demurraged;
    }
    Ok(())
}

/// Reconciles a wrapper deposit or withdrawal.
///
/// The wrapper's own Transfer event already moved both ledgers by the
/// nominal `amount`; this corrects the secondary side to `counterpart`.
pub fn reconcile_wrapper(
    snapshot: &mut Snapshot,
    flow: WrapperFlow,
    account: &Address,
    token_id: &str,
    amount: U256,
    counterpart: U256,
    timestamp: u64,
) -> Result<(), ProjectionError> {
    if account.is_zero() {
        return Ok(());
    }
    let amount = SignedAmount::from(amount);
    let counterpart = SignedAmount::from(counterpart);

    let mut record = load_or_default(snapshot, account, token_id)?;
    match flow {
        WrapperFlow::DepositDemurraged => record.inflationary_value += counterpart - amount,
        WrapperFlow::WithdrawDemurraged => record.inflationary_value += amount - counterpart,
        WrapperFlow::DepositInflationary => record.balance += counterpart - amount,
        WrapperFlow::WithdrawInflationary => record.balance += amount - counterpart,
    }
    record.last_calculated = timestamp;
    snapshot.put(EntityRecord::Balance(record));
    Ok(())
}
