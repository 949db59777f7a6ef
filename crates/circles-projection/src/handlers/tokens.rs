//! # Token Registry
//!
//! Token existence, type classification and running total supply.

use crate::domain::{
    legacy_token_owner, AvatarType, LoadedToken, ProjectionError, ProtocolVersion, Provenance,
    Token, TokenType, TransferType,
};
use crate::snapshot::Snapshot;
use shared_types::{Address, U256};
use tracing::warn;

/// One token movement as seen by the registry.
#[derive(Debug, Clone, Copy)]
pub struct TokenMovement<'a> {
    pub token_id: &'a str,
    pub value: U256,
    pub from: &'a Address,
    pub to: &'a Address,
    pub transfer_type: TransferType,
    pub version: ProtocolVersion,
    /// Avatar type of the recipient, used to classify a token seen for the first time.
    pub recipient_type: AvatarType,
}

/// Records a token explicitly announced by a registration event.
pub fn create(
    snapshot: &mut Snapshot,
    id: String,
    token_type: TokenType,
    owner: Address,
    version: ProtocolVersion,
    provenance: Provenance,
) {
    snapshot.put_token(Token {
        id,
        token_type,
        token_owner: owner,
        total_supply: U256::zero(),
        version,
        provenance,
    });
}

/// Creates the token on first reference and applies mint/burn supply changes.
pub fn register_movement(
    snapshot: &mut Snapshot,
    movement: TokenMovement<'_>,
    provenance: Provenance,
) -> Result<(), ProjectionError> {
    match snapshot.token(movement.token_id)? {
        LoadedToken::Placeholder { id } => {
            let total_supply = if movement.transfer_type.tracks_supply() && movement.from.is_zero() {
                movement.value
            } else {
                U256::zero()
            };
            let token_owner = legacy_token_owner(&id, movement.to);
            snapshot.put_token(Token {
                id,
                token_type: TokenType::for_recipient(movement.recipient_type),
                token_owner,
                total_supply,
                version: movement.version,
                provenance,
            });
        }
        LoadedToken::Known(mut token) => {
            if !movement.transfer_type.tracks_supply() {
                return Ok(());
            }
            let next = next_supply(&token, &movement);
            if next != token.total_supply {
                token.total_supply = next;
                snapshot.put_token(token);
            }
        }
    }
    Ok(())
}

fn next_supply(token: &Token, movement: &TokenMovement<'_>) -> U256 {
    if movement.from.is_zero() {
        token.total_supply.saturating_add(movement.value)
    } else if movement.to.is_zero() {
        if movement.value > token.total_supply {
            warn!(
                token = %token.id,
                supply = %token.total_supply,
                burned = %movement.value,
                "Burn exceeds recorded supply, clamping at zero"
            );
        }
        token.total_supply.saturating_sub(movement.value)
    } else {
        token.total_supply
    }
}
