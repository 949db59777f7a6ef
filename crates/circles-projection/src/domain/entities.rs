//! # Ledger Entities
//!
//! Every record the projection writes. Records are created lazily on the
//! first event that addresses their key and are never deleted.

use serde::{Deserialize, Serialize};
use shared_types::{Address, ProfileMetadata, SignedAmount, TxHash, U256};

// =============================================================================
// POSITION & PROVENANCE
// =============================================================================

/// Global ordering key of a log event.
///
/// Field order gives the derived `Ord`: block, then transaction, then log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct EventPosition {
    pub block_number: u64,
    pub transaction_index: u32,
    pub log_index: u32,
}

/// Where a record was last written from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Provenance {
    pub block_number: u64,
    pub timestamp: u64,
    pub transaction_index: u32,
    pub log_index: u32,
    pub transaction_hash: TxHash,
}

// =============================================================================
// ENUMS
// =============================================================================

/// Protocol generation an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProtocolVersion {
    V1,
    V2,
}

impl ProtocolVersion {
    /// Numeric suffix used in composite keys.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AvatarType {
    Unknown,
    Invite,
    Signup,
    OrganizationSignup,
    RegisterHuman,
    RegisterOrganization,
    RegisterGroup,
    Migrating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    Signup,
    RegisterHuman,
    RegisterGroup,
    WrappedDemurrageToken,
    WrappedStaticToken,
}

impl TokenType {
    /// Token type for a token first seen arriving at an avatar of `avatar_type`.
    #[must_use]
    pub fn for_recipient(avatar_type: AvatarType) -> Self {
        match avatar_type {
            AvatarType::Signup | AvatarType::OrganizationSignup => Self::Signup,
            AvatarType::RegisterGroup => Self::RegisterGroup,
            _ => Self::RegisterHuman,
        }
    }

    #[must_use]
    pub fn is_wrapped(self) -> bool {
        matches!(self, Self::WrappedDemurrageToken | Self::WrappedStaticToken)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferType {
    Transfer,
    TransferSingle,
    HubTransfer,
    StreamCompleted,
    Erc20WrapperTransfer,
    PersonalMint,
    Demurrage,
    GroupMintSingle,
    GroupMintBatch,
    GroupRedeem,
    GroupRedeemCollateralBurn,
    GroupRedeemCollateralReturn,
    MetriFee,
}

impl TransferType {
    /// Types whose mints and burns move a token's total supply.
    ///
    /// Batch legs are recorded as `TransferSingle`, so they are tracked too.
    #[must_use]
    pub fn tracks_supply(self) -> bool {
        matches!(
            self,
            Self::Transfer | Self::TransferSingle | Self::Erc20WrapperTransfer
        )
    }
}

// =============================================================================
// AVATAR
// =============================================================================

/// Received-trust count at which an avatar counts as verified.
pub const VERIFIED_TRUST_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Avatar {
    pub id: Address,
    pub avatar_type: AvatarType,
    pub version: ProtocolVersion,
    pub token_id: Option<String>,
    pub wrapped_token_id: Option<Address>,
    /// Mirror of every balance delta applied to this avatar, across tokens.
    pub balance: SignedAmount,
    pub invited_by: Option<Address>,
    pub trusted_by_n: u32,
    pub trusts_given_count: u32,
    pub trusts_received_count: u32,
    pub is_verified: bool,
    pub last_mint: Option<u64>,
    pub mint_end_period: Option<u64>,
    pub last_demurrage_update: Option<u64>,
    pub cid_v0: Option<String>,
    pub profile_id: Address,
    pub provenance: Provenance,
}

impl Avatar {
    /// A fresh avatar with zeroed counters.
    #[must_use]
    pub fn new(
        id: Address,
        avatar_type: AvatarType,
        version: ProtocolVersion,
        provenance: Provenance,
    ) -> Self {
        Self {
            id,
            avatar_type,
            version,
            token_id: None,
            wrapped_token_id: None,
            balance: SignedAmount::ZERO,
            invited_by: None,
            trusted_by_n: 0,
            trusts_given_count: 0,
            trusts_received_count: 0,
            is_verified: false,
            last_mint: None,
            mint_end_period: None,
            last_demurrage_update: None,
            cid_v0: None,
            profile_id: id,
            provenance,
        }
    }

    pub fn trust_received(&mut self) {
        self.trusts_received_count += 1;
        self.trusted_by_n = self.trusts_received_count;
        self.is_verified = self.trusts_received_count >= VERIFIED_TRUST_THRESHOLD;
    }

    pub fn trust_revoked(&mut self) {
        self.trusts_received_count = self.trusts_received_count.saturating_sub(1);
        self.trusted_by_n = self.trusts_received_count;
        self.is_verified = self.trusts_received_count >= VERIFIED_TRUST_THRESHOLD;
    }

    /// Clears every trust counter (V2 migration).
    pub fn reset_trust_counters(&mut self) {
        self.trusted_by_n = 0;
        self.trusts_given_count = 0;
        self.trusts_received_count = 0;
        self.is_verified = false;
    }
}

// =============================================================================
// TOKEN
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub token_type: TokenType,
    pub token_owner: Address,
    pub total_supply: U256,
    pub version: ProtocolVersion,
    pub provenance: Provenance,
}

/// A token lookup result, resolved explicitly where it is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedToken {
    /// The token has been recorded.
    Known(Token),
    /// Only the id is known; nothing has been recorded yet.
    Placeholder { id: String },
}

impl LoadedToken {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Known(token) => &token.id,
            Self::Placeholder { id } => id,
        }
    }

    #[must_use]
    pub fn token_type(&self) -> Option<TokenType> {
        match self {
            Self::Known(token) => Some(token.token_type),
            Self::Placeholder { .. } => None,
        }
    }
}

// =============================================================================
// TRUST RELATION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustRelation {
    pub id: String,
    pub truster: Address,
    pub trustee: Address,
    pub limit: U256,
    pub expiry_time: U256,
    pub is_mutual: bool,
    pub is_migrated: bool,
    pub version: ProtocolVersion,
    pub provenance: Provenance,
}

impl TrustRelation {
    /// An edge is active until an untrust zeroes its limit.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.limit.is_zero()
    }
}

// =============================================================================
// BALANCE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarBalance {
    pub id: String,
    pub avatar: Address,
    pub token_id: String,
    pub balance: SignedAmount,
    /// Secondary ledger for wrapped tokens (demurrage-adjusted counterpart).
    pub inflationary_value: SignedAmount,
    pub last_calculated: u64,
}

// =============================================================================
// TRANSFERS & TRANSACTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: String,
    pub transaction_hash: TxHash,
    pub log_index: u32,
    pub from: Address,
    pub to: Address,
    pub operator: Option<Address>,
    pub value: U256,
    pub token: String,
    pub transfer_type: TransferType,
    pub version: ProtocolVersion,
    pub is_part_of_stream_or_hub: bool,
    pub demurrage_from_id: Option<String>,
    pub demurrage_to_id: Option<String>,
    pub metri_fee_id: Option<String>,
    pub safe_tx_hash: Option<TxHash>,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxHash,
    pub safe_tx_hash: Option<TxHash>,
    pub provenance: Provenance,
}

/// Links a non-zero participant of a transfer to the transfer and its transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTransfer {
    pub id: String,
    pub avatar: Address,
    pub transaction: TxHash,
    pub transfer_id: String,
}

// =============================================================================
// PROFILES, BACKING, STATS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Address,
    #[serde(flatten)]
    pub metadata: ProfileMetadata,
}

/// Lifecycle of one CirclesBacking instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CirclesBacking {
    pub id: Address,
    pub backer: Address,
    pub backing_asset: Address,
    pub personal_circles_address: Address,
    pub lbp_address: Option<Address>,
    pub initiated_in: TxHash,
    pub provenance: Provenance,
}

/// Network-wide counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stats {
    pub signups: u64,
    pub trusts: u64,
    pub transfers: u64,
}
