//! # Entity Keys
//!
//! Deterministic composite identifiers and the tagged key/record pair the
//! store is addressed with.
//!
//! | Entity | Id format |
//! |---|---|
//! | AvatarBalance | `{avatar}-{token}` |
//! | TrustRelation | `{truster}{trustee}{version}` |
//! | Transfer | `{tx}-{logIndex}`, `{tx}-{logIndex}-{leg}`, `{tx}-stream` |
//! | TransactionTransfer | `{transfer}-{avatar}` |
//!
//! Addresses and hashes always render as lowercase `0x` hex.

use super::entities::{
    Avatar, AvatarBalance, CirclesBacking, Profile, ProtocolVersion, Stats, Token, Transaction,
    TransactionTransfer, Transfer, TrustRelation,
};
use serde::{Deserialize, Serialize};
use shared_types::{Address, TxHash, U256};
use std::fmt;

/// Suffix of the synthetic aggregate transfer written by stream settlements.
pub const STREAM_SUFFIX: &str = "stream";

#[must_use]
pub fn balance_id(avatar: &Address, token_id: &str) -> String {
    format!("{avatar}-{token_id}")
}

#[must_use]
pub fn trust_id(truster: &Address, trustee: &Address, version: ProtocolVersion) -> String {
    format!("{truster}{trustee}{}", version.as_u8())
}

#[must_use]
pub fn transfer_id(tx: &TxHash, log_index: u32) -> String {
    format!("{tx}-{log_index}")
}

/// Id of leg `leg` of a batch transfer. The first leg keeps the plain id.
#[must_use]
pub fn batch_leg_id(tx: &TxHash, log_index: u32, leg: usize) -> String {
    if leg == 0 {
        transfer_id(tx, log_index)
    } else {
        format!("{tx}-{log_index}-{leg}")
    }
}

#[must_use]
pub fn stream_transfer_id(tx: &TxHash) -> String {
    format!("{tx}-{STREAM_SUFFIX}")
}

#[must_use]
pub fn transaction_transfer_id(transfer_id: &str, avatar: &Address) -> String {
    format!("{transfer_id}-{avatar}")
}

/// Token id of a contract-addressed token (V1 personal tokens, ERC20 wrappers).
#[must_use]
pub fn contract_token_id(address: &Address) -> String {
    address.to_string()
}

/// Token id of an ERC-1155 id (decimal).
#[must_use]
pub fn erc1155_token_id(id: &U256) -> String {
    id.to_string()
}

/// Owner of a token first seen by id only.
///
/// Tried strictly in order; later steps are lossy fallbacks:
/// 1. the literal id, if it is `0x`-prefixed and parses as an address;
/// 2. the id as a decimal integer, zero-padded to 40 hex digits;
/// 3. the id as a decimal integer, hex-encoded without padding;
/// 4. the transfer recipient.
#[must_use]
pub fn legacy_token_owner(token_id: &str, recipient: &Address) -> Address {
    if token_id.starts_with("0x") {
        if let Ok(address) = token_id.parse::<Address>() {
            return address;
        }
    }

    if let Ok(value) = U256::from_dec_str(token_id) {
        // U256's LowerHex ignores width flags; pad the string instead.
        let digits = format!("{value:x}");
        if let Ok(address) = format!("0x{digits:0>40}").parse::<Address>() {
            return address;
        }
        if let Ok(address) = format!("0x{digits}").parse::<Address>() {
            return address;
        }
    }

    *recipient
}

// =============================================================================
// TAGGED KEYS & RECORDS
// =============================================================================

/// Address of one record in the entity store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKey {
    Avatar(Address),
    Token(String),
    Trust(String),
    Balance(String),
    Transfer(String),
    Transaction(TxHash),
    TransactionTransfer(String),
    Profile(Address),
    CirclesBacking(Address),
    Stats,
}

impl EntityKey {
    /// Entity type name, for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Avatar(_) => "Avatar",
            Self::Token(_) => "Token",
            Self::Trust(_) => "TrustRelation",
            Self::Balance(_) => "AvatarBalance",
            Self::Transfer(_) => "Transfer",
            Self::Transaction(_) => "Transaction",
            Self::TransactionTransfer(_) => "TransactionTransfer",
            Self::Profile(_) => "Profile",
            Self::CirclesBacking(_) => "CirclesBacking",
            Self::Stats => "Stats",
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Avatar(a) | Self::Profile(a) | Self::CirclesBacking(a) => {
                write!(f, "{}:{a}", self.kind())
            }
            Self::Token(id)
            | Self::Trust(id)
            | Self::Balance(id)
            | Self::Transfer(id)
            | Self::TransactionTransfer(id) => write!(f, "{}:{id}", self.kind()),
            Self::Transaction(tx) => write!(f, "{}:{tx}", self.kind()),
            Self::Stats => f.write_str("Stats"),
        }
    }
}

/// One stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity")]
pub enum EntityRecord {
    Avatar(Avatar),
    Token(Token),
    Trust(TrustRelation),
    Balance(AvatarBalance),
    Transfer(Transfer),
    Transaction(Transaction),
    TransactionTransfer(TransactionTransfer),
    Profile(Profile),
    CirclesBacking(CirclesBacking),
    Stats(Stats),
}

impl EntityRecord {
    /// The key this record is stored under.
    #[must_use]
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Avatar(a) => EntityKey::Avatar(a.id),
            Self::Token(t) => EntityKey::Token(t.id.clone()),
            Self::Trust(t) => EntityKey::Trust(t.id.clone()),
            Self::Balance(b) => EntityKey::Balance(b.id.clone()),
            Self::Transfer(t) => EntityKey::Transfer(t.id.clone()),
            Self::Transaction(t) => EntityKey::Transaction(t.id),
            Self::TransactionTransfer(t) => EntityKey::TransactionTransfer(t.id.clone()),
            Self::Profile(p) => EntityKey::Profile(p.id),
            Self::CirclesBacking(c) => EntityKey::CirclesBacking(c.id),
            Self::Stats(_) => EntityKey::Stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    #[test]
    fn test_trust_id_is_lowercase_and_versioned() {
        let truster: Address = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".parse().unwrap();
        let id = trust_id(&truster, &addr(0xbb), ProtocolVersion::V2);
        assert_eq!(
            id,
            "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb2"
        );
    }

    #[test]
    fn test_stream_id_never_collides_with_log_ids() {
        let tx = TxHash::new([0xab; 32]);
        let stream = stream_transfer_id(&tx);
        for log_index in 0..64 {
            assert_ne!(stream, transfer_id(&tx, log_index));
            assert_ne!(stream, batch_leg_id(&tx, log_index, 1));
        }
    }

    #[test]
    fn test_batch_first_leg_keeps_plain_id() {
        let tx = TxHash::new([1; 32]);
        assert_eq!(batch_leg_id(&tx, 4, 0), transfer_id(&tx, 4));
        assert_eq!(batch_leg_id(&tx, 4, 2), format!("{tx}-4-2"));
    }

    #[test]
    fn test_owner_literal_hex() {
        let owner = legacy_token_owner("0x1111111111111111111111111111111111111111", &addr(9));
        assert_eq!(owner, addr(0x11));
    }

    #[test]
    fn test_owner_decimal_is_padded() {
        assert_eq!(
            legacy_token_owner("255", &addr(9)).to_string(),
            "0x00000000000000000000000000000000000000ff"
        );
    }

    #[test]
    fn test_owner_decimal_round_trips_v2_token_id() {
        let avatar = addr(0x42);
        assert_eq!(legacy_token_owner(&avatar.to_token_id(), &addr(9)), avatar);
    }

    #[test]
    fn test_owner_falls_back_to_recipient() {
        assert_eq!(legacy_token_owner("not-a-number", &addr(9)), addr(9));
        assert_eq!(legacy_token_owner("0x1234", &addr(9)), addr(9));
        // Larger than 160 bits: neither integer encoding is an address.
        let too_wide = (U256::one() << 200).to_string();
        assert_eq!(legacy_token_owner(&too_wide, &addr(9)), addr(9));
    }

    #[test]
    fn test_record_key_matches() {
        let stats = EntityRecord::Stats(Stats::default());
        assert_eq!(stats.key(), EntityKey::Stats);
        assert_eq!(EntityKey::Avatar(addr(1)).kind(), "Avatar");
    }
}
