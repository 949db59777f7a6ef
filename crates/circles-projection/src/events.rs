//! # Decoded Circles Events
//!
//! The projection consumes already-decoded logs. Each [`EventEnvelope`]
//! carries the log's position and source contract plus one [`CirclesEvent`].
//!
//! Serialized form (one JSON object per line in event files):
//!
//! ```json
//! {"block_number":1,"block_timestamp":1700000000,"transaction_hash":"0x..",
//!  "transaction_index":0,"log_index":3,"source":"0x..",
//!  "event":{"type":"Signup","user":"0x..","token":"0x.."}}
//! ```
//!
//! `U256` fields use `primitive-types`' serde form: `0x`-prefixed hex.

use crate::domain::{EventPosition, Provenance};
use serde::{Deserialize, Serialize};
use shared_types::{Address, TxHash, U256};

/// A decoded log with its chain position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub block_number: u64,
    pub block_timestamp: u64,
    pub transaction_hash: TxHash,
    pub transaction_index: u32,
    pub log_index: u32,
    /// Contract (or safe) that emitted the log.
    pub source: Address,
    pub event: CirclesEvent,
}

impl EventEnvelope {
    #[must_use]
    pub fn position(&self) -> EventPosition {
        EventPosition {
            block_number: self.block_number,
            transaction_index: self.transaction_index,
            log_index: self.log_index,
        }
    }

    #[must_use]
    pub fn provenance(&self) -> Provenance {
        Provenance {
            block_number: self.block_number,
            timestamp: self.block_timestamp,
            transaction_index: self.transaction_index,
            log_index: self.log_index,
            transaction_hash: self.transaction_hash,
        }
    }
}

/// Every event the projection understands, grouped by emitting contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CirclesEvent {
    // =========================================================================
    // HUB V1
    // =========================================================================
    Signup {
        user: Address,
        token: Address,
    },
    OrganizationSignup {
        organization: Address,
    },
    /// `can_send_to` trusts `user` up to `limit` percent; zero revokes.
    HubTrust {
        can_send_to: Address,
        user: Address,
        limit: U256,
    },
    HubTransfer {
        from: Address,
        to: Address,
        amount: U256,
    },

    // =========================================================================
    // V1 PERSONAL TOKEN (source = token contract)
    // =========================================================================
    PersonalTransfer {
        from: Address,
        to: Address,
        amount: U256,
    },

    // =========================================================================
    // HUB V2
    // =========================================================================
    RegisterHuman {
        avatar: Address,
        inviter: Address,
    },
    RegisterOrganization {
        organization: Address,
        name: String,
    },
    RegisterGroup {
        group: Address,
        mint: Address,
        treasury: Address,
        name: String,
        symbol: String,
    },
    Trust {
        truster: Address,
        trustee: Address,
        expiry_time: U256,
    },
    TransferSingle {
        operator: Address,
        from: Address,
        to: Address,
        id: U256,
        value: U256,
    },
    TransferBatch {
        operator: Address,
        from: Address,
        to: Address,
        ids: Vec<U256>,
        values: Vec<U256>,
    },
    StreamCompleted {
        operator: Address,
        from: Address,
        to: Address,
        ids: Vec<U256>,
        amounts: Vec<U256>,
    },
    PersonalMint {
        human: Address,
        amount: U256,
        start_period: U256,
        end_period: U256,
    },
    DiscountCost {
        account: Address,
        id: U256,
        discount_cost: U256,
    },

    // =========================================================================
    // NAME REGISTRY
    // =========================================================================
    UpdateMetadataDigest {
        avatar: Address,
        metadata_digest: TxHash,
    },

    // =========================================================================
    // ERC20 LIFT & WRAPPERS (wrapper events: source = wrapper contract)
    // =========================================================================
    Erc20WrapperDeployed {
        avatar: Address,
        erc20_wrapper: Address,
        /// 0 = demurraged wrapper, anything else = inflationary (static).
        circles_type: u8,
    },
    WrapperTransfer {
        from: Address,
        to: Address,
        value: U256,
    },
    DepositDemurraged {
        account: Address,
        amount: U256,
        inflationary_amount: U256,
    },
    WithdrawDemurraged {
        account: Address,
        amount: U256,
        inflationary_amount: U256,
    },
    DepositInflationary {
        account: Address,
        amount: U256,
        demurraged_amount: U256,
    },
    WithdrawInflationary {
        account: Address,
        amount: U256,
        demurraged_amount: U256,
    },

    // =========================================================================
    // GROUP TREASURIES
    // =========================================================================
    CreateVault {
        group: Address,
        vault: Address,
    },
    GroupMintSingle {
        group: Address,
        id: U256,
        value: U256,
    },
    GroupMintBatch {
        group: Address,
        ids: Vec<U256>,
        values: Vec<U256>,
    },
    GroupRedeem {
        group: Address,
        id: U256,
        value: U256,
    },
    GroupRedeemCollateralBurn {
        group: Address,
        ids: Vec<U256>,
        values: Vec<U256>,
    },
    GroupRedeemCollateralReturn {
        group: Address,
        to: Address,
        ids: Vec<U256>,
        values: Vec<U256>,
    },

    // =========================================================================
    // SAFE ACCOUNTS (source = safe)
    // =========================================================================
    ExecutionSuccess {
        tx_hash: TxHash,
        payment: U256,
    },

    // =========================================================================
    // CIRCLES BACKING
    // =========================================================================
    CirclesBackingInitiated {
        backer: Address,
        circles_backing_instance: Address,
        backing_asset: Address,
        personal_circles_address: Address,
    },
    CirclesBackingCompleted {
        backer: Address,
        circles_backing_instance: Address,
        lbp: Address,
    },
}

impl CirclesEvent {
    /// Event name, for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Signup { .. } => "Signup",
            Self::OrganizationSignup { .. } => "OrganizationSignup",
            Self::HubTrust { .. } => "HubTrust",
            Self::HubTransfer { .. } => "HubTransfer",
            Self::PersonalTransfer { .. } => "PersonalTransfer",
            Self::RegisterHuman { .. } => "RegisterHuman",
            Self::RegisterOrganization { .. } => "RegisterOrganization",
            Self::RegisterGroup { .. } => "RegisterGroup",
            Self::Trust { .. } => "Trust",
            Self::TransferSingle { .. } => "TransferSingle",
            Self::TransferBatch { .. } => "TransferBatch",
            Self::StreamCompleted { .. } => "StreamCompleted",
            Self::PersonalMint { .. } => "PersonalMint",
            Self::DiscountCost { .. } => "DiscountCost",
            Self::UpdateMetadataDigest { .. } => "UpdateMetadataDigest",
            Self::Erc20WrapperDeployed { .. } => "Erc20WrapperDeployed",
            Self::WrapperTransfer { .. } => "WrapperTransfer",
            Self::DepositDemurraged { .. } => "DepositDemurraged",
            Self::WithdrawDemurraged { .. } => "WithdrawDemurraged",
            Self::DepositInflationary { .. } => "DepositInflationary",
            Self::WithdrawInflationary { .. } => "WithdrawInflationary",
            Self::CreateVault { .. } => "CreateVault",
            Self::GroupMintSingle { .. } => "GroupMintSingle",
            Self::GroupMintBatch { .. } => "GroupMintBatch",
            Self::GroupRedeem { .. } => "GroupRedeem",
            Self::GroupRedeemCollateralBurn { .. } => "GroupRedeemCollateralBurn",
            Self::GroupRedeemCollateralReturn { .. } => "GroupRedeemCollateralReturn",
            Self::ExecutionSuccess { .. } => "ExecutionSuccess",
            Self::CirclesBackingInitiated { .. } => "CirclesBackingInitiated",
            Self::CirclesBackingCompleted { .. } => "CirclesBackingCompleted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_line() {
        let line = r#"{
            "block_number": 12,
            "block_timestamp": 1700000000,
            "transaction_hash": "0x0000000000000000000000000000000000000000000000000000000000000abc",
            "transaction_index": 1,
            "log_index": 4,
            "source": "0x29b9a7fbb8995b2423a71cc17cf9810798f6c543",
            "event": {
                "type": "HubTrust",
                "can_send_to": "0x1111111111111111111111111111111111111111",
                "user": "0x2222222222222222222222222222222222222222",
                "limit": "0x32"
            }
        }"#;
        let envelope: EventEnvelope = serde_json::from_str(line).unwrap();

        assert_eq!(envelope.event.name(), "HubTrust");
        assert_eq!(
            envelope.position(),
            EventPosition {
                block_number: 12,
                transaction_index: 1,
                log_index: 4
            }
        );
        match envelope.event {
            CirclesEvent::HubTrust { limit, .. } => assert_eq!(limit, U256::from(50)),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
