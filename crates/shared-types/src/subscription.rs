//! # Source Subscriptions
//!
//! Requests emitted by the projection engine when an event reveals a newly
//! deployed contract (or account) that the chain watcher must start
//! following.

use crate::primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of event source being registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKind {
    /// A V1 personal token contract deployed by a signup.
    PersonalToken,
    /// An ERC20 wrapper around a V2 token.
    WrappedErc20,
    /// A V2 human's safe account (execution results).
    SafeAccount,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PersonalToken => "PersonalToken",
            Self::WrappedErc20 => "WrappedErc20",
            Self::SafeAccount => "SafeAccount",
        };
        f.write_str(name)
    }
}

/// A one-shot request to start following `address` as a source of `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub kind: SourceKind,
    pub address: Address,
    /// Block of the event that revealed the source; watching starts here.
    pub from_block: u64,
}

impl SubscriptionRequest {
    #[must_use]
    pub fn new(kind: SourceKind, address: Address, from_block: u64) -> Self {
        Self {
            kind,
            address,
            from_block,
        }
    }

    /// Identity used for de-duplication.
    #[must_use]
    pub fn key(&self) -> (SourceKind, Address) {
        (self.kind, self.address)
    }
}
