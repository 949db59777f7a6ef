//! # Issued Sources Registry
//!
//! Remembers every `(kind, address)` already broadcast so the bus can drop
//! repeats. Entries are never evicted: a registered source stays registered.

use shared_types::{Address, SourceKind, SubscriptionRequest};
use std::collections::HashMap;

/// Record of issued subscriptions, keyed by source identity.
#[derive(Debug, Default)]
pub struct IssuedSources {
    /// (kind, address) -> block at which it was first requested.
    issued: HashMap<(SourceKind, Address), u64>,
    /// Requests dropped because they were already issued.
    duplicates: u64,
}

impl IssuedSources {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the request. Returns false if it was issued before.
    pub fn check_and_insert(&mut self, request: &SubscriptionRequest) -> bool {
        if self.issued.contains_key(&request.key()) {
            self.duplicates += 1;
            return false;
        }
        self.issued.insert(request.key(), request.from_block);
        true
    }

    /// Block at which the source was first requested, if it was.
    #[must_use]
    pub fn first_block(&self, kind: SourceKind, address: &Address) -> Option<u64> {
        self.issued.get(&(kind, *address)).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.issued.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }

    #[must_use]
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_request_wins() {
        let mut registry = IssuedSources::new();
        let addr = Address::new([9u8; 20]);

        assert!(registry.check_and_insert(&SubscriptionRequest::new(
            SourceKind::PersonalToken,
            addr,
            5
        )));
        assert!(!registry.check_and_insert(&SubscriptionRequest::new(
            SourceKind::PersonalToken,
            addr,
            8
        )));

        assert_eq!(registry.first_block(SourceKind::PersonalToken, &addr), Some(5));
        assert_eq!(registry.duplicates(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_same_address_different_kind_is_distinct() {
        let mut registry = IssuedSources::new();
        let addr = Address::new([3u8; 20]);

        assert!(registry.check_and_insert(&SubscriptionRequest::new(
            SourceKind::PersonalToken,
            addr,
            1
        )));
        assert!(registry.check_and_insert(&SubscriptionRequest::new(
            SourceKind::SafeAccount,
            addr,
            1
        )));
        assert_eq!(registry.len(), 2);
    }
}
