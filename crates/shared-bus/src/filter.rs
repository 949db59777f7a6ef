//! # Subscription Filters
//!
//! Lets a subscriber receive only the source kinds it knows how to watch.

use shared_types::{SourceKind, SubscriptionRequest};

/// Filter over source kinds. An empty list matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub kinds: Vec<SourceKind>,
}

impl SubscriptionFilter {
    /// Matches every request.
    #[must_use]
    pub fn all() -> Self {
        Self { kinds: Vec::new() }
    }

    /// Matches only the given kinds.
    #[must_use]
    pub fn kinds(kinds: Vec<SourceKind>) -> Self {
        Self { kinds }
    }

    #[must_use]
    pub fn matches(&self, request: &SubscriptionRequest) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&request.kind)
    }
}
