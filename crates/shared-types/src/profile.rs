//! # Profile Metadata
//!
//! Off-chain profile documents attached to avatars, and the resolver
//! contract the projection engine calls during its read phase.
//!
//! Resolution is infallible by contract: every fetch or parse failure
//! degrades to "no profile" so ledger writes are never blocked.

use crate::primitives::{Address, TxHash};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A profile document as served by the metadata endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ProfileMetadata {
    /// Returns true if no field carries a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.symbol.is_none()
            && self.description.is_none()
            && self.preview_image_url.is_none()
            && self.image_url.is_none()
    }

    /// Drops empty and whitespace-only strings.
    #[must_use]
    pub fn stripped(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.trim().is_empty())
        }
        Self {
            name: keep(self.name),
            symbol: keep(self.symbol),
            description: keep(self.description),
            preview_image_url: keep(self.preview_image_url),
            image_url: keep(self.image_url),
        }
    }

    /// Overwrites fields of `self` with every field `other` sets.
    pub fn merge_from(&mut self, other: &ProfileMetadata) {
        if other.name.is_some() {
            self.name.clone_from(&other.name);
        }
        if other.symbol.is_some() {
            self.symbol.clone_from(&other.symbol);
        }
        if other.description.is_some() {
            self.description.clone_from(&other.description);
        }
        if other.preview_image_url.is_some() {
            self.preview_image_url.clone_from(&other.preview_image_url);
        }
        if other.image_url.is_some() {
            self.image_url.clone_from(&other.image_url);
        }
    }
}

/// Outcome of resolving a name-registry metadata digest.
///
/// The CID is always present, even when no source returned a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDigest {
    pub cid_v0: String,
    pub profile: Option<ProfileMetadata>,
}

/// Resolves addresses (V1) and metadata digests (V2) to profiles.
#[async_trait]
pub trait ProfileResolver: Send + Sync {
    /// Looks up the profile registered for a V1 address.
    async fn resolve_address(&self, address: &Address) -> Option<ProfileMetadata>;

    /// Converts the digest to its CIDv0 and fetches the document behind it.
    async fn resolve_digest(&self, digest: &TxHash) -> ResolvedDigest;
}

/// Resolver that never fetches anything.
///
/// Used when profile fetching is disabled and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProfileResolver;

#[async_trait]
impl ProfileResolver for NoopProfileResolver {
    async fn resolve_address(&self, _address: &Address) -> Option<ProfileMetadata> {
        None
    }

    async fn resolve_digest(&self, digest: &TxHash) -> ResolvedDigest {
        ResolvedDigest {
            cid_v0: digest.to_cid_v0(),
            profile: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint_json() {
        let json = r#"{"name":"Alice","description":"","previewImageUrl":"data:image/png;base64,AA","extra":1}"#;
        let profile: ProfileMetadata = serde_json::from_str(json).unwrap();
        let profile = profile.stripped();

        assert_eq!(profile.name.as_deref(), Some("Alice"));
        assert_eq!(profile.description, None);
        assert!(profile.preview_image_url.is_some());
        assert!(!profile.is_empty());
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut base = ProfileMetadata {
            name: Some("Group".into()),
            symbol: Some("GRP".into()),
            ..Default::default()
        };
        let update = ProfileMetadata {
            description: Some("about".into()),
            ..Default::default()
        };
        base.merge_from(&update);

        assert_eq!(base.symbol.as_deref(), Some("GRP"));
        assert_eq!(base.description.as_deref(), Some("about"));
    }

    #[tokio::test]
    async fn test_noop_resolver_still_returns_cid() {
        let resolver = NoopProfileResolver;
        let digest = TxHash::new([7u8; 32]);

        let resolved = resolver.resolve_digest(&digest).await;
        assert_eq!(resolved.cid_v0, digest.to_cid_v0());
        assert!(resolved.profile.is_none());
        assert!(resolver.resolve_address(&Address::ZERO).await.is_none());
    }
}
