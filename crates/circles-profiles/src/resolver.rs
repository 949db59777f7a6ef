//! # Cached Profile Resolver
//!
//! ```text
//! lookup ──► SQLite cache ──hit──► return
//!                 │
//!                miss
//!                 ▼
//!        source 1 ─► source 2 ─► ... (first non-empty wins)
//!                 │
//!                 ▼
//!        strip, check preview image, write through
//! ```
//!
//! Every failure is logged and degrades to "no profile". Cache reads and
//! writes run on the blocking pool.

use crate::cache::SqliteProfileCache;
use crate::config::ProfilesConfig;
use crate::error::ProfileError;
use crate::sources::{http_client, GardenApiSource, IpfsGatewaySource, Lookup, MetadataSource};
use crate::validate::{ImageCheck, ImageSizeValidator};
use async_trait::async_trait;
use shared_types::{Address, ProfileMetadata, ProfileResolver, ResolvedDigest, TxHash};
use std::sync::Arc;
use tokio::task;
use tracing::{debug, info, warn};

pub struct CachedProfileResolver {
    cache: Arc<SqliteProfileCache>,
    digest_sources: Vec<Box<dyn MetadataSource>>,
    address_sources: Vec<Box<dyn MetadataSource>>,
    images: Option<Box<dyn ImageCheck>>,
}

impl CachedProfileResolver {
    /// Resolver with no sources; only cached profiles are returned.
    pub fn new(cache: SqliteProfileCache) -> Self {
        Self {
            cache: Arc::new(cache),
            digest_sources: Vec::new(),
            address_sources: Vec::new(),
            images: None,
        }
    }

    /// Builds the resolver with the configured gateways, Garden API and cache.
    pub fn from_config(config: &ProfilesConfig) -> Result<Self, ProfileError> {
        let cache = match &config.cache_path {
            Some(path) => SqliteProfileCache::open(path)?,
            None => SqliteProfileCache::in_memory()?,
        };
        let client = http_client(config.fetch_timeout)?;

        let mut resolver = Self::new(cache)
            .with_address_source(GardenApiSource::new(client.clone(), &config.garden_api))
            .with_image_check(ImageSizeValidator::new(
                client.clone(),
                config.max_image_bytes(),
            ));
        for gateway in &config.ipfs_gateways {
            resolver = resolver.with_digest_source(IpfsGatewaySource::new(client.clone(), gateway));
        }

        info!(
            gateways = config.ipfs_gateways.len(),
            cache = ?config.cache_path,
            "Profile resolver ready"
        );
        Ok(resolver)
    }

    #[must_use]
    pub fn with_digest_source(mut self, source: impl MetadataSource + 'static) -> Self {
        self.digest_sources.push(Box::new(source));
        self
    }

    #[must_use]
    pub fn with_address_source(mut self, source: impl MetadataSource + 'static) -> Self {
        self.address_sources.push(Box::new(source));
        self
    }

    #[must_use]
    pub fn with_image_check(mut self, check: impl ImageCheck + 'static) -> Self {
        self.images = Some(Box::new(check));
        self
    }

    pub fn cache(&self) -> &SqliteProfileCache {
        &self.cache
    }

    async fn cached(&self, key: &str) -> Option<(Option<String>, ProfileMetadata)> {
        let cache = self.cache.clone();
        let id = key.to_string();
        match task::spawn_blocking(move || cache.get(&id)).await {
            Ok(Ok(hit)) => hit.map(|entry| (entry.cid_v0, entry.profile)),
            Ok(Err(error)) => {
                warn!(%key, %error, "Profile cache read failed");
                None
            }
            Err(error) => {
                warn!(%key, %error, "Profile cache read task failed");
                None
            }
        }
    }

    async fn store(&self, key: &str, cid_v0: Option<&str>, profile: &ProfileMetadata) {
        let cache = self.cache.clone();
        let (id, cid_v0, profile) = (
            key.to_string(),
            cid_v0.map(str::to_string),
            profile.clone(),
        );
        match task::spawn_blocking(move || cache.put(&id, cid_v0.as_deref(), &profile)).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => warn!(%key, %error, "Profile cache write failed"),
            Err(error) => warn!(%key, %error, "Profile cache write task failed"),
        }
    }

    async fn first_hit(
        &self,
        sources: &[Box<dyn MetadataSource>],
        lookup: Lookup<'_>,
    ) -> Option<ProfileMetadata> {
        for source in sources {
            match source.fetch(lookup).await {
                Ok(Some(profile)) => {
                    let profile = self.checked(profile.stripped()).await;
                    if !profile.is_empty() {
                        return Some(profile);
                    }
                    debug!(source = source.name(), "Empty profile document");
                }
                Ok(None) => debug!(source = source.name(), "No profile"),
                Err(error) => warn!(source = source.name(), %error, "Profile fetch failed"),
            }
        }
        None
    }

    async fn checked(&self, mut profile: ProfileMetadata) -> ProfileMetadata {
        if let (Some(images), Some(url)) = (&self.images, &profile.preview_image_url) {
            if let Err(error) = images.check(url).await {
                warn!(%error, "Dropping preview image");
                profile.preview_image_url = None;
            }
        }
        profile
    }
}

#[async_trait]
impl ProfileResolver for CachedProfileResolver {
    async fn resolve_address(&self, address: &Address) -> Option<ProfileMetadata> {
        let key = address.to_string();
        if let Some((_, profile)) = self.cached(&key).await {
            return Some(profile);
        }

        let profile = self
            .first_hit(&self.address_sources, Lookup::Address(address))
            .await?;
        self.store(&key, None, &profile).await;
        Some(profile)
    }

    async fn resolve_digest(&self, digest: &TxHash) -> ResolvedDigest {
        let cid_v0 = digest.to_cid_v0();
        let key = digest.to_plain_hex();
        if let Some((cached_cid, profile)) = self.cached(&key).await {
            return ResolvedDigest {
                cid_v0: cached_cid.unwrap_or(cid_v0),
                profile: Some(profile),
            };
        }

        let profile = self.first_hit(&self.digest_sources, Lookup::Cid(&cid_v0)).await;
        if let Some(profile) = &profile {
            self.store(&key, Some(&cid_v0), profile).await;
        }
        ResolvedDigest { cid_v0, profile }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // =========================================================================
    // TEST HELPERS
    // =========================================================================

    enum Reply {
        Profile(ProfileMetadata),
        Empty,
        Fail,
    }

    struct FakeSource {
        name: &'static str,
        reply: Reply,
        calls: Arc<AtomicUsize>,
    }

    impl FakeSource {
        fn new(name: &'static str, reply: Reply) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let source = Self {
                name,
                reply,
                calls: calls.clone(),
            };
            (source, calls)
        }
    }

    #[async_trait]
    impl MetadataSource for FakeSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(
            &self,
            _lookup: Lookup<'_>,
        ) -> Result<Option<ProfileMetadata>, ProfileError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Reply::Profile(profile) => Ok(Some(profile.clone())),
                Reply::Empty => Ok(Some(ProfileMetadata {
                    name: Some("  ".into()),
                    ..Default::default()
                })),
                Reply::Fail => Err(ProfileError::Status {
                    url: self.name.to_string(),
                    status: 502,
                }),
            }
        }
    }

    struct RejectAll;

    #[async_trait]
    impl ImageCheck for RejectAll {
        async fn check(&self, _url: &str) -> Result<(), ProfileError> {
            Err(ProfileError::ImageTooLarge { size: 2, limit: 1 })
        }
    }

    fn alice() -> ProfileMetadata {
        ProfileMetadata {
            name: Some("Alice".into()),
            description: Some(String::new()),
            preview_image_url: Some("https://img.example/alice.png".into()),
            ..Default::default()
        }
    }

    fn resolver() -> CachedProfileResolver {
        CachedProfileResolver::new(SqliteProfileCache::in_memory().unwrap())
    }

    // =========================================================================
    // TESTS
    // =========================================================================

    #[tokio::test]
    async fn test_falls_through_failed_and_empty_sources() {
        let (down, down_calls) = FakeSource::new("down", Reply::Fail);
        let (blank, _) = FakeSource::new("blank", Reply::Empty);
        let (up, up_calls) = FakeSource::new("up", Reply::Profile(alice()));
        let resolver = resolver()
            .with_digest_source(down)
            .with_digest_source(blank)
            .with_digest_source(up);

        let digest = TxHash::new([3u8; 32]);
        let resolved = resolver.resolve_digest(&digest).await;

        assert_eq!(resolved.cid_v0, digest.to_cid_v0());
        let profile = resolved.profile.unwrap();
        assert_eq!(profile.name.as_deref(), Some("Alice"));
        assert_eq!(profile.description, None);
        assert_eq!(down_calls.load(Ordering::SeqCst), 1);
        assert_eq!(up_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_sources() {
        let (up, calls) = FakeSource::new("up", Reply::Profile(alice()));
        let resolver = resolver().with_address_source(up);
        let address = Address::new([9u8; 20]);

        let first = resolver.resolve_address(&address).await;
        let second = resolver.resolve_address(&address).await;

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cache().len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_total_failure_keeps_cid_and_caches_nothing() {
        let (down, _) = FakeSource::new("down", Reply::Fail);
        let resolver = resolver().with_digest_source(down);

        let digest = TxHash::new([4u8; 32]);
        let resolved = resolver.resolve_digest(&digest).await;

        assert_eq!(resolved.cid_v0, digest.to_cid_v0());
        assert!(resolved.profile.is_none());
        assert!(resolver.cache().is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_rejected_image_is_dropped() {
        let (up, _) = FakeSource::new("up", Reply::Profile(alice()));
        let resolver = resolver()
            .with_address_source(up)
            .with_image_check(RejectAll);

        let profile = resolver
            .resolve_address(&Address::new([1u8; 20]))
            .await
            .unwrap();

        assert_eq!(profile.name.as_deref(), Some("Alice"));
        assert!(profile.preview_image_url.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_lookups_share_the_cache() {
        let (up, calls) = FakeSource::new("up", Reply::Profile(alice()));
        let resolver = Arc::new(resolver().with_digest_source(up));
        let digest = TxHash::new([8u8; 32]);

        resolver.resolve_digest(&digest).await;
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.resolve_digest(&digest).await })
            })
            .collect();
        for handle in handles {
            let resolved = handle.await.unwrap();
            assert_eq!(resolved.profile.unwrap().name.as_deref(), Some("Alice"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_address_lookup_ignores_digest_sources() {
        let (ipfs, calls) = FakeSource::new("ipfs", Reply::Profile(alice()));
        let resolver = resolver().with_digest_source(ipfs);

        assert!(resolver.resolve_address(&Address::new([2u8; 20])).await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
