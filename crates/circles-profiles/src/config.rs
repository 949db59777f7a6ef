//! Profile resolution configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Gateways tried in order for IPFS documents.
pub const DEFAULT_IPFS_GATEWAYS: [&str; 3] = [
    "https://cloudflare-ipfs.com/ipfs",
    "https://ipfs.io/ipfs",
    "https://gateway.pinata.cloud/ipfs",
];

pub const DEFAULT_GARDEN_API: &str = "https://api.circles.garden";

/// Largest preview image accepted, in KiB.
pub const DEFAULT_MAX_IMAGE_KB: u64 = 150;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilesConfig {
    /// SQLite cache file. `None` keeps the cache in memory.
    pub cache_path: Option<PathBuf>,

    /// IPFS gateways, highest priority first
    pub ipfs_gateways: Vec<String>,

    /// Base URL of the Garden API (V1 profiles)
    pub garden_api: String,

    pub max_image_kb: u64,

    /// Per-request timeout
    pub fetch_timeout: Duration,
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            cache_path: Some(PathBuf::from(".cache/profiles.db")),
            ipfs_gateways: DEFAULT_IPFS_GATEWAYS.iter().map(|g| g.to_string()).collect(),
            garden_api: DEFAULT_GARDEN_API.to_string(),
            max_image_kb: DEFAULT_MAX_IMAGE_KB,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl ProfilesConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CIRCLES_PROFILE_CACHE`: SQLite cache path, `:memory:` for none (default: .cache/profiles.db)
    /// - `CIRCLES_IPFS_GATEWAYS`: Comma-separated gateway list (default: cloudflare, ipfs.io, pinata)
    /// - `CIRCLES_GARDEN_API`: Garden API base URL (default: https://api.circles.garden)
    /// - `CIRCLES_MAX_IMAGE_KB`: Preview image size limit (default: 150)
    /// - `CIRCLES_FETCH_TIMEOUT_SECS`: Per-request timeout (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            cache_path: match env::var("CIRCLES_PROFILE_CACHE") {
                Ok(path) if path == ":memory:" => None,
                Ok(path) => Some(PathBuf::from(path)),
                Err(_) => defaults.cache_path,
            },

            ipfs_gateways: env::var("CIRCLES_IPFS_GATEWAYS")
                .map(|v| parse_list(&v))
                .ok()
                .filter(|gateways| !gateways.is_empty())
                .unwrap_or(defaults.ipfs_gateways),

            garden_api: env::var("CIRCLES_GARDEN_API").unwrap_or(defaults.garden_api),

            max_image_kb: env::var("CIRCLES_MAX_IMAGE_KB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_image_kb),

            fetch_timeout: env::var("CIRCLES_FETCH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_timeout),
        }
    }

    #[must_use]
    pub fn max_image_bytes(&self) -> u64 {
        self.max_image_kb.saturating_mul(1024)
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().trim_end_matches('/'))
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
