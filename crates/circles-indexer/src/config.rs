//! Runtime configuration from environment variables.

use circles_profiles::ProfilesConfig;
use circles_projection::ProjectionConfig;
use shared_types::{Address, ValueParseError};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An address variable did not hold a 20-byte hex address
    #[error("invalid address in {var}: {source}")]
    InvalidAddress {
        var: &'static str,
        #[source]
        source: ValueParseError,
    },

    /// The event file does not exist
    #[error("event file not found: {0}")]
    MissingEventsFile(PathBuf),
}

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// JSON-lines file of ordered event envelopes
    pub events_file: PathBuf,

    /// Optional JSON-lines dump of the final ledger
    pub dump_file: Option<PathBuf>,

    /// Resolve profiles over the network; otherwise only CIDs are recorded
    pub fetch_profiles: bool,

    /// `EnvFilter` directive
    pub log_level: String,

    pub projection: ProjectionConfig,
    pub profiles: ProfilesConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            events_file: PathBuf::from("events.jsonl"),
            dump_file: None,
            fetch_profiles: false,
            log_level: "info".to_string(),
            projection: ProjectionConfig::default(),
            profiles: ProfilesConfig::default(),
        }
    }
}

impl IndexerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CIRCLES_EVENTS_FILE`: Event file path (default: events.jsonl)
    /// - `CIRCLES_DUMP_FILE`: Ledger dump path (default: none)
    /// - `CIRCLES_FETCH_PROFILES`: Enable profile fetching (default: false)
    /// - `CIRCLES_LOG_LEVEL`: Log filter, `RUST_LOG` takes precedence (default: info)
    /// - `CIRCLES_METRI_FEE_COLLECTOR`: Fee collector address (default: none)
    /// - `CIRCLES_UNTRUST_GRACE_SECS`: V2 trust grace window (default: 3600)
    ///
    /// Profile settings are read by [`ProfilesConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mut projection = defaults.projection;
        if let Ok(raw) = env::var("CIRCLES_METRI_FEE_COLLECTOR") {
            if !raw.trim().is_empty() {
                let collector = raw.trim().parse::<Address>().map_err(|source| {
                    ConfigError::InvalidAddress {
                        var: "CIRCLES_METRI_FEE_COLLECTOR",
                        source,
                    }
                })?;
                projection.metri_fee_collector = Some(collector);
            }
        }
        if let Some(grace) = env::var("CIRCLES_UNTRUST_GRACE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            projection.untrust_grace_secs = grace;
        }

        Ok(Self {
            events_file: env::var("CIRCLES_EVENTS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.events_file),

            dump_file: env::var("CIRCLES_DUMP_FILE").ok().map(PathBuf::from),

            fetch_profiles: env::var("CIRCLES_FETCH_PROFILES")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.fetch_profiles),

            log_level: env::var("RUST_LOG")
                .or_else(|_| env::var("CIRCLES_LOG_LEVEL"))
                .unwrap_or(defaults.log_level),

            projection,
            profiles: ProfilesConfig::from_env(),
        })
    }

    /// Checks that the configured inputs exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.events_file.is_file() {
            return Err(ConfigError::MissingEventsFile(self.events_file.clone()));
        }
        Ok(())
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_parsing() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" 1 "));
        assert!(parse_flag("YES"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_missing_events_file() {
        let config = IndexerConfig {
            events_file: PathBuf::from("/nonexistent/events.jsonl"),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingEventsFile(_))
        ));
    }
}
