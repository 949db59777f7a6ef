//! # Circles Indexer Runtime
//!
//! Replays an ordered file of decoded Circles logs through the projection
//! engine.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Install the tracing subscriber
//! 3. Build the profile resolver (network-backed or no-op)
//! 4. Wire store, subscription bus and projection service
//! 5. Start the source watcher
//! 6. Replay the event feed and report

pub mod config;
pub mod feed;
pub mod runtime;

pub use config::{ConfigError, IndexerConfig};
pub use feed::{EventFeed, FeedError};
pub use runtime::{
    profile_resolver, spawn_source_watcher, IndexerRuntime, ReplaySummary, RuntimeError,
};
