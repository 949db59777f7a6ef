//! # circles-projection
//!
//! Projects the ordered log stream of the Circles network into a ledger of
//! avatars, tokens, trust relations, balances and transfers.
//!
//! ## Processing Model
//!
//! ```text
//! EventEnvelope ──→ [order check] ──→ [loader: read set] ──→ EntityStore (concurrent reads)
//!                                            │
//!                                            ↓
//!                                       Snapshot ──→ [handler: synchronous writes]
//!                                                          │
//!                         ┌────────────────────────────────┤
//!                         ↓                                ↓
//!              EntityStore::save (dirty records)   SourceRegistrar (subscription requests)
//! ```
//!
//! - **Total order**: events must arrive with a strictly increasing
//!   `(block, transaction index, log index)` position.
//! - **Read then write**: every entity a handler touches is declared and
//!   loaded before the handler runs; handlers never await.
//! - **Append/merge only**: entities are created lazily and never deleted.

pub mod adapters;
pub mod domain;
pub mod events;
pub mod handlers;
pub mod ports;
pub mod service;
pub mod snapshot;

pub use adapters::*;
pub use domain::*;
pub use events::*;
pub use ports::*;
pub use service::{ProcessOutcome, ProjectionConfig, ProjectionService, ProjectionStats};
