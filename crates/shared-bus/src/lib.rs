//! # Shared Bus - Source Subscription Bus
//!
//! Carries [`SubscriptionRequest`]s from the projection engine to whatever
//! component watches the chain for logs.
//!
//! ```text
//! ┌──────────────────┐                      ┌──────────────────┐
//! │ Projection       │                      │ Chain watcher    │
//! │ engine           │    publish()         │                  │
//! │                  │ ──────┐              │                  │
//! └──────────────────┘       │              └──────────────────┘
//!                            ▼                      ↑
//!                   ┌──────────────────┐           │
//!                   │ SubscriptionBus  │ ──────────┘
//!                   │ (dedup registry) │  subscribe()
//!                   └──────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - **Once per source:** a `(kind, address)` pair is broadcast at most once
//!   for the lifetime of the bus; repeats are counted and dropped.
//! - **No blocking:** publishing never waits on subscribers. A lagging
//!   subscriber loses the oldest requests and is told how many.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod filter;
pub mod publisher;
pub mod registry;
pub mod subscriber;

pub use filter::SubscriptionFilter;
pub use publisher::{PublishOutcome, SubscriptionBus, SubscriptionPublisher};
pub use registry::IssuedSources;
pub use subscriber::{RequestStream, Subscription, SubscriptionError};

pub use shared_types::{SourceKind, SubscriptionRequest};

/// Maximum requests buffered per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
