//! # Shared Types Crate
//!
//! Value objects and contracts shared across the Circles indexer crates.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: addresses, hashes and amounts are defined once
//!   here and reused by the projection engine, the profile resolver and the
//!   runtime.
//! - **Canonical Text Form**: every identifier renders as lowercase `0x` hex so
//!   composite entity keys are deterministic.
//! - **Ports, Not Implementations**: collaborator contracts (`ProfileResolver`)
//!   live here; adapters live in their own crates.

pub mod errors;
pub mod primitives;
pub mod profile;
pub mod subscription;

pub use errors::*;
pub use primitives::*;
pub use profile::*;
pub use subscription::*;
