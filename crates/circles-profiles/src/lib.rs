//! # Circles Profiles
//!
//! Resolves avatar profile metadata for the projection engine.
//!
//! | Lookup | Sources | Cache key |
//! |---|---|---|
//! | V1 address | Garden API | `0x`-prefixed address |
//! | V2 metadata digest | IPFS gateways, in order | digest hex |
//!
//! Results are written through to a SQLite cache and served from it on
//! every later lookup. Fetch failures never surface to the caller.

pub mod cache;
pub mod config;
pub mod error;
pub mod resolver;
pub mod sources;
pub mod validate;

pub use cache::{CachedProfile, SqliteProfileCache};
pub use config::ProfilesConfig;
pub use error::ProfileError;
pub use resolver::CachedProfileResolver;
pub use sources::{GardenApiSource, IpfsGatewaySource, Lookup, MetadataSource};
pub use validate::{ImageCheck, ImageSizeValidator};
