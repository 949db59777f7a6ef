//! Domain layer: entities, keys and errors.

pub mod entities;
pub mod errors;
pub mod keys;

pub use entities::*;
pub use errors::*;
pub use keys::*;
