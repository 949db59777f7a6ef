//! Adapters for the outbound ports.

pub mod memory_store;
pub mod registrar;

pub use memory_store::InMemoryEntityStore;
pub use registrar::BusRegistrar;
