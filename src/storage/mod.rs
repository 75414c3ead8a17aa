//! Storage Layer Module
//!
//! Persistence for the deposit-address cache.
//!
//! This module contains:
//! - Cache trait definition for abstraction
//! - SQLite implementation (persists across sessions)
//! - In-memory implementation for testing

pub mod memory;
pub mod sqlite;
pub mod traits;

// Re-exports for convenience
pub use memory::MemoryAddressCache;
pub use sqlite::SqliteAddressCache;
pub use traits::{AddressCache, CachedAddress, StorageError, StorageResult, CACHE_NAMESPACE};
