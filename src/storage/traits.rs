//! Storage Trait Definitions
//!
//! Defines the address cache interface sitting in front of the gateway's
//! address-issuance call. Implementations can use SQLite (persistent across
//! sessions) or in-memory (testing).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed namespace the cached addresses are stored under
pub const CACHE_NAMESPACE: &str = "market_deposit_address";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A deposit address remembered for one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAddress {
    /// User the gateway issued the address for
    pub user_id: Option<String>,
    /// Asset symbol, the cache key
    pub currency: String,
    pub address: String,
}

impl CachedAddress {
    pub fn new(
        user_id: Option<String>,
        currency: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            currency: currency.into(),
            address: address.into(),
        }
    }
}

/// Deposit address cache, keyed by currency
///
/// Implementations:
/// - `SqliteAddressCache` - Persistent storage with SQLite
/// - `MemoryAddressCache` - In-memory storage for testing
#[async_trait]
pub trait AddressCache: Send + Sync {
    /// Get the cached address for a currency
    async fn get(&self, currency: &str) -> StorageResult<Option<CachedAddress>>;

    /// Store (or overwrite) the address for its currency
    async fn put(&self, entry: &CachedAddress) -> StorageResult<()>;

    /// Forget the address for a currency; returns whether one existed
    async fn clear(&self, currency: &str) -> StorageResult<bool>;

    /// Forget every cached address
    async fn clear_all(&self) -> StorageResult<u64>;
}
