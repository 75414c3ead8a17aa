//! In-Memory Address Cache
//!
//! Data is lost when the process exits.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::{AddressCache, CachedAddress, StorageResult};

/// In-memory address cache
///
/// Uses Arc<RwLock<>> so clones share the same entries.
#[derive(Clone, Default)]
pub struct MemoryAddressCache {
    entries: Arc<RwLock<HashMap<String, CachedAddress>>>,
}

impl MemoryAddressCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached currencies
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl AddressCache for MemoryAddressCache {
    async fn get(&self, currency: &str) -> StorageResult<Option<CachedAddress>> {
        Ok(self.entries.read().await.get(currency).cloned())
    }

    async fn put(&self, entry: &CachedAddress) -> StorageResult<()> {
        self.entries
            .write()
            .await
            .insert(entry.currency.clone(), entry.clone());
        Ok(())
    }

    async fn clear(&self, currency: &str) -> StorageResult<bool> {
        Ok(self.entries.write().await.remove(currency).is_some())
    }

    async fn clear_all(&self) -> StorageResult<u64> {
        let mut entries = self.entries.write().await;
        let count = entries.len() as u64;
        entries.clear();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_clear() {
        let cache = MemoryAddressCache::new();
        assert!(cache.get("TON").await.unwrap().is_none());

        let entry = CachedAddress::new(Some("42".to_string()), "TON", "EQ_addr");
        cache.put(&entry).await.unwrap();
        assert_eq!(cache.get("TON").await.unwrap(), Some(entry));

        assert!(cache.clear("TON").await.unwrap());
        assert!(!cache.clear("TON").await.unwrap());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache = MemoryAddressCache::new();
        let other = cache.clone();

        cache
            .put(&CachedAddress::new(None, "TON", "EQ_a"))
            .await
            .unwrap();
        other
            .put(&CachedAddress::new(None, "USDT", "EQ_b"))
            .await
            .unwrap();

        assert_eq!(cache.len().await, 2);
        assert_eq!(other.clear_all().await.unwrap(), 2);
        assert!(cache.is_empty().await);
    }
}
