//! Address Provisioner
//!
//! Read-through cache in front of the gateway's address-issuance call.
//! A cached address for the currency is returned without touching the
//! network; otherwise a new one is requested and remembered.

use std::sync::Arc;

use super::types::DepositError;
use crate::common::logging::log_cache_event;
use crate::gateway::{NewAddressRequest, PaymentGateway};
use crate::storage::{AddressCache, CachedAddress};

/// Obtains and caches deposit addresses
#[derive(Clone)]
pub struct AddressProvisioner {
    gateway: Arc<dyn PaymentGateway>,
    cache: Arc<dyn AddressCache>,
}

impl AddressProvisioner {
    pub fn new(gateway: Arc<dyn PaymentGateway>, cache: Arc<dyn AddressCache>) -> Self {
        Self { gateway, cache }
    }

    /// Return the deposit address for `currency`, issuing one if none is cached
    pub async fn get_or_create_deposit_address(
        &self,
        user_id: &str,
        currency: &str,
    ) -> Result<String, DepositError> {
        match self.cache.get(currency).await {
            Ok(Some(entry)) if Self::usable(&entry, user_id) => {
                log_cache_event("hit", currency, None);
                return Ok(entry.address);
            }
            Ok(Some(entry)) => {
                tracing::info!(
                    currency,
                    cached_user = ?entry.user_id,
                    "cached deposit address belongs to another user, re-provisioning"
                );
            }
            Ok(None) => log_cache_event("miss", currency, None),
            Err(e) => {
                // Treated as a miss
                log_cache_event("read", currency, Some(&e.to_string()));
            }
        }

        let request = NewAddressRequest::new(currency, Some(user_id.to_string()));
        let response = self.gateway.create_address(&request).await.map_err(|e| {
            tracing::error!(currency, error = %e, "address issuance failed");
            DepositError::AddressUnavailable(e.to_string())
        })?;

        let address = response.address.trim().to_string();
        if address.is_empty() {
            return Err(DepositError::AddressUnavailable(
                "gateway returned an empty address".to_string(),
            ));
        }

        let owner = response.user_id.or_else(|| Some(user_id.to_string()));
        let entry = CachedAddress::new(owner, currency, address.clone());
        match self.cache.put(&entry).await {
            Ok(()) => log_cache_event("write", currency, None),
            Err(e) => log_cache_event("write", currency, Some(&e.to_string())),
        }

        tracing::info!(currency, address = %address, "deposit address provisioned");
        Ok(address)
    }

    /// Drop the cached address for `currency`
    pub async fn invalidate(&self, currency: &str) -> bool {
        match self.cache.clear(currency).await {
            Ok(existed) => {
                log_cache_event("clear", currency, None);
                existed
            }
            Err(e) => {
                log_cache_event("clear", currency, Some(&e.to_string()));
                false
            }
        }
    }

    fn usable(entry: &CachedAddress, user_id: &str) -> bool {
        !entry.address.is_empty()
            && entry.user_id.as_deref().map_or(true, |owner| owner == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayError, MockPaymentGateway, NewAddressResponse};
    use crate::storage::MemoryAddressCache;

    fn issued(address: &str) -> NewAddressResponse {
        NewAddressResponse {
            address: address.to_string(),
            user_id: None,
        }
    }

    #[tokio::test]
    async fn test_provisioning_is_idempotent() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_address()
            .withf(|req| req.currency == "TON" && req.user_id.as_deref() == Some("user-1"))
            .times(1)
            .returning(|_| Ok(issued("EQ_deposit")));

        let cache = Arc::new(MemoryAddressCache::new());
        let provisioner = AddressProvisioner::new(Arc::new(gateway), cache.clone());

        let first = provisioner.get_or_create_deposit_address("user-1", "TON").await.unwrap();
        let second = provisioner.get_or_create_deposit_address("user-1", "TON").await.unwrap();

        assert_eq!(first, "EQ_deposit");
        assert_eq!(second, "EQ_deposit");
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_gateway() {
        let gateway = MockPaymentGateway::new();
        let cache = Arc::new(MemoryAddressCache::new());
        cache
            .put(&CachedAddress::new(Some("user-1".to_string()), "TON", "EQ_cached"))
            .await
            .unwrap();

        let provisioner = AddressProvisioner::new(Arc::new(gateway), cache);
        let address = provisioner.get_or_create_deposit_address("user-1", "TON").await.unwrap();
        assert_eq!(address, "EQ_cached");
    }

    #[tokio::test]
    async fn test_other_users_entry_is_reprovisioned() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_address()
            .times(1)
            .returning(|_| Ok(issued("EQ_fresh")));

        let cache = Arc::new(MemoryAddressCache::new());
        cache
            .put(&CachedAddress::new(Some("user-0".to_string()), "TON", "EQ_stale"))
            .await
            .unwrap();

        let provisioner = AddressProvisioner::new(Arc::new(gateway), cache.clone());
        let address = provisioner.get_or_create_deposit_address("user-1", "TON").await.unwrap();
        assert_eq!(address, "EQ_fresh");

        let entry = cache.get("TON").await.unwrap().unwrap();
        assert_eq!(entry.user_id.as_deref(), Some("user-1"));
    }

    #[tokio::test]
    async fn test_gateway_failure_is_address_unavailable() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_address().returning(|_| {
            Err(GatewayError::Api {
                status: 503,
                body: "maintenance".to_string(),
            })
        });

        let cache = Arc::new(MemoryAddressCache::new());
        let provisioner = AddressProvisioner::new(Arc::new(gateway), cache.clone());

        let err = provisioner
            .get_or_create_deposit_address("user-1", "TON")
            .await
            .unwrap_err();
        assert!(matches!(err, DepositError::AddressUnavailable(_)));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_address_is_not_cached() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_address().returning(|_| Ok(issued("  ")));

        let cache = Arc::new(MemoryAddressCache::new());
        let provisioner = AddressProvisioner::new(Arc::new(gateway), cache.clone());

        let err = provisioner
            .get_or_create_deposit_address("user-1", "TON")
            .await
            .unwrap_err();
        assert!(matches!(err, DepositError::AddressUnavailable(_)));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalidate_forces_new_issuance() {
        let mut gateway = MockPaymentGateway::new();
        let mut seq = 0;
        gateway.expect_create_address().times(2).returning(move |_| {
            seq += 1;
            Ok(issued(&format!("EQ_{}", seq)))
        });

        let cache = Arc::new(MemoryAddressCache::new());
        let provisioner = AddressProvisioner::new(Arc::new(gateway), cache);

        assert_eq!(
            provisioner.get_or_create_deposit_address("u", "TON").await.unwrap(),
            "EQ_1"
        );
        assert!(provisioner.invalidate("TON").await);
        assert!(!provisioner.invalidate("TON").await);
        assert_eq!(
            provisioner.get_or_create_deposit_address("u", "TON").await.unwrap(),
            "EQ_2"
        );
    }
}
