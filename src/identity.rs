//! User Identity Resolution
//!
//! Deposits are tagged with a user id the gateway can attribute incomes to.
//! Several sources may know one; the first available wins:
//!
//! 1. the embedding host (e.g. the chat app running the mini-app)
//! 2. the locally-known user id
//! 3. the connected wallet address

use std::sync::Arc;

/// An embedding context that may supply a stable user identifier
pub trait HostIdentity: Send + Sync {
    fn user_id(&self) -> Option<String>;
}

/// Host identity fixed at startup (e.g. read from the environment)
#[derive(Debug, Clone, Default)]
pub struct StaticHostIdentity {
    user_id: Option<String>,
}

impl StaticHostIdentity {
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            user_id: user_id.filter(|id| !id.trim().is_empty()),
        }
    }
}

impl HostIdentity for StaticHostIdentity {
    fn user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}

/// Where a resolved identity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    Host,
    Local,
    Wallet,
}

/// A resolved user identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub source: IdentitySource,
}

/// Picks the user id for a deposit
#[derive(Clone, Default)]
pub struct IdentityResolver {
    host: Option<Arc<dyn HostIdentity>>,
    local_user_id: Option<String>,
}

impl IdentityResolver {
    pub fn new(host: Option<Arc<dyn HostIdentity>>, local_user_id: Option<String>) -> Self {
        Self {
            host,
            local_user_id: local_user_id.filter(|id| !id.trim().is_empty()),
        }
    }

    /// Resolve with the connected wallet address as the last resort
    pub fn resolve(&self, wallet_address: &str) -> Identity {
        if let Some(user_id) = self.host.as_ref().and_then(|h| h.user_id()) {
            return Identity {
                user_id,
                source: IdentitySource::Host,
            };
        }

        if let Some(user_id) = &self.local_user_id {
            return Identity {
                user_id: user_id.clone(),
                source: IdentitySource::Local,
            };
        }

        Identity {
            user_id: wallet_address.to_string(),
            source: IdentitySource::Wallet,
        }
    }
}
