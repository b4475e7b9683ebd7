//! Credential broker seam.
//!
//! Interactive sign-in and token caching live outside this core. The client
//! asks the broker for a fresh bearer token on every call; it never caches
//! tokens itself. Brokers must serialize refreshes per account.

use async_trait::async_trait;
use ws_core::Result;

/// Which plane a token grants access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenScope {
    /// Resource queries against the management plane (project discovery).
    Management,
    /// Per-workstation control plane calls (list, create, start, stop).
    DataPlane,
}

/// A signed-in developer account known to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub display_name: String,
}

#[async_trait]
pub trait CredentialBroker: Send + Sync {
    /// Obtain a bearer token for the given scope and account.
    async fn get_token(&self, scope: TokenScope, account_id: &str) -> Result<String>;

    /// All accounts currently signed in.
    async fn get_all_accounts(&self) -> Result<Vec<Account>>;
}
