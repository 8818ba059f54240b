//! Authorization records (`users/{uid}`).
//!
//! Provisioned out-of-band; the back-office only ever reads them.

use serde::Deserialize;

use storedesk_core::{Role, StoreId};

/// The role and store binding of a principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRecord {
    /// Role string; anything other than `STORE_ADMIN` is [`Role::Other`].
    #[serde(default)]
    pub role: Option<Role>,
    /// Store the principal administers.
    #[serde(default)]
    pub store_id: Option<String>,
}

impl AuthorizationRecord {
    /// The store this record grants admin access to, if any.
    ///
    /// Access requires the `STORE_ADMIN` role and a non-empty store ID.
    #[must_use]
    pub fn grants(&self) -> Option<StoreId> {
        if !self.role.is_some_and(|role| role.is_store_admin()) {
            return None;
        }
        self.store_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(StoreId::new)
    }
}
