//! Status and role enums stored on documents.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Order processing status.
///
/// No transition rules are enforced: an admin may move an order from any
/// status to any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Every status, in the order they appear in status pickers.
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::Processing,
        Self::Completed,
        Self::Cancelled,
    ];

    /// Wire value stored in the `status` field.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// Role carried by an authorization record (`users/{uid}.role`).
///
/// Only [`Role::StoreAdmin`] grants access to the back-office. Roles this
/// system does not know about deserialize to [`Role::Other`] instead of
/// failing, so an unexpected value is treated as "not an admin".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Administrator bound to a single store.
    StoreAdmin,
    /// Any other role.
    #[serde(other)]
    Other,
}

impl Role {
    /// Whether this role may use the store back-office.
    #[must_use]
    pub const fn is_store_admin(&self) -> bool {
        matches!(self, Self::StoreAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoreAdmin => f.write_str("STORE_ADMIN"),
            Self::Other => f.write_str("OTHER"),
        }
    }
}
