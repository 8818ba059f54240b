//! Store configuration (`stores/{storeId}`).

use serde::{Deserialize, Serialize};

/// Public details of a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
}

impl StoreProfile {
    /// Build a profile from form input, trimming each field.
    #[must_use]
    pub fn new(name: &str, address: &str, phone: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            address: address.trim().to_string(),
            phone: phone.trim().to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_missing_fields_default_to_empty() {
        let profile: StoreProfile = serde_json::from_value(json!({"name": "Corner Shop"})).unwrap();
        assert_eq!(profile.name, "Corner Shop");
        assert!(profile.address.is_empty());
        assert!(profile.phone.is_empty());
    }

    #[test]
    fn test_new_trims_input() {
        let profile = StoreProfile::new("  Corner Shop ", " 1 Main St", "555-0100 ");
        assert_eq!(profile, StoreProfile::new("Corner Shop", "1 Main St", "555-0100"));
    }
}
