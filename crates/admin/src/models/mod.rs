//! Back-office domain models.
//!
//! Each model mirrors one document shape in the store. Field names are
//! camelCase on the wire; reads go through [`crate::store::Document::decode`]
//! and writes through [`crate::store::to_fields`].

pub mod authorization;
pub mod order;
pub mod product;
pub mod store_profile;

pub use authorization::AuthorizationRecord;
pub use order::{Order, OrderItem};
pub use product::{NewProduct, Product, ProductPatch};
pub use store_profile::StoreProfile;

use storedesk_core::PriceError;
use thiserror::Error;

/// Candidate input rejected before any write.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Product name is empty or whitespace.
    #[error("product name is required")]
    BlankName,

    /// Price is missing, not a number, or negative.
    #[error(transparent)]
    Price(#[from] PriceError),

    /// Order status outside the known set.
    #[error("unknown order status: {0}")]
    UnknownStatus(String),

    /// A partial update with no fields set.
    #[error("nothing to update")]
    EmptyPatch,
}
