//! Storedesk Core - Shared types library.
//!
//! This crate provides the domain types used by the Storedesk components:
//! - `admin` - Store back-office (session gate, resource views, HTTP surface)
//! - `integration-tests` - Cross-module tests
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no document store access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for document IDs, prices, emails, statuses and roles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
