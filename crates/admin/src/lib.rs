//! Storedesk Admin library.
//!
//! This crate provides the store back-office as a library, allowing it to be
//! tested and reused.
//!
//! # Security
//!
//! Every page except sign-in and registration requires a store admin: a
//! principal whose `users/{uid}` authorization record carries the
//! `STORE_ADMIN` role and a store ID. All reads and writes are scoped to that
//! store.
//!
//! # Modules
//!
//! - [`identity`] - Identity provider boundary (Firebase Auth, in-memory)
//! - [`store`] - Document store boundary (Firestore, in-memory)
//! - [`gate`] - Session gate: turns sign-in notifications into access decisions
//! - [`views`] - Store-scoped resource views (products, orders, store configuration)
//! - [`routes`] - HTTP handlers and templates

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod filters;
pub mod gate;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
pub mod views;
