//! Integration tests for the session gate.
//!
//! Sign-in, registration and sign-out against the in-memory identity
//! provider, with authorization records in the in-memory document store.

#![allow(clippy::unwrap_used)]

use storedesk_admin::gate::Access;
use storedesk_core::Email;
use storedesk_integration_tests::{
    ADMIN_EMAIL, CUSTOMER_EMAIL, PASSWORD, TestContext, UNPROVISIONED_EMAIL, seeded_identity,
    seeded_store,
};

#[tokio::test]
async fn test_starts_signed_out() {
    let ctx = TestContext::new().await;
    let state = ctx.state.gate().snapshot();

    assert!(!state.loading);
    assert!(!state.is_admin);
    assert!(state.principal.is_none());
    assert!(matches!(ctx.state.gate().access(), Access::Denied));
}

#[tokio::test]
async fn test_store_admin_is_scoped_to_their_store() {
    let ctx = TestContext::new().await;
    ctx.sign_in(ADMIN_EMAIL).await;

    let admin = ctx.state.gate().access().granted().unwrap();
    assert_eq!(admin.store_id().as_str(), "store-1");
    assert_eq!(admin.principal().uid.as_str(), "admin-1");
    assert_eq!(admin.email().map(Email::as_str), Some(ADMIN_EMAIL));
}

#[tokio::test]
async fn test_non_admins_are_signed_out_again() {
    for email in [CUSTOMER_EMAIL, UNPROVISIONED_EMAIL] {
        let ctx = TestContext::new().await;
        ctx.sign_in(email).await;

        let state = ctx.state.gate().snapshot();
        assert!(!state.is_admin, "{email} must not be admitted");
        assert!(state.principal.is_none());
        assert!(state.store_id.is_none());
        assert!(!ctx.identity.is_signed_in());
        assert_eq!(ctx.identity.sign_out_count(), 1);
    }
}

#[tokio::test]
async fn test_unreadable_authorization_record_denies_access() {
    let ctx = TestContext::new().await;
    ctx.store.set_fail_reads(true);
    ctx.sign_in(ADMIN_EMAIL).await;

    assert!(matches!(ctx.state.gate().access(), Access::Denied));
    assert!(!ctx.identity.is_signed_in());

    // Access comes back once the store is readable and the admin signs in again
    ctx.store.set_fail_reads(false);
    ctx.sign_in(ADMIN_EMAIL).await;
    assert!(ctx.state.gate().access().granted().is_some());
}

#[tokio::test]
async fn test_new_account_is_not_admitted() {
    let ctx = TestContext::with(seeded_identity(), seeded_store()).await;
    let email = Email::parse("newcomer@store-one.test").unwrap();

    let principal = ctx.state.gate().register(&email, PASSWORD).await.unwrap();

    assert_eq!(principal.email.as_ref(), Some(&email));
    assert!(!ctx.state.gate().snapshot().is_admin);
    assert!(!ctx.identity.is_signed_in());
}

#[tokio::test]
async fn test_sign_out_clears_the_grant() {
    let ctx = TestContext::new().await;
    ctx.sign_in(ADMIN_EMAIL).await;
    assert!(ctx.state.gate().snapshot().is_admin);

    ctx.state.gate().sign_out().await;

    let state = ctx.state.gate().snapshot();
    assert!(!state.is_admin);
    assert!(state.store_id.is_none());
    assert!(!state.loading);
}

#[tokio::test]
async fn test_wrong_password_is_reported() {
    let ctx = TestContext::new().await;
    let email = Email::parse(ADMIN_EMAIL).unwrap();

    let result = ctx.state.gate().sign_in(&email, "wrong-password").await;

    assert!(result.is_err());
    assert!(matches!(ctx.state.gate().access(), Access::Denied));
}
