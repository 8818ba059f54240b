//! Session middleware configuration for the back-office.
//!
//! Sets up in-memory sessions using tower-sessions (SameSite=Strict, 24hr
//! inactivity expiry). The session only carries the browser's sign-in
//! marker; the signed-in principal itself lives in the session gate, and a
//! request is only a store admin's if both agree.

use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer};

use crate::gate::StoreAdmin;

/// Session cookie name for the back-office.
pub const SESSION_COOKIE_NAME: &str = "storedesk_admin_session";

/// Session key holding the grant the browser signed in under.
pub const SIGNED_IN_GRANT_KEY: &str = "signed_in_grant";

/// Session expiry time in seconds (24 hours).
const SESSION_EXPIRY_SECONDS: i64 = 24 * 60 * 60;

/// Create the session layer with an in-memory store.
///
/// The back-office only listens on localhost over plain HTTP, so the cookie
/// is not marked `Secure`.
#[must_use]
pub fn create_session_layer() -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(false)
        .with_same_site(tower_sessions::cookie::SameSite::Strict)
        .with_http_only(true)
        .with_path("/")
}

/// Mark the browser behind `session` as the one that obtained `admin`.
///
/// Cycles the session ID first so a pre-login cookie cannot be reused.
///
/// # Errors
///
/// Returns the session store's error.
pub async fn mark_signed_in(
    session: &Session,
    admin: &StoreAdmin,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session
        .insert(SIGNED_IN_GRANT_KEY, admin.grant_sequence())
        .await
}

/// Whether the browser behind `session` signed in under `admin`'s grant.
///
/// A marker left from an earlier sign-in never matches, so signing out or a
/// gate reset invalidates every browser at once.
pub async fn holds_grant(session: &Session, admin: &StoreAdmin) -> bool {
    session
        .get::<u64>(SIGNED_IN_GRANT_KEY)
        .await
        .ok()
        .flatten()
        .is_some_and(|grant| grant == admin.grant_sequence())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_marked_session_holds_grant() {
        let session = session();
        let admin = StoreAdmin::for_tests("admin-1", "store-1");
        assert!(!holds_grant(&session, &admin).await);

        mark_signed_in(&session, &admin).await.unwrap();
        assert!(holds_grant(&session, &admin).await);

        session.flush().await.unwrap();
        assert!(!holds_grant(&session, &admin).await);
    }

    #[tokio::test]
    async fn test_stale_grant_is_rejected() {
        let session = session();
        session.insert(SIGNED_IN_GRANT_KEY, 7_u64).await.unwrap();
        let admin = StoreAdmin::for_tests("admin-1", "store-1");
        assert!(!holds_grant(&session, &admin).await);
    }
}
