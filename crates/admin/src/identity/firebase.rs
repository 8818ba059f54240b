//! Firebase Authentication REST client.
//!
//! Email/password sign-in and sign-up go through the Identity Toolkit API;
//! ID tokens are refreshed through the Secure Token API. Tokens live only in
//! memory: restarting the process signs the principal out.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::instrument;
use url::Url;

use storedesk_core::{Email, PrincipalId};

use super::{AuthStatePublisher, AuthStateReceiver, IdentityError, IdentityProvider, Principal};
use crate::config::FirebaseConfig;

/// ID tokens are refreshed once they are this close to expiring.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

/// Firebase Authentication client.
///
/// Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct FirebaseAuth {
    inner: Arc<FirebaseAuthInner>,
}

struct FirebaseAuthInner {
    client: reqwest::Client,
    api_key: SecretString,
    identity_toolkit_url: String,
    secure_token_url: String,
    session: RwLock<Option<TokenSession>>,
    state: AuthStatePublisher,
}

/// Tokens for the signed-in principal.
struct TokenSession {
    principal: Principal,
    id_token: SecretString,
    refresh_token: SecretString,
    expires_at: DateTime<Utc>,
}

impl TokenSession {
    fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now <= Duration::seconds(TOKEN_REFRESH_MARGIN_SECS)
    }
}

/// Request body for `accounts:signInWithPassword` and `accounts:signUp`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

/// Response body for `accounts:signInWithPassword` and `accounts:signUp`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    local_id: String,
    email: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

/// Response body for the Secure Token `token` endpoint.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

/// Error envelope shared by both APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl FirebaseAuth {
    /// Create a client for the configured project.
    #[must_use]
    pub fn new(config: &FirebaseConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create a client sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: &FirebaseConfig) -> Self {
        Self {
            inner: Arc::new(FirebaseAuthInner {
                client,
                api_key: config.api_key.clone(),
                identity_toolkit_url: config.identity_toolkit_url(),
                secure_token_url: config.secure_token_url(),
                session: RwLock::new(None),
                state: AuthStatePublisher::new(),
            }),
        }
    }

    fn endpoint(&self, base: &str, path: &str) -> Result<Url, IdentityError> {
        let mut url = Url::parse(&format!("{base}/{path}"))
            .map_err(|e| IdentityError::Provider(format!("invalid endpoint: {e}")))?;
        url.query_pairs_mut()
            .append_pair("key", self.inner.api_key.expose_secret());
        Ok(url)
    }

    /// Run a password flow (`accounts:signInWithPassword` or `accounts:signUp`).
    async fn password_flow(
        &self,
        method: &str,
        email: &Email,
        password: &str,
    ) -> Result<Principal, IdentityError> {
        let url = self.endpoint(&self.inner.identity_toolkit_url, method)?;
        let body = PasswordRequest {
            email: email.as_str(),
            password,
            return_secure_token: true,
        };

        let response = self.inner.client.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        let payload: PasswordResponse = response.json().await?;
        let principal = Principal {
            uid: PrincipalId::new(payload.local_id),
            email: payload
                .email
                .as_deref()
                .and_then(|e| Email::parse(e).ok())
                .or_else(|| Some(email.clone())),
        };

        let session = TokenSession {
            principal: principal.clone(),
            id_token: SecretString::from(payload.id_token),
            refresh_token: SecretString::from(payload.refresh_token),
            expires_at: expiry_from(&payload.expires_in),
        };
        *self.inner.session.write().await = Some(session);
        self.inner.state.publish(Some(principal.clone()));

        Ok(principal)
    }

    /// Exchange the refresh token for a new ID token.
    async fn refresh(&self, refresh_token: &SecretString) -> Result<RefreshResponse, IdentityError> {
        let url = self.endpoint(&self.inner.secure_token_url, "token")?;
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose_secret()),
        ];

        let response = self.inner.client.post(url).form(&params).send().await?;
        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }
        Ok(response.json().await?)
    }

    async fn clear_session(&self) {
        let had_session = self.inner.session.write().await.take().is_some();
        if had_session {
            self.inner.state.publish(None);
        }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for FirebaseAuth {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in(&self, email: &Email, password: &str) -> Result<Principal, IdentityError> {
        let principal = self
            .password_flow("accounts:signInWithPassword", email, password)
            .await?;
        tracing::info!(uid = %principal.uid, "Signed in with identity provider");
        Ok(principal)
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) {
        // Firebase has no server-side sign-out for password sessions:
        // dropping the tokens ends the session.
        self.inner.session.write().await.take();
        self.inner.state.publish(None);
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn register(&self, email: &Email, password: &str) -> Result<Principal, IdentityError> {
        let principal = self
            .password_flow("accounts:signUp", email, password)
            .await?;
        tracing::info!(uid = %principal.uid, "Registered identity provider account");
        Ok(principal)
    }

    fn subscribe(&self) -> AuthStateReceiver {
        self.inner.state.subscribe()
    }

    async fn id_token(&self) -> Result<Option<SecretString>, IdentityError> {
        let refresh_token = {
            let session = self.inner.session.read().await;
            match session.as_ref() {
                None => return Ok(None),
                Some(s) if !s.needs_refresh(Utc::now()) => return Ok(Some(s.id_token.clone())),
                Some(s) => s.refresh_token.clone(),
            }
        };

        match self.refresh(&refresh_token).await {
            Ok(refreshed) => {
                let mut session = self.inner.session.write().await;
                let Some(current) = session.as_mut() else {
                    // Signed out while the refresh was in flight
                    return Ok(None);
                };
                current.id_token = SecretString::from(refreshed.id_token);
                current.refresh_token = SecretString::from(refreshed.refresh_token);
                current.expires_at = expiry_from(&refreshed.expires_in);
                tracing::debug!(uid = %current.principal.uid, "Refreshed ID token");
                Ok(Some(current.id_token.clone()))
            }
            Err(IdentityError::SessionExpired) => {
                tracing::warn!("Refresh token rejected, ending session");
                self.clear_session().await;
                Err(IdentityError::SessionExpired)
            }
            Err(e) => Err(e),
        }
    }
}

/// Compute the expiry instant from an `expiresIn` seconds string.
fn expiry_from(expires_in: &str) -> DateTime<Utc> {
    // Firebase ID tokens last one hour; fall back to that if the field is odd
    let seconds = expires_in.parse::<i64>().unwrap_or(3600);
    Utc::now() + Duration::seconds(seconds)
}

/// Turn a non-success response into an `IdentityError`.
async fn provider_error(response: reqwest::Response) -> IdentityError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorEnvelope>(&text) {
        Ok(envelope) => IdentityError::from_provider_message(&envelope.error.message),
        Err(_) => IdentityError::Provider(format!("HTTP {status}: {text}")),
    }
}
