//! Identity provider error types.

use thiserror::Error;

/// Errors returned by identity provider operations.
///
/// These are surfaced to whoever called sign-in or registration; the
/// back-office does not retry them.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] storedesk_core::EmailError),

    /// Unknown account or wrong password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Registration for an email that already has an account.
    #[error("an account already exists for this email")]
    EmailExists,

    /// Password rejected by the provider's policy.
    #[error("password is too weak: {0}")]
    WeakPassword(String),

    /// Account disabled by a provider administrator.
    #[error("this account has been disabled")]
    UserDisabled,

    /// Provider-side throttling.
    #[error("too many attempts, try again later")]
    TooManyAttempts,

    /// The refresh token is no longer valid.
    #[error("session expired, sign in again")]
    SessionExpired,

    /// Any other provider error code.
    #[error("identity provider error: {0}")]
    Provider(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl IdentityError {
    /// Map a Firebase Auth error message (e.g. `"WEAK_PASSWORD : Password should
    /// be at least 6 characters"`) to an error variant.
    #[must_use]
    pub fn from_provider_message(message: &str) -> Self {
        let (code, detail) = message
            .split_once(':')
            .map_or((message.trim(), ""), |(code, detail)| {
                (code.trim(), detail.trim())
            });

        match code {
            "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS"
            | "INVALID_EMAIL" => Self::InvalidCredentials,
            "EMAIL_EXISTS" => Self::EmailExists,
            "WEAK_PASSWORD" => Self::WeakPassword(detail.to_string()),
            "USER_DISABLED" => Self::UserDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyAttempts,
            "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "USER_NOT_FOUND" => Self::SessionExpired,
            _ => Self::Provider(message.to_string()),
        }
    }

    /// Whether the error comes from the provider being unreachable or
    /// misbehaving rather than from the user's input.
    #[must_use]
    pub const fn is_service_error(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::Http(_))
    }

    /// Message shown on the sign-in and registration forms.
    #[must_use]
    pub fn user_message(&self) -> String {
        if self.is_service_error() {
            "The sign-in service is unavailable. Please try again.".to_string()
        } else {
            let message = self.to_string();
            let mut chars = message.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_codes_collapse() {
        for code in [
            "EMAIL_NOT_FOUND",
            "INVALID_PASSWORD",
            "INVALID_LOGIN_CREDENTIALS",
        ] {
            assert!(matches!(
                IdentityError::from_provider_message(code),
                IdentityError::InvalidCredentials
            ));
        }
    }

    #[test]
    fn test_weak_password_keeps_detail() {
        let err = IdentityError::from_provider_message(
            "WEAK_PASSWORD : Password should be at least 6 characters",
        );
        match err {
            IdentityError::WeakPassword(detail) => {
                assert_eq!(detail, "Password should be at least 6 characters");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            IdentityError::InvalidCredentials.user_message(),
            "Invalid email or password"
        );
        assert_eq!(
            IdentityError::Provider("INTERNAL".to_string()).user_message(),
            "The sign-in service is unavailable. Please try again."
        );
    }

    #[test]
    fn test_unknown_code_is_passed_through() {
        let err = IdentityError::from_provider_message("OPERATION_NOT_ALLOWED");
        assert_eq!(
            err.to_string(),
            "identity provider error: OPERATION_NOT_ALLOWED"
        );
    }
}
