//! Identity collaborator.
//!
//! Credential verification and federated sign-in are delegated to an external
//! provider. Failures carry a classified [`AuthErrorCode`] so the login flows can
//! map them to fixed user-facing messages without string-matching provider
//! payloads themselves.

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

mod toolkit;

pub use toolkit::{DEFAULT_IDENTITY_URL, IdentityToolkit};

/// A user the provider vouched for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub uid: String,
    /// Federated accounts may come back without an email.
    pub email: Option<String>,
}

/// Credential handed back by the browser after the provider popup finished.
#[derive(Debug)]
pub enum FederatedCredential {
    IdToken(SecretString),
    AccessToken(SecretString),
}

/// Provider error classification.
///
/// The popup variants use the browser SDK codes (`auth/popup-blocked`, ...)
/// because that is where the popup runs; the rest are normalized from the
/// provider's REST error messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthErrorCode {
    PopupCancelled,
    PopupBlocked,
    PopupClosed,
    InvalidCredential,
    UserDisabled,
    TooManyRequests,
    Network,
    Other(String),
}

impl AuthErrorCode {
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "auth/cancelled-popup-request" => Self::PopupCancelled,
            "auth/popup-blocked" => Self::PopupBlocked,
            "auth/popup-closed-by-user" => Self::PopupClosed,
            "auth/invalid-credential"
            | "auth/wrong-password"
            | "auth/user-not-found"
            | "auth/invalid-email"
            | "EMAIL_NOT_FOUND"
            | "INVALID_PASSWORD"
            | "INVALID_LOGIN_CREDENTIALS"
            | "INVALID_EMAIL"
            | "INVALID_IDP_RESPONSE" => Self::InvalidCredential,
            "auth/user-disabled" | "USER_DISABLED" => Self::UserDisabled,
            "auth/too-many-requests" | "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyRequests,
            "auth/network-request-failed" => Self::Network,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::PopupCancelled => "auth/cancelled-popup-request",
            Self::PopupBlocked => "auth/popup-blocked",
            Self::PopupClosed => "auth/popup-closed-by-user",
            Self::InvalidCredential => "auth/invalid-credential",
            Self::UserDisabled => "auth/user-disabled",
            Self::TooManyRequests => "auth/too-many-requests",
            Self::Network => "auth/network-request-failed",
            Self::Other(code) => code,
        }
    }
}

#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct IdentityError {
    pub code: AuthErrorCode,
    pub message: String,
}

impl IdentityError {
    #[must_use]
    pub fn new(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthenticatedUser, IdentityError>;

    async fn sign_in_federated(
        &self,
        credential: &FederatedCredential,
    ) -> Result<AuthenticatedUser, IdentityError>;

    /// Clear whatever partial state the last attempt left behind. Idempotent.
    async fn sign_out(&self);
}
