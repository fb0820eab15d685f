//! Credential and federated login.
//!
//! Both flows share the same shape: run the device gate, call the identity
//! provider, and on any failure force a provider sign-out so no partially
//! authenticated state survives. A successful login binds the fingerprint to
//! the account if nobody claimed it first.

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::{
    Attendance,
    device::{DeviceGateError, FingerprintSource, GateDecision, check_device},
    model::{Caller, UserProfile},
};
use crate::{
    identity::{AuthErrorCode, FederatedCredential, IdentityError},
    store::{StoreError, Users},
};

const INVALID_CREDENTIALS: &str = "Invalid email or password.";
const FEDERATED_FALLBACK_DETAIL: &str = "please try again later.";
const MISSING_EMAIL_DETAIL: &str = "No email address found for this account.";

/// Where the client should go next.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Destination {
    #[serde(rename = "/dashboard")]
    Dashboard,
    #[serde(rename = "/loginregister")]
    LoginRegister,
    #[serde(rename = "/register")]
    Register,
    #[serde(rename = "/forgot-password")]
    ForgotPassword,
    #[serde(rename = "/")]
    Home,
}

impl Destination {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Dashboard => "/dashboard",
            Self::LoginRegister => "/loginregister",
            Self::Register => "/register",
            Self::ForgotPassword => "/forgot-password",
            Self::Home => "/",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginOutcome {
    pub caller: Caller,
    pub destination: Destination,
    pub gate: GateDecision,
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("Please fill in all fields.")]
    MissingFields,
    #[error(transparent)]
    Device(#[from] DeviceGateError),
    #[error("{}", credential_message(.0))]
    Identity(IdentityError),
}

fn credential_message(error: &IdentityError) -> &str {
    if error.message.trim().is_empty() {
        INVALID_CREDENTIALS
    } else {
        &error.message
    }
}

#[derive(Debug, Error)]
pub enum FederatedLoginError {
    #[error("Sign-in was cancelled. Please try again.")]
    PopupCancelled,
    #[error("The sign-in popup was blocked. Please allow popups for this site and try again.")]
    PopupBlocked,
    #[error("You closed the sign-in window before finishing. Please try again.")]
    PopupClosed,
    #[error("Google sign-in timed out. Please try again.")]
    TimedOut,
    #[error("Google sign-in failed: {detail}")]
    Failed { detail: String },
}

impl FederatedLoginError {
    fn failed(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if detail.trim().is_empty() {
            Self::Failed {
                detail: FEDERATED_FALLBACK_DETAIL.to_string(),
            }
        } else {
            Self::Failed { detail }
        }
    }
}

impl From<IdentityError> for FederatedLoginError {
    fn from(error: IdentityError) -> Self {
        match error.code {
            AuthErrorCode::PopupCancelled => Self::PopupCancelled,
            AuthErrorCode::PopupBlocked => Self::PopupBlocked,
            AuthErrorCode::PopupClosed => Self::PopupClosed,
            _ => Self::failed(error.message),
        }
    }
}

impl From<DeviceGateError> for FederatedLoginError {
    fn from(error: DeviceGateError) -> Self {
        Self::failed(error.to_string())
    }
}

impl From<StoreError> for FederatedLoginError {
    fn from(error: StoreError) -> Self {
        Self::failed(error.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("A profile already exists for this account.")]
    AlreadyExists,
    #[error("Error: {0}")]
    Store(#[from] StoreError),
}

impl Attendance {
    /// Email/password login behind the device gate.
    ///
    /// Blank fields are rejected before anything else runs. A fingerprint bound
    /// to another email is rejected before the provider is called.
    ///
    /// # Errors
    /// Returns `MissingFields`, the device gate rejection, or the provider's
    /// classified failure.
    pub async fn credential_login<F>(
        &self,
        email: &str,
        password: &SecretString,
        fingerprint: &F,
    ) -> Result<LoginOutcome, LoginError>
    where
        F: FingerprintSource + ?Sized,
    {
        let email = email.trim();
        if email.is_empty() || password.expose_secret().is_empty() {
            return Err(LoginError::MissingFields);
        }

        let fingerprint = fingerprint.fingerprint();
        match self
            .verify_credentials(email, password, fingerprint.as_deref())
            .await
        {
            Ok(outcome) => {
                self.remember_device(fingerprint.as_deref(), email).await;
                info!(gate = ?outcome.gate, "credential login succeeded");
                Ok(outcome)
            }
            Err(err) => {
                self.identity.sign_out().await;
                warn!("credential login failed: {err}");
                Err(err)
            }
        }
    }

    async fn verify_credentials(
        &self,
        email: &str,
        password: &SecretString,
        fingerprint: Option<&str>,
    ) -> Result<LoginOutcome, LoginError> {
        let gate = check_device(self.store(), fingerprint, email).await?;

        let user = self
            .identity
            .sign_in_with_password(email, password)
            .await
            .map_err(LoginError::Identity)?;

        Ok(LoginOutcome {
            caller: Caller {
                user_id: user.uid,
                email: email.to_string(),
            },
            destination: Destination::Dashboard,
            gate,
        })
    }

    /// Federated (Google) login.
    ///
    /// The provider call is bounded by the configured timeout. Users with a
    /// profile go to the dashboard; first-time users go to registration.
    ///
    /// # Errors
    /// Returns the popup-specific variants, `TimedOut`, or `Failed` with a
    /// detail message for everything else, device conflicts included.
    pub async fn federated_login<F>(
        &self,
        credential: &FederatedCredential,
        fingerprint: &F,
    ) -> Result<LoginOutcome, FederatedLoginError>
    where
        F: FingerprintSource + ?Sized,
    {
        let fingerprint = fingerprint.fingerprint();
        match self
            .verify_federated(credential, fingerprint.as_deref())
            .await
        {
            Ok(outcome) => {
                self.remember_device(fingerprint.as_deref(), &outcome.caller.email)
                    .await;
                info!(
                    destination = outcome.destination.path(),
                    "federated login succeeded"
                );
                Ok(outcome)
            }
            Err(err) => {
                self.identity.sign_out().await;
                warn!("federated login failed: {err}");
                Err(err)
            }
        }
    }

    async fn verify_federated(
        &self,
        credential: &FederatedCredential,
        fingerprint: Option<&str>,
    ) -> Result<LoginOutcome, FederatedLoginError> {
        let user = timeout(
            self.federated_timeout,
            self.identity.sign_in_federated(credential),
        )
        .await
        .map_err(|_| FederatedLoginError::TimedOut)??;

        let email = user
            .email
            .ok_or_else(|| FederatedLoginError::failed(MISSING_EMAIL_DETAIL))?;

        let gate = check_device(self.store(), fingerprint, &email).await?;

        let destination = if self.store().user_exists(&user.uid).await? {
            Destination::Dashboard
        } else {
            Destination::LoginRegister
        };

        Ok(LoginOutcome {
            caller: Caller {
                user_id: user.uid,
                email,
            },
            destination,
            gate,
        })
    }

    /// Drop whatever the provider holds for the last attempt, e.g. when a
    /// login succeeded but the session could not be issued.
    pub async fn sign_out(&self) {
        self.identity.sign_out().await;
    }

    /// Create the profile document for a signed-in user finishing registration.
    ///
    /// # Errors
    /// Returns `AlreadyExists` if the user already has a profile.
    pub async fn register_profile(
        &self,
        caller: &Caller,
        display_name: Option<&str>,
    ) -> Result<UserProfile, ProfileError> {
        let profile = UserProfile {
            id: caller.user_id.clone(),
            email: caller.email.clone(),
            display_name: display_name
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            created_at: Utc::now(),
        };

        if !self.store().create_profile(&profile).await? {
            return Err(ProfileError::AlreadyExists);
        }
        info!("user profile created");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        attendance::test_support::{ScriptedIdentity, attendance},
        store::{DeviceBindings, MemoryStore},
    };
    use anyhow::Result;
    use std::{sync::Arc, time::Duration};

    fn password(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    fn device(id: &str) -> Option<String> {
        Some(id.to_string())
    }

    fn id_token() -> FederatedCredential {
        FederatedCredential::IdToken(password("token"))
    }

    #[tokio::test]
    async fn fresh_device_proceeds_and_gets_bound() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(ScriptedIdentity::accepting("uid-1", "a@x.com"));
        let flows = attendance(&store, &identity);

        let outcome = flows
            .credential_login("a@x.com", &password("pw"), &device("dev-123"))
            .await?;

        assert_eq!(outcome.destination, Destination::Dashboard);
        assert_eq!(outcome.gate, GateDecision::FirstUse);
        assert_eq!(outcome.caller.user_id, "uid-1");
        let binding = store.get_binding("dev-123").await?;
        assert_eq!(binding.map(|b| b.email).as_deref(), Some("a@x.com"));
        Ok(())
    }

    #[tokio::test]
    async fn bound_device_rejects_other_email_without_calling_provider() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        store.bind_device("dev-456", "owner@x.com").await?;
        let identity = Arc::new(ScriptedIdentity::accepting("uid-2", "other@x.com"));
        let flows = attendance(&store, &identity);

        let err = flows
            .credential_login("other@x.com", &password("pw"), &device("dev-456"))
            .await
            .err();

        let message = err.map(|err| err.to_string()).unwrap_or_default();
        assert!(message.contains("owner@x.com"));
        assert_eq!(identity.provider_calls(), 0);
        assert_eq!(identity.sign_out_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn missing_fields_short_circuit() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(ScriptedIdentity::accepting("uid-1", "a@x.com"));
        let flows = attendance(&store, &identity);

        for (email, pw) in [("", "pw"), ("a@x.com", ""), ("   ", "pw")] {
            let result = flows
                .credential_login(email, &password(pw), &device("dev-1"))
                .await;
            assert!(matches!(result, Err(LoginError::MissingFields)));
        }
        assert_eq!(identity.provider_calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn provider_rejection_signs_out_and_leaves_device_unbound() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(ScriptedIdentity::rejecting(
            AuthErrorCode::InvalidCredential,
            "Invalid email or password.",
        ));
        let flows = attendance(&store, &identity);

        let result = flows
            .credential_login("a@x.com", &password("bad"), &device("dev-1"))
            .await;

        assert_eq!(
            result.err().map(|err| err.to_string()).as_deref(),
            Some("Invalid email or password.")
        );
        assert_eq!(identity.sign_out_count(), 1);
        assert!(store.get_binding("dev-1").await?.is_none());
        Ok(())
    }

    #[test]
    fn empty_provider_message_falls_back() {
        let err = LoginError::Identity(IdentityError::new(AuthErrorCode::Network, ""));
        assert_eq!(err.to_string(), INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn login_without_fingerprint_binds_nothing() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(ScriptedIdentity::accepting("uid-1", "a@x.com"));
        let flows = attendance(&store, &identity);

        let outcome = flows
            .credential_login("a@x.com", &password("pw"), &None::<String>)
            .await?;
        assert_eq!(outcome.gate, GateDecision::NoFingerprint);
        Ok(())
    }

    #[tokio::test]
    async fn federated_new_user_goes_to_registration() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(ScriptedIdentity::accepting("uid-g", "g@x.com"));
        let flows = attendance(&store, &identity);

        let outcome = flows.federated_login(&id_token(), &device("dev-9")).await?;
        assert_eq!(outcome.destination, Destination::LoginRegister);
        assert!(store.get_binding("dev-9").await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn federated_known_user_goes_to_dashboard() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(ScriptedIdentity::accepting("uid-g", "g@x.com"));
        let flows = attendance(&store, &identity);
        let caller = Caller {
            user_id: "uid-g".to_string(),
            email: "g@x.com".to_string(),
        };
        flows.register_profile(&caller, Some("G")).await?;

        let outcome = flows.federated_login(&id_token(), &device("dev-9")).await?;
        assert_eq!(outcome.destination, Destination::Dashboard);
        Ok(())
    }

    #[tokio::test]
    async fn federated_missing_email_fails_and_signs_out() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(
            ScriptedIdentity::accepting("uid-g", "g@x.com").with_federated_user("uid-g", None),
        );
        let flows = attendance(&store, &identity);

        let err = flows.federated_login(&id_token(), &device("dev-9")).await.err();
        assert_eq!(
            err.map(|err| err.to_string()).as_deref(),
            Some("Google sign-in failed: No email address found for this account.")
        );
        assert_eq!(identity.sign_out_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn federated_device_conflict_is_reported_as_failure() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        store.bind_device("dev-456", "owner@x.com").await?;
        let identity = Arc::new(ScriptedIdentity::accepting("uid-g", "g@x.com"));
        let flows = attendance(&store, &identity);

        let err = flows
            .federated_login(&id_token(), &device("dev-456"))
            .await
            .err();
        let message = err.map(|err| err.to_string()).unwrap_or_default();
        assert!(message.starts_with("Google sign-in failed: "));
        assert!(message.contains("owner@x.com"));
        assert_eq!(identity.sign_out_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn federated_popup_codes_map_to_fixed_messages() -> Result<()> {
        let cases = [
            (
                AuthErrorCode::PopupCancelled,
                "Sign-in was cancelled. Please try again.",
            ),
            (
                AuthErrorCode::PopupBlocked,
                "The sign-in popup was blocked. Please allow popups for this site and try again.",
            ),
            (
                AuthErrorCode::PopupClosed,
                "You closed the sign-in window before finishing. Please try again.",
            ),
            (
                AuthErrorCode::Other("OPERATION_NOT_ALLOWED".to_string()),
                "Google sign-in failed: boom",
            ),
            (
                AuthErrorCode::Other("x".to_string()),
                "Google sign-in failed: please try again later.",
            ),
        ];

        for (code, expected) in cases {
            let message = if matches!(code, AuthErrorCode::Other(ref c) if c == "x") {
                ""
            } else {
                "boom"
            };
            let store = Arc::new(MemoryStore::new());
            let identity = Arc::new(ScriptedIdentity::rejecting(code, message));
            let flows = attendance(&store, &identity);

            let err = flows.federated_login(&id_token(), &None::<String>).await.err();
            assert_eq!(err.map(|err| err.to_string()).as_deref(), Some(expected));
            assert_eq!(identity.sign_out_count(), 1);
        }
        Ok(())
    }

    #[tokio::test]
    async fn federated_timeout_is_reported() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(
            ScriptedIdentity::accepting("uid-g", "g@x.com")
                .with_federated_delay(Duration::from_secs(5)),
        );
        let flows =
            attendance(&store, &identity).with_federated_timeout(Duration::from_millis(20));

        let result = flows.federated_login(&id_token(), &None::<String>).await;
        assert!(matches!(result, Err(FederatedLoginError::TimedOut)));
        assert_eq!(identity.sign_out_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_profile_is_rejected() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(ScriptedIdentity::accepting("uid-1", "a@x.com"));
        let flows = attendance(&store, &identity);
        let caller = Caller {
            user_id: "uid-1".to_string(),
            email: "a@x.com".to_string(),
        };

        let profile = flows.register_profile(&caller, Some("  ")).await?;
        assert_eq!(profile.display_name, None);
        let again = flows.register_profile(&caller, None).await;
        assert!(matches!(again, Err(ProfileError::AlreadyExists)));
        Ok(())
    }

    #[test]
    fn destinations_serialize_as_paths() -> Result<()> {
        assert_eq!(serde_json::to_string(&Destination::Dashboard)?, "\"/dashboard\"");
        assert_eq!(Destination::LoginRegister.path(), "/loginregister");
        assert_eq!(Destination::Home.path(), "/");
        Ok(())
    }
}
