//! Google Identity Toolkit REST client.
//!
//! Uses `accounts:signInWithPassword` and `accounts:signInWithIdp`. The base URL
//! is configurable so the Firebase Auth emulator can stand in for the real
//! service (`http://localhost:9099/identitytoolkit.googleapis.com`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{Instrument, debug, info_span, warn};
use url::{Url, form_urlencoded};

use super::{AuthErrorCode, AuthenticatedUser, FederatedCredential, IdentityError, IdentityProvider};

pub const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com";
const GOOGLE_PROVIDER_ID: &str = "google.com";

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

pub struct IdentityToolkit {
    client: Client,
    base_url: Url,
    api_key: SecretString,
    request_uri: String,
}

impl std::fmt::Debug for IdentityToolkit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityToolkit")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"***")
            .field("request_uri", &self.request_uri)
            .finish()
    }
}

impl IdentityToolkit {
    /// Build a client for the given base URL.
    ///
    /// `request_uri` is echoed to `signInWithIdp` and must be an origin the
    /// provider project accepts (usually the frontend base URL).
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: SecretString, request_uri: String) -> Result<Self> {
        // Keep the trailing slash so `join` appends instead of replacing the last segment.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .with_context(|| format!("Invalid identity provider URL: {base_url}"))?;

        let client = Client::builder()
            .use_rustls_tls()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("Failed to build identity provider HTTP client")?;

        Ok(Self {
            client,
            base_url,
            api_key,
            request_uri,
        })
    }

    fn endpoint(&self, method: &str) -> Result<Url, IdentityError> {
        let mut url = self
            .base_url
            .join(&format!("v1/accounts:{method}"))
            .map_err(|err| {
                IdentityError::new(AuthErrorCode::Other("invalid-url".to_string()), err.to_string())
            })?;
        url.query_pairs_mut()
            .append_pair("key", self.api_key.expose_secret());
        Ok(url)
    }

    async fn call(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<AuthenticatedUser, IdentityError> {
        let url = self.endpoint(method)?;
        let span = info_span!("identity.request", identity.method = method);

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .instrument(span)
            .await
            .map_err(|err| {
                warn!("identity provider unreachable: {err}");
                IdentityError::new(
                    AuthErrorCode::Network,
                    "Could not reach the identity provider.",
                )
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|err| {
            IdentityError::new(AuthErrorCode::Network, format!("Failed to read response: {err}"))
        })?;

        if !status.is_success() {
            let error = classify_error(status, &text);
            debug!(code = error.code.as_str(), "identity provider rejected {method}");
            return Err(error);
        }

        let parsed: SignInResponse = serde_json::from_str(&text).map_err(|err| {
            IdentityError::new(
                AuthErrorCode::Other("invalid-response".to_string()),
                format!("Unexpected identity provider response: {err}"),
            )
        })?;

        Ok(AuthenticatedUser {
            uid: parsed.local_id,
            email: parsed.email.filter(|email| !email.trim().is_empty()),
        })
    }
}

/// Map a provider error payload to a classified error with a user-facing message.
fn classify_error(status: StatusCode, body: &str) -> IdentityError {
    let raw = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_default();
    // Messages look like `TOO_MANY_ATTEMPTS_TRY_LATER : Access to this account ...`.
    let code_str = raw.split(" : ").next().unwrap_or_default().trim();
    let code = if code_str.is_empty() {
        AuthErrorCode::Other(format!("http-{}", status.as_u16()))
    } else {
        AuthErrorCode::from_code(code_str)
    };

    let message = match &code {
        AuthErrorCode::InvalidCredential => "Invalid email or password.".to_string(),
        AuthErrorCode::UserDisabled => "This account has been disabled.".to_string(),
        AuthErrorCode::TooManyRequests => "Too many attempts. Please try again later.".to_string(),
        AuthErrorCode::Network => "Could not reach the identity provider.".to_string(),
        AuthErrorCode::PopupCancelled | AuthErrorCode::PopupBlocked | AuthErrorCode::PopupClosed => {
            code.as_str().to_string()
        }
        AuthErrorCode::Other(code) => code.clone(),
    };

    IdentityError::new(code, message)
}

fn federated_post_body(credential: &FederatedCredential) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    match credential {
        FederatedCredential::IdToken(token) => {
            serializer.append_pair("id_token", token.expose_secret());
        }
        FederatedCredential::AccessToken(token) => {
            serializer.append_pair("access_token", token.expose_secret());
        }
    }
    serializer.append_pair("providerId", GOOGLE_PROVIDER_ID);
    serializer.finish()
}

#[async_trait]
impl IdentityProvider for IdentityToolkit {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthenticatedUser, IdentityError> {
        self.call(
            "signInWithPassword",
            json!({
                "email": email,
                "password": password.expose_secret(),
                "returnSecureToken": true,
            }),
        )
        .await
    }

    async fn sign_in_federated(
        &self,
        credential: &FederatedCredential,
    ) -> Result<AuthenticatedUser, IdentityError> {
        self.call(
            "signInWithIdp",
            json!({
                "postBody": federated_post_body(credential),
                "requestUri": self.request_uri,
                "returnSecureToken": true,
                "returnIdpCredential": true,
            }),
        )
        .await
    }

    async fn sign_out(&self) {
        // Provider tokens are never kept server side, so there is nothing to revoke.
        debug!("identity sign-out");
    }
}
