//! Federated (Google) login.
//!
//! The browser runs the provider popup and posts the resulting credential here.
//! Popup failures that happen before a credential exists are reported by the
//! client itself with the same fixed messages.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use secrecy::SecretString;
use std::sync::Arc;

use super::{
    login::signed_in,
    session::end_session,
    state::AuthConfig,
    types::{FederatedLoginRequest, LoginResponse},
};
use crate::{
    api::handlers::{ErrorResponse, error_response},
    attendance::{Attendance, ClientFingerprint, FederatedLoginError},
    identity::FederatedCredential,
};

fn credential(request: &FederatedLoginRequest) -> Option<FederatedCredential> {
    let non_blank = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| SecretString::from(token.to_string()))
    };
    non_blank(&request.id_token)
        .map(FederatedCredential::IdToken)
        .or_else(|| non_blank(&request.access_token).map(FederatedCredential::AccessToken))
}

#[utoipa::path(
    post,
    path = "/v1/auth/federated",
    request_body = FederatedLoginRequest,
    responses(
        (status = 200, description = "Signed in; redirect is /dashboard or /loginregister", body = LoginResponse),
        (status = 400, description = "No provider credential supplied", body = ErrorResponse),
        (status = 401, description = "Federated sign-in failed", body = ErrorResponse),
        (status = 500, description = "Session could not be created")
    ),
    tag = "auth"
)]
pub async fn federated(
    headers: HeaderMap,
    attendance: Extension<Attendance>,
    auth_config: Extension<Arc<AuthConfig>>,
    payload: Option<Json<FederatedLoginRequest>>,
) -> impl IntoResponse {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let Some(credential) = credential(&request) else {
        let message = FederatedLoginError::Failed {
            detail: "missing provider credential.".to_string(),
        };
        return error_response(StatusCode::BAD_REQUEST, message.to_string());
    };
    let fingerprint = ClientFingerprint::from_request(request.fingerprint.as_deref(), &headers);

    match attendance.federated_login(&credential, &fingerprint).await {
        Ok(outcome) => signed_in(&headers, &attendance, &auth_config, outcome).await,
        Err(err) => {
            let cleared = end_session(&headers, attendance.store(), &auth_config).await;
            (
                cleared,
                error_response(StatusCode::UNAUTHORIZED, err.to_string()),
            )
                .into_response()
        }
    }
}
