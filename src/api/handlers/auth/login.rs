//! Credential login.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use secrecy::SecretString;
use std::sync::Arc;

use super::{
    session::{end_session, issue_session},
    state::AuthConfig,
    types::{LoginRequest, LoginResponse},
};
use crate::{
    api::handlers::{ErrorResponse, error_response},
    attendance::{Attendance, ClientFingerprint, LoginError, LoginOutcome},
};

pub(super) const LOGIN_MESSAGE: &str = "Login successful.";

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in; session cookie set", body = LoginResponse),
        (status = 400, description = "Missing email or password", body = ErrorResponse),
        (status = 401, description = "Device bound to another account or credentials rejected", body = ErrorResponse),
        (status = 500, description = "Session could not be created")
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    attendance: Extension<Attendance>,
    auth_config: Extension<Arc<AuthConfig>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let fingerprint = ClientFingerprint::from_request(request.fingerprint.as_deref(), &headers);
    let password = SecretString::from(request.password);

    match attendance
        .credential_login(&request.email, &password, &fingerprint)
        .await
    {
        Ok(outcome) => signed_in(&headers, &attendance, &auth_config, outcome).await,
        Err(LoginError::MissingFields) => {
            error_response(StatusCode::BAD_REQUEST, LoginError::MissingFields.to_string())
        }
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

/// Issue a session for a successful login and answer with the redirect target.
/// Issue the session for a successful login. If that fails the login is
/// undone like any other failure: provider sign-out and a cleared cookie.
pub(super) async fn signed_in(
    headers: &HeaderMap,
    attendance: &Attendance,
    auth_config: &AuthConfig,
    outcome: LoginOutcome,
) -> axum::response::Response {
    let cookie = match issue_session(attendance.store(), auth_config, &outcome.caller).await {
        Ok(cookie) => cookie,
        Err(status) => {
            attendance.sign_out().await;
            let cleared = end_session(headers, attendance.store(), auth_config).await;
            return (status, cleared).into_response();
        }
    };

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);
    let body = LoginResponse {
        redirect: outcome.destination,
        message: LOGIN_MESSAGE.to_string(),
        user_id: outcome.caller.user_id,
        email: outcome.caller.email,
    };
    (StatusCode::OK, response_headers, Json(body)).into_response()
}
