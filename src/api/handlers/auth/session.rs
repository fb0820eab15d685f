//! Session endpoints for cookie and bearer auth.

use axum::{
    Json,
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{AUTHORIZATION, COOKIE, InvalidHeaderValue, SET_COOKIE},
    },
    response::IntoResponse,
};
use chrono::{TimeDelta, Utc};
use std::sync::Arc;
use tracing::error;

use super::{
    state::AuthConfig,
    types::SessionResponse,
    utils::{generate_session_token, hash_session_token},
};
use crate::{
    attendance::{Attendance, model::Caller},
    store::{Sessions, Store},
};

pub(crate) const SESSION_COOKIE_NAME: &str = "rollcall_session";

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(headers: HeaderMap, attendance: Extension<Attendance>) -> impl IntoResponse {
    // Missing cookies are treated as "no session" to avoid leaking auth state.
    match authenticate_session(&headers, attendance.store()).await {
        Ok(Some(caller)) => {
            let response = SessionResponse {
                user_id: caller.user_id,
                email: caller.email,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(status) => status.into_response(),
    }
}

/// Resolve a session cookie or bearer token into the caller, if present.
///
/// Returns `Ok(None)` when the token is missing, unknown or expired.
pub(crate) async fn authenticate_session(
    headers: &HeaderMap,
    store: &dyn Store,
) -> Result<Option<Caller>, StatusCode> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };
    // Only the hash is stored; never compare raw tokens against the store.
    let token_hash = hash_session_token(&token);
    match store.lookup_session(&token_hash).await {
        Ok(caller) => Ok(caller),
        Err(err) => {
            error!("Failed to lookup session: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    attendance: Extension<Attendance>,
    auth_config: Extension<Arc<AuthConfig>>,
) -> impl IntoResponse {
    (StatusCode::NO_CONTENT, end_session(&headers, attendance.store(), &auth_config).await)
        .into_response()
}

/// Delete the presented session, if any, and return headers that clear the cookie.
pub(crate) async fn end_session(
    headers: &HeaderMap,
    store: &dyn Store,
    auth_config: &AuthConfig,
) -> HeaderMap {
    if let Some(token) = extract_session_token(headers) {
        let token_hash = hash_session_token(&token);
        if let Err(err) = store.delete_session(&token_hash).await {
            error!("Failed to delete session: {err}");
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(auth_config) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    response_headers
}

/// Persist a fresh session for `caller` and return the `Set-Cookie` value.
pub(crate) async fn issue_session(
    store: &dyn Store,
    auth_config: &AuthConfig,
    caller: &Caller,
) -> Result<HeaderValue, StatusCode> {
    let token = generate_session_token().map_err(|err| {
        error!("Failed to generate session token: {err}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let expires_at = TimeDelta::try_seconds(auth_config.session_ttl_seconds())
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| {
            error!(
                "Session TTL out of range: {}",
                auth_config.session_ttl_seconds()
            );
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    store
        .insert_session(&hash_session_token(&token), caller, expires_at)
        .await
        .map_err(|err| {
            error!("Failed to insert session: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    session_cookie(auth_config, &token).map_err(|err| {
        error!("Failed to build session cookie: {err}");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Build a secure `HttpOnly` cookie for the session token.
fn session_cookie(auth_config: &AuthConfig, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = auth_config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if auth_config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(auth_config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if auth_config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let value = headers.get(COOKIE)?.to_str().ok()?;
    value.split(';').find_map(|pair| {
        let (key, val) = pair.trim().split_once('=')?;
        (key.trim() == SESSION_COOKIE_NAME)
            .then(|| val.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
