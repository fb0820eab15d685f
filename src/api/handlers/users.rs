//! Profile registration for first-time federated users.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use super::{ErrorResponse, auth::session::authenticate_session, error_response};
use crate::attendance::{Attendance, ProfileError, model::UserProfile};

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct ProfileRequest {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[utoipa::path(
    post,
    path = "/v1/users/profile",
    request_body = ProfileRequest,
    responses(
        (status = 201, description = "Profile created", body = UserProfile),
        (status = 401, description = "No active session", body = ErrorResponse),
        (status = 409, description = "Profile already exists", body = ErrorResponse),
        (status = 500, description = "Profile could not be written", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn create_profile(
    headers: HeaderMap,
    attendance: Extension<Attendance>,
    payload: Option<Json<ProfileRequest>>,
) -> impl IntoResponse {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let caller = match authenticate_session(&headers, attendance.store()).await {
        Ok(Some(caller)) => caller,
        Ok(None) => {
            return error_response(StatusCode::UNAUTHORIZED, "You are not signed in.");
        }
        Err(status) => return status.into_response(),
    };

    match attendance
        .register_profile(&caller, request.display_name.as_deref())
        .await
    {
        Ok(profile) => (StatusCode::CREATED, Json(profile)).into_response(),
        Err(err @ ProfileError::AlreadyExists) => {
            error_response(StatusCode::CONFLICT, err.to_string())
        }
        Err(err @ ProfileError::Store(_)) => {
            error!("Failed to create profile: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}
