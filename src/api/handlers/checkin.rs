//! QR check-in endpoint.

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
use crate::{
    attendance::{Attendance, CheckInError, CheckInOutcome, Destination},
    capture::{CaptureGuard, NoCapture},
};

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct CheckInRequest {
    /// Decoded QR text.
    #[serde(default)]
    pub payload: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckInStatus {
    CheckedIn,
    AlreadyCheckedIn,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CheckInResponse {
    pub status: CheckInStatus,
    pub class_id: String,
    pub checked_in_count: Option<i64>,
    pub message: String,
    /// Set after a fresh check-in.
    pub redirect: Option<Destination>,
}

#[utoipa::path(
    post,
    path = "/v1/checkin",
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "Checked in, or already checked in", body = CheckInResponse),
        (status = 204, description = "Class does not exist"),
        (status = 400, description = "Payload is not a check-in URL", body = ErrorResponse),
        (status = 401, description = "No active session", body = ErrorResponse),
        (status = 500, description = "Check-in could not be written", body = ErrorResponse)
    ),
    tag = "checkin"
)]
pub async fn check_in(
    headers: HeaderMap,
    attendance: Extension<Attendance>,
    payload: Option<Json<CheckInRequest>>,
) -> impl IntoResponse {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let caller = match authenticate_session(&headers, attendance.store()).await {
        Ok(caller) => caller,
        Err(status) => return status.into_response(),
    };

    // The payload was decoded by the client; nothing is captured server side.
    let capture = CaptureGuard::new(NoCapture);
    let mut redirect = None;
    let result = attendance
        .check_in(capture, &request.payload, caller.as_ref(), |_| {
            redirect = Some(Destination::Dashboard);
        })
        .await;

    match result {
        Ok(outcome) => {
            let message = outcome.notice().unwrap_or_default().to_string();
            let response = match outcome {
                CheckInOutcome::CheckedIn {
                    class_id,
                    checked_in_count,
                } => CheckInResponse {
                    status: CheckInStatus::CheckedIn,
                    class_id,
                    checked_in_count: Some(checked_in_count),
                    message,
                    redirect,
                },
                CheckInOutcome::AlreadyCheckedIn { class_id } => CheckInResponse {
                    status: CheckInStatus::AlreadyCheckedIn,
                    class_id,
                    checked_in_count: None,
                    message,
                    redirect,
                },
                CheckInOutcome::ClassNotFound { .. } => {
                    return StatusCode::NO_CONTENT.into_response();
                }
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err @ CheckInError::InvalidPayload) => {
            error_response(StatusCode::BAD_REQUEST, err.to_string())
        }
        Err(err @ CheckInError::NotSignedIn) => {
            error_response(StatusCode::UNAUTHORIZED, err.to_string())
        }
        Err(CheckInError::Store(err)) => {
            error!("Failed to record check-in: {err}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                CheckInError::Store(err).to_string(),
            )
        }
    }
}
