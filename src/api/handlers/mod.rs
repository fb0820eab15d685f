//! API handlers for Rollcall.
//!
//! Handlers stay thin: they resolve the caller from the session, call into
//! [`Attendance`](crate::attendance::Attendance) and map the flow's outcome to a
//! status code and JSON body.

pub mod auth;
pub mod checkin;
pub mod classes;
pub mod health;
pub mod root;
pub mod users;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned by every endpoint that reports a user-facing message.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}
