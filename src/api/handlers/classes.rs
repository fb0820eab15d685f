//! Class endpoints.

use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use super::{ErrorResponse, auth::session::authenticate_session, error_response};
use crate::attendance::{Attendance, CreateClassError, model::ClassRecord};

const NOT_SIGNED_IN: &str = "You are not signed in.";

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct CreateClassRequest {
    #[serde(default)]
    pub name: String,
}

#[utoipa::path(
    post,
    path = "/v1/classes",
    request_body = CreateClassRequest,
    responses(
        (status = 201, description = "Class created", body = ClassRecord),
        (status = 400, description = "Class name is empty", body = ErrorResponse),
        (status = 401, description = "No active session", body = ErrorResponse),
        (status = 500, description = "Class could not be written", body = ErrorResponse)
    ),
    tag = "classes"
)]
pub async fn create_class(
    headers: HeaderMap,
    attendance: Extension<Attendance>,
    payload: Option<Json<CreateClassRequest>>,
) -> impl IntoResponse {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let caller = match authenticate_session(&headers, attendance.store()).await {
        Ok(caller) => caller,
        Err(status) => return status.into_response(),
    };

    match attendance.create_class(&request.name, caller.as_ref()).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(err @ CreateClassError::EmptyName) => {
            error_response(StatusCode::BAD_REQUEST, err.to_string())
        }
        Err(err @ CreateClassError::NotSignedIn) => {
            error_response(StatusCode::UNAUTHORIZED, err.to_string())
        }
        Err(err @ CreateClassError::Store(_)) => {
            error!("Failed to create class: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/classes",
    responses(
        (status = 200, description = "Classes the caller owns or belongs to", body = [ClassRecord]),
        (status = 401, description = "No active session", body = ErrorResponse)
    ),
    tag = "classes"
)]
pub async fn list_classes(headers: HeaderMap, attendance: Extension<Attendance>) -> impl IntoResponse {
    let caller = match signed_in_caller(&headers, &attendance).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match attendance.classes_for(&caller).await {
        Ok(classes) => (StatusCode::OK, Json(classes)).into_response(),
        Err(err) => {
            error!("Failed to list classes: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/classes/{class_id}",
    params(
        ("class_id" = String, Path, description = "Class id")
    ),
    responses(
        (status = 200, description = "Class detail", body = ClassRecord),
        (status = 401, description = "No active session", body = ErrorResponse),
        (status = 404, description = "Unknown class or caller is not a member")
    ),
    tag = "classes"
)]
pub async fn get_class(
    Path(class_id): Path<String>,
    headers: HeaderMap,
    attendance: Extension<Attendance>,
) -> impl IntoResponse {
    let caller = match signed_in_caller(&headers, &attendance).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match attendance.class_for(&caller, &class_id).await {
        Ok(Some(class)) => (StatusCode::OK, Json(class)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to load class: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn signed_in_caller(
    headers: &HeaderMap,
    attendance: &Attendance,
) -> Result<crate::attendance::model::Caller, Response> {
    match authenticate_session(headers, attendance.store()).await {
        Ok(Some(caller)) => Ok(caller),
        Ok(None) => Err(error_response(StatusCode::UNAUTHORIZED, NOT_SIGNED_IN)),
        Err(status) => Err(status.into_response()),
    }
}
