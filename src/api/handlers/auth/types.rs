//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::attendance::Destination;

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Best-effort device id computed by the browser.
    #[serde(default)]
    pub fingerprint: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct FederatedLoginRequest {
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub fingerprint: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub redirect: Destination,
    pub message: String,
    pub user_id: String,
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub user_id: String,
    pub email: String,
}
