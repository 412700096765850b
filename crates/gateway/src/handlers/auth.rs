//! Caller identity

use axum::Json;
use docvault_common::auth::Principal;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub subject: String,
    pub role: String,
    pub is_admin: bool,
}

/// The principal bound by the authentication gate
pub async fn me(principal: Principal) -> Json<MeResponse> {
    Json(MeResponse {
        is_admin: principal.is_admin(),
        role: principal.role.as_str().to_string(),
        subject: principal.subject,
    })
}
