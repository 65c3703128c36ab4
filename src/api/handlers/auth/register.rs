//! Account registration endpoint.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use crate::api::handlers::{auth_error_response, valid_email};
use crate::auth::{service::normalize_email, AuthService};

use super::types::RegisterRequest;

const MIN_PASSWORD_LENGTH: usize = 8;

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Pending account created, OTP dispatched"),
        (status = 400, description = "Validation error", body = String),
        (status = 409, description = "Email already registered", body = String)
    ),
    tag = "auth"
)]
pub async fn register(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }
    if request.password.len() < MIN_PASSWORD_LENGTH {
        return (StatusCode::BAD_REQUEST, "Password too short".to_string()).into_response();
    }

    match service.register(&email, &request.password).await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(err) => auth_error_response(&err).into_response(),
    }
}
