//! Login and email-duplicate check endpoints.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::api::handlers::{auth_error_response, valid_email};
use crate::auth::{service::normalize_email, AuthService};

use super::types::{AuthResultResponse, EmailDuplicateResponse, LoginRequest};

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login outcome; tokens only when status is SUCCESS", body = AuthResultResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 401, description = "Invalid credentials", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }
    if request.device_id.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing device id".to_string()).into_response();
    }

    match service
        .login(&email, &request.password, &request.device_meta())
        .await
    {
        Ok(result) => (StatusCode::OK, Json(AuthResultResponse::from(result))).into_response(),
        Err(err) => auth_error_response(&err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/auth/check-email/{email}",
    params(
        ("email" = String, Path, description = "Email address to check")
    ),
    responses(
        (status = 200, description = "Whether the email is already registered", body = EmailDuplicateResponse),
        (status = 400, description = "Validation error", body = String)
    ),
    tag = "auth"
)]
pub async fn check_email(
    service: Extension<Arc<AuthService>>,
    Path(email): Path<String>,
) -> impl IntoResponse {
    let email = normalize_email(&email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    match service.check_email_duplicate(&email).await {
        Ok(duplicate) => (StatusCode::OK, Json(EmailDuplicateResponse { duplicate })).into_response(),
        Err(err) => auth_error_response(&err).into_response(),
    }
}
