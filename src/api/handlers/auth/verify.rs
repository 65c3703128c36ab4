//! OTP verification and re-issue endpoints.
//!
//! Two verification entry points exist on purpose: `verify-otp` trusts the
//! submitting device and issues tokens, while `verify-email` only flips the
//! verification flag. Account confirmation and new-device trust are
//! different OTP purposes even though both consume the same challenge.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use crate::api::handlers::{auth_error_response, valid_email, valid_otp};
use crate::auth::{service::normalize_email, AuthService};

use super::types::{AuthResultResponse, RetryOtpRequest, VerifyEmailRequest, VerifyOtpRequest};

#[utoipa::path(
    post,
    path = "/v1/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Account activated and device registered", body = AuthResultResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 401, description = "Expired or mismatched passcode", body = String)
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> impl IntoResponse {
    let request: VerifyOtpRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }
    if !valid_otp(request.otp.trim()) {
        return (StatusCode::BAD_REQUEST, "Invalid passcode format".to_string()).into_response();
    }
    if request.device_id.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing device id".to_string()).into_response();
    }

    match service
        .verify_otp(&email, &request.otp, &request.device_meta())
        .await
    {
        Ok(result) => (StatusCode::OK, Json(AuthResultResponse::from(result))).into_response(),
        Err(err) => auth_error_response(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 204, description = "Email verified"),
        (status = 400, description = "Validation error", body = String),
        (status = 401, description = "Expired or mismatched passcode", body = String)
    ),
    tag = "auth"
)]
pub async fn verify_email(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<VerifyEmailRequest>>,
) -> impl IntoResponse {
    let request: VerifyEmailRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }
    if !valid_otp(request.otp.trim()) {
        return (StatusCode::BAD_REQUEST, "Invalid passcode format".to_string()).into_response();
    }

    match service.verify_email(&email, &request.otp).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => auth_error_response(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/otp/retry",
    request_body = RetryOtpRequest,
    responses(
        (status = 204, description = "Fresh passcode dispatched"),
        (status = 400, description = "Validation error", body = String)
    ),
    tag = "auth"
)]
pub async fn retry_otp(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<RetryOtpRequest>>,
) -> impl IntoResponse {
    let request: RetryOtpRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    match service.retry_otp(&email).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => auth_error_response(&err).into_response(),
    }
}
