//! Device listing and removal endpoints.
//!
//! All routes here are guarded. Removing a *different* device additionally
//! requires a fresh OTP, so a stolen access token alone cannot evict other
//! sessions.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::auth::{AccessGuard, AuthService};

use super::auth::types::{DeviceResponse, RemoveOtherDeviceRequest};
use super::{auth_error_response, guard_error_response, valid_otp};

#[utoipa::path(
    get,
    path = "/v1/devices",
    responses(
        (status = 200, description = "Sessions for the calling user, oldest first", body = [DeviceResponse]),
        (status = 401, description = "Unauthorized", body = String)
    ),
    tag = "devices"
)]
pub async fn list_devices(
    headers: HeaderMap,
    guard: Extension<Arc<AccessGuard>>,
    service: Extension<Arc<AuthService>>,
) -> impl IntoResponse {
    let identity = match guard.authenticate(&headers).await {
        Ok(identity) => identity,
        Err(err) => return guard_error_response(&err).into_response(),
    };

    match service.list_devices(identity.user.id).await {
        Ok(sessions) => {
            let devices: Vec<DeviceResponse> = sessions
                .iter()
                .map(|session| DeviceResponse::from_session(session, identity.session.id))
                .collect();
            (StatusCode::OK, Json(devices)).into_response()
        }
        Err(err) => auth_error_response(&err).into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/devices",
    responses(
        (status = 204, description = "Current device session removed"),
        (status = 401, description = "Unauthorized", body = String)
    ),
    tag = "devices"
)]
pub async fn remove_current_device(
    headers: HeaderMap,
    guard: Extension<Arc<AccessGuard>>,
    service: Extension<Arc<AuthService>>,
) -> impl IntoResponse {
    let identity = match guard.authenticate(&headers).await {
        Ok(identity) => identity,
        Err(err) => return guard_error_response(&err).into_response(),
    };

    match service
        .logout(identity.user.id, &identity.session.device_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => auth_error_response(&err).into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/devices/other",
    request_body = RemoveOtherDeviceRequest,
    responses(
        (status = 204, description = "Target device session removed, its refresh token revoked"),
        (status = 400, description = "Validation error or target is the current device", body = String),
        (status = 401, description = "Unauthorized or failed OTP step-up", body = String)
    ),
    tag = "devices"
)]
pub async fn remove_other_device(
    headers: HeaderMap,
    guard: Extension<Arc<AccessGuard>>,
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<RemoveOtherDeviceRequest>>,
) -> impl IntoResponse {
    let identity = match guard.authenticate(&headers).await {
        Ok(identity) => identity,
        Err(err) => return guard_error_response(&err).into_response(),
    };

    let request: RemoveOtherDeviceRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    if !valid_otp(request.otp.trim()) {
        return (StatusCode::BAD_REQUEST, "Invalid passcode format".to_string()).into_response();
    }
    if request.device_id.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing device id".to_string()).into_response();
    }

    match service
        .remove_other_device(
            &identity.user,
            &identity.session,
            request.device_id.trim(),
            &request.otp,
        )
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => auth_error_response(&err).into_response(),
    }
}
