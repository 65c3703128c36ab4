//! Token refresh and logout endpoints.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::api::handlers::{auth_error_response, guard_error_response};
use crate::auth::{AccessGuard, AuthService};

use super::types::{AuthResultResponse, RefreshRequest};

const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body = RefreshRequest,
    params(
        ("x-refresh-token" = Option<String>, Header, description = "Refresh token; overrides the body field")
    ),
    responses(
        (status = 200, description = "New token pair; the presented refresh token is now invalid", body = AuthResultResponse),
        (status = 400, description = "Missing refresh token", body = String),
        (status = 401, description = "Unknown or rotated refresh token", body = String)
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<RefreshRequest>>,
) -> impl IntoResponse {
    let Some(token) = extract_refresh_token(&headers, payload.as_deref()) else {
        return (
            StatusCode::BAD_REQUEST,
            "Missing refresh token".to_string(),
        )
            .into_response();
    };

    match service.refresh(&token).await {
        Ok(result) => (StatusCode::OK, Json(AuthResultResponse::from(result))).into_response(),
        Err(err) => auth_error_response(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session removed"),
        (status = 401, description = "Unauthorized", body = String)
    ),
    tag = "auth"
)]
pub async fn logout(
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

/// Prefer the `x-refresh-token` header (with or without a Bearer prefix),
/// falling back to the JSON body field.
fn extract_refresh_token(headers: &HeaderMap, body: Option<&RefreshRequest>) -> Option<String> {
    if let Some(value) = headers.get(REFRESH_TOKEN_HEADER) {
        let raw = value.to_str().ok()?.trim();
        let token = raw
            .strip_prefix("Bearer ")
            .or_else(|| raw.strip_prefix("bearer "))
            .unwrap_or(raw)
            .trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }
    body.and_then(|body| body.refresh_token.clone())
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_wins_over_body() {
        let mut headers = HeaderMap::new();
        headers.insert(
            REFRESH_TOKEN_HEADER,
            HeaderValue::from_static("Bearer from-header"),
        );
        let body = RefreshRequest {
            refresh_token: Some("from-body".to_string()),
        };
        assert_eq!(
            extract_refresh_token(&headers, Some(&body)).as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn body_is_fallback() {
        let body = RefreshRequest {
            refresh_token: Some(" from-body ".to_string()),
        };
        assert_eq!(
            extract_refresh_token(&HeaderMap::new(), Some(&body)).as_deref(),
            Some("from-body")
        );
    }

    #[test]
    fn bare_header_token_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(REFRESH_TOKEN_HEADER, HeaderValue::from_static("raw-token"));
        assert_eq!(
            extract_refresh_token(&headers, None).as_deref(),
            Some("raw-token")
        );
    }

    #[test]
    fn missing_everywhere_is_none() {
        assert!(extract_refresh_token(&HeaderMap::new(), None).is_none());
        let body = RefreshRequest {
            refresh_token: Some("  ".to_string()),
        };
        assert!(extract_refresh_token(&HeaderMap::new(), Some(&body)).is_none());
    }
}
