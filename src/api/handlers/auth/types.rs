//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{AuthResult, AuthStatus, DeviceMeta, UserSession};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub device_id: String,
    pub device_model: String,
    pub device_os: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RetryOtpRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
    pub device_id: String,
    pub device_model: String,
    pub device_os: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub otp: String,
}

/// Body form of the refresh request; the `x-refresh-token` header wins
/// when both are present.
#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RemoveOtherDeviceRequest {
    pub device_id: String,
    pub otp: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthStatusDto {
    Success,
    NeedOtp,
    NeedSocialRegister,
}

/// Wire shape of a credential flow outcome. The token fields are null
/// unless `status` is `SUCCESS`.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthResultResponse {
    pub status: AuthStatusDto,
    pub access_token: Option<String>,
    /// Absolute access-token expiry, unix seconds.
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
}

impl From<AuthResult> for AuthResultResponse {
    fn from(result: AuthResult) -> Self {
        let status = match result.status {
            AuthStatus::Success => AuthStatusDto::Success,
            AuthStatus::NeedOtp => AuthStatusDto::NeedOtp,
            AuthStatus::NeedSocialRegister => AuthStatusDto::NeedSocialRegister,
        };
        Self {
            status,
            access_token: result.access_token,
            expires_in: result.expires_in,
            refresh_token: result.refresh_token,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EmailDuplicateResponse {
    pub duplicate: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DeviceResponse {
    pub id: String,
    pub device_id: String,
    pub device_model: String,
    pub device_os: String,
    pub created_at: String,
    pub updated_at: String,
    pub is_current_device: bool,
}

impl DeviceResponse {
    #[must_use]
    pub fn from_session(session: &UserSession, current_session_id: uuid::Uuid) -> Self {
        Self {
            id: session.id.to_string(),
            device_id: session.device_id.clone(),
            device_model: session.device_model.clone(),
            device_os: session.device_os.clone(),
            created_at: session.created_at.to_rfc3339(),
            updated_at: session.updated_at.to_rfc3339(),
            is_current_device: session.id == current_session_id,
        }
    }
}

impl LoginRequest {
    #[must_use]
    pub fn device_meta(&self) -> DeviceMeta {
        DeviceMeta {
            device_id: self.device_id.clone(),
            device_model: self.device_model.clone(),
            device_os: self.device_os.clone(),
        }
    }
}

impl VerifyOtpRequest {
    #[must_use]
    pub fn device_meta(&self) -> DeviceMeta {
        DeviceMeta {
            device_id: self.device_id.clone(),
            device_model: self.device_model.clone(),
            device_os: self.device_os.clone(),
        }
    }
}
