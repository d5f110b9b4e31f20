use serde::{Deserialize, Serialize};
use trackle_core::ProfileIdentity;

/// Success envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: &str, data: T) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            data: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: u64,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: ProfileIdentity,
}

#[derive(Debug, Serialize)]
pub struct OAuthResponse {
    pub token: String,
    pub expires_at: u64,
    pub user: ProfileIdentity,
    pub is_new: bool,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: String,
    pub created_at: u64,
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub role: String,
}

impl From<ProfileIdentity> for MeResponse {
    fn from(identity: ProfileIdentity) -> Self {
        Self {
            id: identity.id.to_string(),
            created_at: identity.created_at,
            email: identity.email,
            username: identity.username,
            full_name: identity.full_name,
            role: identity.role,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UsernameAvailability {
    pub available: bool,
    pub message: String,
}
