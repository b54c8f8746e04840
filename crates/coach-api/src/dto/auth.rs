//! Authentication DTOs

use chrono::{DateTime, Utc};
use coach_core::models::UserRole;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Development token request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DevTokenRequest {
    /// Caller identity to embed as the token subject
    #[validate(length(min = 1, max = 100, message = "Caller id is required"))]
    pub caller_id: String,

    #[serde(default)]
    pub role: UserRole,
}

/// Issued token
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    /// Access token (JWT)
    pub access_token: String,

    /// Token type (always "Bearer")
    pub token_type: String,

    /// Token expiration time in seconds
    pub expires_in: i64,

    pub caller_id: String,

    pub role: UserRole,
}

impl TokenResponse {
    pub fn new(access_token: String, expires_in: i64, caller_id: String, role: UserRole) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
            caller_id,
            role,
        }
    }
}

/// Identity behind the presented token
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub caller_id: String,
    pub role: UserRole,
    pub expires_at: Option<DateTime<Utc>>,
}
