//! Token claims
//!
//! The subject is the opaque caller identity the booking engine uses as a
//! lock holder and booking owner.

use chrono::{DateTime, Duration, TimeZone, Utc};
use coach_core::models::UserRole;
use serde::{Deserialize, Serialize};

/// Issuer stamped on, and required of, every token
pub const ISSUER: &str = "coach-booking";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Caller id
    pub sub: String,
    pub role: UserRole,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Claims for `caller_id` valid for `ttl_secs` from now
    ///
    /// ```
    /// use coach_auth::Claims;
    /// use coach_core::models::UserRole;
    ///
    /// let claims = Claims::new("traveller-42", UserRole::User, 600);
    /// assert_eq!(claims.caller_id(), "traveller-42");
    /// assert_eq!(claims.exp - claims.iat, 600);
    /// ```
    pub fn new(caller_id: &str, role: UserRole, ttl_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: caller_id.to_string(),
            role,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl_secs)).timestamp(),
        }
    }

    pub fn caller_id(&self) -> &str {
        &self.sub
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}
