//! Token issuing and validation

use crate::claims::{Claims, ISSUER};
use coach_core::error::AppError;
use coach_core::models::UserRole;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, warn};

/// HS256 signer and verifier for caller tokens
#[derive(Clone)]
pub struct JwtService {
    expiration_secs: i64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    /// ```
    /// use coach_auth::JwtService;
    /// use coach_core::models::UserRole;
    ///
    /// let jwt = JwtService::new("secret", 3600);
    /// let token = jwt.issue("traveller-42", UserRole::User)?;
    /// assert_eq!(jwt.validate_token(&token)?.sub, "traveller-42");
    /// # Ok::<(), coach_core::error::AppError>(())
    /// ```
    pub fn new(secret: &str, expiration_secs: i64) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        Self {
            expiration_secs,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Issue a token for a caller, valid for the configured lifetime
    pub fn issue(&self, caller_id: &str, role: UserRole) -> Result<String, AppError> {
        self.sign(&Claims::new(caller_id, role, self.expiration_secs))
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        debug!(caller = %claims.sub, role = %claims.role, "Signing token");
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| AppError::InvalidToken(format!("token signing failed: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => {
                    warn!(error = %e, "Rejected token");
                    AppError::InvalidToken(e.to_string())
                }
            })
    }

    pub fn expiration_secs(&self) -> i64 {
        self.expiration_secs
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("expiration_secs", &self.expiration_secs)
            .finish_non_exhaustive()
    }
}
