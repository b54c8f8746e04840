//! Actix-web extractors for authenticated callers
//!
//! A token is accepted from, in order: the `Authorization: Bearer` header,
//! a `token` cookie, or a `token` query parameter. The last one exists because
//! browsers cannot set headers on a WebSocket upgrade.

use crate::jwt::JwtService;
use crate::Claims;
use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use coach_core::error::AppError;
use coach_core::models::UserRole;
use futures::future::{ready, Ready};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(|t| t.trim().to_string())
}

fn presented_token(req: &HttpRequest) -> Option<String> {
    bearer_token(req)
        .or_else(|| req.cookie("token").map(|c| c.value().to_string()))
        .or_else(|| {
            web::Query::<TokenQuery>::from_query(req.query_string())
                .ok()
                .and_then(|q| q.into_inner().token)
        })
        .filter(|t| !t.is_empty())
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, AppError> {
    let jwt = req
        .app_data::<web::Data<Arc<JwtService>>>()
        .ok_or_else(|| AppError::Internal("token service not registered".to_string()))?;

    let token = presented_token(req)
        .ok_or_else(|| AppError::Unauthorized("no token presented".to_string()))?;

    let claims = jwt.validate_token(&token)?;
    debug!(caller = %claims.sub, role = %claims.role, "Caller authenticated");
    Ok(AuthenticatedUser::from_claims(claims))
}

/// The caller behind a valid token
///
/// ```no_run
/// use actix_web::HttpResponse;
/// use coach_auth::AuthenticatedUser;
///
/// async fn my_bookings(user: AuthenticatedUser) -> HttpResponse {
///     HttpResponse::Ok().json(serde_json::json!({ "caller": user.user_id }))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Opaque caller identity; lock holder and booking owner
    pub user_id: String,
    pub role: UserRole,
    pub claims: Claims,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            user_id: claims.sub.clone(),
            role: claims.role,
            claims,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Owner of a booking, or the booking desk
    pub fn can_access(&self, owner_id: &str) -> bool {
        self.is_admin() || self.user_id == owner_id
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req).map_err(|e| {
            debug!(path = req.path(), "Authentication failed: {}", e);
            e.into()
        }))
    }
}

/// Booking desk caller; everyone else gets 403
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

impl std::ops::Deref for AdminUser {
    type Target = AuthenticatedUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for AdminUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = authenticate(req).and_then(|user| {
            if user.is_admin() {
                Ok(AdminUser(user))
            } else {
                warn!(caller = %user.user_id, path = req.path(), "Admin route refused");
                Err(AppError::Forbidden)
            }
        });
        ready(result.map_err(Into::into))
    }
}
