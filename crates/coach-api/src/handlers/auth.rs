//! Authentication handlers
//!
//! Identity is owned by an upstream issuer sharing the JWT secret. The token
//! endpoint here exists for local development and test rigs only and is
//! disabled unless `auth.allow_dev_tokens` is set.

use crate::dto::{ApiResponse, DevTokenRequest, MeResponse, TokenResponse};
use crate::security::{client_key, Throttles};
use actix_web::{web, HttpRequest, HttpResponse};
use coach_auth::{AuthenticatedUser, JwtService};
use coach_core::config::AuthConfig;
use coach_core::AppError;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

/// Issue a token for an arbitrary caller
///
/// POST /api/v1/auth/token
#[instrument(skip_all)]
pub async fn issue_dev_token(
    http: HttpRequest,
    jwt_service: web::Data<Arc<JwtService>>,
    auth_config: web::Data<AuthConfig>,
    throttles: web::Data<Throttles>,
    req: web::Json<DevTokenRequest>,
) -> Result<HttpResponse, AppError> {
    if !auth_config.allow_dev_tokens {
        warn!("Development token requested while disabled");
        return Err(AppError::NotFound("auth/token".to_string()));
    }

    throttles.auth.check(&client_key(&http))?;

    req.validate().map_err(|e| {
        warn!("Token request validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let DevTokenRequest { caller_id, role } = req.into_inner();
    let caller_id = caller_id.trim().to_string();
    let token = jwt_service.issue(&caller_id, role)?;

    info!(caller = %caller_id, %role, "Development token issued");

    Ok(HttpResponse::Ok().json(ApiResponse::success(TokenResponse::new(
        token,
        jwt_service.expiration_secs(),
        caller_id,
        role,
    ))))
}

/// Identity behind the presented token
///
/// GET /api/v1/auth/me
pub async fn me(user: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::success(MeResponse {
        expires_at: user.claims.expires_at(),
        caller_id: user.user_id,
        role: user.role,
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/token", web::post().to(issue_dev_token))
            .route("/me", web::get().to(me)),
    );
}
