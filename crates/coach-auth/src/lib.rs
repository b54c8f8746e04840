//! Caller identity for the coach booking engine
//!
//! The engine treats callers as opaque identities. This crate issues and
//! validates the JWTs carrying that identity and provides Actix-web extractors
//! with a user/admin role split.
//!
//! ## Using extractors in Actix-web
//!
//! ```no_run
//! use actix_web::HttpResponse;
//! use coach_auth::middleware::{AdminUser, AuthenticatedUser};
//!
//! async fn protected_route(user: AuthenticatedUser) -> HttpResponse {
//!     HttpResponse::Ok().json(serde_json::json!({
//!         "caller": user.user_id,
//!         "role": user.role
//!     }))
//! }
//!
//! async fn admin_route(_admin: AdminUser) -> HttpResponse {
//!     HttpResponse::Ok().finish()
//! }
//! ```

pub mod claims;
pub mod jwt;
pub mod middleware;

pub use claims::Claims;
pub use jwt::JwtService;
pub use middleware::{AdminUser, AuthenticatedUser};
