//! Health check

use actix_web::{web, HttpResponse};
use chrono::Utc;
use coach_services::BookingEngine;
use serde_json::json;
use std::sync::Arc;

/// GET /api/v1/health
pub async fn health(engine: web::Data<Arc<BookingEngine>>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "coach-booking",
        "version": env!("CARGO_PKG_VERSION"),
        "realtime_connections": engine.broadcaster.connection_count(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health));
}
