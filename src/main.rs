//! Coach seat booking server
//!
//! Wires the storage backend, the booking engine and its background loops
//! (lock reaper, travel reminders) to the HTTP and WebSocket API.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpResponse, HttpServer};
use anyhow::Context;
use coach_auth::JwtService;
use coach_cache::{CachedVehicleRepository, RedisCache};
use coach_core::AppConfig;
use coach_db::Stores;
use coach_services::{BookingEngine, LogNotifier, MockPaymentGateway};
use std::env;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "coach_booking={l},coach_api={l},coach_services={l},coach_db={l},coach_cache={l},actix_web=info,sqlx=warn",
            l = log_level
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Storage backend, with the vehicle cache in front when Redis is configured
async fn open_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    let stores = Stores::open(config)
        .await
        .context("failed to open storage backend")?;

    let Some(url) = config.redis.url.as_deref() else {
        return Ok(stores);
    };

    match RedisCache::new(url).await {
        Ok(cache) => {
            info!(
                "Vehicle cache enabled with {}s TTL",
                config.redis.vehicle_ttl_secs
            );
            let cached = CachedVehicleRepository::new(
                stores.vehicles.clone(),
                cache,
                config.redis.vehicle_ttl_secs,
            );
            Ok(stores.with_vehicles(Arc::new(cached)))
        }
        Err(e) => {
            warn!("Redis unavailable, running without vehicle cache: {}", e);
            Ok(stores)
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting coach booking server v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().context("failed to load configuration")?;

    let stores = open_stores(&config).await?;

    let gateway = Arc::new(MockPaymentGateway::from_config(&config.payment));
    let engine = Arc::new(BookingEngine::new(
        stores,
        gateway,
        Arc::new(LogNotifier),
        &config.booking,
    ));

    info!(
        lock_ttl_secs = config.booking.lock_ttl_secs,
        cutoff_hours = config.booking.cancellation_cutoff_hours,
        refund_percent = config.booking.refund_percent,
        "Booking engine ready"
    );

    let (reaper, stop_reaper) = engine.reaper();
    let reaper_task = tokio::spawn(reaper.run());
    let (reminders, stop_reminders) = engine.reminders();
    let reminders_task = tokio::spawn(reminders.run());

    let jwt_service = Arc::new(JwtService::new(
        &config.auth.jwt_secret,
        config.auth.jwt_expiration_minutes * 60,
    ));
    if config.auth.allow_dev_tokens {
        warn!("Development token endpoint is enabled");
    }

    let bind_addr = config.server_addr();
    let workers = config.server.workers;
    let cors_origins = config.server.cors_origins.clone();
    let auth_config = config.auth.clone();
    // Built once so every worker draws from the same buckets
    let throttles = coach_api::Throttles::from_config(&config.rate_limit);

    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, workers
    );

    let server_engine = engine.clone();
    HttpServer::new(move || {
        let cors_origins_inner = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                let origins: Vec<&str> = cors_origins_inner.split(',').collect();
                if let Ok(origin_str) = origin.to_str() {
                    origins.iter().any(|o| o.trim() == origin_str)
                } else {
                    false
                }
            })
            .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
                header::COOKIE,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(server_engine.clone()))
            .app_data(web::Data::new(jwt_service.clone()))
            .app_data(web::Data::new(auth_config.clone()))
            .app_data(web::Data::new(throttles.clone()))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                let error_message = err.to_string();
                actix_web::error::InternalError::from_response(
                    err,
                    HttpResponse::BadRequest().json(serde_json::json!({
                        "error": "invalid_query",
                        "message": error_message
                    })),
                )
                .into()
            }))
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                let error_message = err.to_string();
                actix_web::error::InternalError::from_response(
                    err,
                    HttpResponse::BadRequest().json(serde_json::json!({
                        "error": "invalid_body",
                        "message": error_message
                    })),
                )
                .into()
            }))
            .wrap(coach_api::security_headers())
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::Logger::new("%a \"%r\" %s %b %Dms"))
            .wrap(middleware::NormalizePath::trim())
            .service(web::scope("/api/v1").configure(coach_api::configure_api))
            .configure(coach_api::configure_ws)
            .route(
                "/",
                web::get().to(|| async {
                    HttpResponse::Found()
                        .append_header(("Location", "/api/v1/health"))
                        .finish()
                }),
            )
    })
    .workers(workers)
    .bind(&bind_addr)
    .with_context(|| format!("failed to bind {}", bind_addr))?
    .run()
    .await?;

    info!("HTTP server stopped, shutting down background tasks");
    let _ = stop_reaper.send(true);
    let _ = stop_reminders.send(true);
    for (name, task) in [("reaper", reaper_task), ("reminders", reminders_task)] {
        if let Err(e) = task.await {
            warn!("{} task ended abnormally: {}", name, e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}
