//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use chrono::Duration;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub payment: PaymentConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Comma separated list of allowed CORS origins
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_cors_origins() -> String {
    "http://localhost:3000,http://127.0.0.1:3000".to_string()
}

/// Which storage backend backs the seat ledger and record stores
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Single process, in-memory maps with per-seat atomicity
    #[default]
    Memory,
    /// PostgreSQL with row-level compare-and-set
    Postgres,
}

/// Storage selection
#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL, required for the postgres backend
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Run embedded migrations at startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_run_migrations() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            run_migrations: default_run_migrations(),
        }
    }
}

/// Redis configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    /// Redis connection URL; the vehicle cache is disabled when unset
    pub url: Option<String>,

    /// TTL for cached vehicle instances in seconds
    #[serde(default = "default_vehicle_ttl")]
    pub vehicle_ttl_secs: u64,
}

fn default_vehicle_ttl() -> u64 {
    300
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            vehicle_ttl_secs: default_vehicle_ttl(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// JWT signing secret
    pub jwt_secret: String,

    /// JWT token expiration in minutes
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_minutes: i64,

    /// Expose the development token endpoint
    #[serde(default)]
    pub allow_dev_tokens: bool,
}

fn default_jwt_expiration() -> i64 {
    1440 // 24 hours
}

/// Reservation, booking and cancellation policy
#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    /// How long a seat hold lasts
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: i64,

    /// Interval between reaper sweeps
    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_secs: u64,

    /// Minimum hours before departure at which a booking may still be cancelled
    #[serde(default = "default_cancellation_cutoff")]
    pub cancellation_cutoff_hours: i64,

    /// Share of the total refunded on cancellation
    #[serde(default = "default_refund_percent")]
    pub refund_percent: u32,

    /// Prefix of generated booking numbers
    #[serde(default = "default_booking_number_prefix")]
    pub booking_number_prefix: String,

    /// Upper bound on seats in a single reservation
    #[serde(default = "default_max_seats")]
    pub max_seats_per_booking: usize,

    /// Attempts for store calls failing with a transient error
    #[serde(default = "default_store_retry_attempts")]
    pub store_retry_attempts: u32,

    /// Base backoff between store retries, doubled per attempt
    #[serde(default = "default_store_retry_backoff")]
    pub store_retry_backoff_ms: u64,

    /// Interval between travel reminder sweeps
    #[serde(default = "default_reminder_interval")]
    pub reminder_interval_secs: u64,
}

fn default_lock_ttl() -> i64 {
    600 // 10 minutes
}

fn default_reaper_interval() -> u64 {
    30
}

fn default_cancellation_cutoff() -> i64 {
    24
}

fn default_refund_percent() -> u32 {
    90
}

fn default_booking_number_prefix() -> String {
    "CB".to_string()
}

fn default_max_seats() -> usize {
    10
}

fn default_store_retry_attempts() -> u32 {
    3
}

fn default_store_retry_backoff() -> u64 {
    50
}

fn default_reminder_interval() -> u64 {
    3600
}

impl BookingConfig {
    pub fn lock_ttl(&self) -> Duration {
        Duration::seconds(self.lock_ttl_secs)
    }

    pub fn cancellation_cutoff(&self) -> Duration {
        Duration::hours(self.cancellation_cutoff_hours)
    }

    pub fn reaper_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.reaper_interval_secs.max(1))
    }

    pub fn reminder_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.reminder_interval_secs.max(1))
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            lock_ttl_secs: default_lock_ttl(),
            reaper_interval_secs: default_reaper_interval(),
            cancellation_cutoff_hours: default_cancellation_cutoff(),
            refund_percent: default_refund_percent(),
            booking_number_prefix: default_booking_number_prefix(),
            max_seats_per_booking: default_max_seats(),
            store_retry_attempts: default_store_retry_attempts(),
            store_retry_backoff_ms: default_store_retry_backoff(),
            reminder_interval_secs: default_reminder_interval(),
        }
    }
}

/// Mock payment gateway behaviour
#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    /// Simulated gateway round trip
    #[serde(default = "default_payment_latency")]
    pub simulated_latency_ms: u64,

    /// Decline every charge (exercise the compensation path)
    #[serde(default)]
    pub decline_all: bool,
}

fn default_payment_latency() -> u64 {
    1000
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            simulated_latency_ms: default_payment_latency(),
            decline_all: false,
        }
    }
}

/// `requests` attempts per `window_secs` for one caller
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub requests: u32,
    pub window_secs: u64,
}

impl RateLimit {
    pub const fn new(requests: u32, window_secs: u64) -> Self {
        Self {
            requests,
            window_secs,
        }
    }

    /// Time for one spent attempt to come back
    pub fn replenish_every(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.window_secs.max(1)) / self.requests.max(1)
    }
}

/// Per-caller throttling of the endpoints that claim seats or issue tokens
#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,

    /// Booking attempts (create booking)
    #[serde(default = "default_booking_limit")]
    pub bookings: RateLimit,

    /// Seat lock attempts over HTTP and WebSocket
    #[serde(default = "default_reservation_limit")]
    pub reservations: RateLimit,

    /// Token requests, keyed by client address
    #[serde(default = "default_auth_limit")]
    pub auth: RateLimit,
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_booking_limit() -> RateLimit {
    RateLimit::new(3, 60)
}

fn default_reservation_limit() -> RateLimit {
    RateLimit::new(20, 60)
}

fn default_auth_limit() -> RateLimit {
    RateLimit::new(5, 900)
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            bookings: default_booking_limit(),
            reservations: default_reservation_limit(),
            auth: default_auth_limit(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("storage.backend", "memory")?
            .set_default("database.max_connections", 10)?
            .set_default("redis.vehicle_ttl_secs", 300)?
            .set_default("auth.jwt_expiration_minutes", 1440)?
            .set_default("auth.allow_dev_tokens", false)?
            .set_default("booking.lock_ttl_secs", 600)?
            .set_default("booking.reaper_interval_secs", 30)?
            .set_default("booking.cancellation_cutoff_hours", 24)?
            .set_default("booking.refund_percent", 90)?
            .set_default("booking.booking_number_prefix", "CB")?
            .set_default("payment.simulated_latency_ms", 1000)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with COACH_ prefix
            .add_source(
                Environment::with_prefix("COACH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("COACH").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
