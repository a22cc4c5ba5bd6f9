//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront (`https://` enables secure cookies)
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (postgres backend only;
//!   falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_CART_BACKEND` - `postgres` (default) or `memory`
//! - `CART_TAX_RATE` - Sales tax as a fraction (default: 0.13)
//! - `CART_TAX_ROUNDING` - `half_up` (default) or `half_even`
//! - `CART_EXPIRY_DAYS` - Days of inactivity before a cart expires (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance trace sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use chrono::Duration;
use secrecy::SecretString;
use thiserror::Error;

use pg_closets_core::{PricingPolicy, Rounding, TaxPolicy, TaxRate};

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Where server-side carts are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CartBackend {
    #[default]
    Postgres,
    /// Process memory; carts are lost on restart.
    Memory,
}

impl FromStr for CartBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown cart backend '{other}'")),
        }
    }
}

/// Cart behaviour settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartConfig {
    pub backend: CartBackend,
    pub tax: TaxPolicy,
    /// Days of inactivity before a server cart expires.
    pub expiry_days: u16,
}

impl CartConfig {
    /// Pricing rules with the configured tax.
    #[must_use]
    pub const fn pricing(&self) -> PricingPolicy {
        PricingPolicy::with_tax(self.tax)
    }

    /// Cart lifetime as a duration.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::days(i64::from(self.expiry_days))
    }
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            backend: CartBackend::default(),
            tax: TaxPolicy::default(),
            expiry_days: 30,
        }
    }
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: Option<SecretString>,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Cart settings
    pub cart: CartConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. production, staging)
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry performance trace sample rate
    pub sentry_traces_sample_rate: f32,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        let cart = CartConfig::from_env()?;

        let database_url = match cart.backend {
            CartBackend::Postgres => Some(get_database_url("STOREFRONT_DATABASE_URL")?),
            CartBackend::Memory => get_database_url("STOREFRONT_DATABASE_URL").ok(),
        };

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            cart,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl CartConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let backend: CartBackend = parse_env("STOREFRONT_CART_BACKEND", "postgres")?;
        let rate: TaxRate = parse_env("CART_TAX_RATE", "0.13")?;
        let rounding: Rounding = parse_env("CART_TAX_ROUNDING", "half_up")?;
        let expiry_days: u16 = parse_env("CART_EXPIRY_DAYS", "30")?;
        if expiry_days == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CART_EXPIRY_DAYS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            backend,
            tax: TaxPolicy::new(rate, rounding),
            expiry_days,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    // Try primary key first (e.g., STOREFRONT_DATABASE_URL)
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    // Fallback to generic DATABASE_URL (set by Fly.io postgres attach)
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
