//! Database operations for storefront `PostgreSQL`.
//!
//! # Database: `pgc_storefront`
//!
//! ## Tables
//!
//! - `storefront.product` - Read-only mirror of the catalog (price, stock)
//! - `storefront.cart` - One row per owner (user id or anonymous session token)
//! - `storefront.cart_line` - Lines, unique per `(cart_id, product_id, customization)`
//! - `tower_sessions.session` - Session storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p pg-closets-cli -- migrate
//! ```
//!
//! # Concurrency
//!
//! Line increments are single `INSERT ... ON CONFLICT DO UPDATE` statements,
//! so two tabs adding the same product never lose an update. Multi-statement
//! writes are wrapped in [`with_retry`], which retries serialization failures
//! and deadlocks.

pub mod carts;
pub mod products;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::warn;

/// Attempts made by [`with_retry`] before giving up.
pub const MAX_WRITE_ATTEMPTS: u32 = 3;

/// `SQLSTATE` for `serialization_failure`.
const SERIALIZATION_FAILURE: &str = "40001";
/// `SQLSTATE` for `deadlock_detected`.
const DEADLOCK_DETECTED: &str = "40P01";

/// Repository error type.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation or a write that kept conflicting.
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Whether the error is a transient conflict worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db_err)) => matches!(
                db_err.code().as_deref(),
                Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED)
            ),
            _ => false,
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Run a write, retrying transient conflicts up to [`MAX_WRITE_ATTEMPTS`] times.
///
/// # Errors
///
/// Returns the last error if every attempt fails, or the first
/// non-retryable error.
pub async fn with_retry<T, F, Fut>(operation: &str, mut op: F) -> Result<T, RepositoryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RepositoryError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => {
                warn!(operation, attempt, error = %e, "Retrying conflicting write");
                attempt += 1;
            }
            Err(e) if e.is_retryable() => {
                return Err(RepositoryError::Conflict(format!(
                    "{operation} kept conflicting after {attempt} attempts: {e}"
                )));
            }
            other => return other,
        }
    }
}
