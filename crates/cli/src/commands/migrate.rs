//! Database migration commands.
//!
//! Applies the storefront schema (`crates/storefront/migrations`, embedded at
//! build time) and then the `tower-sessions` table used by the storefront's
//! session layer. Both steps are idempotent.

use tower_sessions_sqlx_store::PostgresStore;
use tracing::info;

use pg_closets_storefront::db;

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails,
/// or a migration fails.
pub async fn storefront() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to storefront database");

    sqlx::migrate!("../storefront/migrations").run(&pool).await?;
    info!("Storefront migrations applied");

    PostgresStore::new(pool).migrate().await?;
    info!("Session store migrations applied");

    Ok(())
}
