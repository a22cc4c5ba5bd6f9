//! Server-side cart maintenance.

use tracing::info;

use pg_closets_storefront::db::{self, carts::CartRepository};

/// Delete every cart whose expiry has passed. Lines go with them.
///
/// # Errors
///
/// Returns an error if the database URL is missing or the delete fails.
pub async fn purge_expired() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;

    let removed = CartRepository::new(&pool).purge_expired().await?;
    info!(removed, "Purged expired carts");

    Ok(())
}
