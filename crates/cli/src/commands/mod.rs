//! Subcommand implementations.

pub mod cart;
pub mod carts;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;

/// Database URL for the storefront.
///
/// Reads `STOREFRONT_DATABASE_URL`, falling back to `DATABASE_URL`.
/// A `.env` file in the working directory is loaded first.
fn database_url() -> Result<SecretString, &'static str> {
    dotenvy::dotenv().ok();

    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "STOREFRONT_DATABASE_URL not set")
}
