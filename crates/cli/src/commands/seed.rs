//! Seed the product catalog mirror.
//!
//! The storefront prices and stock-checks carts against
//! `storefront.product`. This command reads a YAML list of products and
//! upserts each one, so re-running with an updated file refreshes prices
//! and stock in place.
//!
//! ```yaml
//! - id: bypass-door
//!   name: Bypass Closet Door
//!   price: 45900      # cents
//!   stock: 12
//! ```

use std::collections::HashSet;
use std::path::Path;

use tracing::{error, info};

use pg_closets_storefront::db::{self, products::ProductRepository};
use pg_closets_storefront::models::Product;

/// Upsert products from a YAML file.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the file cannot be read
/// or fails validation, or a database write fails.
pub async fn catalog(file_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;

    if !file_path.exists() {
        return Err(format!("File not found: {}", file_path.display()).into());
    }

    info!(path = %file_path.display(), "Loading catalog from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(file_path).await?;
    let products = parse_catalog(&content)?;

    info!(products = products.len(), "Parsed catalog");

    let errors = validate_catalog(&products);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let repo = ProductRepository::new(&pool);
    for product in &products {
        repo.upsert(product).await?;
    }

    info!(upserted = products.len(), "Catalog seeded");
    Ok(())
}

fn parse_catalog(content: &str) -> Result<Vec<Product>, serde_yaml::Error> {
    serde_yaml::from_str(content)
}

/// Problems that would make the catalog ambiguous or unusable.
fn validate_catalog(products: &[Product]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for product in products {
        let id = product.id.as_str();
        if id.trim().is_empty() {
            errors.push("product with empty id".to_string());
            continue;
        }
        if !seen.insert(id) {
            errors.push(format!("duplicate product id '{id}'"));
        }
        if product.name.trim().is_empty() {
            errors.push(format!("product '{id}' has no name"));
        }
        if product.price.cents() < 0 {
            errors.push(format!("product '{id}' has a negative price"));
        }
    }

    errors
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use pg_closets_core::Money;

    use super::*;

    const CATALOG: &str = r"
- id: bypass-door
  name: Bypass Closet Door
  price: 45900
  stock: 12
- id: bifold-door
  name: Bifold Closet Door
  price: 29900
  stock: 0
";

    #[test]
    fn test_parse_catalog() {
        let products = parse_catalog(CATALOG).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].id.as_str(), "bypass-door");
        assert_eq!(products[0].price, Money::from_cents(45_900));
        assert_eq!(products[1].stock, 0);
        assert!(validate_catalog(&products).is_empty());
    }

    #[test]
    fn test_parse_rejects_negative_stock() {
        let yaml = "- {id: x, name: X, price: 100, stock: -1}";
        assert!(parse_catalog(yaml).is_err());
    }

    #[test]
    fn test_validate_catalog_reports_every_problem() {
        let yaml = r"
- {id: door, name: Door, price: 100, stock: 1}
- {id: door, name: '', price: -5, stock: 1}
- {id: ' ', name: Blank, price: 100, stock: 1}
";
        let errors = validate_catalog(&parse_catalog(yaml).unwrap());
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("duplicate product id 'door'")));
        assert!(errors.iter().any(|e| e.contains("has no name")));
        assert!(errors.iter().any(|e| e.contains("negative price")));
        assert!(errors.iter().any(|e| e.contains("empty id")));
    }
}
