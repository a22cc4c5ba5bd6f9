//! Catalog mirror repository.
//!
//! The cart prices lines from `storefront.product` and checks stock there at
//! checkout. Rows are written by the CLI seeder, never by request handlers.

use sqlx::PgPool;

use pg_closets_core::{Money, ProductId};

use super::RepositoryError;
use crate::models::Product;

/// Internal row type for database queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    price_cents: i64,
    stock: i32,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        if row.price_cents < 0 {
            return Err(RepositoryError::DataCorruption(format!(
                "negative price for product {}: {}",
                row.id, row.price_cents
            )));
        }
        let stock = u32::try_from(row.stock).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "negative stock for product {}: {}",
                row.id, row.stock
            ))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            price: Money::from_cents(row.price_cents),
            stock,
        })
    }
}

/// Repository for catalog lookups.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        // Using runtime query to avoid SQLx offline mode cache requirements
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, price_cents, stock
            FROM storefront.product
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get every listed product in one query. Unknown IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<&str> = ids.iter().map(ProductId::as_str).collect();
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, price_cents, stock
            FROM storefront.product
            WHERE id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Insert or replace a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the stock does not fit the
    /// column, or `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, product: &Product) -> Result<(), RepositoryError> {
        let stock = i32::try_from(product.stock)
            .map_err(|_| RepositoryError::Conflict(format!("stock too large: {}", product.stock)))?;

        sqlx::query(
            r"
            INSERT INTO storefront.product (id, name, price_cents, stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                stock = EXCLUDED.stock,
                updated_at = NOW()
            ",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(stock)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
