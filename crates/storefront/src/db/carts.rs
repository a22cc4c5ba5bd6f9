//! Server-side cart repository.
//!
//! A cart row is owned by exactly one user or anonymous session token and
//! expires after a period of inactivity. Every successful write through
//! [`CartRepository::find_or_create`] slides that window forward.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::PgPool;

use pg_closets_core::{CartId, CartLine, Customization, LineId, Money, ProductId};

use super::RepositoryError;
use crate::models::CartOwner;

/// Cart header: id, applied promotion, installation notes, and expiry.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StoredCart {
    pub id: CartId,
    /// Promotion code as entered; resolved against the catalog on read.
    pub promo_code: Option<String>,
    pub installation_date: Option<NaiveDate>,
    pub special_instructions: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Internal row type for cart lines.
#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    id: LineId,
    product_id: ProductId,
    customization: String,
    quantity: i32,
    unit_price_cents: i64,
    installation: bool,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let customization = Customization::from_canonical_key(&row.customization).map_err(|e| {
            RepositoryError::DataCorruption(format!(
                "invalid customization on cart line {}: {e}",
                row.id
            ))
        })?;
        let quantity = u32::try_from(row.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| {
                RepositoryError::DataCorruption(format!(
                    "invalid quantity on cart line {}: {}",
                    row.id, row.quantity
                ))
            })?;

        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            quantity,
            unit_price: Money::from_cents(row.unit_price_cents),
            customization,
            installation: row.installation,
        })
    }
}

/// Clamp a line quantity to the `INTEGER` column.
fn quantity_column(quantity: u32) -> i32 {
    i32::try_from(quantity).unwrap_or(i32::MAX)
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the owner's cart if it exists and has not expired.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(&self, owner: &CartOwner) -> Result<Option<StoredCart>, RepositoryError> {
        // Using runtime query to avoid SQLx offline mode cache requirements
        let cart = sqlx::query_as::<_, StoredCart>(
            r"
            SELECT id, promo_code, installation_date, special_instructions, expires_at
            FROM storefront.cart
            WHERE (user_id = $1 OR session_token = $2)
              AND expires_at > NOW()
            ",
        )
        .bind(owner.user_id())
        .bind(owner.session_token())
        .fetch_optional(self.pool)
        .await?;

        Ok(cart)
    }

    /// Get the owner's cart, creating it if needed, and push its expiry to
    /// `now + ttl`.
    ///
    /// An expired cart for the same owner is deleted first so a returning
    /// visitor starts from an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn find_or_create(
        &self,
        owner: &CartOwner,
        ttl: Duration,
    ) -> Result<StoredCart, RepositoryError> {
        let user_id = owner.user_id();
        let session_token = owner.session_token();
        let expires_at = Utc::now() + ttl;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            DELETE FROM storefront.cart
            WHERE (user_id = $1 OR session_token = $2)
              AND expires_at <= NOW()
            ",
        )
        .bind(user_id)
        .bind(session_token)
        .execute(&mut *tx)
        .await?;

        let upsert = match owner {
            CartOwner::User(_) => {
                r"
                INSERT INTO storefront.cart (user_id, session_token, expires_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (user_id) DO UPDATE
                SET expires_at = EXCLUDED.expires_at, updated_at = NOW()
                RETURNING id, promo_code, installation_date, special_instructions, expires_at
                "
            }
            CartOwner::Guest(_) => {
                r"
                INSERT INTO storefront.cart (user_id, session_token, expires_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (session_token) DO UPDATE
                SET expires_at = EXCLUDED.expires_at, updated_at = NOW()
                RETURNING id, promo_code, installation_date, special_instructions, expires_at
                "
            }
        };

        let cart = sqlx::query_as::<_, StoredCart>(upsert)
            .bind(user_id)
            .bind(session_token)
            .bind(expires_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(cart)
    }

    /// Lines of a cart in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` if a stored line is invalid.
    pub async fn lines(&self, cart_id: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT id, product_id, customization, quantity, unit_price_cents, installation
            FROM storefront.cart_line
            WHERE cart_id = $1
            ORDER BY position
            ",
        )
        .bind(cart_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Add a line or, if the same selection is already in the cart, increase
    /// its quantity in the same statement.
    ///
    /// Returns the id of the line now holding the selection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add_line(
        &self,
        cart_id: CartId,
        line: &CartLine,
    ) -> Result<LineId, RepositoryError> {
        let id: LineId = sqlx::query_scalar(
            r"
            INSERT INTO storefront.cart_line AS line
                (id, cart_id, product_id, customization, quantity, unit_price_cents, installation)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (cart_id, product_id, customization) DO UPDATE
            SET quantity = LEAST(line.quantity::BIGINT + EXCLUDED.quantity, 2147483647)::INTEGER,
                updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(line.id)
        .bind(cart_id)
        .bind(&line.product_id)
        .bind(line.customization.canonical_key())
        .bind(quantity_column(line.quantity))
        .bind(line.unit_price.cents())
        .bind(line.installation)
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }

    /// Replace a line's quantity. Zero or negative deletes the line.
    ///
    /// Returns `false` if the line is not in this cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_quantity(
        &self,
        cart_id: CartId,
        line_id: LineId,
        quantity: i64,
    ) -> Result<bool, RepositoryError> {
        if quantity <= 0 {
            return self.remove_line(cart_id, line_id).await;
        }
        let quantity = i32::try_from(quantity).unwrap_or(i32::MAX);

        let result = sqlx::query(
            r"
            UPDATE storefront.cart_line
            SET quantity = $3, updated_at = NOW()
            WHERE cart_id = $1 AND id = $2
            ",
        )
        .bind(cart_id)
        .bind(line_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a line. Returns `false` if the line is not in this cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove_line(
        &self,
        cart_id: CartId,
        line_id: LineId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM storefront.cart_line
            WHERE cart_id = $1 AND id = $2
            ",
        )
        .bind(cart_id)
        .bind(line_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every line, the applied promotion and the installation notes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn clear(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM storefront.cart_line WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r"
            UPDATE storefront.cart
            SET promo_code = NULL,
                installation_date = NULL,
                special_instructions = NULL,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(cart_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Request or cancel installation for a line.
    ///
    /// Returns `false` if the line is not in this cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_installation(
        &self,
        cart_id: CartId,
        line_id: LineId,
        included: bool,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.cart_line
            SET installation = $3, updated_at = NOW()
            WHERE cart_id = $1 AND id = $2
            ",
        )
        .bind(cart_id)
        .bind(line_id)
        .bind(included)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Attach or remove the cart's promotion code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the cart does not exist, or
    /// `RepositoryError::Database` if the query fails.
    pub async fn set_promo_code(
        &self,
        cart_id: CartId,
        code: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.cart
            SET promo_code = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(cart_id)
        .bind(code)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Set or unset the preferred installation day.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the cart does not exist, or
    /// `RepositoryError::Database` if the query fails.
    pub async fn set_installation_date(
        &self,
        cart_id: CartId,
        date: Option<NaiveDate>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.cart
            SET installation_date = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(cart_id)
        .bind(date)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Set or unset the notes for the installer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the cart does not exist, or
    /// `RepositoryError::Database` if the query fails.
    pub async fn set_special_instructions(
        &self,
        cart_id: CartId,
        instructions: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.cart
            SET special_instructions = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(cart_id)
        .bind(instructions)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete carts whose expiry has passed. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.cart WHERE expires_at <= NOW()")
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(customization: &str, quantity: i32) -> CartLineRow {
        CartLineRow {
            id: LineId::generate(),
            product_id: ProductId::new("bifold-door"),
            customization: customization.to_owned(),
            quantity,
            unit_price_cents: 25_900,
            installation: true,
        }
    }

    #[test]
    fn test_line_row_conversion() {
        let line = CartLine::try_from(row(r#"{"finish":"oak","width":"36"}"#, 2)).unwrap();
        assert_eq!(line.quantity, 2);
        assert_eq!(line.customization.get("finish"), Some("oak"));
        assert_eq!(line.line_total(), Money::from_cents(51_800));
        assert!(line.installation);
    }

    #[test]
    fn test_line_row_rejects_corrupt_values() {
        assert!(matches!(
            CartLine::try_from(row("not json", 1)),
            Err(RepositoryError::DataCorruption(_))
        ));
        assert!(matches!(
            CartLine::try_from(row("{}", 0)),
            Err(RepositoryError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_quantity_column_saturates() {
        assert_eq!(quantity_column(5), 5);
        assert_eq!(quantity_column(u32::MAX), i32::MAX);
    }
}
