//! Cart service errors.

use thiserror::Error;

use pg_closets_core::{ProductId, PromoError};

use crate::db::RepositoryError;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    #[error(transparent)]
    Promo(#[from] PromoError),

    #[error("cart is empty")]
    EmptyCart,

    /// A line asks for more than the catalog has on hand.
    #[error("only {available} of {name} left in stock (requested {requested})")]
    OutOfStock {
        product_id: ProductId,
        name: String,
        requested: u64,
        available: u32,
    },
}
