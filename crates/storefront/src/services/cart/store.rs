//! Storage backend behind the cart service.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use sqlx::PgPool;
use tracing::{debug, error, info};

use pg_closets_core::{CartId, CartLine, LineId, ProductId};

use super::memory::MemoryCartStore;
use crate::db::carts::CartRepository;
use crate::db::products::ProductRepository;
use crate::db::{RepositoryError, with_retry};
use crate::models::{CartOwner, Product};

/// A cart as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCartState {
    pub id: CartId,
    pub lines: Vec<CartLine>,
    pub promo_code: Option<String>,
    pub installation_date: Option<NaiveDate>,
    pub special_instructions: Option<String>,
}

/// Where carts live. Cheap to clone.
#[derive(Debug, Clone)]
pub enum CartStore {
    Postgres(PgPool),
    Memory(Arc<MemoryCartStore>),
}

impl CartStore {
    /// A fresh in-memory store.
    #[must_use]
    pub fn memory(store: MemoryCartStore) -> Self {
        Self::Memory(Arc::new(store))
    }

    /// Check that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if `PostgreSQL` does not answer.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        match self {
            Self::Postgres(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
                Ok(())
            }
            Self::Memory(_) => Ok(()),
        }
    }

    pub(super) async fn product(
        &self,
        id: &ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        match self {
            Self::Postgres(pool) => ProductRepository::new(pool).get(id).await,
            Self::Memory(store) => Ok(store.product(id).await),
        }
    }

    pub(super) async fn products(
        &self,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError> {
        match self {
            Self::Postgres(pool) => ProductRepository::new(pool).get_many(ids).await,
            Self::Memory(store) => Ok(store.products(ids).await),
        }
    }

    pub(super) async fn find(
        &self,
        owner: &CartOwner,
    ) -> Result<Option<StoredCartState>, RepositoryError> {
        match self {
            Self::Postgres(pool) => {
                let repo = CartRepository::new(pool);
                let Some(cart) = repo.find(owner).await? else {
                    return Ok(None);
                };
                let lines = repo.lines(cart.id).await?;
                Ok(Some(StoredCartState {
                    id: cart.id,
                    lines,
                    promo_code: cart.promo_code,
                    installation_date: cart.installation_date,
                    special_instructions: cart.special_instructions,
                }))
            }
            Self::Memory(store) => Ok(store.find(owner).await),
        }
    }

    pub(super) async fn find_or_create(
        &self,
        owner: &CartOwner,
        ttl: Duration,
    ) -> Result<CartId, RepositoryError> {
        match self {
            Self::Postgres(pool) => {
                let repo = CartRepository::new(pool);
                let cart = with_retry("cart.find_or_create", || repo.find_or_create(owner, ttl))
                    .await?;
                Ok(cart.id)
            }
            Self::Memory(store) => Ok(store.find_or_create(owner, ttl).await),
        }
    }

    pub(super) async fn add_line(
        &self,
        cart_id: CartId,
        line: CartLine,
    ) -> Result<LineId, RepositoryError> {
        match self {
            Self::Postgres(pool) => {
                let repo = CartRepository::new(pool);
                with_retry("cart.add_line", || repo.add_line(cart_id, &line)).await
            }
            Self::Memory(store) => store
                .add_line(cart_id, line)
                .await
                .ok_or(RepositoryError::NotFound),
        }
    }

    pub(super) async fn set_quantity(
        &self,
        cart_id: CartId,
        line_id: LineId,
        quantity: i64,
    ) -> Result<bool, RepositoryError> {
        match self {
            Self::Postgres(pool) => {
                let repo = CartRepository::new(pool);
                with_retry("cart.set_quantity", || {
                    repo.set_quantity(cart_id, line_id, quantity)
                })
                .await
            }
            Self::Memory(store) => Ok(store.set_quantity(cart_id, line_id, quantity).await),
        }
    }

    pub(super) async fn remove_line(
        &self,
        cart_id: CartId,
        line_id: LineId,
    ) -> Result<bool, RepositoryError> {
        match self {
            Self::Postgres(pool) => {
                let repo = CartRepository::new(pool);
                with_retry("cart.remove_line", || repo.remove_line(cart_id, line_id)).await
            }
            Self::Memory(store) => Ok(store.remove_line(cart_id, line_id).await),
        }
    }

    pub(super) async fn set_installation(
        &self,
        cart_id: CartId,
        line_id: LineId,
        included: bool,
    ) -> Result<bool, RepositoryError> {
        match self {
            Self::Postgres(pool) => {
                let repo = CartRepository::new(pool);
                with_retry("cart.set_installation", || {
                    repo.set_installation(cart_id, line_id, included)
                })
                .await
            }
            Self::Memory(store) => Ok(store.set_installation(cart_id, line_id, included).await),
        }
    }

    pub(super) async fn clear(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        match self {
            Self::Postgres(pool) => {
                let repo = CartRepository::new(pool);
                with_retry("cart.clear", || repo.clear(cart_id)).await
            }
            Self::Memory(store) => {
                store.clear(cart_id).await;
                Ok(())
            }
        }
    }

    pub(super) async fn set_promo_code(
        &self,
        cart_id: CartId,
        code: Option<&str>,
    ) -> Result<(), RepositoryError> {
        match self {
            Self::Postgres(pool) => {
                let repo = CartRepository::new(pool);
                with_retry("cart.set_promo_code", || repo.set_promo_code(cart_id, code)).await
            }
            Self::Memory(store) => {
                if store.set_promo_code(cart_id, code).await {
                    Ok(())
                } else {
                    Err(RepositoryError::NotFound)
                }
            }
        }
    }

    pub(super) async fn set_installation_date(
        &self,
        cart_id: CartId,
        date: Option<NaiveDate>,
    ) -> Result<(), RepositoryError> {
        match self {
            Self::Postgres(pool) => {
                let repo = CartRepository::new(pool);
                with_retry("cart.set_installation_date", || {
                    repo.set_installation_date(cart_id, date)
                })
                .await
            }
            Self::Memory(store) => store
                .set_installation_date(cart_id, date)
                .await
                .then_some(())
                .ok_or(RepositoryError::NotFound),
        }
    }

    pub(super) async fn set_special_instructions(
        &self,
        cart_id: CartId,
        instructions: Option<&str>,
    ) -> Result<(), RepositoryError> {
        match self {
            Self::Postgres(pool) => {
                let repo = CartRepository::new(pool);
                with_retry("cart.set_special_instructions", || {
                    repo.set_special_instructions(cart_id, instructions)
                })
                .await
            }
            Self::Memory(store) => store
                .set_special_instructions(cart_id, instructions)
                .await
                .then_some(())
                .ok_or(RepositoryError::NotFound),
        }
    }

    /// Delete carts past their expiry. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        match self {
            Self::Postgres(pool) => CartRepository::new(pool).purge_expired().await,
            Self::Memory(store) => Ok(store.purge_expired().await),
        }
    }
}

/// Spawn a background task that purges expired carts every `every`.
///
/// The first sweep runs immediately. Failures are logged and the task keeps
/// going.
pub fn spawn_expiry_sweeper(store: CartStore, every: std::time::Duration) {
    info!(interval_secs = every.as_secs(), "Spawning expired cart sweeper");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => debug!("No expired carts"),
                Ok(removed) => info!(removed, "Purged expired carts"),
                Err(e) => error!(error = %e, "Failed to purge expired carts"),
            }
        }
    });
}
