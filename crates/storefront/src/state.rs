//! Application state shared across handlers.

use std::sync::Arc;

use pg_closets_core::PromoCatalog;

use crate::config::StorefrontConfig;
use crate::services::{CartService, CartStore};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the cart service and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    carts: CartService,
}

impl AppState {
    /// Create a new application state over a cart store.
    #[must_use]
    pub fn new(config: StorefrontConfig, store: CartStore) -> Self {
        let carts = CartService::new(
            store,
            config.cart.pricing(),
            PromoCatalog::builtin(),
            config.cart.ttl(),
        );

        Self {
            inner: Arc::new(AppStateInner { config, carts }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the cart service.
    #[must_use]
    pub fn carts(&self) -> &CartService {
        &self.inner.carts
    }
}
