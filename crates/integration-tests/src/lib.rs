//! Integration tests for PG Closets.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process tests (memory cart store, no services needed)
//! cargo test -p pg-closets-integration-tests
//!
//! # Including PostgreSQL-backed tests
//! STOREFRONT_DATABASE_URL=postgres://... \
//!     cargo test -p pg-closets-integration-tests -- --include-ignored
//! ```
//!
//! # Test Categories
//!
//! - `cart_api` - Storefront cart API driven through the full router
//! - `cart_postgres` - Repository behaviour against a real database
//! - `local_cart` - File-backed client-side cart sessions

#![allow(clippy::missing_panics_doc)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use pg_closets_core::{Money, ProductId};
use pg_closets_storefront::config::{CartBackend, CartConfig, StorefrontConfig};
use pg_closets_storefront::models::Product;
use pg_closets_storefront::routes;
use pg_closets_storefront::services::{CartStore, MemoryCartStore};
use pg_closets_storefront::state::AppState;

/// Catalog every API test starts with.
#[must_use]
pub fn test_catalog() -> Vec<Product> {
    vec![
        product("bypass-door", "Bypass Closet Door", 45_900, 10),
        product("bifold-door", "Bifold Closet Door", 29_900, 2),
        product("mirror-door", "Mirrored Closet Door", 12_000, 0),
    ]
}

fn product(id: &str, name: &str, price_cents: i64, stock: u32) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        price: Money::from_cents(price_cents),
        stock,
    }
}

/// Storefront configuration for in-process tests.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: None,
        host: [127, 0, 0, 1].into(),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        cart: CartConfig {
            backend: CartBackend::Memory,
            ..CartConfig::default()
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// A browser-like client for the storefront router.
///
/// Holds on to the session cookie between requests, so consecutive calls act
/// as the same anonymous shopper.
pub struct TestClient {
    app: Router,
    cookie: Option<String>,
}

/// Status and parsed JSON body of a response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestClient {
    /// Router over a fresh memory store seeded with [`test_catalog`].
    #[must_use]
    pub fn new() -> Self {
        let store = CartStore::memory(MemoryCartStore::with_products(test_catalog()));
        Self::with_store(store)
    }

    /// Router over the given cart store.
    #[must_use]
    pub fn with_store(store: CartStore) -> Self {
        let state = AppState::new(test_config(), store);
        Self {
            app: routes::app(state, MemoryStore::default(), None),
            cookie: None,
        }
    }

    /// A second shopper sharing this client's server (fresh cookie jar).
    #[must_use]
    pub fn other_shopper(&self) -> Self {
        Self {
            app: self.app.clone(),
            cookie: None,
        }
    }

    pub async fn get(&mut self, path: &str) -> TestResponse {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&mut self, path: &str, body: Value) -> TestResponse {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn patch(&mut self, path: &str, body: Value) -> TestResponse {
        self.send(Method::PATCH, path, Some(body)).await
    }

    pub async fn put(&mut self, path: &str, body: Value) -> TestResponse {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&mut self, path: &str) -> TestResponse {
        self.send(Method::DELETE, path, None).await
    }

    async fn send(&mut self, method: Method, path: &str, body: Option<Value>) -> TestResponse {
        let mut request = Request::builder().method(method).uri(path);
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Router is infallible");

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie
                .to_str()
                .expect("Cookie is ASCII")
                .split(';')
                .next()
                .unwrap_or_default()
                .to_string();
            self.cookie = Some(pair);
        }

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse { status, body }
    }
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}
