//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                              - Liveness
//! GET    /health/ready                        - Readiness (cart store reachable)
//!
//! # Cart API (JSON)
//! GET    /api/cart                            - Current cart
//! DELETE /api/cart                            - Clear cart, promo and notes
//! POST   /api/cart/items                      - Add item (merges same selection)
//! PATCH  /api/cart/items/{lineId}             - Set quantity (<= 0 removes)
//! DELETE /api/cart/items/{lineId}             - Remove item
//! PUT    /api/cart/items/{lineId}/installation - Toggle installation
//! POST   /api/cart/promo                      - Apply promo code
//! DELETE /api/cart/promo                      - Remove promo code
//! PUT    /api/cart/installation-date          - Set or unset installation day
//! PUT    /api/cart/instructions               - Set or unset installer notes
//! POST   /api/cart/checkout                   - Validate stock, quote delivery
//! ```

pub mod cart;

use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware,
    routing::{get, patch, post, put},
};
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;

use crate::middleware::{RateLimiterLayer, create_session_layer, request_id_middleware};
use crate::state::AppState;

/// Create the cart API router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{line_id}",
            patch(cart::update_item).delete(cart::remove_item),
        )
        .route("/items/{line_id}/installation", put(cart::set_installation))
        .route("/promo", post(cart::apply_promo).delete(cart::remove_promo))
        .route("/installation-date", put(cart::set_installation_date))
        .route("/instructions", put(cart::set_special_instructions))
        .route("/checkout", post(cart::checkout))
}

/// Build the full application.
///
/// Sentry layers are added by the binary; everything else a request passes
/// through is assembled here so tests drive the same stack.
pub fn app<S>(
    state: AppState,
    session_store: S,
    rate_limiter: Option<RateLimiterLayer>,
) -> Router
where
    S: SessionStore + Clone,
{
    let mut api = cart_routes();
    if let Some(limiter) = rate_limiter {
        api = api.layer(limiter);
    }

    let session_layer = create_session_layer(session_store, state.config().is_secure());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api/cart", api)
        .layer(session_layer)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies the cart store is reachable before returning OK.
/// Returns 503 Service Unavailable otherwise.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.carts().store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
