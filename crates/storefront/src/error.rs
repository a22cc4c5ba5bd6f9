//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::CartError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    /// Whether this error is the server's fault.
    fn is_server_error(&self) -> bool {
        match self {
            Self::Cart(CartError::Repository(err)) => {
                !matches!(err, RepositoryError::Conflict(_))
            }
            _ => false,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Cart(err) => match err {
                CartError::Repository(RepositoryError::Conflict(_))
                | CartError::OutOfStock { .. } => StatusCode::CONFLICT,
                CartError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
                CartError::ProductNotFound(_) => StatusCode::NOT_FOUND,
                CartError::Promo(_) | CartError::EmptyCart => StatusCode::BAD_REQUEST,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn client_message(&self) -> String {
        // Don't expose internal error details to clients
        match self {
            _ if self.is_server_error() => "Internal server error".to_string(),
            Self::Cart(err) => match err {
                CartError::OutOfStock {
                    name, available, ..
                } => match available {
                    0 => format!("{name} is out of stock"),
                    n => format!("Only {n} of {name} left in stock"),
                },
                CartError::Repository(_) => {
                    "The cart was busy, please try again".to_string()
                }
                other => other.to_string(),
            },
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let status = self.status();
        let body = ErrorBody {
            error: self.client_message(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for cart actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use pg_closets_core::{Money, ProductId, PromoError};

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_bad_request() {
        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
        assert_eq!(get_status(err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_cart_error_status_codes() {
        assert_eq!(
            get_status(CartError::ProductNotFound(ProductId::new("x")).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CartError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CartError::Promo(PromoError::Unknown("X".to_string())).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(
                CartError::Repository(RepositoryError::Conflict("busy".to_string())).into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CartError::Repository(RepositoryError::NotFound).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_out_of_stock_message_names_product() {
        let err = AppError::from(CartError::OutOfStock {
            product_id: ProductId::new("bifold"),
            name: "Bifold Door".to_string(),
            requested: 3,
            available: 2,
        });
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.client_message(), "Only 2 of Bifold Door left in stock");
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::from(CartError::Repository(RepositoryError::DataCorruption(
            "bad customization".to_string(),
        )));
        assert_eq!(err.client_message(), "Internal server error");

        let err = AppError::from(CartError::from(PromoError::MinimumNotMet {
            code: "SAVE50".to_string(),
            minimum: Money::from_dollars(500),
        }));
        assert!(err.client_message().contains("SAVE50"));
    }
}
