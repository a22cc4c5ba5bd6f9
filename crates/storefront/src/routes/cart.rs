//! Cart API handlers.
//!
//! Every handler answers with the full cart so clients can re-render from a
//! single response. Validation of client input happens here; the cart
//! service assumes well-formed quantities.

use std::num::NonZeroU32;

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::instrument;

use pg_closets_core::{Customization, LineId, ProductId};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::CurrentCart;
use crate::services::cart::{MAX_LINE_QUANTITY, MAX_SPECIAL_INSTRUCTIONS};
use crate::services::{CartView, CheckoutView};
use crate::state::AppState;

/// Body of `POST /api/cart/items`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub customization: Customization,
}

const fn default_quantity() -> i64 {
    1
}

/// Body of `PATCH /api/cart/items/{lineId}`.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

/// Body of `PUT /api/cart/items/{lineId}/installation`.
#[derive(Debug, Deserialize)]
pub struct InstallationRequest {
    pub included: bool,
}

/// Body of `POST /api/cart/promo`.
#[derive(Debug, Deserialize)]
pub struct PromoRequest {
    pub code: String,
}

/// Body of `PUT /api/cart/installation-date`.
#[derive(Debug, Deserialize)]
pub struct InstallationDateRequest {
    /// `YYYY-MM-DD`, or `null` to unset.
    pub date: Option<NaiveDate>,
}

/// Body of `PUT /api/cart/instructions`.
#[derive(Debug, Deserialize)]
pub struct InstructionsRequest {
    /// Notes for the installer, or `null` to unset.
    pub instructions: Option<String>,
}

/// Installation day: today or later.
fn installation_date(date: Option<NaiveDate>, today: NaiveDate) -> Result<Option<NaiveDate>> {
    match date {
        Some(date) if date < today => Err(AppError::BadRequest(
            "installation date cannot be in the past".to_string(),
        )),
        _ => Ok(date),
    }
}

/// Installer notes: at most [`MAX_SPECIAL_INSTRUCTIONS`] characters.
fn special_instructions(instructions: Option<&str>) -> Result<Option<&str>> {
    match instructions {
        Some(text) if text.trim().chars().count() > MAX_SPECIAL_INSTRUCTIONS => {
            Err(AppError::BadRequest(format!(
                "special instructions must be at most {MAX_SPECIAL_INSTRUCTIONS} characters"
            )))
        }
        _ => Ok(instructions),
    }
}

/// Quantity for a new line: 1 through [`MAX_LINE_QUANTITY`].
fn add_quantity(quantity: i64) -> Result<NonZeroU32> {
    u32::try_from(quantity)
        .ok()
        .filter(|q| *q <= MAX_LINE_QUANTITY)
        .and_then(NonZeroU32::new)
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "quantity must be between 1 and {MAX_LINE_QUANTITY}"
            ))
        })
}

/// Replacement quantity: at most [`MAX_LINE_QUANTITY`]; zero or less removes.
fn update_quantity(quantity: i64) -> Result<i64> {
    if quantity > i64::from(MAX_LINE_QUANTITY) {
        return Err(AppError::BadRequest(format!(
            "quantity must be at most {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(quantity)
}

/// Show the caller's cart.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    CurrentCart(owner): CurrentCart,
) -> Result<Json<CartView>> {
    Ok(Json(state.carts().view(&owner).await?))
}

/// Add a product to the cart.
#[instrument(skip(state, body))]
pub async fn add_item(
    State(state): State<AppState>,
    CurrentCart(owner): CurrentCart,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<CartView>> {
    let quantity = add_quantity(body.quantity)?;
    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", body.product_id.as_str())]),
    );
    let cart = state
        .carts()
        .add_item(&owner, &body.product_id, quantity, body.customization)
        .await?;
    Ok(Json(cart))
}

/// Change a line's quantity.
#[instrument(skip(state))]
pub async fn update_item(
    State(state): State<AppState>,
    CurrentCart(owner): CurrentCart,
    Path(line_id): Path<LineId>,
    Json(body): Json<UpdateQuantityRequest>,
) -> Result<Json<CartView>> {
    let quantity = update_quantity(body.quantity)?;
    let cart = state
        .carts()
        .update_quantity(&owner, line_id, quantity)
        .await?;
    Ok(Json(cart))
}

/// Remove a line.
#[instrument(skip(state))]
pub async fn remove_item(
    State(state): State<AppState>,
    CurrentCart(owner): CurrentCart,
    Path(line_id): Path<LineId>,
) -> Result<Json<CartView>> {
    Ok(Json(state.carts().remove_item(&owner, line_id).await?))
}

/// Request or cancel installation for a line.
#[instrument(skip(state))]
pub async fn set_installation(
    State(state): State<AppState>,
    CurrentCart(owner): CurrentCart,
    Path(line_id): Path<LineId>,
    Json(body): Json<InstallationRequest>,
) -> Result<Json<CartView>> {
    let cart = state
        .carts()
        .set_installation(&owner, line_id, body.included)
        .await?;
    Ok(Json(cart))
}

/// Empty the cart.
#[instrument(skip(state))]
pub async fn clear(
    State(state): State<AppState>,
    CurrentCart(owner): CurrentCart,
) -> Result<Json<CartView>> {
    Ok(Json(state.carts().clear(&owner).await?))
}

/// Apply a promotion code.
#[instrument(skip(state))]
pub async fn apply_promo(
    State(state): State<AppState>,
    CurrentCart(owner): CurrentCart,
    Json(body): Json<PromoRequest>,
) -> Result<Json<CartView>> {
    if body.code.trim().is_empty() {
        return Err(AppError::BadRequest("promo code is required".to_string()));
    }
    Ok(Json(state.carts().apply_promo(&owner, &body.code).await?))
}

/// Remove the promotion code.
#[instrument(skip(state))]
pub async fn remove_promo(
    State(state): State<AppState>,
    CurrentCart(owner): CurrentCart,
) -> Result<Json<CartView>> {
    Ok(Json(state.carts().remove_promo(&owner).await?))
}

/// Set or unset the preferred installation day.
#[instrument(skip(state))]
pub async fn set_installation_date(
    State(state): State<AppState>,
    CurrentCart(owner): CurrentCart,
    Json(body): Json<InstallationDateRequest>,
) -> Result<Json<CartView>> {
    let date = installation_date(body.date, Utc::now().date_naive())?;
    Ok(Json(state.carts().set_installation_date(&owner, date).await?))
}

/// Set or unset the notes for the installer.
#[instrument(skip(state, body))]
pub async fn set_special_instructions(
    State(state): State<AppState>,
    CurrentCart(owner): CurrentCart,
    Json(body): Json<InstructionsRequest>,
) -> Result<Json<CartView>> {
    let instructions = special_instructions(body.instructions.as_deref())?;
    let cart = state
        .carts()
        .set_special_instructions(&owner, instructions)
        .await?;
    Ok(Json(cart))
}

/// Validate the cart against stock and quote delivery.
#[instrument(skip(state))]
pub async fn checkout(
    State(state): State<AppState>,
    CurrentCart(owner): CurrentCart,
) -> Result<Json<CheckoutView>> {
    add_breadcrumb("cart", "Checkout started", None);
    let today = Utc::now().date_naive();
    Ok(Json(state.carts().checkout(&owner, today).await?))
}
