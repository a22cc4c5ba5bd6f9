//! Server-side cart operations.
//!
//! Every operation resolves the caller's [`CartOwner`] to a single cart, so
//! concurrent requests from two tabs of the same session land on the same
//! rows. Prices come from the catalog when a line is first added and are
//! kept on the line afterwards.

mod error;
mod memory;
mod store;

use std::collections::BTreeMap;
use std::num::NonZeroU32;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, instrument};

use pg_closets_core::{
    Cart, CartAction, CartId, CartLine, Customization, DeliveryWindow, LineId, OrderSummary,
    PricingPolicy, ProductId, PromoCatalog, Totals,
};

pub use error::CartError;
pub use memory::MemoryCartStore;
pub use store::{CartStore, StoredCartState, spawn_expiry_sweeper};

use crate::models::CartOwner;

/// Largest quantity a single line may hold through the API.
pub const MAX_LINE_QUANTITY: u32 = 999;

/// Longest installer note accepted through the API, in characters.
pub const MAX_SPECIAL_INSTRUCTIONS: usize = 1_000;

/// A cart as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    /// `None` until the owner's first write.
    pub id: Option<CartId>,
    pub items: Vec<CartLine>,
    pub totals: Totals,
    pub summary: OrderSummary,
    pub promo_code: Option<String>,
    pub installation_date: Option<NaiveDate>,
    pub special_instructions: Option<String>,
}

/// Result of a successful checkout validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    pub cart: CartView,
    pub delivery: DeliveryWindow,
}

/// Cart operations over a [`CartStore`].
#[derive(Debug, Clone)]
pub struct CartService {
    store: CartStore,
    pricing: PricingPolicy,
    promos: PromoCatalog,
    ttl: Duration,
}

impl CartService {
    #[must_use]
    pub const fn new(
        store: CartStore,
        pricing: PricingPolicy,
        promos: PromoCatalog,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            pricing,
            promos,
            ttl,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &CartStore {
        &self.store
    }

    #[must_use]
    pub const fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    /// Current cart for an owner. Owners without a cart see an empty one.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn view(&self, owner: &CartOwner) -> Result<CartView, CartError> {
        let state = self.store.find(owner).await?;
        Ok(self.render(state))
    }

    /// Add a product, merging with a line holding the same selection.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` for products missing from the
    /// catalog, or `CartError::Repository` if the store fails.
    #[instrument(skip(self, customization), fields(owner = %owner))]
    pub async fn add_item(
        &self,
        owner: &CartOwner,
        product_id: &ProductId,
        quantity: NonZeroU32,
        customization: Customization,
    ) -> Result<CartView, CartError> {
        let product = self
            .store
            .product(product_id)
            .await?
            .ok_or_else(|| CartError::ProductNotFound(product_id.clone()))?;

        let cart_id = self.store.find_or_create(owner, self.ttl).await?;
        let line = CartLine {
            id: LineId::generate(),
            product_id: product.id,
            quantity: quantity.get(),
            unit_price: product.price,
            customization,
            installation: false,
        };
        let line_id = self.store.add_line(cart_id, line).await?;
        info!(cart_id = %cart_id, line_id = %line_id, quantity = quantity.get(), "Added to cart");

        self.view(owner).await
    }

    /// Replace a line's quantity; zero or negative removes the line.
    /// Unknown lines are ignored.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn update_quantity(
        &self,
        owner: &CartOwner,
        line_id: LineId,
        quantity: i64,
    ) -> Result<CartView, CartError> {
        let cart_id = self.store.find_or_create(owner, self.ttl).await?;
        if !self.store.set_quantity(cart_id, line_id, quantity).await? {
            debug!(cart_id = %cart_id, line_id = %line_id, "Quantity update for unknown line");
        }
        self.view(owner).await
    }

    /// Remove a line. Unknown lines are ignored.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn remove_item(
        &self,
        owner: &CartOwner,
        line_id: LineId,
    ) -> Result<CartView, CartError> {
        let cart_id = self.store.find_or_create(owner, self.ttl).await?;
        if !self.store.remove_line(cart_id, line_id).await? {
            debug!(cart_id = %cart_id, line_id = %line_id, "Removal of unknown line");
        }
        self.view(owner).await
    }

    /// Request or cancel installation for a line. Unknown lines are ignored.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn set_installation(
        &self,
        owner: &CartOwner,
        line_id: LineId,
        included: bool,
    ) -> Result<CartView, CartError> {
        let cart_id = self.store.find_or_create(owner, self.ttl).await?;
        if !self
            .store
            .set_installation(cart_id, line_id, included)
            .await?
        {
            debug!(cart_id = %cart_id, line_id = %line_id, "Installation toggle for unknown line");
        }
        self.view(owner).await
    }

    /// Empty the cart and drop its promotion and installation notes.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn clear(&self, owner: &CartOwner) -> Result<CartView, CartError> {
        if let Some(state) = self.store.find(owner).await? {
            self.store.clear(state.id).await?;
            info!(cart_id = %state.id, "Cart cleared");
        }
        self.view(owner).await
    }

    /// Attach a promotion code.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Promo` for unknown codes or a subtotal below the
    /// code's minimum, or `CartError::Repository` if the store fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn apply_promo(&self, owner: &CartOwner, code: &str) -> Result<CartView, CartError> {
        let state = self.store.find(owner).await?;
        let subtotal = state
            .as_ref()
            .map(|state| Cart::from_lines(state.lines.iter().cloned()).subtotal())
            .unwrap_or_default();
        let promo = self.promos.resolve(code, subtotal)?;

        let cart_id = self.store.find_or_create(owner, self.ttl).await?;
        self.store.set_promo_code(cart_id, Some(&promo.code)).await?;
        info!(cart_id = %cart_id, code = %promo.code, "Promo code applied");

        self.view(owner).await
    }

    /// Detach the promotion code, if any.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn remove_promo(&self, owner: &CartOwner) -> Result<CartView, CartError> {
        if let Some(state) = self.store.find(owner).await? {
            self.store.set_promo_code(state.id, None).await?;
        }
        self.view(owner).await
    }

    /// Set or unset the preferred installation day.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn set_installation_date(
        &self,
        owner: &CartOwner,
        date: Option<NaiveDate>,
    ) -> Result<CartView, CartError> {
        let cart_id = self.store.find_or_create(owner, self.ttl).await?;
        self.store.set_installation_date(cart_id, date).await?;
        debug!(cart_id = %cart_id, ?date, "Installation date set");
        self.view(owner).await
    }

    /// Set or unset notes for the installer. Blank text unsets them.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    #[instrument(skip(self, instructions), fields(owner = %owner))]
    pub async fn set_special_instructions(
        &self,
        owner: &CartOwner,
        instructions: Option<&str>,
    ) -> Result<CartView, CartError> {
        let instructions = instructions.map(str::trim).filter(|text| !text.is_empty());
        let cart_id = self.store.find_or_create(owner, self.ttl).await?;
        self.store
            .set_special_instructions(cart_id, instructions)
            .await?;
        self.view(owner).await
    }

    /// Validate the cart for checkout against current stock.
    ///
    /// Quantities of lines sharing a product are summed before comparing
    /// with stock. Nothing is reserved; payment happens downstream.
    ///
    /// # Errors
    ///
    /// Returns `CartError::EmptyCart` for an empty cart,
    /// `CartError::OutOfStock` naming the first short product, or
    /// `CartError::Repository` if the store fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn checkout(
        &self,
        owner: &CartOwner,
        ordered_on: NaiveDate,
    ) -> Result<CheckoutView, CartError> {
        let state = self
            .store
            .find(owner)
            .await?
            .filter(|state| !state.lines.is_empty())
            .ok_or(CartError::EmptyCart)?;

        let requested = requested_quantities(&state.lines);
        let ids: Vec<ProductId> = requested.keys().cloned().collect();
        let products = self.store.products(&ids).await?;

        for (product_id, quantity) in &requested {
            let product = products.iter().find(|p| &p.id == product_id);
            let available = product.map_or(0, |p| p.stock);
            if *quantity > u64::from(available) {
                return Err(CartError::OutOfStock {
                    product_id: product_id.clone(),
                    name: product.map_or_else(|| product_id.to_string(), |p| p.name.clone()),
                    requested: *quantity,
                    available,
                });
            }
        }

        let cart = self.render(Some(state));
        info!(total = %cart.summary.total, "Checkout validated");
        Ok(CheckoutView {
            cart,
            delivery: DeliveryWindow::from_order_date(ordered_on),
        })
    }

    fn render(&self, state: Option<StoredCartState>) -> CartView {
        let Some(state) = state else {
            let cart = Cart::new();
            return CartView {
                id: None,
                items: Vec::new(),
                totals: cart.totals(&self.pricing.tax),
                summary: cart.summary(&self.pricing),
                promo_code: None,
                installation_date: None,
                special_instructions: None,
            };
        };

        let promo = state
            .promo_code
            .as_deref()
            .and_then(|code| self.promos.lookup(code));
        let cart = Cart::from_lines(state.lines)
            .with_promo(promo)
            .reduce(CartAction::SetInstallationDate(state.installation_date))
            .reduce(CartAction::SetSpecialInstructions(state.special_instructions));

        CartView {
            id: Some(state.id),
            totals: cart.totals(&self.pricing.tax),
            summary: cart.summary(&self.pricing),
            promo_code: cart.promo_code().map(|promo| promo.code.clone()),
            installation_date: cart.installation_date(),
            special_instructions: cart.special_instructions().map(str::to_owned),
            items: cart.into_items(),
        }
    }
}

fn requested_quantities(lines: &[CartLine]) -> BTreeMap<ProductId, u64> {
    let mut requested = BTreeMap::new();
    for line in lines {
        *requested.entry(line.product_id.clone()).or_insert(0) += u64::from(line.quantity);
    }
    requested
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pg_closets_core::{Money, PromoError};
    use uuid::Uuid;

    use super::*;
    use crate::models::Product;

    fn product(id: &str, dollars: i64, stock: u32) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("{id} door"),
            price: Money::from_dollars(dollars),
            stock,
        }
    }

    fn service() -> CartService {
        let store = MemoryCartStore::with_products([
            product("bypass", 250, 10),
            product("bifold", 100, 1),
            product("pivot", 600, 5),
        ]);
        CartService::new(
            CartStore::memory(store),
            PricingPolicy::default(),
            PromoCatalog::builtin(),
            Duration::days(30),
        )
    }

    fn guest() -> CartOwner {
        CartOwner::Guest(Uuid::new_v4())
    }

    fn qty(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_view_without_cart_is_empty() {
        let view = service().view(&guest()).await.unwrap();
        assert!(view.id.is_none());
        assert!(view.items.is_empty());
        assert_eq!(view.totals.total, Money::ZERO);
    }

    #[tokio::test]
    async fn test_add_prices_from_catalog_and_merges() {
        let svc = service();
        let owner = guest();
        svc.add_item(&owner, &ProductId::new("bypass"), qty(1), Customization::none())
            .await
            .unwrap();
        let view = svc
            .add_item(&owner, &ProductId::new("bypass"), qty(2), Customization::none())
            .await
            .unwrap();

        assert_eq!(view.items.len(), 1);
        assert_eq!(view.totals.item_count, 3);
        assert_eq!(view.totals.subtotal, Money::from_dollars(750));
    }

    #[tokio::test]
    async fn test_different_customization_makes_new_line() {
        let svc = service();
        let owner = guest();
        let oak = Customization::none().with("finish", "oak");
        svc.add_item(&owner, &ProductId::new("bypass"), qty(1), oak)
            .await
            .unwrap();
        let view = svc
            .add_item(&owner, &ProductId::new("bypass"), qty(1), Customization::none())
            .await
            .unwrap();
        assert_eq!(view.items.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_product_is_rejected() {
        let err = service()
            .add_item(&guest(), &ProductId::new("nope"), qty(1), Customization::none())
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn test_update_to_zero_removes_line() {
        let svc = service();
        let owner = guest();
        let view = svc
            .add_item(&owner, &ProductId::new("bypass"), qty(2), Customization::none())
            .await
            .unwrap();
        let line_id = view.items.first().unwrap().id;

        let view = svc.update_quantity(&owner, line_id, 5).await.unwrap();
        assert_eq!(view.totals.item_count, 5);

        let view = svc.update_quantity(&owner, line_id, 0).await.unwrap();
        assert!(view.items.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_line_is_noop() {
        let svc = service();
        let owner = guest();
        svc.add_item(&owner, &ProductId::new("bypass"), qty(1), Customization::none())
            .await
            .unwrap();
        let view = svc.remove_item(&owner, LineId::generate()).await.unwrap();
        assert_eq!(view.items.len(), 1);
    }

    #[tokio::test]
    async fn test_promo_requires_minimum_and_clear_drops_it() {
        let svc = service();
        let owner = guest();
        svc.add_item(&owner, &ProductId::new("bifold"), qty(1), Customization::none())
            .await
            .unwrap();

        let err = svc.apply_promo(&owner, "SAVE50").await.unwrap_err();
        assert!(matches!(err, CartError::Promo(PromoError::MinimumNotMet { .. })));

        let view = svc.apply_promo(&owner, "welcome10").await.unwrap();
        assert_eq!(view.promo_code.as_deref(), Some("WELCOME10"));
        assert_eq!(view.summary.discount, Money::from_dollars(10));

        let view = svc.clear(&owner).await.unwrap();
        assert!(view.items.is_empty());
        assert!(view.promo_code.is_none());
    }

    #[tokio::test]
    async fn test_installation_notes_and_clear() {
        let svc = service();
        let owner = guest();
        svc.add_item(&owner, &ProductId::new("pivot"), qty(1), Customization::none())
            .await
            .unwrap();

        let view = svc
            .set_installation_date(&owner, Some(date(2026, 11, 2)))
            .await
            .unwrap();
        assert_eq!(view.installation_date, Some(date(2026, 11, 2)));

        let view = svc
            .set_special_instructions(&owner, Some("  Park in the driveway  "))
            .await
            .unwrap();
        assert_eq!(
            view.special_instructions.as_deref(),
            Some("Park in the driveway")
        );

        let view = svc.set_special_instructions(&owner, Some(" ")).await.unwrap();
        assert!(view.special_instructions.is_none());

        svc.set_special_instructions(&owner, Some("Gate code 4412"))
            .await
            .unwrap();
        let view = svc.clear(&owner).await.unwrap();
        assert!(view.installation_date.is_none());
        assert!(view.special_instructions.is_none());
    }

    #[tokio::test]
    async fn test_installation_fee_in_summary() {
        let svc = service();
        let owner = guest();
        let view = svc
            .add_item(&owner, &ProductId::new("pivot"), qty(1), Customization::none())
            .await
            .unwrap();
        let line_id = view.items.first().unwrap().id;
        let view = svc.set_installation(&owner, line_id, true).await.unwrap();
        assert_eq!(view.summary.installation, Money::from_dollars(299));
        assert_eq!(view.summary.shipping, Money::ZERO);
    }

    #[tokio::test]
    async fn test_checkout_empty_cart() {
        let err = service()
            .checkout(&guest(), date(2026, 10, 14))
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::EmptyCart));
    }

    #[tokio::test]
    async fn test_checkout_sums_lines_against_stock() {
        let svc = service();
        let owner = guest();
        svc.add_item(&owner, &ProductId::new("bifold"), qty(1), Customization::none())
            .await
            .unwrap();
        svc.add_item(
            &owner,
            &ProductId::new("bifold"),
            qty(1),
            Customization::none().with("finish", "white"),
        )
        .await
        .unwrap();

        let err = svc.checkout(&owner, date(2026, 10, 14)).await.unwrap_err();
        match err {
            CartError::OutOfStock {
                requested,
                available,
                name,
                ..
            } => {
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
                assert_eq!(name, "bifold door");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_checkout_returns_delivery_window() {
        let svc = service();
        let owner = guest();
        svc.add_item(&owner, &ProductId::new("bypass"), qty(2), Customization::none())
            .await
            .unwrap();
        let checkout = svc.checkout(&owner, date(2026, 10, 14)).await.unwrap();
        assert_eq!(checkout.delivery.earliest, date(2026, 10, 21));
        assert_eq!(checkout.cart.totals.item_count, 2);
    }

    #[tokio::test]
    async fn test_user_and_guest_carts_are_separate() {
        let svc = service();
        let guest = guest();
        let user = CartOwner::User(pg_closets_core::UserId::new(42));
        svc.add_item(&guest, &ProductId::new("bypass"), qty(1), Customization::none())
            .await
            .unwrap();
        assert!(svc.view(&user).await.unwrap().items.is_empty());
    }
}
