//! The canonical shopping cart.
//!
//! A [`Cart`] is an ordered list of [`CartLine`]s plus drawer visibility, an
//! optional promotion and the shopper's installation notes. It changes only through [`Cart::apply`], which is total:
//! every [`CartAction`] is valid from every state and none of them can fail.
//! Input validation (positive quantities, stock, promo eligibility) is the
//! caller's job and happens before an action is built.
//!
//! Invariants upheld by every transition:
//! - no two lines share the same `(product_id, customization)` pair;
//! - no two lines share the same id;
//! - every stored line has `quantity >= 1`.

mod delivery;
mod persist;
mod promo;
mod session;
mod summary;
mod totals;

use std::collections::HashSet;
use std::num::NonZeroU32;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{Customization, LineId, Money, ProductId};

pub use delivery::DeliveryWindow;
pub use persist::{
    CART_STORAGE_KEY, CartPersistence, MemoryStorage, PersistError, PersistedCart, Storage,
    StorageError,
};
pub use promo::{DiscountKind, PromoCatalog, PromoCode, PromoError};
pub use session::CartSession;
pub use summary::{OrderSummary, PricingPolicy};
pub use totals::Totals;

/// One entry in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: LineId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Price per unit captured when the line was first added.
    pub unit_price: Money,
    #[serde(default)]
    pub customization: Customization,
    /// Professional installation requested for this line.
    #[serde(default)]
    pub installation: bool,
}

impl CartLine {
    /// `unit_price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }

    /// Whether this line is the same selection as `(product_id, customization)`.
    #[must_use]
    pub fn matches(&self, product_id: &ProductId, customization: &Customization) -> bool {
        self.product_id == *product_id && self.customization == *customization
    }
}

/// A state transition for [`Cart`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    /// Merge into the matching line or append a new line with `line_id`.
    Add {
        line_id: LineId,
        product_id: ProductId,
        unit_price: Money,
        quantity: NonZeroU32,
        customization: Customization,
    },
    /// Drop a line. Unknown ids are ignored.
    Remove { line_id: LineId },
    /// Replace a line's quantity; zero or negative removes the line.
    UpdateQuantity { line_id: LineId, quantity: i64 },
    /// Drop every line, the applied promotion and the installation notes.
    Clear,
    ToggleOpen,
    Open,
    Close,
    /// Request or cancel installation for a line. Unknown ids are ignored.
    SetInstallation { line_id: LineId, included: bool },
    /// Attach a promotion. Eligibility must be checked beforehand.
    ApplyPromo(PromoCode),
    RemovePromo,
    /// Preferred installation day, or `None` to unset it.
    SetInstallationDate(Option<NaiveDate>),
    /// Free-form notes for the installer. Blank text unsets them.
    SetSpecialInstructions(Option<String>),
}

impl CartAction {
    /// Build an `Add` action with a freshly generated line id.
    #[must_use]
    pub fn add(
        product_id: ProductId,
        unit_price: Money,
        quantity: NonZeroU32,
        customization: Customization,
    ) -> Self {
        Self::Add {
            line_id: LineId::generate(),
            product_id,
            unit_price,
            quantity,
            customization,
        }
    }
}

/// An in-progress collection of items a shopper intends to purchase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    items: Vec<CartLine>,
    /// Drawer visibility. Ephemeral, never persisted.
    #[serde(skip)]
    is_open: bool,
    #[serde(default)]
    promo_code: Option<PromoCode>,
    #[serde(default)]
    installation_date: Option<NaiveDate>,
    #[serde(default)]
    special_instructions: Option<String>,
}

impl Cart {
    /// An empty, closed cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a cart from stored lines, restoring the invariants.
    ///
    /// Lines with zero quantity are dropped, lines with a duplicate
    /// `(product_id, customization)` are merged into the first occurrence,
    /// and a line whose id is already taken gets a fresh one.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut items: Vec<CartLine> = Vec::new();
        let mut ids = HashSet::new();
        for mut line in lines {
            if line.quantity == 0 {
                continue;
            }
            match items
                .iter_mut()
                .find(|existing| existing.matches(&line.product_id, &line.customization))
            {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(line.quantity);
                    existing.installation |= line.installation;
                }
                None => {
                    if !ids.insert(line.id) {
                        line.id = LineId::generate();
                        ids.insert(line.id);
                    }
                    items.push(line);
                }
            }
        }
        Self {
            items,
            ..Self::default()
        }
    }

    /// Builder-style promotion setter, used when rehydrating.
    #[must_use]
    pub fn with_promo(mut self, promo: Option<PromoCode>) -> Self {
        self.promo_code = promo;
        self
    }

    /// Lines in display order.
    #[must_use]
    pub fn items(&self) -> &[CartLine] {
        &self.items
    }

    /// Consume the cart, returning its lines.
    #[must_use]
    pub fn into_items(self) -> Vec<CartLine> {
        self.items
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.is_open
    }

    #[must_use]
    pub const fn promo_code(&self) -> Option<&PromoCode> {
        self.promo_code.as_ref()
    }

    /// Day the shopper would like the installer to come.
    #[must_use]
    pub const fn installation_date(&self) -> Option<NaiveDate> {
        self.installation_date
    }

    #[must_use]
    pub fn special_instructions(&self) -> Option<&str> {
        self.special_instructions.as_deref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find a line by id.
    #[must_use]
    pub fn line(&self, line_id: LineId) -> Option<&CartLine> {
        self.items.iter().find(|line| line.id == line_id)
    }

    /// Find the line holding a given selection.
    #[must_use]
    pub fn find(&self, product_id: &ProductId, customization: &Customization) -> Option<&CartLine> {
        self.items
            .iter()
            .find(|line| line.matches(product_id, customization))
    }

    /// Apply a transition in place.
    pub fn apply(&mut self, action: CartAction) {
        match action {
            CartAction::Add {
                line_id,
                product_id,
                unit_price,
                quantity,
                customization,
            } => {
                if let Some(line) = self
                    .items
                    .iter_mut()
                    .find(|line| line.matches(&product_id, &customization))
                {
                    line.quantity = line.quantity.saturating_add(quantity.get());
                } else {
                    self.items.push(CartLine {
                        id: line_id,
                        product_id,
                        quantity: quantity.get(),
                        unit_price,
                        customization,
                        installation: false,
                    });
                }
            }
            CartAction::Remove { line_id } => self.remove_line(line_id),
            CartAction::UpdateQuantity { line_id, quantity } => {
                if quantity <= 0 {
                    self.remove_line(line_id);
                } else if let Some(line) = self.items.iter_mut().find(|line| line.id == line_id) {
                    line.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
                }
            }
            CartAction::Clear => {
                self.items.clear();
                self.promo_code = None;
                self.installation_date = None;
                self.special_instructions = None;
            }
            CartAction::ToggleOpen => self.is_open = !self.is_open,
            CartAction::Open => self.is_open = true,
            CartAction::Close => self.is_open = false,
            CartAction::SetInstallation { line_id, included } => {
                if let Some(line) = self.items.iter_mut().find(|line| line.id == line_id) {
                    line.installation = included;
                }
            }
            CartAction::ApplyPromo(promo) => self.promo_code = Some(promo),
            CartAction::RemovePromo => self.promo_code = None,
            CartAction::SetInstallationDate(date) => self.installation_date = date,
            CartAction::SetSpecialInstructions(text) => {
                self.special_instructions = text
                    .map(|text| text.trim().to_owned())
                    .filter(|text| !text.is_empty());
            }
        }
    }

    /// Apply a transition, returning the next state.
    #[must_use]
    pub fn reduce(mut self, action: CartAction) -> Self {
        self.apply(action);
        self
    }

    fn remove_line(&mut self, line_id: LineId) {
        self.items.retain(|line| line.id != line_id);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn qty(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    fn add(product: &str, price: i64, n: u32, customization: Customization) -> CartAction {
        CartAction::add(
            ProductId::new(product),
            Money::from_cents(price),
            qty(n),
            customization,
        )
    }

    #[test]
    fn test_add_same_selection_merges() {
        let cart = Cart::new()
            .reduce(add("product-a", 10_000, 1, Customization::none()))
            .reduce(add("product-a", 10_000, 2, Customization::none()));

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 3);
    }

    #[test]
    fn test_add_different_customization_creates_lines() {
        let m = Customization::none().with("size", "M");
        let l = Customization::none().with("size", "L");
        let cart = Cart::new()
            .reduce(add("product-a", 10_000, 1, m))
            .reduce(add("product-a", 10_000, 1, l));

        assert_eq!(cart.items().len(), 2);
        assert_ne!(cart.items()[0].id, cart.items()[1].id);
    }

    #[test]
    fn test_merge_keeps_original_line_id_and_price() {
        let first = add("product-a", 10_000, 1, Customization::none());
        let CartAction::Add { line_id, .. } = first.clone() else {
            unreachable!()
        };
        let cart = Cart::new()
            .reduce(first)
            .reduce(add("product-a", 12_000, 1, Customization::none()));

        assert_eq!(cart.items()[0].id, line_id);
        assert_eq!(cart.items()[0].unit_price, Money::from_cents(10_000));
    }

    #[test]
    fn test_insertion_order_is_display_order() {
        let cart = Cart::new()
            .reduce(add("c", 1, 1, Customization::none()))
            .reduce(add("a", 1, 1, Customization::none()))
            .reduce(add("b", 1, 1, Customization::none()))
            .reduce(add("a", 1, 4, Customization::none()));

        let order: Vec<&str> = cart.items().iter().map(|l| l.product_id.as_str()).collect();
        assert_eq!(order, ["c", "a", "b"]);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let cart = Cart::new().reduce(add("a", 1, 1, Customization::none()));
        let after = cart.clone().reduce(CartAction::Remove {
            line_id: LineId::generate(),
        });
        assert_eq!(after, cart);
    }

    #[test]
    fn test_update_quantity_zero_equals_remove() {
        let cart = Cart::new()
            .reduce(add("a", 1, 2, Customization::none()))
            .reduce(add("b", 1, 1, Customization::none()));
        let line_id = cart.items()[0].id;

        let removed = cart.clone().reduce(CartAction::Remove { line_id });
        let zeroed = cart.reduce(CartAction::UpdateQuantity {
            line_id,
            quantity: 0,
        });
        assert_eq!(removed, zeroed);
    }

    #[test]
    fn test_update_quantity_negative_removes() {
        let cart = Cart::new()
            .reduce(add("a", 1, 2, Customization::none()))
            .reduce(add("b", 1, 5, Customization::none()));
        let line_id = cart.items()[0].id;

        let cart = cart.reduce(CartAction::UpdateQuantity {
            line_id,
            quantity: -1,
        });
        assert_eq!(cart.items().len(), 1);
        assert!(cart.line(line_id).is_none());
    }

    #[test]
    fn test_update_quantity_replaces() {
        let cart = Cart::new().reduce(add("a", 1, 2, Customization::none()));
        let line_id = cart.items()[0].id;
        let cart = cart.reduce(CartAction::UpdateQuantity {
            line_id,
            quantity: 7,
        });
        assert_eq!(cart.line(line_id).unwrap().quantity, 7);
    }

    #[test]
    fn test_clear_keeps_drawer_state() {
        let cart = Cart::new()
            .reduce(CartAction::Open)
            .reduce(add("a", 1, 2, Customization::none()))
            .reduce(CartAction::ApplyPromo(
                PromoCatalog::builtin().lookup("welcome10").unwrap(),
            ))
            .reduce(CartAction::SetInstallationDate(NaiveDate::from_ymd_opt(
                2026, 11, 2,
            )))
            .reduce(CartAction::SetSpecialInstructions(Some(
                "Side door code 4412".to_owned(),
            )))
            .reduce(CartAction::Clear);

        assert!(cart.is_empty());
        assert!(cart.is_open());
        assert!(cart.promo_code().is_none());
        assert!(cart.installation_date().is_none());
        assert!(cart.special_instructions().is_none());
    }

    #[test]
    fn test_installation_notes() {
        let date = NaiveDate::from_ymd_opt(2026, 11, 2).unwrap();
        let cart = Cart::new()
            .reduce(CartAction::SetInstallationDate(Some(date)))
            .reduce(CartAction::SetSpecialInstructions(Some(
                "  Call on arrival ".to_owned(),
            )));
        assert_eq!(cart.installation_date(), Some(date));
        assert_eq!(cart.special_instructions(), Some("Call on arrival"));

        let cart = cart
            .reduce(CartAction::SetInstallationDate(None))
            .reduce(CartAction::SetSpecialInstructions(Some("   ".to_owned())));
        assert!(cart.installation_date().is_none());
        assert!(cart.special_instructions().is_none());
    }

    #[test]
    fn test_visibility_transitions_leave_items_alone() {
        let cart = Cart::new().reduce(add("a", 1, 2, Customization::none()));
        let items = cart.items().to_vec();

        let cart = cart.reduce(CartAction::ToggleOpen);
        assert!(cart.is_open());
        let cart = cart.reduce(CartAction::ToggleOpen);
        assert!(!cart.is_open());
        let cart = cart.reduce(CartAction::Open).reduce(CartAction::Open);
        assert!(cart.is_open());
        let cart = cart.reduce(CartAction::Close);
        assert!(!cart.is_open());
        assert_eq!(cart.items(), items.as_slice());
    }

    #[test]
    fn test_set_installation() {
        let cart = Cart::new().reduce(add("a", 1, 1, Customization::none()));
        let line_id = cart.items()[0].id;
        let cart = cart.reduce(CartAction::SetInstallation {
            line_id,
            included: true,
        });
        assert!(cart.line(line_id).unwrap().installation);
    }

    #[test]
    fn test_from_lines_restores_invariants() {
        let line = |product: &str, quantity: u32| CartLine {
            id: LineId::generate(),
            product_id: ProductId::new(product),
            quantity,
            unit_price: Money::from_cents(100),
            customization: Customization::none(),
            installation: false,
        };

        let cart = Cart::from_lines([line("a", 1), line("b", 0), line("a", 2), line("c", 1)]);
        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.items()[0].quantity, 3);
        assert_eq!(cart.items()[1].product_id.as_str(), "c");

        let shared = LineId::generate();
        let cart = Cart::from_lines([
            CartLine {
                id: shared,
                ..line("a", 1)
            },
            CartLine {
                id: shared,
                ..line("b", 2)
            },
        ]);
        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.items()[0].id, shared);
        assert_ne!(cart.items()[1].id, shared);

        let cart = cart.reduce(CartAction::Remove { line_id: shared });
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].product_id.as_str(), "b");
    }

    #[test]
    fn test_quantity_saturates() {
        let cart = Cart::new()
            .reduce(add("a", 1, u32::MAX, Customization::none()))
            .reduce(add("a", 1, 5, Customization::none()));
        assert_eq!(cart.items()[0].quantity, u32::MAX);

        let line_id = cart.items()[0].id;
        let cart = cart.reduce(CartAction::UpdateQuantity {
            line_id,
            quantity: i64::MAX,
        });
        assert_eq!(cart.items()[0].quantity, u32::MAX);
    }
}
