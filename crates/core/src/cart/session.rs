//! A persisted cart: state plus its storage, saved after every mutation.

use std::num::NonZeroU32;

use chrono::NaiveDate;

use super::{
    Cart, CartAction, CartPersistence, OrderSummary, PersistError, PricingPolicy, PromoCatalog,
    PromoError, Storage, Totals,
};
use crate::types::{Customization, LineId, Money, ProductId};

/// The client-side cart: rehydrated on open, written after every change.
#[derive(Debug)]
pub struct CartSession<S> {
    cart: Cart,
    persistence: CartPersistence<S>,
    pricing: PricingPolicy,
    /// The last write failed and storage is behind `cart`.
    unsaved: bool,
}

impl<S: Storage> CartSession<S> {
    /// Restore the stored cart (or start empty).
    #[must_use]
    pub fn open(persistence: CartPersistence<S>, pricing: PricingPolicy) -> Self {
        let cart = persistence.load();
        Self {
            cart,
            persistence,
            pricing,
            unsaved: false,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    /// Pricing rules used for totals.
    #[must_use]
    pub const fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    /// Whether storage holds the current cart.
    #[must_use]
    pub const fn is_saved(&self) -> bool {
        !self.unsaved
    }

    /// Apply an action and persist the result.
    ///
    /// A failed write is logged and leaves the session unsaved; see
    /// [`Self::is_saved`] and [`Self::try_save`].
    pub fn dispatch(&mut self, action: CartAction) {
        let persist = !matches!(
            action,
            CartAction::ToggleOpen | CartAction::Open | CartAction::Close
        );
        self.cart.apply(action);
        if persist {
            self.unsaved = !self.persistence.save(&self.cart);
        }
    }

    /// Write the current cart, surfacing errors.
    ///
    /// # Errors
    ///
    /// Returns `PersistError` if the snapshot cannot be written.
    pub fn try_save(&mut self) -> Result<(), PersistError> {
        self.persistence.try_save(&self.cart)?;
        self.unsaved = false;
        Ok(())
    }

    /// Add `quantity` of a product, merging with an identical selection.
    ///
    /// Returns the id of the line now holding the selection.
    pub fn add(
        &mut self,
        product_id: ProductId,
        unit_price: Money,
        quantity: NonZeroU32,
        customization: Customization,
    ) -> LineId {
        let line_id = LineId::generate();
        self.dispatch(CartAction::Add {
            line_id,
            product_id: product_id.clone(),
            unit_price,
            quantity,
            customization: customization.clone(),
        });
        self.cart
            .find(&product_id, &customization)
            .map_or(line_id, |line| line.id)
    }

    pub fn remove(&mut self, line_id: LineId) {
        self.dispatch(CartAction::Remove { line_id });
    }

    pub fn update_quantity(&mut self, line_id: LineId, quantity: i64) {
        self.dispatch(CartAction::UpdateQuantity { line_id, quantity });
    }

    pub fn clear(&mut self) {
        self.dispatch(CartAction::Clear);
    }

    pub fn set_installation(&mut self, line_id: LineId, included: bool) {
        self.dispatch(CartAction::SetInstallation { line_id, included });
    }

    /// Apply a promotion if the current subtotal qualifies.
    ///
    /// # Errors
    ///
    /// Returns `PromoError` for unknown codes or an insufficient subtotal; the
    /// cart is left unchanged.
    pub fn apply_promo(&mut self, catalog: &PromoCatalog, code: &str) -> Result<(), PromoError> {
        let promo = catalog.resolve(code, self.cart.subtotal())?;
        self.dispatch(CartAction::ApplyPromo(promo));
        Ok(())
    }

    pub fn remove_promo(&mut self) {
        self.dispatch(CartAction::RemovePromo);
    }

    pub fn set_installation_date(&mut self, date: Option<NaiveDate>) {
        self.dispatch(CartAction::SetInstallationDate(date));
    }

    pub fn set_special_instructions(&mut self, instructions: Option<String>) {
        self.dispatch(CartAction::SetSpecialInstructions(instructions));
    }

    pub fn toggle_open(&mut self) {
        self.dispatch(CartAction::ToggleOpen);
    }

    pub fn open_drawer(&mut self) {
        self.dispatch(CartAction::Open);
    }

    pub fn close_drawer(&mut self) {
        self.dispatch(CartAction::Close);
    }

    /// Item count, subtotal, tax, and total.
    #[must_use]
    pub fn totals(&self) -> Totals {
        self.cart.totals(&self.pricing.tax)
    }

    /// Checkout figures including promotion, shipping, and installation.
    #[must_use]
    pub fn summary(&self) -> OrderSummary {
        self.cart.summary(&self.pricing)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cart::{MemoryStorage, StorageError};

    /// Storage that rejects writes until unlocked.
    #[derive(Default)]
    struct ReadOnlyStorage {
        inner: MemoryStorage,
        writable: std::cell::Cell<bool>,
    }

    impl Storage for ReadOnlyStorage {
        fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.read(key)
        }

        fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.writable.get() {
                self.inner.write(key, value)
            } else {
                Err(StorageError::Unavailable("read-only".to_owned()))
            }
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }
    }

    fn session(storage: &MemoryStorage) -> CartSession<&MemoryStorage> {
        CartSession::open(CartPersistence::new(storage), PricingPolicy::default())
    }

    #[test]
    fn test_mutations_survive_reopen() {
        let storage = MemoryStorage::new();
        let mut first = session(&storage);
        let line = first.add(
            ProductId::new("door"),
            Money::from_cents(10_000),
            NonZeroU32::new(2).unwrap(),
            Customization::none(),
        );
        first.add(
            ProductId::new("door"),
            Money::from_cents(10_000),
            NonZeroU32::MIN,
            Customization::none(),
        );
        first.set_installation(line, true);

        let second = session(&storage);
        assert_eq!(second.cart().items().len(), 1);
        assert_eq!(second.totals().item_count, 3);
        assert!(second.cart().line(line).unwrap().installation);
    }

    #[test]
    fn test_add_returns_merged_line_id() {
        let storage = MemoryStorage::new();
        let mut s = session(&storage);
        let first = s.add(
            ProductId::new("door"),
            Money::from_cents(1),
            NonZeroU32::MIN,
            Customization::none(),
        );
        let second = s.add(
            ProductId::new("door"),
            Money::from_cents(1),
            NonZeroU32::MIN,
            Customization::none(),
        );
        assert_eq!(first, second);
    }

    #[test]
    fn test_promo_rejected_leaves_cart_unchanged() {
        let storage = MemoryStorage::new();
        let mut s = session(&storage);
        s.add(
            ProductId::new("door"),
            Money::from_dollars(50),
            NonZeroU32::MIN,
            Customization::none(),
        );
        let before = s.cart().clone();

        let err = s.apply_promo(&PromoCatalog::builtin(), "WELCOME10").unwrap_err();
        assert!(matches!(err, PromoError::MinimumNotMet { .. }));
        assert_eq!(s.cart(), &before);
    }

    #[test]
    fn test_promo_persists() {
        let storage = MemoryStorage::new();
        let mut s = session(&storage);
        s.add(
            ProductId::new("door"),
            Money::from_dollars(150),
            NonZeroU32::MIN,
            Customization::none(),
        );
        s.apply_promo(&PromoCatalog::builtin(), "welcome10").unwrap();
        assert_eq!(s.summary().discount, Money::from_dollars(15));

        let reopened = session(&storage);
        assert_eq!(reopened.cart().promo_code().unwrap().code, "WELCOME10");
    }

    #[test]
    fn test_clear_persists_empty_cart() {
        let storage = MemoryStorage::new();
        let mut s = session(&storage);
        s.add(
            ProductId::new("door"),
            Money::from_dollars(150),
            NonZeroU32::MIN,
            Customization::none(),
        );
        s.clear();
        assert!(session(&storage).cart().is_empty());
    }

    #[test]
    fn test_installation_notes_persist() {
        let storage = MemoryStorage::new();
        let mut s = session(&storage);
        let date = NaiveDate::from_ymd_opt(2026, 11, 2).unwrap();
        s.set_installation_date(Some(date));
        s.set_special_instructions(Some("Basement entrance".to_owned()));

        let reopened = session(&storage);
        assert_eq!(reopened.cart().installation_date(), Some(date));
        assert_eq!(
            reopened.cart().special_instructions(),
            Some("Basement entrance")
        );
    }

    #[test]
    fn test_failed_write_leaves_session_unsaved() {
        let storage = ReadOnlyStorage::default();
        let mut s = CartSession::open(CartPersistence::new(&storage), PricingPolicy::default());
        assert!(s.is_saved());

        s.add(
            ProductId::new("door"),
            Money::from_dollars(150),
            NonZeroU32::MIN,
            Customization::none(),
        );
        assert!(!s.is_saved());
        assert!(matches!(s.try_save(), Err(PersistError::Storage(_))));

        storage.writable.set(true);
        s.try_save().unwrap();
        assert!(s.is_saved());
        assert_eq!(session(&storage.inner).cart().items().len(), 1);
    }

    #[test]
    fn test_drawer_toggle_is_ephemeral() {
        let storage = MemoryStorage::new();
        let mut s = session(&storage);
        s.toggle_open();
        assert!(s.cart().is_open());
        s.close_drawer();
        s.open_drawer();
        assert!(s.cart().is_open());
        assert!(!session(&storage).cart().is_open());
    }
}
