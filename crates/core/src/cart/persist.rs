//! Cart persistence adapter.
//!
//! A cart survives reloads by being written to a [`Storage`] after every
//! mutation and read back on start-up. Loading never fails: missing,
//! unreadable, or corrupt data yields an empty cart and a warning.
//!
//! Only the promotion's code is stored. Its terms are looked up in the
//! [`PromoCatalog`] on load, so a stored code the store no longer honours is
//! dropped.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::{Cart, CartAction, CartLine, PromoCatalog};

/// Storage key used for the shopper's cart.
pub const CART_STORAGE_KEY: &str = "pg-closets-cart";

/// Current snapshot format.
const SNAPSHOT_VERSION: u32 = 1;

/// Errors raised by a storage medium.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from saving or loading a cart snapshot.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("invalid cart snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("unsupported cart snapshot version {0}")]
    Version(u32),
}

/// A string key-value medium (browser local storage, a file directory, ...).
pub trait Storage {
    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the medium cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the medium cannot be written.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete the value under `key`. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the medium cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<S: Storage + ?Sized> Storage for &S {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).write(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// In-process storage, mainly for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// Serialized form of a cart. Drawer visibility is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCart {
    pub version: u32,
    pub items: Vec<CartLine>,
    /// Code text of the applied promotion.
    #[serde(default)]
    pub promo_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

impl PersistedCart {
    /// Snapshot a cart.
    #[must_use]
    pub fn from_cart(cart: &Cart) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            items: cart.items().to_vec(),
            promo_code: cart.promo_code().map(|promo| promo.code.clone()),
            installation_date: cart.installation_date(),
            special_instructions: cart.special_instructions().map(str::to_owned),
        }
    }

    /// Rebuild a closed cart from the snapshot, taking promotion terms from
    /// `promos`.
    #[must_use]
    pub fn into_cart(self, promos: &PromoCatalog) -> Cart {
        let promo = self.promo_code.as_deref().and_then(|code| {
            let found = promos.lookup(code);
            if found.is_none() {
                debug!(code = %code, "Dropping stored promo code not in catalog");
            }
            found
        });
        Cart::from_lines(self.items)
            .with_promo(promo)
            .reduce(CartAction::SetInstallationDate(self.installation_date))
            .reduce(CartAction::SetSpecialInstructions(self.special_instructions))
    }

    /// Encode as JSON.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; unreachable for well-formed carts.
    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON, rejecting unknown versions.
    ///
    /// # Errors
    ///
    /// Returns `PersistError::Snapshot` for malformed JSON and
    /// `PersistError::Version` for snapshots written by a newer format.
    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        let snapshot: Self = serde_json::from_str(json)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PersistError::Version(snapshot.version));
        }
        Ok(snapshot)
    }
}

/// Loads and saves one cart under a fixed key.
#[derive(Debug)]
pub struct CartPersistence<S> {
    storage: S,
    key: String,
    promos: PromoCatalog,
}

impl<S: Storage> CartPersistence<S> {
    /// Persist under [`CART_STORAGE_KEY`].
    #[must_use]
    pub fn new(storage: S) -> Self {
        Self::with_key(storage, CART_STORAGE_KEY)
    }

    /// Persist under a custom key.
    #[must_use]
    pub fn with_key(storage: S, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            promos: PromoCatalog::builtin(),
        }
    }

    /// Resolve stored promotion codes against `promos` instead of the
    /// built-in catalog.
    #[must_use]
    pub fn with_promos(mut self, promos: PromoCatalog) -> Self {
        self.promos = promos;
        self
    }

    /// The storage key in use.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Borrow the underlying storage.
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Load the stored cart, or an empty one if nothing usable is stored.
    #[must_use]
    pub fn load(&self) -> Cart {
        match self.try_load() {
            Ok(Some(cart)) => {
                debug!(key = %self.key, lines = cart.items().len(), "Cart restored");
                cart
            }
            Ok(None) => Cart::new(),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Discarding unreadable cart");
                Cart::new()
            }
        }
    }

    /// Load the stored cart, surfacing errors.
    ///
    /// # Errors
    ///
    /// Returns `PersistError` if storage fails or the snapshot is invalid.
    pub fn try_load(&self) -> Result<Option<Cart>, PersistError> {
        let Some(raw) = self.storage.read(&self.key)? else {
            return Ok(None);
        };
        Ok(Some(PersistedCart::from_json(&raw)?.into_cart(&self.promos)))
    }

    /// Save the cart, logging instead of failing.
    ///
    /// Returns `true` if the cart was written.
    pub fn save(&self, cart: &Cart) -> bool {
        match self.try_save(cart) {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to persist cart");
                false
            }
        }
    }

    /// Save the cart, surfacing errors.
    ///
    /// # Errors
    ///
    /// Returns `PersistError` if the snapshot cannot be written.
    pub fn try_save(&self, cart: &Cart) -> Result<(), PersistError> {
        let json = PersistedCart::from_cart(cart).to_json()?;
        self.storage.write(&self.key, &json)?;
        Ok(())
    }

    /// Remove the stored cart, logging instead of failing.
    pub fn forget(&self) {
        if let Err(e) = self.storage.remove(&self.key) {
            warn!(key = %self.key, error = %e, "Failed to remove stored cart");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;
    use crate::cart::{DiscountKind, PromoCode};
    use crate::types::{Customization, Money, ProductId, Rounding};

    /// Storage that fails every operation.
    struct BrokenStorage;

    impl Storage for BrokenStorage {
        fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_owned()))
        }

        fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_owned()))
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_owned()))
        }
    }

    fn sample_cart() -> Cart {
        Cart::new()
            .reduce(CartAction::add(
                ProductId::new("continental-bypass"),
                Money::from_cents(54_900),
                NonZeroU32::new(2).unwrap(),
                Customization::none().with("size", "72x80").with("finish", "white"),
            ))
            .reduce(CartAction::add(
                ProductId::new("soft-close-kit"),
                Money::from_cents(4_900),
                NonZeroU32::MIN,
                Customization::none(),
            ))
            .reduce(CartAction::add(
                ProductId::new("bifold-36"),
                Money::from_cents(19_900),
                NonZeroU32::MIN,
                Customization::none(),
            ))
            .reduce(CartAction::ApplyPromo(
                PromoCatalog::builtin().lookup("WELCOME10").unwrap(),
            ))
            .reduce(CartAction::Open)
    }

    #[test]
    fn test_round_trip_preserves_items_and_order() {
        let persistence = CartPersistence::new(MemoryStorage::new());
        let cart = sample_cart();
        assert!(persistence.save(&cart));

        let loaded = persistence.load();
        assert_eq!(loaded.items(), cart.items());
        assert_eq!(loaded.promo_code(), cart.promo_code());
    }

    #[test]
    fn test_drawer_state_is_not_persisted() {
        let persistence = CartPersistence::new(MemoryStorage::new());
        let cart = sample_cart();
        assert!(cart.is_open());
        persistence.save(&cart);

        let raw = persistence.storage().read(CART_STORAGE_KEY).unwrap().unwrap();
        assert!(!raw.contains("isOpen"));
        assert!(!persistence.load().is_open());
    }

    #[test]
    fn test_missing_data_loads_empty() {
        let persistence = CartPersistence::new(MemoryStorage::new());
        let cart = persistence.load();
        assert!(cart.is_empty());
        assert!(!cart.is_open());
    }

    #[test]
    fn test_malformed_json_loads_empty() {
        let storage = MemoryStorage::new();
        storage.write(CART_STORAGE_KEY, "{not json").unwrap();
        let persistence = CartPersistence::new(storage);

        let cart = persistence.load();
        assert_eq!(cart, Cart::new());
        assert!(persistence.try_load().is_err());
    }

    #[test]
    fn test_wrong_shape_loads_empty() {
        let storage = MemoryStorage::new();
        storage
            .write(CART_STORAGE_KEY, r#"{"version":1,"items":[{"quantity":"three"}]}"#)
            .unwrap();
        assert!(CartPersistence::new(storage).load().is_empty());
    }

    #[test]
    fn test_future_version_loads_empty() {
        let storage = MemoryStorage::new();
        storage
            .write(CART_STORAGE_KEY, r#"{"version":99,"items":[]}"#)
            .unwrap();
        let persistence = CartPersistence::new(storage);
        assert!(matches!(
            persistence.try_load(),
            Err(PersistError::Version(99))
        ));
        assert!(persistence.load().is_empty());
    }

    #[test]
    fn test_broken_storage_never_panics() {
        let persistence = CartPersistence::new(BrokenStorage);
        assert!(persistence.load().is_empty());
        assert!(!persistence.save(&sample_cart()));
        persistence.forget();
    }

    #[test]
    fn test_stored_duplicates_are_merged_on_load() {
        let line = serde_json::json!({
            "id": "5b0e5f3c-3a51-4d2b-9a45-0c2f4a8c7d10",
            "productId": "bifold-36",
            "quantity": 1,
            "unitPrice": 19900
        });
        let mut second = line.clone();
        second["id"] = serde_json::json!("9f1c2d3e-4b5a-4c6d-8e7f-a0b1c2d3e4f5");
        second["quantity"] = serde_json::json!(2);
        let snapshot = serde_json::json!({ "version": 1, "items": [line, second] });

        let storage = MemoryStorage::new();
        storage
            .write(CART_STORAGE_KEY, &snapshot.to_string())
            .unwrap();
        let cart = CartPersistence::new(storage).load();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_promo_terms_come_from_catalog() {
        let snapshot = serde_json::json!({
            "version": 1,
            "items": [{
                "id": "5b0e5f3c-3a51-4d2b-9a45-0c2f4a8c7d10",
                "productId": "bifold-36",
                "quantity": 1,
                "unitPrice": 10000
            }],
            "promoCode": {
                "code": "WELCOME10",
                "discount": {"type": "percentage", "value": 250}
            }
        });
        let storage = MemoryStorage::new();
        storage
            .write(CART_STORAGE_KEY, &snapshot.to_string())
            .unwrap();
        assert!(CartPersistence::new(&storage).load().is_empty());

        let mut snapshot = snapshot;
        snapshot["promoCode"] = serde_json::json!("welcome10");
        storage
            .write(CART_STORAGE_KEY, &snapshot.to_string())
            .unwrap();
        let cart = CartPersistence::new(&storage).load();
        assert_eq!(cart.promo_code().unwrap().discount, DiscountKind::Percentage(10));
        let summary = cart.summary(&crate::cart::PricingPolicy::default());
        assert_eq!(summary.discount, Money::from_dollars(10));
        assert!(summary.total > Money::ZERO);
    }

    #[test]
    fn test_unknown_stored_promo_is_dropped() {
        let staff = PromoCode {
            code: "STAFF".to_owned(),
            discount: DiscountKind::Percentage(100),
            minimum_purchase: None,
        };
        let storage = MemoryStorage::new();
        let catalog = PromoCatalog::new(vec![staff.clone()]).unwrap();
        let persistence = CartPersistence::new(&storage).with_promos(catalog);
        let cart = sample_cart().reduce(CartAction::ApplyPromo(staff));
        persistence.save(&cart);

        let restored = persistence.load();
        assert_eq!(
            restored
                .promo_code()
                .unwrap()
                .discount_on(restored.subtotal(), Rounding::HalfUp),
            restored.subtotal()
        );
        assert!(CartPersistence::new(&storage).load().promo_code().is_none());
    }

    #[test]
    fn test_installation_notes_round_trip() {
        let date = NaiveDate::from_ymd_opt(2026, 11, 2).unwrap();
        let persistence = CartPersistence::new(MemoryStorage::new());
        let cart = sample_cart()
            .reduce(CartAction::SetInstallationDate(Some(date)))
            .reduce(CartAction::SetSpecialInstructions(Some(
                "Gate code 4412".to_owned(),
            )));
        assert!(persistence.save(&cart));

        let loaded = persistence.load();
        assert_eq!(loaded.installation_date(), Some(date));
        assert_eq!(loaded.special_instructions(), Some("Gate code 4412"));

        assert!(persistence.save(&loaded.reduce(CartAction::Clear)));
        let raw = persistence.storage().read(CART_STORAGE_KEY).unwrap().unwrap();
        assert!(!raw.contains("installationDate"));
        assert!(!raw.contains("specialInstructions"));
    }

    #[test]
    fn test_custom_key_isolated() {
        let storage = MemoryStorage::new();
        let a = CartPersistence::with_key(&storage, "tab-a");
        let b = CartPersistence::with_key(&storage, "tab-b");
        a.save(&sample_cart());
        assert!(!a.load().is_empty());
        assert!(b.load().is_empty());
    }
}
