//! In-process cart store.
//!
//! Runs the same reducer as the client-side cart, so merge and removal
//! semantics match the Postgres store. Used by tests and by
//! `STOREFRONT_CART_BACKEND=memory`.

use std::collections::HashMap;
use std::num::NonZeroU32;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::Mutex;

use pg_closets_core::{Cart, CartAction, CartId, CartLine, LineId, ProductId};

use super::store::StoredCartState;
use crate::models::{CartOwner, Product};

#[derive(Debug)]
struct MemoryCart {
    owner: CartOwner,
    cart: Cart,
    promo_code: Option<String>,
    expires_at: DateTime<Utc>,
}

impl MemoryCart {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    fn state(&self, id: CartId) -> StoredCartState {
        StoredCartState {
            id,
            lines: self.cart.items().to_vec(),
            promo_code: self.promo_code.clone(),
            installation_date: self.cart.installation_date(),
            special_instructions: self.cart.special_instructions().map(str::to_owned),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    products: HashMap<ProductId, Product>,
    carts: HashMap<CartId, MemoryCart>,
    owners: HashMap<CartOwner, CartId>,
    last_id: i32,
}

impl Inner {
    fn cart_mut(&mut self, cart_id: CartId) -> Option<&mut Cart> {
        self.carts.get_mut(&cart_id).map(|entry| &mut entry.cart)
    }

    fn remove_cart(&mut self, cart_id: CartId) {
        if let Some(entry) = self.carts.remove(&cart_id) {
            self.owners.remove(&entry.owner);
        }
    }
}

/// Carts and catalog held in process memory.
#[derive(Debug, Default)]
pub struct MemoryCartStore {
    inner: Mutex<Inner>,
}

impl MemoryCartStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-loaded with a catalog.
    #[must_use]
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let products = products
            .into_iter()
            .map(|product| (product.id.clone(), product))
            .collect();
        Self {
            inner: Mutex::new(Inner {
                products,
                ..Inner::default()
            }),
        }
    }

    /// Insert or replace a catalog entry.
    pub async fn upsert_product(&self, product: Product) {
        self.inner
            .lock()
            .await
            .products
            .insert(product.id.clone(), product);
    }

    pub(super) async fn product(&self, id: &ProductId) -> Option<Product> {
        self.inner.lock().await.products.get(id).cloned()
    }

    pub(super) async fn products(&self, ids: &[ProductId]) -> Vec<Product> {
        let inner = self.inner.lock().await;
        ids.iter()
            .filter_map(|id| inner.products.get(id).cloned())
            .collect()
    }

    pub(super) async fn find(&self, owner: &CartOwner) -> Option<StoredCartState> {
        let inner = self.inner.lock().await;
        let id = *inner.owners.get(owner)?;
        inner
            .carts
            .get(&id)
            .filter(|entry| entry.is_live(Utc::now()))
            .map(|entry| entry.state(id))
    }

    pub(super) async fn find_or_create(&self, owner: &CartOwner, ttl: Duration) -> CartId {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;

        if let Some(id) = inner.owners.get(owner).copied() {
            if let Some(entry) = inner.carts.get_mut(&id).filter(|entry| entry.is_live(now)) {
                entry.expires_at = now + ttl;
                return id;
            }
            inner.remove_cart(id);
        }

        inner.last_id = inner.last_id.saturating_add(1);
        let id = CartId::new(inner.last_id);
        inner.carts.insert(
            id,
            MemoryCart {
                owner: *owner,
                cart: Cart::new(),
                promo_code: None,
                expires_at: now + ttl,
            },
        );
        inner.owners.insert(*owner, id);
        id
    }

    pub(super) async fn add_line(&self, cart_id: CartId, line: CartLine) -> Option<LineId> {
        let mut inner = self.inner.lock().await;
        let cart = inner.cart_mut(cart_id)?;
        let (product_id, customization) = (line.product_id.clone(), line.customization.clone());
        let Some(quantity) = NonZeroU32::new(line.quantity) else {
            return cart.find(&product_id, &customization).map(|l| l.id);
        };
        cart.apply(CartAction::Add {
            line_id: line.id,
            product_id: line.product_id,
            unit_price: line.unit_price,
            quantity,
            customization: line.customization,
        });
        cart.find(&product_id, &customization).map(|l| l.id)
    }

    pub(super) async fn set_quantity(
        &self,
        cart_id: CartId,
        line_id: LineId,
        quantity: i64,
    ) -> bool {
        self.mutate_line(
            cart_id,
            line_id,
            CartAction::UpdateQuantity { line_id, quantity },
        )
        .await
    }

    pub(super) async fn remove_line(&self, cart_id: CartId, line_id: LineId) -> bool {
        self.mutate_line(cart_id, line_id, CartAction::Remove { line_id })
            .await
    }

    pub(super) async fn set_installation(
        &self,
        cart_id: CartId,
        line_id: LineId,
        included: bool,
    ) -> bool {
        self.mutate_line(
            cart_id,
            line_id,
            CartAction::SetInstallation { line_id, included },
        )
        .await
    }

    pub(super) async fn clear(&self, cart_id: CartId) {
        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.carts.get_mut(&cart_id) {
            entry.cart.apply(CartAction::Clear);
            entry.promo_code = None;
        }
    }

    pub(super) async fn set_promo_code(&self, cart_id: CartId, code: Option<&str>) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.carts.get_mut(&cart_id) {
            Some(entry) => {
                entry.promo_code = code.map(str::to_owned);
                true
            }
            None => false,
        }
    }

    pub(super) async fn set_installation_date(
        &self,
        cart_id: CartId,
        date: Option<NaiveDate>,
    ) -> bool {
        self.mutate_cart(cart_id, CartAction::SetInstallationDate(date))
            .await
    }

    pub(super) async fn set_special_instructions(
        &self,
        cart_id: CartId,
        instructions: Option<&str>,
    ) -> bool {
        self.mutate_cart(
            cart_id,
            CartAction::SetSpecialInstructions(instructions.map(str::to_owned)),
        )
        .await
    }

    pub(super) async fn purge_expired(&self) -> u64 {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        let expired: Vec<CartId> = inner
            .carts
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            inner.remove_cart(*id);
        }
        u64::try_from(expired.len()).unwrap_or(u64::MAX)
    }

    async fn mutate_cart(&self, cart_id: CartId, action: CartAction) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(cart) = inner.cart_mut(cart_id) else {
            return false;
        };
        cart.apply(action);
        true
    }

    async fn mutate_line(&self, cart_id: CartId, line_id: LineId, action: CartAction) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(cart) = inner.cart_mut(cart_id) else {
            return false;
        };
        if cart.line(line_id).is_none() {
            return false;
        }
        cart.apply(action);
        true
    }
}
