//! Business logic services for storefront.
//!
//! # Services
//!
//! - `cart` - Server-side cart operations over Postgres or the in-memory store

pub mod cart;

pub use cart::{CartError, CartService, CartStore, CartView, CheckoutView, MemoryCartStore};
