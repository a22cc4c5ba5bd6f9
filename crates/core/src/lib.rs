//! PG Closets Core - Cart domain library.
//!
//! This crate provides the canonical shopping cart used by every PG Closets
//! component:
//! - `storefront` - JSON cart API backed by `PostgreSQL`
//! - `cli` - Local, file-backed cart and database maintenance
//!
//! # Architecture
//!
//! The core crate contains only types, pure state transitions, and storage
//! traits - no network access, no database queries. Persistence backends plug
//! in through [`cart::Storage`].
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, tax rates, and customizations
//! - [`cart`] - Cart state, mutation engine, totals, and persistence adapter

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::{
    Cart, CartAction, CartLine, CartPersistence, CartSession, DeliveryWindow, OrderSummary,
    PersistError, PricingPolicy, PromoCatalog, PromoCode, PromoError, Storage, StorageError,
    Totals,
};
pub use types::*;
