//! Core types for PG Closets.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod customization;
pub mod id;
pub mod money;

pub use customization::Customization;
pub use id::*;
pub use money::{CurrencyCode, Money, Rounding, TaxPolicy, TaxRate, TaxRateError};
