//! Checkout figures: promotion, shipping, installation, and tax on top of the
//! line subtotal.

use serde::{Deserialize, Serialize};

use super::Cart;
use crate::types::{Money, TaxPolicy};

/// Store pricing rules applied at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingPolicy {
    pub tax: TaxPolicy,
    /// Subtotal at or above which shipping is free.
    pub free_shipping_threshold: Money,
    /// Flat shipping charge below the threshold.
    pub standard_shipping: Money,
    /// Installation charge for the first line that requests it.
    pub installation_base: Money,
    /// Installation charge for each further line.
    pub installation_additional: Money,
}

impl PricingPolicy {
    /// Default store rules with a specific tax policy.
    #[must_use]
    pub const fn with_tax(tax: TaxPolicy) -> Self {
        Self {
            tax,
            free_shipping_threshold: Money::from_dollars(500),
            standard_shipping: Money::from_dollars(99),
            installation_base: Money::from_dollars(299),
            installation_additional: Money::from_dollars(50),
        }
    }

    /// Shipping owed for a subtotal.
    #[must_use]
    pub fn shipping_for(&self, subtotal: Money) -> Money {
        if subtotal == Money::ZERO || subtotal >= self.free_shipping_threshold {
            Money::ZERO
        } else {
            self.standard_shipping
        }
    }

    /// Installation fee for a number of lines requesting installation.
    #[must_use]
    pub fn installation_for(&self, lines: u32) -> Money {
        match lines {
            0 => Money::ZERO,
            n => self.installation_base + self.installation_additional.times(n - 1),
        }
    }
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self::with_tax(TaxPolicy::default())
    }
}

/// Everything a payment provider needs to charge for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub item_count: u64,
    pub subtotal: Money,
    pub discount: Money,
    pub shipping: Money,
    pub installation: Money,
    pub tax: Money,
    pub total: Money,
}

impl OrderSummary {
    /// Compute checkout figures for a cart.
    ///
    /// Tax applies to `subtotal + shipping + installation - discount`.
    #[must_use]
    pub fn compute(cart: &Cart, policy: &PricingPolicy) -> Self {
        let subtotal = cart.subtotal();
        let discount = cart
            .promo_code()
            .map_or(Money::ZERO, |promo| {
                promo.discount_on(subtotal, policy.tax.rounding)
            });
        let shipping = policy.shipping_for(subtotal);
        let installing = cart.items().iter().filter(|line| line.installation).count();
        let installation = policy.installation_for(u32::try_from(installing).unwrap_or(u32::MAX));

        let taxable = subtotal + shipping + installation - discount;
        let tax = policy.tax.tax_on(taxable);

        Self {
            item_count: cart.item_count(),
            subtotal,
            discount,
            shipping,
            installation,
            tax,
            total: taxable + tax,
        }
    }
}

impl Cart {
    /// Checkout figures for this cart.
    #[must_use]
    pub fn summary(&self, policy: &PricingPolicy) -> OrderSummary {
        OrderSummary::compute(self, policy)
    }
}
