//! Derived cart figures.
//!
//! Nothing here is cached: every call walks the line list, which is small.

use serde::{Deserialize, Serialize};

use super::Cart;
use crate::types::{Money, TaxPolicy};

/// Figures derived from a cart's lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    /// Sum of line quantities.
    pub item_count: u64,
    /// Sum of `unit_price * quantity`.
    pub subtotal: Money,
    /// `round(subtotal * rate)`.
    pub tax: Money,
    /// `subtotal + tax`.
    pub total: Money,
}

impl Cart {
    /// Sum of all line quantities.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items().iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.items().iter().map(super::CartLine::line_total).sum()
    }

    /// Compute item count, subtotal, tax, and grand total.
    #[must_use]
    pub fn totals(&self, tax: &TaxPolicy) -> Totals {
        let subtotal = self.subtotal();
        let tax = tax.tax_on(subtotal);
        Totals {
            item_count: self.item_count(),
            subtotal,
            tax,
            total: subtotal + tax,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;
    use crate::cart::CartAction;
    use crate::types::{Customization, ProductId, Rounding, TaxRate};

    fn cart_with(lines: &[(&str, i64, u32)]) -> Cart {
        lines.iter().fold(Cart::new(), |cart, (product, price, qty)| {
            cart.reduce(CartAction::add(
                ProductId::new(*product),
                Money::from_cents(*price),
                NonZeroU32::new(*qty).unwrap(),
                Customization::none(),
            ))
        })
    }

    #[test]
    fn test_example_cart_totals() {
        let cart = cart_with(&[("door", 10_000, 2), ("track", 5_000, 1)]);
        let totals = cart.totals(&TaxPolicy::default());

        assert_eq!(totals.item_count, 3);
        assert_eq!(totals.subtotal, Money::from_cents(25_000));
        assert_eq!(totals.tax, Money::from_cents(3_250));
        assert_eq!(totals.total, Money::from_cents(28_250));
    }

    #[test]
    fn test_empty_cart_totals_are_zero() {
        let totals = Cart::new().totals(&TaxPolicy::default());
        assert_eq!(totals.item_count, 0);
        assert_eq!(totals.subtotal, Money::ZERO);
        assert_eq!(totals.tax, Money::ZERO);
        assert_eq!(totals.total, Money::ZERO);
    }

    #[test]
    fn test_totals_identities_hold() {
        let policies = [
            TaxPolicy::default(),
            TaxPolicy::new(TaxRate::ONTARIO_HST, Rounding::HalfEven),
            TaxPolicy::new("0.05".parse().unwrap(), Rounding::HalfUp),
        ];
        let carts = [
            cart_with(&[("a", 1, 1)]),
            cart_with(&[("a", 50, 1), ("b", 3, 7)]),
            cart_with(&[("a", 99_999, 3), ("b", 1, 1), ("c", 12_345, 2)]),
        ];

        for policy in &policies {
            for cart in &carts {
                let totals = cart.totals(policy);
                let qty: u64 = cart.items().iter().map(|l| u64::from(l.quantity)).sum();
                assert_eq!(totals.item_count, qty);
                assert_eq!(totals.total, totals.subtotal + totals.tax);
                assert_eq!(totals.tax, policy.tax_on(totals.subtotal));
            }
        }
    }

    #[test]
    fn test_totals_track_mutations() {
        let cart = cart_with(&[("a", 1_000, 1)]);
        assert_eq!(cart.totals(&TaxPolicy::default()).subtotal, Money::from_cents(1_000));

        let line_id = cart.items().first().unwrap().id;
        let cart = cart.reduce(CartAction::UpdateQuantity {
            line_id,
            quantity: 4,
        });
        let totals = cart.totals(&TaxPolicy::default());
        assert_eq!(totals.item_count, 4);
        assert_eq!(totals.subtotal, Money::from_cents(4_000));
        assert_eq!(totals.tax, Money::from_cents(520));
    }
}
