//! Promotion codes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Money, Rounding};

/// Why a promotion cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromoError {
    #[error("unknown promo code: {0}")]
    Unknown(String),

    #[error("promo code {code} requires a minimum purchase of {minimum}")]
    MinimumNotMet { code: String, minimum: Money },

    #[error("promo code {code} grants {percent}% off, above 100%")]
    InvalidPercentage { code: String, percent: u8 },
}

/// How a promotion reduces the subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum DiscountKind {
    /// Whole-number percentage off the subtotal, at most 100.
    Percentage(u8),
    /// Fixed amount off, never more than the subtotal.
    Fixed(Money),
}

/// A promotion attached to a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoCode {
    pub code: String,
    pub discount: DiscountKind,
    #[serde(default)]
    pub minimum_purchase: Option<Money>,
}

impl PromoCode {
    /// Check that a subtotal qualifies for this promotion.
    ///
    /// # Errors
    ///
    /// Returns `PromoError::MinimumNotMet` when the subtotal is below the
    /// promotion's minimum purchase.
    pub fn check(&self, subtotal: Money) -> Result<(), PromoError> {
        match self.minimum_purchase {
            Some(minimum) if subtotal < minimum => Err(PromoError::MinimumNotMet {
                code: self.code.clone(),
                minimum,
            }),
            _ => Ok(()),
        }
    }

    /// Reject discount terms that could exceed the subtotal.
    ///
    /// # Errors
    ///
    /// Returns `PromoError::InvalidPercentage` for percentages above 100.
    pub fn validate(&self) -> Result<(), PromoError> {
        match self.discount {
            DiscountKind::Percentage(percent) if percent > 100 => {
                Err(PromoError::InvalidPercentage {
                    code: self.code.clone(),
                    percent,
                })
            }
            _ => Ok(()),
        }
    }

    /// Discount granted on `subtotal`, never more than the subtotal itself.
    /// Zero when the minimum is not met.
    #[must_use]
    pub fn discount_on(&self, subtotal: Money, rounding: Rounding) -> Money {
        if self.check(subtotal).is_err() {
            return Money::ZERO;
        }
        let discount = match self.discount {
            DiscountKind::Percentage(pct) => {
                subtotal.scale(Decimal::new(i64::from(pct.min(100)), 2), rounding)
            }
            DiscountKind::Fixed(amount) => amount,
        };
        discount.min(subtotal).max(Money::ZERO)
    }
}

/// The set of promotions the store accepts.
#[derive(Debug, Clone)]
pub struct PromoCatalog {
    codes: Vec<PromoCode>,
}

impl PromoCatalog {
    /// Create a catalog from explicit codes.
    ///
    /// # Errors
    ///
    /// Returns `PromoError::InvalidPercentage` if any code grants more than
    /// 100% off.
    pub fn new(codes: Vec<PromoCode>) -> Result<Self, PromoError> {
        for promo in &codes {
            promo.validate()?;
        }
        Ok(Self { codes })
    }

    /// The store's standing promotions.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            codes: vec![
                PromoCode {
                    code: "WELCOME10".to_owned(),
                    discount: DiscountKind::Percentage(10),
                    minimum_purchase: Some(Money::from_dollars(100)),
                },
                PromoCode {
                    code: "SAVE50".to_owned(),
                    discount: DiscountKind::Fixed(Money::from_dollars(50)),
                    minimum_purchase: Some(Money::from_dollars(500)),
                },
                PromoCode {
                    code: "INSTALL20".to_owned(),
                    discount: DiscountKind::Percentage(20),
                    minimum_purchase: Some(Money::from_dollars(1_000)),
                },
            ],
        }
    }

    /// Find a code, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn lookup(&self, code: &str) -> Option<PromoCode> {
        let wanted = code.trim();
        self.codes
            .iter()
            .find(|promo| promo.code.eq_ignore_ascii_case(wanted))
            .cloned()
    }

    /// Look up a code and check it against a subtotal.
    ///
    /// # Errors
    ///
    /// Returns `PromoError::Unknown` for codes not in the catalog and
    /// `PromoError::MinimumNotMet` when the subtotal is too small.
    pub fn resolve(&self, code: &str, subtotal: Money) -> Result<PromoCode, PromoError> {
        let promo = self
            .lookup(code)
            .ok_or_else(|| PromoError::Unknown(code.trim().to_owned()))?;
        promo.check(subtotal)?;
        Ok(promo)
    }
}

impl Default for PromoCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
