//! Local cart: the anonymous, client-side variant of the cart.
//!
//! State lives in a JSON snapshot under the data directory and is rewritten
//! after every change; a command whose write fails exits with an error.
//! Prices are supplied on the command line since there is no catalog to
//! consult offline.

use std::fmt::Write as _;
use std::num::NonZeroU32;
use std::path::PathBuf;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;

use pg_closets_cli::FileStorage;
use pg_closets_core::{
    CartPersistence, CartSession, CurrencyCode, Customization, LineId, Money, PersistError,
    PricingPolicy, ProductId, PromoCatalog, PromoError,
};
use pg_closets_storefront::services::cart::MAX_LINE_QUANTITY;

/// Errors from local cart commands.
#[derive(Debug, Error)]
pub enum LocalCartError {
    #[error("No data directory available; pass --data-dir")]
    NoDataDir,

    #[error("Invalid price '{0}': expected dollars with at most two decimals")]
    InvalidPrice(String),

    #[error("Quantity must be between 1 and {MAX_LINE_QUANTITY}, got {0}")]
    InvalidQuantity(u32),

    #[error("Invalid option '{0}': expected key=value")]
    InvalidOption(String),

    #[error("Invalid line id '{0}'")]
    InvalidLineId(String),

    #[error("No line {0} in the cart")]
    UnknownLine(LineId),

    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error(transparent)]
    Promo(#[from] PromoError),

    #[error("Failed to save cart: {0}")]
    Persist(#[from] PersistError),
}

/// A cart session bound to a file in the data directory.
pub struct LocalCart {
    session: CartSession<FileStorage>,
    promos: PromoCatalog,
}

impl LocalCart {
    /// Open (or start) the cart stored under `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns `LocalCartError::NoDataDir` if no directory was given and the
    /// platform has no data directory.
    pub fn open(data_dir: Option<PathBuf>) -> Result<Self, LocalCartError> {
        let dir = data_dir
            .or_else(FileStorage::default_dir)
            .ok_or(LocalCartError::NoDataDir)?;
        tracing::debug!(dir = %dir.display(), "Opening local cart");

        let persistence = CartPersistence::new(FileStorage::new(dir));
        Ok(Self {
            session: CartSession::open(persistence, PricingPolicy::default()),
            promos: PromoCatalog::builtin(),
        })
    }

    /// Add a product at the given unit price.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed price, option, or out-of-range quantity.
    pub fn add(
        &mut self,
        product_id: &str,
        price: &str,
        quantity: u32,
        options: &[String],
    ) -> Result<(), LocalCartError> {
        let unit_price = parse_price(price)?;
        let quantity = NonZeroU32::new(quantity)
            .filter(|q| q.get() <= MAX_LINE_QUANTITY)
            .ok_or(LocalCartError::InvalidQuantity(quantity))?;
        let customization = parse_options(options)?;

        let line_id =
            self.session
                .add(ProductId::new(product_id), unit_price, quantity, customization);
        tracing::info!(%line_id, product_id, quantity = quantity.get(), "Added to cart");
        self.saved()
    }

    /// Set a line's quantity; zero or less removes the line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line id is malformed or not in the cart.
    pub fn update(&mut self, line_id: &str, quantity: i64) -> Result<(), LocalCartError> {
        let line_id = self.existing_line(line_id)?;
        if quantity > i64::from(MAX_LINE_QUANTITY) {
            return Err(LocalCartError::InvalidQuantity(
                u32::try_from(quantity).unwrap_or(u32::MAX),
            ));
        }
        self.session.update_quantity(line_id, quantity);
        self.saved()
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line id is malformed or not in the cart.
    pub fn remove(&mut self, line_id: &str) -> Result<(), LocalCartError> {
        let line_id = self.existing_line(line_id)?;
        self.session.remove(line_id);
        self.saved()
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `LocalCartError::Persist` if the cart cannot be written.
    pub fn clear(&mut self) -> Result<(), LocalCartError> {
        self.session.clear();
        self.saved()
    }

    /// Request or cancel installation for a line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line id is malformed or not in the cart.
    pub fn install(&mut self, line_id: &str, included: bool) -> Result<(), LocalCartError> {
        let line_id = self.existing_line(line_id)?;
        self.session.set_installation(line_id, included);
        self.saved()
    }

    /// Apply a promotion code from the built-in catalog.
    ///
    /// # Errors
    ///
    /// Returns `LocalCartError::Promo` for unknown codes or when the subtotal
    /// is below the code's minimum.
    pub fn apply_promo(&mut self, code: &str) -> Result<(), LocalCartError> {
        self.session.apply_promo(&self.promos, code)?;
        self.saved()
    }

    /// Drop the applied promotion.
    ///
    /// # Errors
    ///
    /// Returns `LocalCartError::Persist` if the cart cannot be written.
    pub fn remove_promo(&mut self) -> Result<(), LocalCartError> {
        self.session.remove_promo();
        self.saved()
    }

    /// Set (`YYYY-MM-DD`) or unset the preferred installation day.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed date or a failed write.
    pub fn schedule(&mut self, date: Option<&str>) -> Result<(), LocalCartError> {
        let date = date
            .map(|raw| {
                raw.trim()
                    .parse::<NaiveDate>()
                    .map_err(|_| LocalCartError::InvalidDate(raw.to_string()))
            })
            .transpose()?;
        self.session.set_installation_date(date);
        self.saved()
    }

    /// Set or unset notes for the installer.
    ///
    /// # Errors
    ///
    /// Returns `LocalCartError::Persist` if the cart cannot be written.
    pub fn notes(&mut self, text: Option<String>) -> Result<(), LocalCartError> {
        self.session.set_special_instructions(text);
        self.saved()
    }

    /// Print the cart to stdout.
    #[allow(clippy::print_stdout)]
    pub fn print(&self) {
        print!("{}", self.render());
    }

    /// Surface a write the session could not complete.
    fn saved(&mut self) -> Result<(), LocalCartError> {
        if !self.session.is_saved() {
            self.session.try_save()?;
        }
        Ok(())
    }

    fn existing_line(&self, raw: &str) -> Result<LineId, LocalCartError> {
        let line_id: LineId = raw
            .parse()
            .map_err(|_| LocalCartError::InvalidLineId(raw.to_string()))?;
        if self.session.cart().line(line_id).is_none() {
            return Err(LocalCartError::UnknownLine(line_id));
        }
        Ok(line_id)
    }

    fn render(&self) -> String {
        let cart = self.session.cart();
        let money = |m: Money| m.display(CurrencyCode::default());
        let mut out = String::new();

        if cart.is_empty() {
            out.push_str("Your cart is empty.\n");
            return out;
        }

        for line in cart.items() {
            let _ = write!(
                out,
                "{}  {} x{} @ {} = {}",
                line.id,
                line.product_id,
                line.quantity,
                money(line.unit_price),
                money(line.line_total()),
            );
            let options: Vec<String> = line
                .customization
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            if !options.is_empty() {
                let _ = write!(out, " [{}]", options.join(", "));
            }
            if line.installation {
                out.push_str(" +installation");
            }
            out.push('\n');
        }

        let summary = self.session.summary();
        let _ = writeln!(out, "\nItems:        {}", summary.item_count);
        let _ = writeln!(out, "Subtotal:     {}", money(summary.subtotal));
        if let Some(promo) = cart.promo_code() {
            let _ = writeln!(out, "Promo {}: -{}", promo.code, money(summary.discount));
        }
        let _ = writeln!(out, "Shipping:     {}", money(summary.shipping));
        if summary.installation > Money::ZERO {
            let _ = writeln!(out, "Installation: {}", money(summary.installation));
        }
        let _ = writeln!(out, "Tax:          {}", money(summary.tax));
        let _ = writeln!(out, "Total:        {}", money(summary.total));
        if let Some(date) = cart.installation_date() {
            let _ = writeln!(out, "\nInstall on:   {date}");
        }
        if let Some(notes) = cart.special_instructions() {
            let _ = writeln!(out, "Notes:        {notes}");
        }
        out
    }
}

/// Dollars (e.g. `459`, `459.5`, `459.99`) to cents.
fn parse_price(raw: &str) -> Result<Money, LocalCartError> {
    let invalid = || LocalCartError::InvalidPrice(raw.to_string());
    let dollars: Decimal = raw.trim().parse().map_err(|_| invalid())?;
    let cents = dollars * Decimal::ONE_HUNDRED;
    if dollars.is_sign_negative() || !cents.fract().is_zero() {
        return Err(invalid());
    }
    cents.to_i64().map(Money::from_cents).ok_or_else(invalid)
}

/// `key=value` pairs to a customization. Later keys win.
fn parse_options(options: &[String]) -> Result<Customization, LocalCartError> {
    options
        .iter()
        .map(|raw| {
            raw.split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .filter(|(k, _)| !k.is_empty())
                .ok_or_else(|| LocalCartError::InvalidOption(raw.clone()))
        })
        .collect()
}
