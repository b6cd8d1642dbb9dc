//! Cart

use std::fmt;

use rusty_money::iso::Currency;
use thiserror::Error;
use tracing::debug;

use crate::{
    menu::{MenuItem, PriceVariant},
    pricing::{Price, PricingError, line_total, total_price},
};

/// Errors related to cart mutations or totals.
#[derive(Debug, Error, PartialEq)]
pub enum CartError {
    /// A variant's currency differs from the cart currency (item, variant currency, cart currency).
    #[error("item {0} has currency {1}, but cart has currency {2}")]
    CurrencyMismatch(String, &'static str, &'static str),

    /// The variant does not belong to the item.
    #[error("item {item} has no variant {variant:?}")]
    UnknownVariant {
        /// Item name.
        item: String,

        /// Requested variant label.
        variant: String,
    },

    /// Quantities below zero (or beyond `u32`) are rejected rather than clamped.
    #[error("invalid quantity {0}")]
    InvalidQuantity(i64),

    /// Incrementing a line would overflow its quantity.
    #[error("quantity overflow for {0}")]
    QuantityOverflow(LineKey),

    /// The cart is locked while an order is being submitted.
    #[error("cart cannot change while an order is being submitted")]
    CheckoutInProgress,

    /// Wrapped pricing error.
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// Identity of a cart line: item name plus variant label.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LineKey {
    /// Menu item name.
    pub name: String,

    /// Selected variant label.
    pub variant: String,
}

impl LineKey {
    /// Creates a key from an item name and variant label.
    pub fn new(name: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variant: variant.into(),
        }
    }

    fn matches(&self, line: &CartLine) -> bool {
        line.name == self.name && line.variant.label() == self.variant
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.variant.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} ({})", self.name, self.variant)
        }
    }
}

/// One cart entry. Quantity is always at least 1.
#[derive(Clone, Debug, PartialEq)]
pub struct CartLine {
    name: String,
    category: String,
    variant: PriceVariant,
    quantity: u32,
}

impl CartLine {
    /// Menu item name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Menu category of the item.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Selected variant.
    pub fn variant(&self) -> &PriceVariant {
        &self.variant
    }

    /// Quantity, at least 1.
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Unit price of the selected variant.
    pub fn unit_price(&self) -> &Price {
        self.variant.price()
    }

    /// Unit price times quantity.
    ///
    /// # Errors
    ///
    /// Returns a `PricingError` if the multiplication overflows.
    pub fn total(&self) -> Result<Price, PricingError> {
        line_total(self.variant.price(), self.quantity)
    }

    /// The line's identity.
    pub fn key(&self) -> LineKey {
        LineKey::new(self.name.clone(), self.variant.label())
    }
}

/// Result of [`Cart::update_quantity`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuantityUpdate {
    /// The line now has this quantity.
    Updated(u32),

    /// Quantity 0 removed the line.
    Removed,

    /// No line had the key; nothing changed.
    Missing,
}

/// Ordered cart lines with unique `(name, variant)` keys.
#[derive(Clone, Debug)]
pub struct Cart {
    lines: Vec<CartLine>,
    currency: &'static Currency,
}

impl Cart {
    /// Creates an empty cart priced in `currency`.
    pub fn new(currency: &'static Currency) -> Self {
        Cart {
            lines: Vec::new(),
            currency,
        }
    }

    /// Adds one unit of `item` with `variant`, merging into an existing line.
    ///
    /// New lines are appended, so display order is first-add order. Returns
    /// the line's quantity after the add.
    ///
    /// # Errors
    ///
    /// - [`CartError::UnknownVariant`]: `variant` is not one of the item's variants.
    /// - [`CartError::CurrencyMismatch`]: the variant is priced in another currency.
    /// - [`CartError::QuantityOverflow`]: the merged quantity would overflow.
    pub fn add_line(&mut self, item: &MenuItem, variant: &PriceVariant) -> Result<u32, CartError> {
        if item.variant(variant.label()) != Some(variant) {
            return Err(CartError::UnknownVariant {
                item: item.name().to_string(),
                variant: variant.label().to_string(),
            });
        }

        let variant_currency = variant.price().currency();
        if variant_currency != self.currency {
            return Err(CartError::CurrencyMismatch(
                item.name().to_string(),
                variant_currency.iso_alpha_code,
                self.currency.iso_alpha_code,
            ));
        }

        let key = LineKey::new(item.name(), variant.label());

        let quantity = match self.lines.iter_mut().find(|line| key.matches(line)) {
            Some(line) => {
                line.quantity = line
                    .quantity
                    .checked_add(1)
                    .ok_or_else(|| CartError::QuantityOverflow(key.clone()))?;

                line.quantity
            }
            None => {
                self.lines.push(CartLine {
                    name: item.name().to_string(),
                    category: item.category().to_string(),
                    variant: variant.clone(),
                    quantity: 1,
                });

                1
            }
        };

        debug!(line = %key, quantity, "line added");

        Ok(quantity)
    }

    /// Removes the line with `key`, returning it. Absent keys are a no-op.
    pub fn remove_line(&mut self, key: &LineKey) -> Option<CartLine> {
        let index = self.position(key)?;
        let line = self.lines.remove(index);

        debug!(line = %key, "line removed");

        Some(line)
    }

    /// Sets the quantity of the line with `key`; `0` removes it.
    ///
    /// Other lines are left untouched. An absent key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] for negative quantities or
    /// quantities beyond `u32::MAX`; the cart is not changed.
    pub fn update_quantity(
        &mut self,
        key: &LineKey,
        quantity: i64,
    ) -> Result<QuantityUpdate, CartError> {
        let quantity =
            u32::try_from(quantity).map_err(|_err| CartError::InvalidQuantity(quantity))?;

        if quantity == 0 {
            return Ok(match self.remove_line(key) {
                Some(_) => QuantityUpdate::Removed,
                None => QuantityUpdate::Missing,
            });
        }

        let Some(line) = self.lines.iter_mut().find(|line| key.matches(line)) else {
            return Ok(QuantityUpdate::Missing);
        };

        line.quantity = quantity;

        debug!(line = %key, quantity, "quantity updated");

        Ok(QuantityUpdate::Updated(quantity))
    }

    /// Sum of unit price times quantity over all lines, computed fresh.
    ///
    /// # Errors
    ///
    /// Returns a `PricingError` if a line total overflows.
    pub fn total_price(&self) -> Result<Price, PricingError> {
        total_price(
            self.lines
                .iter()
                .map(|line| (line.variant.price(), line.quantity)),
            self.currency,
        )
    }

    /// Total number of units across lines.
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Lines in first-add order.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Looks up a line by key.
    pub fn get(&self, key: &LineKey) -> Option<&CartLine> {
        self.lines.iter().find(|line| key.matches(line))
    }

    /// Removes every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Get the number of lines in the cart.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if the cart is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Get the currency of the cart.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    fn position(&self, key: &LineKey) -> Option<usize> {
        self.lines.iter().position(|line| key.matches(line))
    }
}
