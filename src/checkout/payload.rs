//! Checkout wire format

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    cart::{Cart, CartLine},
    pricing::{PricingError, to_decimal},
};

use super::CheckoutContext;

/// Channel tag sent with every order.
pub const SOURCE_TAG: &str = "whatsapp_ordering_system";

/// One ordered line.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CheckoutLine {
    /// Menu item name.
    pub name: String,

    /// Variant label; empty for single-variant items.
    pub variant: String,

    /// Units ordered.
    pub quantity: u32,

    /// Price of one unit.
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,

    /// `unit_price * quantity`.
    #[serde(with = "rust_decimal::serde::float")]
    pub line_total: Decimal,
}

impl CheckoutLine {
    fn from_line(line: &CartLine) -> Result<Self, PricingError> {
        Ok(Self {
            name: line.name().to_string(),
            variant: line.variant().label().to_string(),
            quantity: line.quantity(),
            unit_price: to_decimal(line.unit_price()),
            line_total: to_decimal(&line.total()?),
        })
    }
}

/// Body posted to the order endpoint.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CheckoutPayload {
    /// Order identifier from the messaging workflow.
    pub order_id: Option<String>,

    /// Session token, when the order is scoped to a session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,

    /// Lines in cart order.
    pub items: Vec<CheckoutLine>,

    /// Cart total.
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,

    /// Always [`SOURCE_TAG`].
    pub source: &'static str,

    /// Same value for every retry of the same cart contents.
    pub idempotency_key: Uuid,
}

impl CheckoutPayload {
    /// Snapshot `cart` for submission.
    ///
    /// # Errors
    ///
    /// Returns a `PricingError` if a line or the cart total overflows.
    pub fn from_cart(
        cart: &Cart,
        context: &CheckoutContext,
        idempotency_key: Uuid,
    ) -> Result<Self, PricingError> {
        let items = cart
            .lines()
            .iter()
            .map(CheckoutLine::from_line)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            order_id: context.order_id.clone(),
            session_token: context.session_token.clone(),
            items,
            total: to_decimal(&cart.total_price()?),
            source: SOURCE_TAG,
            idempotency_key,
        })
    }
}

/// What the order endpoint told us about the accepted order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckoutReceipt {
    /// Order identifier, if the response carried one.
    pub order_id: Option<String>,
}

impl CheckoutReceipt {
    /// Reads the order identifier from `id` or `order_id`, falling back to
    /// the identifier the page was opened with.
    pub fn from_response(body: &Value, fallback: Option<&str>) -> Self {
        let order_id = ["id", "order_id", "orderId"]
            .iter()
            .find_map(|field| match body.get(field) {
                Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
                Some(Value::Number(id)) => Some(id.to_string()),
                _ => None,
            })
            .or_else(|| fallback.map(str::to_string));

        Self { order_id }
    }

    /// Path of the confirmation page for this order, if its id is known.
    pub fn confirmation_path(&self) -> Option<String> {
        self.order_id
            .as_deref()
            .map(|id| format!("/order/confirmation?orderId={id}"))
    }
}
