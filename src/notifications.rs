//! Notifications
//!
//! Toasts shown to the customer and cart events for observers.

use jiff::{SignedDuration, Timestamp};
use tokio::sync::broadcast;

use crate::cart::LineKey;

/// How long the "added to cart" toast stays up.
pub const ADDED_TOAST_TTL: SignedDuration = SignedDuration::from_millis(1500);

/// Capacity of the cart event channel; slow observers see `Lagged`.
pub const EVENT_CAPACITY: usize = 64;

/// User-facing messages.
pub mod messages {
    /// Line added to the cart.
    pub const ADDED: &str = "Agregado al carrito correctamente";

    /// Checkout accepted.
    pub const ORDER_SENT: &str = "Pedido enviado correctamente";

    /// Checkout failed; the cart is kept for a retry.
    pub const ORDER_FAILED: &str = "Error al enviar el pedido. Por favor, inténtalo de nuevo.";

    /// Checkout attempted while a submission is outstanding.
    pub const ORDER_IN_PROGRESS: &str = "Tu pedido ya se está enviando";

    /// Checkout attempted on an empty cart.
    pub const EMPTY_CART: &str = "Tu carrito está vacío";

    /// Address accepted.
    pub const ADDRESS_SENT: &str = "Dirección confirmada y enviada exitosamente";

    /// Address submission failed.
    pub const ADDRESS_FAILED: &str = "Error al enviar la dirección. Por favor, inténtalo de nuevo.";
}

/// Toast severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastKind {
    /// Line added to the cart.
    Added,

    /// An action completed.
    Success,

    /// A precondition blocked an action.
    Warning,

    /// An action failed.
    Error,
}

/// A transient message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toast {
    kind: ToastKind,
    message: String,
    shown_at: Timestamp,
    ttl: Option<SignedDuration>,
}

impl Toast {
    /// "Added to cart" toast, dismissed after [`ADDED_TOAST_TTL`].
    pub fn added(now: Timestamp) -> Self {
        Self {
            kind: ToastKind::Added,
            message: messages::ADDED.to_string(),
            shown_at: now,
            ttl: Some(ADDED_TOAST_TTL),
        }
    }

    /// A toast that stays until dismissed.
    pub fn sticky(kind: ToastKind, message: impl Into<String>, now: Timestamp) -> Self {
        Self {
            kind,
            message: message.into(),
            shown_at: now,
            ttl: None,
        }
    }

    /// Severity.
    pub fn kind(&self) -> ToastKind {
        self.kind
    }

    /// Message text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// When the toast appeared.
    pub fn shown_at(&self) -> Timestamp {
        self.shown_at
    }

    /// Whether the toast is still showing at `now`.
    pub fn is_visible_at(&self, now: Timestamp) -> bool {
        self.ttl
            .is_none_or(|ttl| now.duration_since(self.shown_at) < ttl)
    }
}

/// Something observers may want to re-render for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartEvent {
    /// A line was added or merged.
    LineAdded {
        /// Line identity.
        key: LineKey,

        /// Quantity after the add.
        quantity: u32,
    },

    /// A line's quantity was set.
    QuantityChanged {
        /// Line identity.
        key: LineKey,

        /// New quantity.
        quantity: u32,
    },

    /// A line was removed.
    LineRemoved {
        /// Line identity.
        key: LineKey,
    },

    /// A variant prompt opened for an item.
    SelectionOpened {
        /// Item name.
        item: String,
    },

    /// The variant prompt closed.
    SelectionClosed,

    /// Every line was removed.
    Cleared,

    /// Checkout was refused before any request (empty cart, already submitting).
    CheckoutRejected {
        /// Reason shown to the customer.
        reason: String,
    },

    /// A checkout request was sent.
    CheckoutStarted,

    /// Checkout succeeded and the cart was cleared.
    CheckoutSucceeded {
        /// Order identifier from the backend, if any.
        order_id: Option<String>,
    },

    /// Checkout failed; cart unchanged.
    CheckoutFailed {
        /// Failure description.
        error: String,
    },
}

/// Fan-out of cart events to any number of observers.
#[derive(Debug)]
pub struct CartEvents {
    sender: broadcast::Sender<CartEvent>,
}

impl CartEvents {
    /// Creates a channel with [`EVENT_CAPACITY`].
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);

        Self { sender }
    }

    /// Subscribes to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. Having no observers is fine.
    pub fn publish(&self, event: CartEvent) {
        _ = self.sender.send(event);
    }
}

impl Default for CartEvents {
    fn default() -> Self {
        Self::new()
    }
}
