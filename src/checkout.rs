//! Checkout
//!
//! Turns a cart into a single order submission. Where the order goes depends
//! on how the page was opened: a resume URL handed over by the messaging
//! workflow, a configured webhook, or the session-scoped order API.

use reqwest::Url;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    pricing::PricingError,
    transport::{TransportError, endpoint},
};

pub mod payload;

pub use payload::{CheckoutLine, CheckoutPayload, CheckoutReceipt, SOURCE_TAG};

/// Errors that can occur while checking out.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Checkout on an empty cart; nothing was sent.
    #[error("cart is empty")]
    EmptyCart,

    /// A submission is already outstanding.
    #[error("a checkout is already in progress")]
    InProgress,

    /// No resume URL, webhook or session token to send the order to.
    #[error("no checkout endpoint is configured")]
    NoEndpoint,

    /// An endpoint could not be built.
    #[error("invalid checkout endpoint: {0}")]
    InvalidEndpoint(String),

    /// The cart total could not be computed.
    #[error("cannot price cart: {0}")]
    Pricing(#[from] PricingError),

    /// The payload could not be serialised.
    #[error("cannot encode checkout payload: {0}")]
    Encode(#[source] serde_json::Error),

    /// The order endpoint did not answer in time; the order may or may not exist.
    #[error("checkout timed out")]
    Timeout(#[source] TransportError),

    /// The order endpoint rejected the order or could not be reached.
    #[error("checkout failed: {0}")]
    Transport(#[source] TransportError),

    /// No submission was outstanding when a result arrived.
    #[error("no checkout is in progress")]
    NotSubmitting,
}

impl From<TransportError> for CheckoutError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Timeout(_) => Self::Timeout(error),
            other => Self::Transport(other),
        }
    }
}

/// Identifiers carried by the page that opened the cart.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckoutContext {
    /// Order identifier from the messaging workflow (`order_id` query parameter).
    pub order_id: Option<String>,

    /// Session token (`token` query parameter).
    pub session_token: Option<String>,

    /// Workflow resume URL (`resumeUrl` query parameter).
    pub resume_url: Option<Url>,
}

/// Deployment endpoints a checkout may be sent to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckoutEndpoints {
    /// Backend API base URL.
    pub api_url: Option<Url>,

    /// Menu checkout webhook.
    pub webhook_url: Option<Url>,
}

/// Where a checkout is sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckoutTarget {
    /// Resume URL supplied by the page.
    Resume(Url),

    /// Configured webhook.
    Webhook(Url),

    /// Backend order-creation path scoped by session token.
    SessionOrders {
        /// `{api}/api/orders`.
        url: Url,

        /// Session token sent with the order.
        session_token: String,
    },
}

impl CheckoutTarget {
    /// Picks the resume URL, then the webhook, then the session order API.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::NoEndpoint`]: none of the three is available.
    /// - [`CheckoutError::InvalidEndpoint`]: the order API URL cannot be built.
    pub fn resolve(
        context: &CheckoutContext,
        endpoints: &CheckoutEndpoints,
    ) -> Result<Self, CheckoutError> {
        if let Some(url) = &context.resume_url {
            return Ok(Self::Resume(url.clone()));
        }

        if let Some(url) = &endpoints.webhook_url {
            return Ok(Self::Webhook(url.clone()));
        }

        match (&endpoints.api_url, &context.session_token) {
            (Some(api), Some(token)) => Ok(Self::SessionOrders {
                url: endpoint(api, &["api", "orders"]).map_err(CheckoutError::InvalidEndpoint)?,
                session_token: token.clone(),
            }),
            _ => Err(CheckoutError::NoEndpoint),
        }
    }

    /// URL the payload is posted to.
    pub fn url(&self) -> &Url {
        match self {
            Self::Resume(url) | Self::Webhook(url) | Self::SessionOrders { url, .. } => url,
        }
    }
}

/// Submission state. The flag resets whether the request succeeds or fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CheckoutState {
    /// Ready to submit.
    #[default]
    Idle,

    /// A request is outstanding; further checkouts are refused.
    Submitting,
}

/// A prepared submission: post `payload` to `target`.
#[derive(Clone, Debug, PartialEq)]
pub struct CheckoutRequest {
    /// Destination.
    pub target: CheckoutTarget,

    /// Body.
    pub payload: CheckoutPayload,
}

impl CheckoutRequest {
    /// Key the backend can use to drop repeated submissions of the same cart.
    pub fn idempotency_key(&self) -> Uuid {
        self.payload.idempotency_key
    }
}
