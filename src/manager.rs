//! Cart manager
//!
//! Owns the cart and everything that reacts to it: the variant prompt, the
//! toast, the review panel and the checkout state machine
//! (`Idle -> Submitting -> Idle`). All mutation goes through this type.

use jiff::Timestamp;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    cart::{Cart, CartError, CartLine, LineKey, QuantityUpdate},
    checkout::{
        CheckoutContext, CheckoutEndpoints, CheckoutError, CheckoutPayload, CheckoutReceipt,
        CheckoutRequest, CheckoutState, CheckoutTarget,
    },
    menu::{MenuItem, PriceVariant},
    notifications::{CartEvent, CartEvents, Toast, ToastKind, messages},
    pricing::{Price, PricingError},
    selection::{Choice, VariantSelection},
    transport::{Transport, TransportError},
};

/// A line that was just added or merged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddedLine {
    /// Line identity.
    pub key: LineKey,

    /// Quantity after the add.
    pub quantity: u32,
}

/// Result of [`CartManager::add_item`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    /// The item had a single variant and went straight into the cart.
    Added(AddedLine),

    /// A variant prompt opened; nothing was added yet.
    AwaitingChoice,
}

/// Owned cart state behind an explicit API.
#[derive(Debug)]
pub struct CartManager {
    cart: Cart,
    selection: VariantSelection,
    toast: Option<Toast>,
    review_open: bool,
    state: CheckoutState,
    idempotency_key: Uuid,
    endpoints: CheckoutEndpoints,
    events: CartEvents,
}

impl CartManager {
    /// Creates a manager around an empty `cart` that checks out to `endpoints`.
    pub fn new(cart: Cart, endpoints: CheckoutEndpoints) -> Self {
        Self {
            cart,
            selection: VariantSelection::default(),
            toast: None,
            review_open: false,
            state: CheckoutState::Idle,
            idempotency_key: Uuid::now_v7(),
            endpoints,
            events: CartEvents::new(),
        }
    }

    /// Adds `item`, or opens the variant prompt if it needs a choice first.
    ///
    /// # Errors
    ///
    /// Returns a `CartError` if the item's variant cannot be added.
    pub fn add_item(&mut self, item: &MenuItem) -> Result<AddOutcome, CartError> {
        self.ensure_unlocked()?;

        if self.selection.open(item) {
            self.events.publish(CartEvent::SelectionOpened {
                item: item.name().to_string(),
            });

            return Ok(AddOutcome::AwaitingChoice);
        }

        let variant = item
            .default_variant()
            .ok_or_else(|| CartError::UnknownVariant {
                item: item.name().to_string(),
                variant: String::new(),
            })?;

        self.add_line(item, variant).map(AddOutcome::Added)
    }

    /// Resolves the open variant prompt.
    ///
    /// The prompt closes whatever the choice. Returns `None` when the choice
    /// did not match the pending item; the cart is then unchanged.
    ///
    /// # Errors
    ///
    /// Returns a `CartError` if the chosen variant cannot be added.
    pub fn choose(&mut self, choice: &Choice) -> Result<Option<AddedLine>, CartError> {
        let was_open = self.selection.is_open();
        let resolved = self.selection.resolve(choice);

        if was_open {
            self.events.publish(CartEvent::SelectionClosed);
        }

        match resolved {
            Some((item, variant)) => self.add_line(&item, &variant).map(Some),
            None => Ok(None),
        }
    }

    /// Closes the variant prompt without touching the cart.
    pub fn cancel_selection(&mut self) {
        if self.selection.cancel().is_some() {
            self.events.publish(CartEvent::SelectionClosed);
        }
    }

    /// Adds one unit of `item` with `variant` and shows the "added" toast.
    ///
    /// # Errors
    ///
    /// [`CartError::CheckoutInProgress`] while submitting, otherwise see
    /// [`Cart::add_line`].
    pub fn add_line(
        &mut self,
        item: &MenuItem,
        variant: &PriceVariant,
    ) -> Result<AddedLine, CartError> {
        self.ensure_unlocked()?;

        let quantity = self.cart.add_line(item, variant)?;
        let key = LineKey::new(item.name(), variant.label());

        self.contents_changed();
        self.toast = Some(Toast::added(Timestamp::now()));
        self.events.publish(CartEvent::LineAdded {
            key: key.clone(),
            quantity,
        });

        Ok(AddedLine { key, quantity })
    }

    /// Removes a line; absent keys are a no-op.
    ///
    /// # Errors
    ///
    /// [`CartError::CheckoutInProgress`] while submitting.
    pub fn remove_line(&mut self, key: &LineKey) -> Result<Option<CartLine>, CartError> {
        self.ensure_unlocked()?;

        let Some(removed) = self.cart.remove_line(key) else {
            return Ok(None);
        };

        self.contents_changed();
        self.events
            .publish(CartEvent::LineRemoved { key: key.clone() });

        Ok(Some(removed))
    }

    /// Sets a line's quantity; `0` removes it.
    ///
    /// # Errors
    ///
    /// [`CartError::CheckoutInProgress`] while submitting, otherwise see
    /// [`Cart::update_quantity`].
    pub fn update_quantity(
        &mut self,
        key: &LineKey,
        quantity: i64,
    ) -> Result<QuantityUpdate, CartError> {
        self.ensure_unlocked()?;

        let update = self.cart.update_quantity(key, quantity)?;

        let event = match update {
            QuantityUpdate::Updated(quantity) => CartEvent::QuantityChanged {
                key: key.clone(),
                quantity,
            },
            QuantityUpdate::Removed => CartEvent::LineRemoved { key: key.clone() },
            QuantityUpdate::Missing => return Ok(update),
        };

        self.contents_changed();
        self.events.publish(event);

        Ok(update)
    }

    /// Current cart total.
    ///
    /// # Errors
    ///
    /// Returns a `PricingError` if the total overflows.
    pub fn total_price(&self) -> Result<Price, PricingError> {
        self.cart.total_price()
    }

    /// The cart.
    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    /// The variant prompt.
    pub fn selection(&self) -> &VariantSelection {
        &self.selection
    }

    /// Shows the cart review panel.
    pub fn open_review(&mut self) {
        self.review_open = true;
    }

    /// Hides the cart review panel.
    pub fn close_review(&mut self) {
        self.review_open = false;
    }

    /// Whether the cart review panel is showing.
    pub fn is_review_open(&self) -> bool {
        self.review_open
    }

    /// The toast still showing at `now`, if any.
    pub fn active_toast(&self, now: Timestamp) -> Option<&Toast> {
        self.toast.as_ref().filter(|toast| toast.is_visible_at(now))
    }

    /// Dismisses the current toast.
    pub fn dismiss_toast(&mut self) {
        self.toast = None;
    }

    /// Checkout state.
    pub fn checkout_state(&self) -> CheckoutState {
        self.state
    }

    /// Key attached to the next submission of the current cart contents.
    pub fn idempotency_key(&self) -> Uuid {
        self.idempotency_key
    }

    /// Subscribes to cart events.
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.events.subscribe()
    }

    /// Validates the cart, picks the endpoint and enters `Submitting`.
    ///
    /// The cart refuses changes until [`Self::finish_checkout`] settles the
    /// request, so the lines cleared on success are exactly the lines sent.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::InProgress`]: a submission is outstanding.
    /// - [`CheckoutError::EmptyCart`]: nothing to order; a warning toast is shown.
    /// - [`CheckoutError::NoEndpoint`] / [`CheckoutError::InvalidEndpoint`]:
    ///   nowhere to send the order.
    /// - [`CheckoutError::Pricing`]: the total overflowed.
    pub fn begin_checkout(
        &mut self,
        context: &CheckoutContext,
    ) -> Result<CheckoutRequest, CheckoutError> {
        if self.state == CheckoutState::Submitting {
            self.reject(messages::ORDER_IN_PROGRESS);

            return Err(CheckoutError::InProgress);
        }

        if self.cart.is_empty() {
            self.reject(messages::EMPTY_CART);
            self.toast = Some(Toast::sticky(
                ToastKind::Warning,
                messages::EMPTY_CART,
                Timestamp::now(),
            ));

            return Err(CheckoutError::EmptyCart);
        }

        let prepared = CheckoutTarget::resolve(context, &self.endpoints).and_then(|target| {
            let payload = CheckoutPayload::from_cart(&self.cart, context, self.idempotency_key)?;

            Ok(CheckoutRequest { target, payload })
        });

        let request = match prepared {
            Ok(request) => request,
            Err(error) => {
                self.fail(&error);

                return Err(error);
            }
        };

        self.state = CheckoutState::Submitting;
        self.events.publish(CartEvent::CheckoutStarted);

        info!(
            url = %request.target.url(),
            lines = request.payload.items.len(),
            total = %request.payload.total,
            idempotency_key = %request.idempotency_key(),
            "submitting order"
        );

        Ok(request)
    }

    /// Settles a submission started by [`Self::begin_checkout`].
    ///
    /// Always returns to `Idle`. On success the cart is cleared, the review
    /// panel closes and a fresh idempotency key is drawn. On failure the cart
    /// is left as it was so the customer can retry.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::NotSubmitting`]: no submission was outstanding.
    /// - [`CheckoutError::Timeout`] / [`CheckoutError::Transport`]: the
    ///   submission failed.
    pub fn finish_checkout(
        &mut self,
        request: &CheckoutRequest,
        outcome: Result<Value, TransportError>,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        if self.state != CheckoutState::Submitting {
            return Err(CheckoutError::NotSubmitting);
        }

        self.state = CheckoutState::Idle;

        match outcome {
            Ok(body) => {
                let receipt =
                    CheckoutReceipt::from_response(&body, request.payload.order_id.as_deref());

                self.cart.clear();
                self.events.publish(CartEvent::Cleared);
                self.review_open = false;
                self.idempotency_key = Uuid::now_v7();
                self.toast = Some(Toast::sticky(
                    ToastKind::Success,
                    messages::ORDER_SENT,
                    Timestamp::now(),
                ));
                self.events.publish(CartEvent::CheckoutSucceeded {
                    order_id: receipt.order_id.clone(),
                });

                info!(order_id = ?receipt.order_id, "order accepted");

                Ok(receipt)
            }
            Err(error) => {
                let error = CheckoutError::from(error);

                self.fail(&error);

                Err(error)
            }
        }
    }

    /// Runs a whole checkout against `transport`.
    ///
    /// # Errors
    ///
    /// Any error from [`Self::begin_checkout`] or [`Self::finish_checkout`].
    pub async fn checkout(
        &mut self,
        transport: &dyn Transport,
        context: &CheckoutContext,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let request = self.begin_checkout(context)?;

        let body = match serde_json::to_value(&request.payload) {
            Ok(body) => body,
            Err(error) => {
                self.state = CheckoutState::Idle;

                let error = CheckoutError::Encode(error);
                self.fail(&error);

                return Err(error);
            }
        };

        let outcome = transport.post_json(request.target.url(), &body).await;

        self.finish_checkout(&request, outcome)
    }

    fn ensure_unlocked(&self) -> Result<(), CartError> {
        if self.state == CheckoutState::Submitting {
            return Err(CartError::CheckoutInProgress);
        }

        Ok(())
    }

    fn contents_changed(&mut self) {
        self.idempotency_key = Uuid::now_v7();
    }

    fn reject(&self, reason: &str) {
        self.events.publish(CartEvent::CheckoutRejected {
            reason: reason.to_string(),
        });
    }

    fn fail(&mut self, error: &CheckoutError) {
        warn!(%error, "checkout failed");

        self.toast = Some(Toast::sticky(
            ToastKind::Error,
            messages::ORDER_FAILED,
            Timestamp::now(),
        ));
        self.events.publish(CartEvent::CheckoutFailed {
            error: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use jiff::SignedDuration;
    use reqwest::Url;
    use rusty_money::{Money, iso};
    use serde_json::json;
    use testresult::TestResult;

    use crate::{menu::Catalog, transport::MockTransport};

    use super::*;

    const WEBHOOK: &str = "https://hooks.example.com/menu";

    fn manager() -> Result<CartManager, Box<dyn std::error::Error>> {
        let endpoints = CheckoutEndpoints {
            api_url: None,
            webhook_url: Some(Url::parse(WEBHOOK)?),
        };

        Ok(CartManager::new(Cart::new(iso::USD), endpoints))
    }

    fn context() -> CheckoutContext {
        CheckoutContext {
            order_id: Some("ord-1".to_string()),
            ..CheckoutContext::default()
        }
    }

    fn item(catalog: &Catalog, name: &str) -> Result<MenuItem, &'static str> {
        catalog.find(name).cloned().ok_or("missing item")
    }

    #[test]
    fn single_variant_items_are_added_directly() -> TestResult {
        let catalog = Catalog::luigis()?;
        let mut manager = manager()?;

        let outcome = manager.add_item(&item(&catalog, "NACHOS")?)?;

        assert_eq!(
            outcome,
            AddOutcome::Added(AddedLine {
                key: LineKey::new("NACHOS", ""),
                quantity: 1,
            })
        );
        assert!(!manager.selection().is_open());

        Ok(())
    }

    #[test]
    fn variant_gated_items_wait_for_a_choice() -> TestResult {
        let catalog = Catalog::luigis()?;
        let mut manager = manager()?;

        let outcome = manager.add_item(&item(&catalog, "LUIGII DE CARNE")?)?;

        assert_eq!(outcome, AddOutcome::AwaitingChoice);
        assert!(manager.cart().is_empty());

        let added = manager.choose(&Choice::AddOn(true))?.ok_or("nothing added")?;

        assert_eq!(added.key, LineKey::new("LUIGII DE CARNE", "Con papas"));
        assert_eq!(manager.cart().len(), 1);
        assert_eq!(manager.total_price()?, Money::from_minor(575, iso::USD));

        Ok(())
    }

    #[test]
    fn cancelling_selection_leaves_cart_alone() -> TestResult {
        let catalog = Catalog::luigis()?;
        let mut manager = manager()?;
        let mut events = manager.subscribe();

        manager.add_item(&item(&catalog, "BATIDOS")?)?;
        manager.cancel_selection();

        assert!(manager.cart().is_empty());
        assert!(!manager.selection().is_open());
        assert_eq!(
            events.try_recv()?,
            CartEvent::SelectionOpened {
                item: "BATIDOS".to_string()
            }
        );
        assert_eq!(events.try_recv()?, CartEvent::SelectionClosed);

        Ok(())
    }

    #[test]
    fn added_toast_disappears_after_a_moment() -> TestResult {
        let catalog = Catalog::luigis()?;
        let mut manager = manager()?;

        manager.add_item(&item(&catalog, "TACOS")?)?;

        let toast = manager
            .active_toast(Timestamp::now())
            .ok_or("toast not shown")?;

        assert_eq!(toast.message(), messages::ADDED);

        let later = toast.shown_at().checked_add(SignedDuration::from_secs(2))?;

        assert!(manager.active_toast(later).is_none());

        Ok(())
    }

    #[test]
    fn mutations_rotate_the_idempotency_key() -> TestResult {
        let catalog = Catalog::luigis()?;
        let mut manager = manager()?;
        let initial = manager.idempotency_key();

        manager.add_item(&item(&catalog, "TACOS")?)?;
        let after_add = manager.idempotency_key();

        manager.update_quantity(&LineKey::new("NACHOS", ""), 3)?;

        assert_ne!(initial, after_add);
        assert_eq!(manager.idempotency_key(), after_add);

        Ok(())
    }

    #[tokio::test]
    async fn empty_cart_checkout_sends_nothing() -> TestResult {
        let mut manager = manager()?;
        let mut transport = MockTransport::new();

        transport.expect_post_json().never();

        let result = manager.checkout(&transport, &context()).await;

        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
        assert_eq!(manager.checkout_state(), CheckoutState::Idle);

        let toast = manager
            .active_toast(Timestamp::now())
            .ok_or("warning not shown")?;

        assert_eq!(toast.kind(), ToastKind::Warning);

        Ok(())
    }

    #[tokio::test]
    async fn successful_checkout_clears_cart_and_closes_review() -> TestResult {
        let catalog = Catalog::luigis()?;
        let mut manager = manager()?;
        let burger = item(&catalog, "LUIGII DE CARNE")?;
        let sola = burger.variant("Sola").ok_or("missing variant")?;

        manager.add_line(&burger, sola)?;
        manager.add_line(&burger, sola)?;
        manager.open_review();

        let key = manager.idempotency_key();
        let mut transport = MockTransport::new();

        transport
            .expect_post_json()
            .once()
            .withf(move |url, body| {
                url.as_str() == WEBHOOK
                    && body.get("total") == Some(&json!(9.0))
                    && body.get("order_id") == Some(&json!("ord-1"))
                    && body.get("source") == Some(&json!("whatsapp_ordering_system"))
                    && body.get("idempotency_key") == Some(&json!(key))
            })
            .return_once(|_, _| Ok(json!({ "id": "A-17" })));

        let receipt = manager.checkout(&transport, &context()).await?;

        assert_eq!(receipt.order_id.as_deref(), Some("A-17"));
        assert!(manager.cart().is_empty());
        assert!(!manager.is_review_open());
        assert_eq!(manager.checkout_state(), CheckoutState::Idle);
        assert_ne!(manager.idempotency_key(), key);

        Ok(())
    }

    #[tokio::test]
    async fn failed_checkout_keeps_cart_and_allows_retry() -> TestResult {
        let catalog = Catalog::luigis()?;
        let mut manager = manager()?;

        manager.add_item(&item(&catalog, "NACHOS")?)?;

        let total = manager.total_price()?;
        let key = manager.idempotency_key();
        let mut transport = MockTransport::new();

        transport
            .expect_post_json()
            .once()
            .return_once(|_, _| {
                Err(TransportError::Status {
                    status: 502,
                    body: "bad gateway".to_string(),
                })
            });

        let result = manager.checkout(&transport, &context()).await;

        assert!(matches!(result, Err(CheckoutError::Transport(_))));
        assert_eq!(manager.cart().len(), 1);
        assert_eq!(manager.total_price()?, total);
        assert_eq!(manager.checkout_state(), CheckoutState::Idle);
        assert_eq!(manager.idempotency_key(), key);

        let mut retry = MockTransport::new();

        retry
            .expect_post_json()
            .once()
            .withf(move |_, body| body.get("idempotency_key") == Some(&json!(key)))
            .return_once(|_, _| Ok(Value::Null));

        let receipt = manager.checkout(&retry, &context()).await?;

        assert_eq!(receipt.order_id.as_deref(), Some("ord-1"));
        assert!(manager.cart().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn timeout_is_reported_separately() -> TestResult {
        let catalog = Catalog::luigis()?;
        let mut manager = manager()?;

        manager.add_item(&item(&catalog, "TACOS")?)?;

        let mut transport = MockTransport::new();

        transport
            .expect_post_json()
            .once()
            .return_once(|_, _| Err(TransportError::Timeout(Duration::from_secs(10))));

        let result = manager.checkout(&transport, &context()).await;

        assert!(matches!(result, Err(CheckoutError::Timeout(_))));
        assert_eq!(manager.cart().len(), 1);

        Ok(())
    }

    #[test]
    fn second_checkout_is_refused_while_submitting() -> TestResult {
        let catalog = Catalog::luigis()?;
        let mut manager = manager()?;

        manager.add_item(&item(&catalog, "TACOS")?)?;

        let request = manager.begin_checkout(&context())?;

        assert_eq!(manager.checkout_state(), CheckoutState::Submitting);
        assert!(matches!(
            manager.begin_checkout(&context()),
            Err(CheckoutError::InProgress)
        ));

        manager.finish_checkout(&request, Ok(Value::Null))?;

        assert_eq!(manager.checkout_state(), CheckoutState::Idle);
        assert!(matches!(
            manager.finish_checkout(&request, Ok(Value::Null)),
            Err(CheckoutError::NotSubmitting)
        ));

        Ok(())
    }

    #[test]
    fn cart_is_locked_while_submitting() -> TestResult {
        let catalog = Catalog::luigis()?;
        let mut manager = manager()?;
        let tacos = LineKey::new("TACOS", "");

        manager.add_item(&item(&catalog, "TACOS")?)?;

        let request = manager.begin_checkout(&context())?;

        assert!(matches!(
            manager.add_item(&item(&catalog, "NACHOS")?),
            Err(CartError::CheckoutInProgress)
        ));
        assert!(matches!(
            manager.add_item(&item(&catalog, "BATIDOS")?),
            Err(CartError::CheckoutInProgress)
        ));
        assert!(!manager.selection().is_open());
        assert!(matches!(
            manager.update_quantity(&tacos, 4),
            Err(CartError::CheckoutInProgress)
        ));
        assert!(matches!(
            manager.remove_line(&tacos),
            Err(CartError::CheckoutInProgress)
        ));
        assert_eq!(manager.cart().item_count(), 1);

        manager.finish_checkout(&request, Ok(Value::Null))?;

        assert!(manager.cart().is_empty());

        manager.add_item(&item(&catalog, "NACHOS")?)?;

        assert_eq!(manager.cart().len(), 1);

        Ok(())
    }

    #[test]
    fn failed_submission_unlocks_the_cart() -> TestResult {
        let catalog = Catalog::luigis()?;
        let mut manager = manager()?;

        manager.add_item(&item(&catalog, "TACOS")?)?;

        let request = manager.begin_checkout(&context())?;
        let failed = manager.finish_checkout(
            &request,
            Err(TransportError::Timeout(Duration::from_secs(10))),
        );

        assert!(matches!(failed, Err(CheckoutError::Timeout(_))));

        manager.add_item(&item(&catalog, "NACHOS")?)?;

        assert_eq!(manager.cart().len(), 2);

        Ok(())
    }

    #[test]
    fn success_publishes_cleared_before_succeeded() -> TestResult {
        let catalog = Catalog::luigis()?;
        let mut manager = manager()?;

        manager.add_item(&item(&catalog, "TACOS")?)?;

        let request = manager.begin_checkout(&context())?;
        let mut events = manager.subscribe();

        manager.finish_checkout(&request, Ok(json!({ "id": 3 })))?;

        assert_eq!(events.try_recv()?, CartEvent::Cleared);
        assert_eq!(
            events.try_recv()?,
            CartEvent::CheckoutSucceeded {
                order_id: Some("3".to_string())
            }
        );

        Ok(())
    }

    #[test]
    fn missing_endpoint_fails_without_submitting() -> TestResult {
        let catalog = Catalog::luigis()?;
        let mut manager = CartManager::new(Cart::new(iso::USD), CheckoutEndpoints::default());

        manager.add_item(&item(&catalog, "TACOS")?)?;

        assert!(matches!(
            manager.begin_checkout(&context()),
            Err(CheckoutError::NoEndpoint)
        ));
        assert_eq!(manager.checkout_state(), CheckoutState::Idle);
        assert_eq!(manager.cart().len(), 1);

        Ok(())
    }
}
