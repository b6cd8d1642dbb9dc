//! Integration tests for the menu-to-order flow

use jiff::civil::Weekday;
use reqwest::Url;
use rusty_money::{Money, iso::USD};
use serde_json::{Value, json};
use testresult::TestResult;

use luigis::{
    cart::{Cart, LineKey, QuantityUpdate},
    checkout::{CheckoutEndpoints, CheckoutError, CheckoutState},
    manager::{AddOutcome, CartManager},
    menu::Catalog,
    notifications::CartEvent,
    promos::Promo,
    selection::Choice,
    session::PageParams,
    transport::{MockTransport, TransportError},
};

fn manager() -> Result<CartManager, Box<dyn std::error::Error>> {
    let endpoints = CheckoutEndpoints {
        api_url: Some(Url::parse("https://api.example.com")?),
        webhook_url: None,
    };

    Ok(CartManager::new(Cart::new(USD), endpoints))
}

#[tokio::test]
async fn chat_link_to_confirmed_order() -> TestResult {
    let page = PageParams::from_url(&Url::parse(
        "https://menu.example.com/?token=tok-1&order_id=55",
    )?);
    let catalog = Catalog::luigis()?;
    let mut manager = manager()?;
    let mut events = manager.subscribe();

    let burger = catalog.find("LUIGII DE CARNE").ok_or("missing burger")?;
    let shake = catalog.find("BATIDOS").ok_or("missing shake")?;
    let nachos = catalog.find("NACHOS").ok_or("missing nachos")?;

    assert_eq!(manager.add_item(burger)?, AddOutcome::AwaitingChoice);
    assert!(manager.cart().is_empty());

    manager.choose(&Choice::AddOn(true))?;
    manager.add_item(burger)?;
    manager.choose(&Choice::AddOn(true))?;

    manager.add_item(shake)?;
    manager.choose(&Choice::Flavor("Melón".to_string()))?;

    manager.add_item(nachos)?;
    manager.update_quantity(&LineKey::new("NACHOS", ""), 0)?;

    assert_eq!(manager.cart().len(), 2);
    assert_eq!(manager.total_price()?, Money::from_minor(575 * 2 + 275, USD));

    let mut transport = MockTransport::new();

    transport
        .expect_post_json()
        .once()
        .withf(|url, body| {
            let items = body.get("items").and_then(Value::as_array);

            url.as_str() == "https://api.example.com/api/orders"
                && body.get("session_token") == Some(&json!("tok-1"))
                && body.get("order_id") == Some(&json!("55"))
                && body.get("total") == Some(&json!(14.25))
                && items.map(Vec::len) == Some(2)
        })
        .return_once(|_, _| Ok(json!({ "order_id": 901 })));

    manager.open_review();

    let receipt = manager.checkout(&transport, &page.checkout_context()).await?;

    assert_eq!(
        receipt.confirmation_path().as_deref(),
        Some("/order/confirmation?orderId=901")
    );
    assert!(manager.cart().is_empty());
    assert!(!manager.is_review_open());

    let mut saw_success = false;

    while let Ok(event) = events.try_recv() {
        if let CartEvent::CheckoutSucceeded { order_id } = event {
            assert_eq!(order_id.as_deref(), Some("901"));
            saw_success = true;
        }
    }

    assert!(saw_success, "no success event published");

    Ok(())
}

#[tokio::test]
async fn lost_response_retry_reuses_the_same_key() -> TestResult {
    let page = PageParams {
        token: Some("tok-2".to_string()),
        ..PageParams::default()
    };
    let catalog = Catalog::luigis()?;
    let mut manager = manager()?;
    let tacos = catalog.find("TACOS").ok_or("missing tacos")?;

    manager.add_item(tacos)?;

    let key = manager.idempotency_key();
    let mut first = MockTransport::new();

    first
        .expect_post_json()
        .once()
        .return_once(|_, _| Err(TransportError::Timeout(std::time::Duration::from_secs(10))));

    let failed = manager.checkout(&first, &page.checkout_context()).await;

    assert!(matches!(failed, Err(CheckoutError::Timeout(_))));
    assert_eq!(manager.checkout_state(), CheckoutState::Idle);
    assert_eq!(manager.cart().item_count(), 1);

    let mut second = MockTransport::new();

    second
        .expect_post_json()
        .once()
        .withf(move |_, body| body.get("idempotency_key") == Some(&json!(key)))
        .return_once(|_, _| Ok(Value::Null));

    manager.checkout(&second, &page.checkout_context()).await?;

    assert!(manager.cart().is_empty());

    Ok(())
}

#[test]
fn todays_promo_goes_into_the_cart() -> TestResult {
    let mut manager = manager()?;
    let promo = Promo::for_weekday(Weekday::Tuesday).ok_or("missing promo")?;

    let item = promo.select(Some(Weekday::Tuesday))?;

    manager.add_item(&item)?;

    assert_eq!(
        manager.update_quantity(&LineKey::new("MONCHI-PAPAS", ""), 2)?,
        QuantityUpdate::Updated(2)
    );
    assert_eq!(manager.total_price()?, Money::from_minor(1198, USD));

    Ok(())
}
