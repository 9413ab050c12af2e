mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use std::sync::Arc;

use common::{TestApp, BASE_URL};
use eventpass_server::models::{NewOrder, Order, OrderCompletion, PaymentStatus};
use eventpass_server::payment::signature::salted_checksum;
use eventpass_server::payment::PhonePeGateway;
use eventpass_server::store::Store;

const SALT_KEY: &str = "phonepe-salt";

/// Nothing listens on the discard port, so status lookups fail fast.
const UNREACHABLE_HOST: &str = "http://127.0.0.1:9";

async fn phonepe_app() -> TestApp {
    let gateway = PhonePeGateway::new(
        reqwest::Client::new(),
        "MERCHANT".into(),
        SALT_KEY.into(),
        "1".into(),
        UNREACHABLE_HOST.into(),
        BASE_URL.into(),
    );
    TestApp::with_gateway(Arc::new(gateway)).await
}

async fn seed_order(app: &TestApp, transaction_id: &str) -> Order {
    app.store
        .create_order(NewOrder {
            event_id: app.event.id,
            name: "Asha Rao".into(),
            email: "asha@example.com".into(),
            phone: Some("9876543210".into()),
            amount: app.event.price,
            gateway: "phonepe".into(),
            gateway_order_id: transaction_id.into(),
        })
        .await
        .unwrap()
}

/// Server-to-server notification as PhonePe signs it.
async fn notify_gateway_result(
    app: &TestApp,
    transaction_id: &str,
    code: &str,
) -> (StatusCode, Value) {
    let response = STANDARD.encode(
        json!({
            "success": code == "PAYMENT_SUCCESS",
            "code": code,
            "data": {
                "merchantId": "MERCHANT",
                "merchantTransactionId": transaction_id,
                "transactionId": "T2401"
            }
        })
        .to_string(),
    );
    let request = Request::post("/payment-callback")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-VERIFY", salted_checksum(&response, SALT_KEY, "1"))
        .body(Body::from(json!({ "response": response }).to_string()))
        .unwrap();
    let (status, _, body) = app.send(request).await;
    (status, body)
}

async fn return_to(app: &TestApp, uri: &str) -> String {
    let (status, headers, _) = app.get(uri).await;
    assert_eq!(status, StatusCode::SEE_OTHER, "{uri}");
    headers[header::LOCATION].to_str().unwrap().to_string()
}

#[tokio::test]
async fn test_payer_lands_on_ticket_after_signed_notification() {
    let app = phonepe_app().await;
    seed_order(&app, "TXNabc").await;

    let (status, body) = notify_gateway_result(&app, "TXNabc", "PAYMENT_SUCCESS").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let ticket_id = body["data"]["ticket"]["id"].as_str().unwrap().to_string();

    let location = return_to(&app, "/payment-return?merchantTransactionId=TXNabc").await;
    assert_eq!(location, format!("{BASE_URL}/ticket/{ticket_id}"));

    // Returning does not issue or send anything new.
    assert_eq!(app.store.ticket_count().await, 1);
    assert_eq!(app.notifier.count(), 1);
}

#[tokio::test]
async fn test_declined_payment_returns_to_failure_page() {
    let app = phonepe_app().await;
    seed_order(&app, "TXNdecl").await;

    let (status, body) = notify_gateway_result(&app, "TXNdecl", "PAYMENT_DECLINED").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "failed");

    let location = return_to(&app, "/payment-return?merchantTransactionId=TXNdecl").await;
    assert_eq!(location, format!("{BASE_URL}/payment-failed"));
    assert_eq!(app.store.ticket_count().await, 0);
}

#[tokio::test]
async fn test_pending_order_with_unreachable_gateway_is_left_untouched() {
    let app = phonepe_app().await;
    let order = seed_order(&app, "TXNwait").await;

    let location = return_to(&app, "/payment-return?merchantTransactionId=TXNwait").await;
    assert_eq!(location, format!("{BASE_URL}/payment-failed"));

    let stored = app.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Pending);
    assert_eq!(app.store.ticket_count().await, 0);

    // The notification still settles it afterwards.
    let (status, body) = notify_gateway_result(&app, "TXNwait", "PAYMENT_SUCCESS").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["replayed"], false);
    assert_eq!(app.store.ticket_count().await, 1);
}

#[tokio::test]
async fn test_completed_order_without_ticket_is_issued_one_on_return() {
    let app = phonepe_app().await;
    let order = seed_order(&app, "TXNbare").await;
    app.store
        .complete_order(&OrderCompletion {
            gateway_order_id: "TXNbare".into(),
            payment_id: "T9".into(),
            signature: "checksum###1".into(),
            status: PaymentStatus::Completed,
        })
        .await
        .unwrap()
        .unwrap();

    let location = return_to(&app, "/payment-return?merchantTransactionId=TXNbare").await;
    let ticket_id = location.trim_start_matches(&format!("{BASE_URL}/ticket/"));
    let (status, _, body) = app.get(&format!("/tickets/by-id/{ticket_id}")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["orderId"], order.id.to_string());
    assert_eq!(app.notifier.count(), 1);

    // A second return reuses the same ticket.
    let again = return_to(&app, "/payment-return?merchantTransactionId=TXNbare").await;
    assert_eq!(again, location);
    assert_eq!(app.store.ticket_count().await, 1);
    assert_eq!(app.notifier.count(), 1);
}

#[tokio::test]
async fn test_unknown_or_missing_reference_goes_to_failure_page() {
    let app = phonepe_app().await;
    let failed = format!("{BASE_URL}/payment-failed");

    assert_eq!(
        return_to(&app, "/payment-return?merchantTransactionId=TXNnope").await,
        failed
    );
    assert_eq!(return_to(&app, "/payment-return").await, failed);
}
