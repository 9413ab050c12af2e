mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;

use common::{mock_callback, RecordingNotifier, TestApp, BASE_URL};
use eventpass_server::models::NewOrder;
use eventpass_server::payment::mock::{callback_link, MOCK_CHECKSUM};
use eventpass_server::payment::signature::hmac_sha256_hex;
use eventpass_server::payment::RazorpayGateway;
use eventpass_server::store::Store;

#[tokio::test]
async fn test_order_charges_event_price_in_minor_units() {
    let app = TestApp::new().await;
    let order = app.place_order().await;

    assert_eq!(order["amount"], 20000);
    assert_eq!(order["currency"], "INR");
    assert_eq!(order["provider"], "mock");
    assert_eq!(order["action"]["type"], "redirect");
    assert!(order["gatewayOrderId"].as_str().unwrap().starts_with("MOCK_"));

    let (status, _, body) = app
        .get(&format!("/orders/{}", order["orderId"].as_str().unwrap()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order"]["paymentStatus"], "pending");
    assert_eq!(
        body["data"]["order"]["amount"]
            .as_str()
            .unwrap()
            .parse::<Decimal>()
            .unwrap(),
        Decimal::new(20000, 2)
    );
    assert!(body["data"]["order"].get("signature").is_none());
}

#[tokio::test]
async fn test_invalid_email_persists_nothing() {
    let app = TestApp::new().await;
    let (status, body) = app
        .post_json(
            "/orders",
            json!({ "eventId": app.event.id, "name": "Asha", "email": "not-an-email" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(app.store.order_count().await, 0);
}

#[tokio::test]
async fn test_missing_fields_and_mismatched_amount_are_rejected() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post_json("/orders", json!({ "eventId": app.event.id, "name": "Asha" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = app
        .post_json(
            "/orders",
            json!({
                "eventId": app.event.id,
                "name": "Asha",
                "email": "asha@example.com",
                "amount": 1
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(app.store.order_count().await, 0);
}

#[tokio::test]
async fn test_unknown_event_is_not_found() {
    let app = TestApp::new().await;
    let (status, body) = app
        .post_json(
            "/orders",
            json!({
                "eventId": uuid::Uuid::new_v4(),
                "name": "Asha",
                "email": "asha@example.com"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_ids_are_answered_with_error_envelope() {
    let app = TestApp::new().await;

    for uri in ["/events/not-a-uuid", "/orders/42", "/tickets/by-id/zzz"] {
        let (status, headers, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("application/json"));
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR", "{uri}");
    }
}

#[tokio::test]
async fn test_successful_payment_issues_one_ticket_and_check_in_consumes_it() {
    let app = TestApp::new().await;
    let order = app.place_order().await;
    let transaction_id = order["gatewayOrderId"].as_str().unwrap();

    // The sandbox page links straight back to the redirect callback.
    let (status, headers, page) = app
        .get(&format!(
            "/mock-payment?transactionId={transaction_id}&amount=20000"
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.as_str().unwrap().contains("&#8377;200.00"));
    assert!(headers[header::CONTENT_SECURITY_POLICY]
        .to_str()
        .unwrap()
        .contains("style-src 'unsafe-inline'"));

    let link = callback_link(transaction_id, "PAYMENT_SUCCESS", "MOCK_PAY_1");
    let (status, headers, _) = app.get(&link).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let location = headers[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with(&format!("{BASE_URL}/ticket/")));
    let ticket_id = location.rsplit('/').next().unwrap();

    assert_eq!(app.store.ticket_count().await, 1);
    assert_eq!(app.notifier.count(), 1);
    {
        let sent = app.notifier.sent.lock().unwrap();
        assert_eq!(sent[0].to_email, "asha@example.com");
        assert_eq!(sent[0].ticket_url, location);
        assert!(sent[0].qr_svg.contains("<svg"));
    }

    let (status, _, body) = app.get(&format!("/tickets/by-id/{ticket_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["eventName"], "Monsoon Live");
    assert_eq!(body["data"]["attendeeName"], "Asha Rao");
    let token = body["data"]["qrToken"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 64);

    let (status, _, body) = app.get(&format!("/tickets/{token}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["valid"], true);

    let (status, headers, _) = app.get(&format!("/tickets/{token}/qr")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/svg+xml");

    let (status, body) = app.post_json("/check-in", json!({ "token": token })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["checkedIn"], true);
    assert_eq!(body["data"]["checkedInBy"], "unknown");
    let checked_in_at = body["data"]["checkedInAt"].clone();

    let (status, body) = app
        .post_json("/check-in", json!({ "token": token, "actor": "gate-2" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_CHECKED_IN");
    assert_eq!(body["error"]["details"]["checkedInAt"], checked_in_at);

    let (_, _, body) = app.get(&format!("/tickets/{token}")).await;
    assert_eq!(body["data"]["valid"], false);
}

#[tokio::test]
async fn test_replayed_callback_returns_same_ticket_without_second_email() {
    let app = TestApp::new().await;
    let order = app.place_order().await;
    let transaction_id = order["gatewayOrderId"].as_str().unwrap();
    let callback = mock_callback(transaction_id, "PAYMENT_SUCCESS", MOCK_CHECKSUM);

    let (status, first) = app.post_json("/payment-callback", callback.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["replayed"], false);
    assert_eq!(first["data"]["outcome"], "succeeded");
    assert_eq!(first["data"]["order"]["paymentStatus"], "completed");

    let (status, second) = app.post_json("/payment-callback", callback).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["replayed"], true);
    assert_eq!(second["data"]["ticket"]["id"], first["data"]["ticket"]["id"]);
    assert_eq!(
        second["data"]["ticket"]["qrToken"],
        first["data"]["ticket"]["qrToken"]
    );

    assert_eq!(app.store.ticket_count().await, 1);
    assert_eq!(app.notifier.count(), 1);
}

#[tokio::test]
async fn test_tampered_checksum_leaves_order_pending() {
    let app = TestApp::new().await;
    let order = app.place_order().await;
    let transaction_id = order["gatewayOrderId"].as_str().unwrap();

    let (status, body) = app
        .post_json(
            "/payment-callback",
            mock_callback(transaction_id, "PAYMENT_SUCCESS", "MOCK_CHECKSUN"),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_SIGNATURE");

    let (_, _, body) = app
        .get(&format!("/orders/{}", order["orderId"].as_str().unwrap()))
        .await;
    assert_eq!(body["data"]["order"]["paymentStatus"], "pending");
    assert_eq!(app.store.ticket_count().await, 0);
    assert_eq!(app.notifier.count(), 0);
}

#[tokio::test]
async fn test_declined_payment_redirects_to_failure_page() {
    let app = TestApp::new().await;
    let order = app.place_order().await;
    let transaction_id = order["gatewayOrderId"].as_str().unwrap();

    let link = callback_link(transaction_id, "PAYMENT_DECLINED", "MOCK_PAY_1");
    let (status, headers, _) = app.get(&link).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(
        headers[header::LOCATION],
        format!("{BASE_URL}/payment-failed").as_str()
    );

    let (_, _, body) = app
        .get(&format!("/orders/{}", order["orderId"].as_str().unwrap()))
        .await;
    assert_eq!(body["data"]["order"]["paymentStatus"], "failed");

    // A late success for a failed order does not resurrect it.
    let (status, body) = app
        .post_json(
            "/payment-callback",
            mock_callback(transaction_id, "PAYMENT_SUCCESS", MOCK_CHECKSUM),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["replayed"], true);
    assert_eq!(body["data"]["outcome"], "failed");
    assert!(body["data"]["ticket"].is_null());
    assert_eq!(app.store.ticket_count().await, 0);
}

#[tokio::test]
async fn test_pending_callback_does_not_mutate_order() {
    let app = TestApp::new().await;
    let order = app.place_order().await;
    let transaction_id = order["gatewayOrderId"].as_str().unwrap();

    let (status, body) = app
        .post_json(
            "/payment-callback",
            mock_callback(transaction_id, "PAYMENT_PENDING", MOCK_CHECKSUM),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "pending");
    assert_eq!(body["data"]["order"]["paymentStatus"], "pending");
}

#[tokio::test]
async fn test_callback_for_unknown_order_is_not_found() {
    let app = TestApp::new().await;
    let (status, body) = app
        .post_json(
            "/payment-callback",
            mock_callback("MOCK_deadbeef", "PAYMENT_SUCCESS", MOCK_CHECKSUM),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "ORDER_NOT_FOUND");
}

#[tokio::test]
async fn test_notification_failure_is_reported_as_warning() {
    let app = TestApp::with_notifier(RecordingNotifier::failing()).await;
    let order = app.place_order().await;
    let transaction_id = order["gatewayOrderId"].as_str().unwrap();

    let (status, body) = app
        .post_json(
            "/payment-callback",
            mock_callback(transaction_id, "PAYMENT_SUCCESS", MOCK_CHECKSUM),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["warning"]
        .as_str()
        .unwrap()
        .contains("relay refused connection"));
    assert!(body["data"]["ticket"]["id"].is_string());
    assert_eq!(app.store.ticket_count().await, 1);
}

#[tokio::test]
async fn test_razorpay_form_callback_is_verified_by_hmac() {
    let gateway = RazorpayGateway::new(
        reqwest::Client::new(),
        "rzp_test_key".into(),
        "rzp_secret".into(),
    );
    let app = TestApp::with_gateway(Arc::new(gateway)).await;

    // Seed the order the gateway would have created.
    let order = app
        .store
        .create_order(NewOrder {
            event_id: app.event.id,
            name: "Asha Rao".into(),
            email: "asha@example.com".into(),
            phone: None,
            amount: app.event.price,
            gateway: "razorpay".into(),
            gateway_order_id: "order_A".into(),
        })
        .await
        .unwrap();

    let forged = format!(
        "razorpay_order_id=order_A&razorpay_payment_id=pay_B&razorpay_signature={}",
        hmac_sha256_hex("wrong_secret", "order_A|pay_B")
    );
    let request = Request::post("/payment-callback")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(forged))
        .unwrap();
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_SIGNATURE");

    let signed = format!(
        "razorpay_order_id=order_A&razorpay_payment_id=pay_B&razorpay_signature={}",
        hmac_sha256_hex("rzp_secret", "order_A|pay_B")
    );
    let request = Request::post("/payment-callback")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(signed))
        .unwrap();
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order"]["id"], order.id.to_string());
    assert_eq!(body["data"]["order"]["paymentId"], "pay_B");
    assert_eq!(app.store.ticket_count().await, 1);
}

#[tokio::test]
async fn test_mock_page_rejects_foreign_references() {
    let app = TestApp::new().await;
    let (status, _, body) = app
        .get("/mock-payment?transactionId=%3Cscript%3E&amount=100")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}
