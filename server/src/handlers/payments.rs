use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::cors::X_VERIFY;
use crate::notify::escape_html;
use crate::payment::mock::{callback_link, is_mock_reference};
use crate::payment::{PaymentOutcome, PaymentProvider, RawCallback};
use crate::services::payments::{self, CallbackResult, ReturnDestination};
use crate::utils::error::AppError;
use crate::utils::response::success;
use crate::AppState;

fn signature_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_VERIFY)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Flattens a JSON object or an urlencoded form into string fields.
fn callback_fields(headers: &HeaderMap, body: &[u8]) -> Result<HashMap<String, String>, AppError> {
    let is_form = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        return serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
            .map(|pairs| pairs.into_iter().collect())
            .map_err(|e| AppError::ValidationError(format!("Invalid form body: {e}")));
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::ValidationError(format!("Invalid JSON body: {e}")))?;
    let Value::Object(map) = value else {
        return Err(AppError::ValidationError(
            "Callback body must be a JSON object".to_string(),
        ));
    };

    Ok(map
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some((key, s)),
            Value::Null => None,
            other => Some((key, other.to_string())),
        })
        .collect())
}

fn result_message(result: &CallbackResult) -> &'static str {
    match (result.outcome, result.replayed) {
        (PaymentOutcome::Succeeded, false) => "Payment verified successfully",
        (PaymentOutcome::Succeeded, true) => "Payment already processed",
        (PaymentOutcome::Failed, _) => "Payment failed",
        (PaymentOutcome::Pending, _) => "Payment pending",
    }
}

pub async fn payment_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let callback = RawCallback {
        fields: callback_fields(&headers, &body)?,
        signature_header: signature_header(&headers),
    };

    let result = payments::handle_callback(&state, &callback).await?;
    let message = result_message(&result);
    Ok(success(result, message).into_response())
}

/// Browser-facing variant: the gateway redirects the payer here, and the
/// payer is sent on to the ticket page or the failure page.
pub async fn payment_redirect(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Redirect {
    let base_url = &state.settings.base_url;
    let failed = Redirect::to(&format!("{base_url}/payment-failed"));

    let Ok(Query(fields)) = query else {
        return failed;
    };
    let callback = RawCallback {
        fields,
        signature_header: signature_header(&headers),
    };

    match payments::handle_callback(&state, &callback).await {
        Ok(CallbackResult {
            outcome: PaymentOutcome::Succeeded,
            ticket: Some(ticket),
            ..
        }) => Redirect::to(&format!("{base_url}/ticket/{}", ticket.id)),
        Ok(result) => {
            tracing::info!(order_id = %result.order.id, outcome = ?result.outcome, "Payment not completed");
            failed
        }
        Err(e) => {
            tracing::warn!(code = e.code(), error = %e, "Payment redirect rejected");
            failed
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReturnQuery {
    pub merchant_transaction_id: String,
}

/// Landing route for payers coming back from a hosted payment page. It
/// carries no signed payload, so the order is resolved from the store and,
/// if still pending, the gateway's status API.
pub async fn payment_return(
    State(state): State<AppState>,
    query: Result<Query<PaymentReturnQuery>, QueryRejection>,
) -> Redirect {
    let base_url = &state.settings.base_url;
    let failed = Redirect::to(&format!("{base_url}/payment-failed"));

    let Ok(Query(query)) = query else {
        return failed;
    };

    match payments::resolve_return(&state, &query.merchant_transaction_id).await {
        Ok(ReturnDestination::Ticket(id)) => Redirect::to(&format!("{base_url}/ticket/{id}")),
        Ok(ReturnDestination::Failed) => failed,
        Err(e) => {
            tracing::warn!(
                code = e.code(),
                error = %e,
                gateway_order_id = %query.merchant_transaction_id,
                "Payment return could not be resolved"
            );
            failed
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockPaymentQuery {
    pub transaction_id: String,
    pub amount: i64,
}

/// Sandbox checkout page served while the mock gateway is active.
pub async fn mock_payment_page(
    State(state): State<AppState>,
    query: Result<Query<MockPaymentQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    if state.payments.provider() != PaymentProvider::Mock {
        return Err(AppError::NotFound("Sandbox payments are disabled".to_string()));
    }

    let Query(query) = query?;
    if !is_mock_reference(&query.transaction_id) {
        return Err(AppError::ValidationError(
            "transactionId is not a sandbox reference".to_string(),
        ));
    }

    let provider_reference = format!("MOCK_PAY_{}", Uuid::new_v4().simple());
    let succeed = callback_link(&query.transaction_id, "PAYMENT_SUCCESS", &provider_reference);
    let fail = callback_link(&query.transaction_id, "PAYMENT_DECLINED", &provider_reference);

    Ok(Html(mock_page(&query.transaction_id, query.amount, &succeed, &fail)).into_response())
}

fn mock_page(transaction_id: &str, amount_minor: i64, succeed: &str, fail: &str) -> String {
    let amount = format!("{}.{:02}", amount_minor / 100, (amount_minor % 100).abs());
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Sandbox Payment</title>
  <style>
    body {{ font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; background: #f1f3f5;
           min-height: 100vh; display: flex; align-items: center; justify-content: center; margin: 0; }}
    .card {{ background: white; border-radius: 16px; padding: 40px; max-width: 420px; width: 100%;
            box-shadow: 0 10px 40px rgba(0,0,0,0.15); text-align: center; }}
    .amount {{ font-size: 40px; font-weight: 800; margin: 24px 0; }}
    .ref {{ font-family: 'Courier New', monospace; font-size: 13px; color: #495057; word-break: break-all; }}
    .notice {{ background: #fff3cd; padding: 12px; border-radius: 8px; color: #856404; font-size: 14px; margin: 24px 0; }}
    a {{ display: block; padding: 16px; margin-top: 12px; border-radius: 10px; color: white;
        text-decoration: none; font-weight: 600; }}
    .pay {{ background: #5f3dc4; }}
    .fail {{ background: #e03131; }}
  </style>
</head>
<body>
  <div class="card">
    <h1>Sandbox Payment</h1>
    <div class="amount">&#8377;{amount}</div>
    <div class="ref">Transaction: {transaction_id}</div>
    <div class="notice">Test mode. No money will be charged.</div>
    <a class="pay" href="{succeed}">Simulate successful payment</a>
    <a class="fail" href="{fail}">Simulate failed payment</a>
  </div>
</body>
</html>
"#,
        succeed = escape_html(succeed),
        fail = escape_html(fail),
    )
}
