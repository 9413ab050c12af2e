//! Payment gateway adapters.
//!
//! Each gateway builds the outbound payment request and authenticates the
//! callback that later reports its outcome. The active gateway is picked
//! from configuration at startup (see [`build_adapter`]).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{Config, GatewayConfig};

pub mod mock;
pub mod phonepe;
pub mod razorpay;
pub mod signature;

pub use mock::MockGateway;
pub use phonepe::PhonePeGateway;
pub use razorpay::RazorpayGateway;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("missing callback field '{0}'")]
    MissingField(&'static str),

    #[error("callback signature mismatch")]
    SignatureMismatch,

    #[error("malformed callback: {0}")]
    MalformedCallback(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway api error status={status} body={body}")]
    Api { status: u16, body: String },

    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Razorpay,
    PhonePe,
    Mock,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Razorpay => "razorpay",
            PaymentProvider::PhonePe => "phonepe",
            PaymentProvider::Mock => "mock",
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub event_id: Uuid,
    /// Amount in the currency's minor unit (paise for INR).
    pub amount_minor: i64,
    pub currency: String,
    pub customer: Customer,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prefill {
    pub name: String,
    pub email: String,
    pub contact: Option<String>,
}

/// What the client does next to pay.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CheckoutAction {
    /// Open the gateway's embedded checkout with these parameters.
    #[serde(rename_all = "camelCase")]
    Open {
        key_id: String,
        order_id: String,
        prefill: Prefill,
    },
    /// Send the browser to a hosted payment page.
    Redirect { url: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkout {
    pub provider: PaymentProvider,
    pub gateway_order_id: String,
    pub amount: i64,
    pub currency: String,
    pub action: CheckoutAction,
}

/// A callback as received, before any authentication: flat string fields
/// from the body or query string, plus the signature header if one was sent.
#[derive(Debug, Clone, Default)]
pub struct RawCallback {
    pub fields: HashMap<String, String>,
    pub signature_header: Option<String>,
}

impl RawCallback {
    pub fn field(&self, name: &'static str) -> Result<&str, PaymentError> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .ok_or(PaymentError::MissingField(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
    Pending,
}

/// A callback whose authenticity has been established.
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    pub gateway_order_id: String,
    pub payment_id: String,
    pub proof: String,
    pub outcome: PaymentOutcome,
}

/// The gateway's own view of a payment, from a status lookup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStatus {
    pub status: String,
    pub paid: bool,
    /// Gateway-side payment id, when the lookup reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
}

#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    /// Registers the payment with the gateway. Not idempotent, never retried.
    async fn create_payment(&self, request: &PaymentRequest) -> Result<Checkout, PaymentError>;

    /// Authenticates a callback. Must not have side effects.
    fn verify_callback(&self, callback: &RawCallback) -> Result<VerifiedPayment, PaymentError>;

    /// Looks the payment up on the gateway. `None` when the gateway has no
    /// status API.
    async fn fetch_status(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<RemoteStatus>, PaymentError>;
}

/// Runs an idempotent gateway read, retrying once if the request itself
/// failed (timeouts, connection errors). API errors are not retried.
pub(crate) async fn with_single_retry<T, F, Fut>(
    operation: &'static str,
    mut call: F,
) -> Result<T, PaymentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PaymentError>>,
{
    match call().await {
        Err(PaymentError::Http(e)) => {
            tracing::warn!(operation, error = %e, "Gateway request failed, retrying once");
            call().await
        }
        other => other,
    }
}

pub(crate) async fn read_json<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, PaymentError> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(PaymentError::Api {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str::<T>(&body)
        .map_err(|e| PaymentError::InvalidResponse(format!("{e}; body={body}")))
}

pub fn build_adapter(config: &Config) -> Result<Arc<dyn PaymentAdapter>, PaymentError> {
    let client = reqwest::Client::builder()
        .timeout(config.gateway_timeout)
        .build()?;

    let adapter: Arc<dyn PaymentAdapter> = match &config.gateway {
        GatewayConfig::Razorpay { key_id, key_secret } => Arc::new(RazorpayGateway::new(
            client,
            key_id.clone(),
            key_secret.clone(),
        )),
        GatewayConfig::PhonePe {
            merchant_id,
            salt_key,
            salt_index,
            host,
        } => Arc::new(PhonePeGateway::new(
            client,
            merchant_id.clone(),
            salt_key.clone(),
            salt_index.clone(),
            host.clone(),
            config.base_url.clone(),
        )),
        GatewayConfig::Mock => Arc::new(MockGateway::new(config.base_url.clone())),
    };

    tracing::info!(provider = %adapter.provider(), "Payment gateway configured");
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_raw_callback_treats_empty_field_as_missing() {
        let mut callback = RawCallback::default();
        callback.fields.insert("code".into(), String::new());
        assert!(matches!(
            callback.field("code"),
            Err(PaymentError::MissingField("code"))
        ));
    }

    #[test]
    fn test_checkout_action_serializes_with_type_tag() {
        let action = CheckoutAction::Redirect {
            url: "http://localhost/pay".into(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "redirect");
        assert_eq!(json["url"], "http://localhost/pay");
    }

    #[tokio::test]
    async fn test_retry_does_not_repeat_api_errors() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), PaymentError> = with_single_retry("status", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(PaymentError::Api {
                    status: 500,
                    body: "boom".into(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
