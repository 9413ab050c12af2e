use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::signature::verify_hmac_sha256_hex;
use super::{
    read_json, with_single_retry, Checkout, CheckoutAction, PaymentAdapter, PaymentError,
    PaymentOutcome, PaymentProvider, PaymentRequest, Prefill, RawCallback, RemoteStatus,
    VerifiedPayment,
};

const RAZORPAY_API_BASE: &str = "https://api.razorpay.com";

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: String,
    notes: OrderNotes<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderNotes<'a> {
    event_id: String,
    email: &'a str,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct RazorpayOrder {
    id: String,
    amount: i64,
    currency: String,
    status: String,
}

pub struct RazorpayGateway {
    client: reqwest::Client,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn new(client: reqwest::Client, key_id: String, key_secret: String) -> Self {
        Self {
            client,
            key_id,
            key_secret,
        }
    }

    async fn get_order(&self, order_id: &str) -> Result<RazorpayOrder, PaymentError> {
        let resp = self
            .client
            .get(format!("{RAZORPAY_API_BASE}/v1/orders/{order_id}"))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;
        read_json(resp).await
    }
}

#[async_trait]
impl PaymentAdapter for RazorpayGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Razorpay
    }

    async fn create_payment(&self, request: &PaymentRequest) -> Result<Checkout, PaymentError> {
        let body = CreateOrderRequest {
            amount: request.amount_minor,
            currency: &request.currency,
            receipt: format!("receipt_{}", Utc::now().timestamp_millis()),
            notes: OrderNotes {
                event_id: request.event_id.to_string(),
                email: &request.customer.email,
                name: &request.customer.name,
            },
        };

        let resp = self
            .client
            .post(format!("{RAZORPAY_API_BASE}/v1/orders"))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await?;
        let order: RazorpayOrder = read_json(resp).await?;

        tracing::info!(gateway_order_id = %order.id, amount = order.amount, "Razorpay order created");

        Ok(Checkout {
            provider: PaymentProvider::Razorpay,
            gateway_order_id: order.id.clone(),
            amount: order.amount,
            currency: order.currency,
            action: CheckoutAction::Open {
                key_id: self.key_id.clone(),
                order_id: order.id,
                prefill: Prefill {
                    name: request.customer.name.clone(),
                    email: request.customer.email.clone(),
                    contact: request.customer.phone.clone(),
                },
            },
        })
    }

    fn verify_callback(&self, callback: &RawCallback) -> Result<VerifiedPayment, PaymentError> {
        let order_id = callback.field("razorpay_order_id")?;
        let payment_id = callback.field("razorpay_payment_id")?;
        let signature = callback.field("razorpay_signature")?;

        let signed = format!("{order_id}|{payment_id}");
        if !verify_hmac_sha256_hex(&self.key_secret, &signed, signature) {
            return Err(PaymentError::SignatureMismatch);
        }

        // Checkout only signs successful payments.
        Ok(VerifiedPayment {
            gateway_order_id: order_id.to_string(),
            payment_id: payment_id.to_string(),
            proof: signature.to_string(),
            outcome: PaymentOutcome::Succeeded,
        })
    }

    async fn fetch_status(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<RemoteStatus>, PaymentError> {
        let order = with_single_retry("razorpay_order_status", || self.get_order(gateway_order_id))
            .await?;

        Ok(Some(RemoteStatus {
            paid: order.status == "paid",
            status: order.status,
            payment_id: None,
        }))
    }
}
