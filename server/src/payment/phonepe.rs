use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::signature::{salted_checksum, sha256_hex};
use super::{
    read_json, with_single_retry, Checkout, CheckoutAction, PaymentAdapter, PaymentError,
    PaymentOutcome, PaymentProvider, PaymentRequest, RawCallback, RemoteStatus, VerifiedPayment,
};

pub const DEFAULT_PHONEPE_HOST: &str = "https://api-preprod.phonepe.com/apis/pg-sandbox";

const PAY_ENDPOINT: &str = "/pg/v1/pay";
const SUCCESS_CODE: &str = "PAYMENT_SUCCESS";
const PENDING_CODE: &str = "PAYMENT_PENDING";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PayPayload<'a> {
    merchant_id: &'a str,
    merchant_transaction_id: &'a str,
    merchant_user_id: String,
    amount: i64,
    redirect_url: String,
    redirect_mode: &'static str,
    callback_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mobile_number: Option<&'a str>,
    payment_instrument: PaymentInstrument,
}

#[derive(Debug, Serialize)]
struct PaymentInstrument {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct PhonePeResponse {
    #[serde(default)]
    success: bool,
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallbackData {
    merchant_transaction_id: String,
    #[serde(default)]
    transaction_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DecodedCallback {
    code: String,
    data: CallbackData,
}

pub struct PhonePeGateway {
    client: reqwest::Client,
    merchant_id: String,
    salt_key: String,
    salt_index: String,
    host: String,
    base_url: String,
}

impl PhonePeGateway {
    pub fn new(
        client: reqwest::Client,
        merchant_id: String,
        salt_key: String,
        salt_index: String,
        host: String,
        base_url: String,
    ) -> Self {
        Self {
            client,
            merchant_id,
            salt_key,
            salt_index,
            host: host.trim_end_matches('/').to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The browser comes back to `/payment-return` by GET; the signed
    /// server-to-server notification goes to `/payment-callback`.
    fn pay_payload<'a>(
        &'a self,
        request: &'a PaymentRequest,
        transaction_id: &'a str,
    ) -> PayPayload<'a> {
        PayPayload {
            merchant_id: &self.merchant_id,
            merchant_transaction_id: transaction_id,
            merchant_user_id: format!("MUID{}", &sha256_hex(&request.customer.email)[..16]),
            amount: request.amount_minor,
            redirect_url: format!(
                "{}/payment-return?merchantTransactionId={transaction_id}",
                self.base_url
            ),
            redirect_mode: "REDIRECT",
            callback_url: format!("{}/payment-callback", self.base_url),
            mobile_number: request.customer.phone.as_deref(),
            payment_instrument: PaymentInstrument { kind: "PAY_PAGE" },
        }
    }

    fn checksum(&self, message: &str) -> String {
        salted_checksum(message, &self.salt_key, &self.salt_index)
    }

    async fn get_status(&self, merchant_transaction_id: &str) -> Result<PhonePeResponse, PaymentError> {
        let path = format!("/pg/v1/status/{}/{}", self.merchant_id, merchant_transaction_id);
        let resp = self
            .client
            .get(format!("{}{}", self.host, path))
            .header("X-VERIFY", self.checksum(&path))
            .header("X-MERCHANT-ID", &self.merchant_id)
            .header("accept", "application/json")
            .send()
            .await?;
        read_json(resp).await
    }
}

fn outcome_for(code: &str) -> PaymentOutcome {
    match code {
        SUCCESS_CODE => PaymentOutcome::Succeeded,
        PENDING_CODE => PaymentOutcome::Pending,
        _ => PaymentOutcome::Failed,
    }
}

#[async_trait]
impl PaymentAdapter for PhonePeGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::PhonePe
    }

    async fn create_payment(&self, request: &PaymentRequest) -> Result<Checkout, PaymentError> {
        let transaction_id = format!("TXN{}", Uuid::new_v4().simple());
        let payload = self.pay_payload(request, &transaction_id);
        let json = serde_json::to_vec(&payload)
            .map_err(|e| PaymentError::InvalidResponse(format!("cannot encode payload: {e}")))?;
        let encoded = STANDARD.encode(json);
        let checksum = self.checksum(&format!("{encoded}{PAY_ENDPOINT}"));

        let resp = self
            .client
            .post(format!("{}{}", self.host, PAY_ENDPOINT))
            .header("X-VERIFY", checksum)
            .header("accept", "application/json")
            .json(&serde_json::json!({ "request": encoded }))
            .send()
            .await?;
        let result: PhonePeResponse = read_json(resp).await?;

        if !result.success {
            return Err(PaymentError::Api {
                status: 200,
                body: result.message.unwrap_or(result.code),
            });
        }

        let url = result
            .data
            .as_ref()
            .and_then(|d| d.pointer("/instrumentResponse/redirectInfo/url"))
            .and_then(Value::as_str)
            .ok_or_else(|| PaymentError::InvalidResponse("missing redirect url".to_string()))?;

        tracing::info!(gateway_order_id = %transaction_id, "PhonePe payment initiated");

        Ok(Checkout {
            provider: PaymentProvider::PhonePe,
            gateway_order_id: transaction_id,
            amount: request.amount_minor,
            currency: request.currency.clone(),
            action: CheckoutAction::Redirect {
                url: url.to_string(),
            },
        })
    }

    fn verify_callback(&self, callback: &RawCallback) -> Result<VerifiedPayment, PaymentError> {
        let response = callback.field("response")?;
        let received = callback
            .signature_header
            .as_deref()
            .ok_or(PaymentError::MissingField("X-VERIFY"))?;

        let expected = self.checksum(response);
        if !constant_time_eq::constant_time_eq(expected.as_bytes(), received.as_bytes()) {
            return Err(PaymentError::SignatureMismatch);
        }

        let decoded = STANDARD
            .decode(response)
            .map_err(|e| PaymentError::MalformedCallback(format!("response is not base64: {e}")))?;
        let decoded: DecodedCallback = serde_json::from_slice(&decoded)
            .map_err(|e| PaymentError::MalformedCallback(e.to_string()))?;

        let payment_id = decoded
            .data
            .transaction_id
            .unwrap_or_else(|| decoded.data.merchant_transaction_id.clone());

        Ok(VerifiedPayment {
            gateway_order_id: decoded.data.merchant_transaction_id,
            payment_id,
            proof: received.to_string(),
            outcome: outcome_for(&decoded.code),
        })
    }

    async fn fetch_status(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<RemoteStatus>, PaymentError> {
        let result =
            with_single_retry("phonepe_status", || self.get_status(gateway_order_id)).await?;

        let payment_id = result
            .data
            .as_ref()
            .and_then(|d| d.get("transactionId"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Some(RemoteStatus {
            paid: result.code == SUCCESS_CODE,
            status: result.code,
            payment_id,
        }))
    }
}
