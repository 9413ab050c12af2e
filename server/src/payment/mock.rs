//! Sandbox gateway for local development.
//!
//! Nothing leaves the process: checkout redirects to a locally served page
//! whose links call the regular callback endpoint with a fixed checksum.

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    Checkout, CheckoutAction, PaymentAdapter, PaymentError, PaymentOutcome, PaymentProvider,
    PaymentRequest, RawCallback, RemoteStatus, VerifiedPayment,
};

pub const MOCK_CHECKSUM: &str = "MOCK_CHECKSUM";
pub const MOCK_ORDER_PREFIX: &str = "MOCK_";

pub struct MockGateway {
    base_url: String,
}

impl MockGateway {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Whether `id` looks like a reference minted by [`MockGateway`].
pub fn is_mock_reference(id: &str) -> bool {
    id.strip_prefix(MOCK_ORDER_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Callback URL the sandbox page links to for a simulated outcome.
pub fn callback_link(transaction_id: &str, code: &str, provider_reference: &str) -> String {
    format!(
        "/payment-callback?merchantTransactionId={transaction_id}&code={code}\
         &providerReferenceId={provider_reference}&checksum={MOCK_CHECKSUM}"
    )
}

#[async_trait]
impl PaymentAdapter for MockGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Mock
    }

    async fn create_payment(&self, request: &PaymentRequest) -> Result<Checkout, PaymentError> {
        let transaction_id = format!("{MOCK_ORDER_PREFIX}{}", Uuid::new_v4().simple());
        let url = format!(
            "{}/mock-payment?transactionId={}&amount={}",
            self.base_url, transaction_id, request.amount_minor
        );

        tracing::info!(gateway_order_id = %transaction_id, "Sandbox payment created");

        Ok(Checkout {
            provider: PaymentProvider::Mock,
            gateway_order_id: transaction_id,
            amount: request.amount_minor,
            currency: request.currency.clone(),
            action: CheckoutAction::Redirect { url },
        })
    }

    fn verify_callback(&self, callback: &RawCallback) -> Result<VerifiedPayment, PaymentError> {
        let transaction_id = callback.field("merchantTransactionId")?;
        let code = callback.field("code")?;
        let checksum = callback
            .fields
            .get("checksum")
            .map(String::as_str)
            .or(callback.signature_header.as_deref())
            .ok_or(PaymentError::MissingField("checksum"))?;

        if !constant_time_eq::constant_time_eq(checksum.as_bytes(), MOCK_CHECKSUM.as_bytes()) {
            return Err(PaymentError::SignatureMismatch);
        }

        let payment_id = callback
            .field("providerReferenceId")
            .map(str::to_string)
            .unwrap_or_else(|_| format!("MOCK_PAY_{transaction_id}"));

        let outcome = match code {
            "PAYMENT_SUCCESS" => PaymentOutcome::Succeeded,
            "PAYMENT_PENDING" => PaymentOutcome::Pending,
            _ => PaymentOutcome::Failed,
        };

        Ok(VerifiedPayment {
            gateway_order_id: transaction_id.to_string(),
            payment_id,
            proof: checksum.to_string(),
            outcome,
        })
    }

    async fn fetch_status(
        &self,
        _gateway_order_id: &str,
    ) -> Result<Option<RemoteStatus>, PaymentError> {
        Ok(None)
    }
}
