//! Order lifecycle: creation against the payment gateway, terminal
//! completion, and status lookup.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::events;
use crate::models::{CompletedOrder, NewOrder, Order, OrderCompletion, PaymentStatus};
use crate::payment::{Checkout, Customer, PaymentRequest, RemoteStatus};
use crate::store::Store;
use crate::utils::error::AppError;
use crate::AppState;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub event_id: Uuid,

    #[validate(length(min = 1, max = 200, message = "name is required (max 200 characters)"))]
    pub name: String,

    #[validate(email(message = "email must be a valid address"))]
    pub email: String,

    #[validate(length(max = 20, message = "phone must be at most 20 characters"))]
    pub phone: Option<String>,

    /// Price the client saw. Only checked against the event, never charged.
    pub amount: Option<Decimal>,
}

impl CreateOrderRequest {
    fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self
                .phone
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            ..self
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCheckout {
    pub order_id: Uuid,
    #[serde(flatten)]
    pub checkout: Checkout,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusView {
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_status: Option<RemoteStatus>,
}

/// Price in the currency's minor unit (major × 100).
pub fn to_minor_units(price: Decimal) -> Result<i64, AppError> {
    (price * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| AppError::InternalServerError(format!("price {price} out of range")))
}

pub async fn create_order(
    state: &AppState,
    request: CreateOrderRequest,
) -> Result<OrderCheckout, AppError> {
    let request = request.normalized();
    request.validate()?;

    let event = events::get_event(state.store.as_ref(), request.event_id).await?;

    if let Some(amount) = request.amount {
        if amount != event.price {
            return Err(AppError::ValidationError(format!(
                "amount {amount} does not match the event price {}",
                event.price
            )));
        }
    }

    let checkout = state
        .payments
        .create_payment(&PaymentRequest {
            event_id: event.id,
            amount_minor: to_minor_units(event.price)?,
            currency: state.settings.currency.clone(),
            customer: Customer {
                name: request.name.clone(),
                email: request.email.clone(),
                phone: request.phone.clone(),
            },
        })
        .await?;

    let order = state
        .store
        .create_order(NewOrder {
            event_id: event.id,
            name: request.name,
            email: request.email,
            phone: request.phone,
            amount: event.price,
            gateway: checkout.provider.as_str().to_string(),
            gateway_order_id: checkout.gateway_order_id.clone(),
        })
        .await?;

    tracing::info!(
        order_id = %order.id,
        event_id = %event.id,
        gateway = %checkout.provider,
        gateway_order_id = %order.gateway_order_id,
        "Order created"
    );

    Ok(OrderCheckout {
        order_id: order.id,
        checkout,
    })
}

/// Applies a verified terminal outcome to the order. An already terminal
/// order comes back unchanged.
pub async fn complete_order(
    store: &dyn Store,
    completion: &OrderCompletion,
) -> Result<CompletedOrder, AppError> {
    if !completion.status.is_terminal() {
        return Err(AppError::ValidationError(
            "an order can only be completed with a terminal status".to_string(),
        ));
    }

    let completed = store
        .complete_order(completion)
        .await?
        .ok_or_else(|| AppError::OrderNotFound(completion.gateway_order_id.clone()))?;

    tracing::info!(
        order_id = %completed.order.id,
        status = %completed.order.payment_status,
        transition = ?completed.transition,
        "Order completion processed"
    );
    Ok(completed)
}

pub async fn order_status(state: &AppState, id: Uuid) -> Result<OrderStatusView, AppError> {
    let order = state
        .store
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::OrderNotFound(id.to_string()))?;

    let gateway_status = if order.payment_status == PaymentStatus::Pending {
        match state.payments.fetch_status(&order.gateway_order_id).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Gateway status lookup failed");
                None
            }
        }
    } else {
        None
    };

    Ok(OrderStatusView {
        order,
        gateway_status,
    })
}
