//! Gateway callback pipeline: verify, settle, issue, notify.

use serde::Serialize;
use uuid::Uuid;

use super::{orders, qr, tickets};
use crate::models::{Order, OrderCompletion, PaymentStatus, Ticket, Transition};
use crate::notify::{NotifyError, TicketNotification};
use crate::payment::{PaymentOutcome, RawCallback, VerifiedPayment};
use crate::utils::error::AppError;
use crate::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResult {
    pub order: Order,
    pub outcome: PaymentOutcome,
    pub ticket: Option<Ticket>,
    /// The order was already settled when this callback arrived.
    pub replayed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub async fn handle_callback(
    state: &AppState,
    callback: &RawCallback,
) -> Result<CallbackResult, AppError> {
    let verified = state.payments.verify_callback(callback)?;

    tracing::info!(
        gateway = %state.payments.provider(),
        gateway_order_id = %verified.gateway_order_id,
        outcome = ?verified.outcome,
        "Payment callback verified"
    );

    match verified.outcome {
        PaymentOutcome::Succeeded => settle_success(state, verified).await,
        PaymentOutcome::Failed => {
            let completed = orders::complete_order(
                state.store.as_ref(),
                &completion(verified, PaymentStatus::Failed),
            )
            .await?;

            Ok(CallbackResult {
                replayed: completed.transition == Transition::AlreadySettled,
                outcome: outcome_of(&completed.order),
                order: completed.order,
                ticket: None,
                warning: None,
            })
        }
        PaymentOutcome::Pending => {
            let order = state
                .store
                .order_by_gateway_reference(&verified.gateway_order_id)
                .await?
                .ok_or(AppError::OrderNotFound(verified.gateway_order_id))?;

            Ok(CallbackResult {
                replayed: order.payment_status.is_terminal(),
                order,
                outcome: PaymentOutcome::Pending,
                ticket: None,
                warning: None,
            })
        }
    }
}

/// The outcome the order actually holds, which differs from the callback's
/// when the order was already settled.
fn outcome_of(order: &Order) -> PaymentOutcome {
    match order.payment_status {
        PaymentStatus::Completed => PaymentOutcome::Succeeded,
        PaymentStatus::Failed => PaymentOutcome::Failed,
        PaymentStatus::Pending => PaymentOutcome::Pending,
    }
}

fn completion(verified: VerifiedPayment, status: PaymentStatus) -> OrderCompletion {
    OrderCompletion {
        gateway_order_id: verified.gateway_order_id,
        payment_id: verified.payment_id,
        signature: verified.proof,
        status,
    }
}

async fn settle_success(
    state: &AppState,
    verified: VerifiedPayment,
) -> Result<CallbackResult, AppError> {
    let gateway_order_id = verified.gateway_order_id.clone();
    let settlement = state
        .store
        .settle_payment(
            &completion(verified, PaymentStatus::Completed),
            tickets::generate_token(),
        )
        .await?
        .ok_or(AppError::OrderNotFound(gateway_order_id))?;

    let replayed = settlement.transition == Transition::AlreadySettled;
    let mut warning = None;

    if let Some(issued) = &settlement.ticket {
        if issued.newly_issued {
            tracing::info!(
                order_id = %settlement.order.id,
                ticket_id = %issued.ticket.id,
                "Payment settled and ticket issued"
            );
            warning = deliver(state, &issued.ticket).await;
        }
    } else {
        tracing::warn!(
            order_id = %settlement.order.id,
            status = %settlement.order.payment_status,
            "Success callback for an order that is not completed"
        );
    }

    Ok(CallbackResult {
        outcome: outcome_of(&settlement.order),
        order: settlement.order,
        ticket: settlement.ticket.map(|issued| issued.ticket),
        replayed,
        warning,
    })
}

/// Where a payer coming back from the gateway's hosted page is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnDestination {
    Ticket(Uuid),
    Failed,
}

/// Resolves a browser return by gateway reference. The signed notification
/// can arrive after the payer does, so a pending order is settled when the
/// gateway's status API reports it paid.
pub async fn resolve_return(
    state: &AppState,
    gateway_order_id: &str,
) -> Result<ReturnDestination, AppError> {
    let order = state
        .store
        .order_by_gateway_reference(gateway_order_id)
        .await?
        .ok_or_else(|| AppError::OrderNotFound(gateway_order_id.to_string()))?;

    match order.payment_status {
        PaymentStatus::Completed => {
            let issued = tickets::issue_ticket(state.store.as_ref(), &order).await?;
            if issued.newly_issued {
                deliver(state, &issued.ticket).await;
            }
            Ok(ReturnDestination::Ticket(issued.ticket.id))
        }
        PaymentStatus::Failed => Ok(ReturnDestination::Failed),
        PaymentStatus::Pending => {
            let Some(remote) = state.payments.fetch_status(gateway_order_id).await? else {
                return Ok(ReturnDestination::Failed);
            };
            if !remote.paid {
                tracing::info!(
                    gateway_order_id,
                    status = %remote.status,
                    "Payer returned before the payment completed"
                );
                return Ok(ReturnDestination::Failed);
            }

            let verified = VerifiedPayment {
                gateway_order_id: gateway_order_id.to_string(),
                payment_id: remote
                    .payment_id
                    .unwrap_or_else(|| gateway_order_id.to_string()),
                proof: format!("status:{}", remote.status),
                outcome: PaymentOutcome::Succeeded,
            };
            let result = settle_success(state, verified).await?;
            Ok(result
                .ticket
                .map_or(ReturnDestination::Failed, |ticket| {
                    ReturnDestination::Ticket(ticket.id)
                }))
        }
    }
}

/// Sends the ticket email. A failure is logged and returned as the warning
/// to surface to the caller.
async fn deliver(state: &AppState, ticket: &Ticket) -> Option<String> {
    let Err(e) = notify(state, ticket).await else {
        return None;
    };
    tracing::warn!(ticket_id = %ticket.id, error = %e, "Ticket email not delivered");
    Some(format!("Ticket issued but the confirmation email failed: {e}"))
}

async fn notify(state: &AppState, ticket: &Ticket) -> Result<(), NotifyError> {
    let details = state
        .store
        .ticket_by_id(ticket.id)
        .await
        .map_err(|e| NotifyError::Build(e.to_string()))?
        .ok_or_else(|| NotifyError::Build(format!("ticket {} vanished", ticket.id)))?;
    let qr_svg = qr::render_svg(&details.qr_token).map_err(|e| NotifyError::Build(e.to_string()))?;

    let notification = TicketNotification {
        to_email: details.attendee_email,
        to_name: details.attendee_name,
        event_name: details.event_name,
        event_date: details.event_date,
        venue: details.venue,
        ticket_id: details.id,
        qr_token: details.qr_token,
        ticket_url: format!("{}/ticket/{}", state.settings.base_url, details.id),
        qr_svg,
    };

    tokio::time::timeout(
        state.settings.notify_timeout,
        state.notifier.send_ticket(&notification),
    )
    .await
    .map_err(|_| NotifyError::Timeout)?
}
