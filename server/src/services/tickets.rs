use rand::rngs::OsRng;
use rand::RngCore;
use uuid::Uuid;

use super::qr;
use crate::models::{IssuedTicket, NewTicket, Order, PaymentStatus, TicketDetails};
use crate::store::Store;
use crate::utils::error::AppError;

const TOKEN_BYTES: usize = 32;

/// 256 bits from the OS generator, lowercase hex.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issues the ticket for a completed order. Calling it again for the same
/// order returns the ticket already issued.
pub async fn issue_ticket(store: &dyn Store, order: &Order) -> Result<IssuedTicket, AppError> {
    if order.payment_status != PaymentStatus::Completed {
        return Err(AppError::ValidationError(format!(
            "order {} is {}, tickets are only issued for completed orders",
            order.id, order.payment_status
        )));
    }

    let issued = store
        .issue_ticket(NewTicket {
            order_id: order.id,
            event_id: order.event_id,
            qr_token: generate_token(),
        })
        .await?;

    if issued.newly_issued {
        tracing::info!(order_id = %order.id, ticket_id = %issued.ticket.id, "Ticket issued");
    } else {
        tracing::debug!(order_id = %order.id, "Ticket already issued for order");
    }
    Ok(issued)
}

pub async fn ticket_by_id(store: &dyn Store, id: Uuid) -> Result<TicketDetails, AppError> {
    store.ticket_by_id(id).await?.ok_or(AppError::TicketNotFound)
}

pub async fn ticket_qr(store: &dyn Store, token: &str) -> Result<String, AppError> {
    let ticket = store
        .ticket_by_token(token)
        .await?
        .ok_or(AppError::TicketNotFound)?;
    qr::render_svg(&ticket.qr_token)
}
