//! Persistence for events, orders and tickets.
//!
//! Every operation that must hold under concurrent requests (settling an
//! order, issuing a ticket, checking a ticket in) is a single atomic step in
//! the backend, so callers never do read-then-write themselves.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    CheckInOutcome, CompletedOrder, Event, EventStats, IssuedTicket, NewOrder, NewTicket, Order,
    OrderCompletion, OrderSummary, TicketDetails, Transition,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unique constraint violated on {0}")]
    Duplicate(String),

    #[error("inconsistent row: {0}")]
    Inconsistent(String),
}

/// Outcome of settling a successful payment: the order after the
/// transition and, when the order is completed, its (single) ticket.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub order: Order,
    pub transition: Transition,
    pub ticket: Option<IssuedTicket>,
}

impl Settlement {
    pub(crate) fn from_completion(completed: CompletedOrder, ticket: Option<IssuedTicket>) -> Self {
        Self {
            order: completed.order,
            transition: completed.transition,
            ticket,
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Events ordered by date, soonest first.
    async fn list_events(&self) -> Result<Vec<Event>, StoreError>;

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, StoreError>;

    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    async fn order_by_gateway_reference(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<Order>, StoreError>;

    /// Moves a pending order to the completion's terminal status. A terminal
    /// order is returned untouched as [`Transition::AlreadySettled`].
    /// `None` when no order carries the gateway reference.
    async fn complete_order(
        &self,
        completion: &OrderCompletion,
    ) -> Result<Option<CompletedOrder>, StoreError>;

    /// Inserts the ticket unless the order already has one, in which case
    /// the existing ticket is returned with `newly_issued = false`.
    ///
    /// Callbacks issue through [`Store::settle_payment`]; this standalone
    /// form serves orders that are already completed, such as a payer
    /// returning from the gateway.
    async fn issue_ticket(&self, ticket: NewTicket) -> Result<IssuedTicket, StoreError>;

    /// `complete_order` followed by `issue_ticket` (when the order ends up
    /// completed) as one atomic unit. `qr_token` is only used if a ticket is
    /// actually created.
    async fn settle_payment(
        &self,
        completion: &OrderCompletion,
        qr_token: String,
    ) -> Result<Option<Settlement>, StoreError>;

    async fn ticket_by_token(&self, token: &str) -> Result<Option<TicketDetails>, StoreError>;

    async fn ticket_by_id(&self, id: Uuid) -> Result<Option<TicketDetails>, StoreError>;

    /// Conditional `checked_in: false -> true` transition keyed by token.
    async fn check_in(&self, token: &str, actor: &str) -> Result<CheckInOutcome, StoreError>;

    async fn order_summary(&self) -> Result<OrderSummary, StoreError>;

    /// Per-event aggregates, latest event first.
    async fn event_stats(&self) -> Result<Vec<EventStats>, StoreError>;
}
