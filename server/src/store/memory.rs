//! In-process backend for tests. Each operation runs inside one critical
//! section, which gives it the same atomicity as the conditional SQL
//! statements in [`super::PgStore`].

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Settlement, Store, StoreError};
use crate::models::{
    CheckInOutcome, CompletedOrder, Event, EventStats, IssuedTicket, NewEvent, NewOrder, NewTicket,
    Order, OrderCompletion, OrderSummary, PaymentStatus, Ticket, TicketDetails, Transition,
};

#[derive(Default)]
struct Tables {
    events: Vec<Event>,
    orders: Vec<Order>,
    tickets: Vec<Ticket>,
}

impl Tables {
    fn complete_order(&mut self, completion: &OrderCompletion) -> Option<CompletedOrder> {
        let order = self
            .orders
            .iter_mut()
            .find(|o| o.gateway_order_id == completion.gateway_order_id)?;

        if order.payment_status.is_terminal() {
            return Some(CompletedOrder {
                order: order.clone(),
                transition: Transition::AlreadySettled,
            });
        }

        order.payment_id = Some(completion.payment_id.clone());
        order.signature = Some(completion.signature.clone());
        order.payment_status = completion.status;
        order.updated_at = Utc::now();

        Some(CompletedOrder {
            order: order.clone(),
            transition: Transition::Applied,
        })
    }

    fn issue_ticket(&mut self, new_ticket: NewTicket) -> Result<IssuedTicket, StoreError> {
        if let Some(existing) = self.tickets.iter().find(|t| t.order_id == new_ticket.order_id) {
            return Ok(IssuedTicket {
                ticket: existing.clone(),
                newly_issued: false,
            });
        }
        if self.tickets.iter().any(|t| t.qr_token == new_ticket.qr_token) {
            return Err(StoreError::Duplicate("tickets.qr_token".to_string()));
        }

        let ticket = Ticket {
            id: Uuid::new_v4(),
            order_id: new_ticket.order_id,
            event_id: new_ticket.event_id,
            qr_token: new_ticket.qr_token,
            checked_in: false,
            checked_in_at: None,
            checked_in_by: None,
            created_at: Utc::now(),
        };
        self.tickets.push(ticket.clone());

        Ok(IssuedTicket {
            ticket,
            newly_issued: true,
        })
    }

    fn details(&self, ticket: &Ticket) -> Result<TicketDetails, StoreError> {
        let order = self
            .orders
            .iter()
            .find(|o| o.id == ticket.order_id)
            .ok_or_else(|| StoreError::Inconsistent(format!("ticket {} has no order", ticket.id)))?;
        let event = self
            .events
            .iter()
            .find(|e| e.id == ticket.event_id)
            .ok_or_else(|| StoreError::Inconsistent(format!("ticket {} has no event", ticket.id)))?;

        Ok(TicketDetails {
            id: ticket.id,
            order_id: ticket.order_id,
            event_id: ticket.event_id,
            qr_token: ticket.qr_token.clone(),
            checked_in: ticket.checked_in,
            checked_in_at: ticket.checked_in_at,
            checked_in_by: ticket.checked_in_by.clone(),
            event_name: event.name.clone(),
            event_date: event.date,
            venue: event.venue.clone(),
            attendee_name: order.name.clone(),
            attendee_email: order.email.clone(),
        })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_event(&self, event: NewEvent) -> Event {
        let event = Event {
            id: Uuid::new_v4(),
            name: event.name,
            description: event.description,
            date: event.date,
            venue: event.venue,
            price: event.price,
            image_url: event.image_url,
            created_at: Utc::now(),
        };
        self.tables.lock().await.events.push(event.clone());
        event
    }

    /// Number of ticket rows, regardless of order.
    pub async fn ticket_count(&self) -> usize {
        self.tables.lock().await.tickets.len()
    }

    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_events(&self) -> Result<Vec<Event>, StoreError> {
        let mut events = self.tables.lock().await.events.clone();
        events.sort_by_key(|e| e.date);
        Ok(events)
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.events.iter().find(|e| e.id == id).cloned())
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.events.iter().any(|e| e.id == order.event_id) {
            return Err(StoreError::Inconsistent(format!(
                "order references unknown event {}",
                order.event_id
            )));
        }
        if tables
            .orders
            .iter()
            .any(|o| o.gateway_order_id == order.gateway_order_id)
        {
            return Err(StoreError::Duplicate("orders.gateway_order_id".to_string()));
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            event_id: order.event_id,
            name: order.name,
            email: order.email,
            phone: order.phone,
            amount: order.amount,
            gateway: order.gateway,
            gateway_order_id: order.gateway_order_id,
            payment_id: None,
            signature: None,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        tables.orders.push(order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn order_by_gateway_reference(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<Order>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .iter()
            .find(|o| o.gateway_order_id == gateway_order_id)
            .cloned())
    }

    async fn complete_order(
        &self,
        completion: &OrderCompletion,
    ) -> Result<Option<CompletedOrder>, StoreError> {
        Ok(self.tables.lock().await.complete_order(completion))
    }

    async fn issue_ticket(&self, ticket: NewTicket) -> Result<IssuedTicket, StoreError> {
        self.tables.lock().await.issue_ticket(ticket)
    }

    async fn settle_payment(
        &self,
        completion: &OrderCompletion,
        qr_token: String,
    ) -> Result<Option<Settlement>, StoreError> {
        let mut tables = self.tables.lock().await;

        let Some(completed) = tables.complete_order(completion) else {
            return Ok(None);
        };

        let ticket = if completed.order.payment_status == PaymentStatus::Completed {
            Some(tables.issue_ticket(NewTicket {
                order_id: completed.order.id,
                event_id: completed.order.event_id,
                qr_token,
            })?)
        } else {
            None
        };

        Ok(Some(Settlement::from_completion(completed, ticket)))
    }

    async fn ticket_by_token(&self, token: &str) -> Result<Option<TicketDetails>, StoreError> {
        let tables = self.tables.lock().await;
        tables
            .tickets
            .iter()
            .find(|t| t.qr_token == token)
            .map(|t| tables.details(t))
            .transpose()
    }

    async fn ticket_by_id(&self, id: Uuid) -> Result<Option<TicketDetails>, StoreError> {
        let tables = self.tables.lock().await;
        tables
            .tickets
            .iter()
            .find(|t| t.id == id)
            .map(|t| tables.details(t))
            .transpose()
    }

    async fn check_in(&self, token: &str, actor: &str) -> Result<CheckInOutcome, StoreError> {
        let mut tables = self.tables.lock().await;

        let Some(ticket) = tables.tickets.iter_mut().find(|t| t.qr_token == token) else {
            return Ok(CheckInOutcome::NotFound);
        };

        if ticket.checked_in {
            return match ticket.checked_in_at {
                Some(checked_in_at) => Ok(CheckInOutcome::AlreadyCheckedIn { checked_in_at }),
                None => Err(StoreError::Inconsistent(
                    "ticket refused check-in but has no check-in time".to_string(),
                )),
            };
        }

        ticket.checked_in = true;
        ticket.checked_in_at = Some(Utc::now());
        ticket.checked_in_by = Some(actor.to_string());
        let ticket = ticket.clone();

        Ok(CheckInOutcome::CheckedIn(tables.details(&ticket)?))
    }

    async fn order_summary(&self) -> Result<OrderSummary, StoreError> {
        let tables = self.tables.lock().await;
        let completed = tables
            .orders
            .iter()
            .filter(|o| o.payment_status == PaymentStatus::Completed);

        Ok(OrderSummary {
            total_orders: tables.orders.len() as i64,
            completed_orders: completed.clone().count() as i64,
            total_revenue: completed.map(|o| o.amount).sum(),
        })
    }

    async fn event_stats(&self) -> Result<Vec<EventStats>, StoreError> {
        let tables = self.tables.lock().await;

        let mut stats: HashMap<Uuid, EventStats> = tables
            .events
            .iter()
            .map(|e| {
                (
                    e.id,
                    EventStats {
                        id: e.id,
                        name: e.name.clone(),
                        date: e.date,
                        venue: e.venue.clone(),
                        completed_orders: 0,
                        tickets_issued: 0,
                        checked_in: 0,
                        revenue: Decimal::ZERO,
                    },
                )
            })
            .collect();

        for order in tables
            .orders
            .iter()
            .filter(|o| o.payment_status == PaymentStatus::Completed)
        {
            if let Some(entry) = stats.get_mut(&order.event_id) {
                entry.completed_orders += 1;
                entry.revenue += order.amount;
            }
        }
        for ticket in &tables.tickets {
            if let Some(entry) = stats.get_mut(&ticket.event_id) {
                entry.tickets_issued += 1;
                if ticket.checked_in {
                    entry.checked_in += 1;
                }
            }
        }

        let mut stats: Vec<EventStats> = stats.into_values().collect();
        stats.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(stats)
    }
}
