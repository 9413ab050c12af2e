use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{Settlement, Store, StoreError};
use crate::models::{
    CheckInOutcome, CompletedOrder, Event, EventStats, IssuedTicket, NewOrder, NewTicket, Order,
    OrderCompletion, OrderSummary, PaymentStatus, Ticket, TicketDetails, Transition,
};

const TICKET_DETAILS_SELECT: &str = r#"
    SELECT t.id, t.order_id, t.event_id, t.qr_token, t.checked_in, t.checked_in_at,
           t.checked_in_by, e.name AS event_name, e.date AS event_date, e.venue,
           o.name AS attendee_name, o.email AS attendee_email
    FROM tickets t
    JOIN orders o ON t.order_id = o.id
    JOIN events e ON t.event_id = e.id
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn unique_violation(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Duplicate(db.constraint().unwrap_or("unique key").to_string());
        }
    }
    StoreError::Database(err)
}

async fn complete_order_on(
    conn: &mut PgConnection,
    completion: &OrderCompletion,
) -> Result<Option<CompletedOrder>, StoreError> {
    let updated = sqlx::query_as::<_, Order>(
        r#"UPDATE orders
           SET payment_id = $2, signature = $3, payment_status = $4, updated_at = NOW()
           WHERE gateway_order_id = $1 AND payment_status = 'pending'
           RETURNING *"#,
    )
    .bind(&completion.gateway_order_id)
    .bind(&completion.payment_id)
    .bind(&completion.signature)
    .bind(completion.status.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(order) = updated {
        return Ok(Some(CompletedOrder {
            order,
            transition: Transition::Applied,
        }));
    }

    let existing = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE gateway_order_id = $1")
        .bind(&completion.gateway_order_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(existing.map(|order| CompletedOrder {
        order,
        transition: Transition::AlreadySettled,
    }))
}

async fn issue_ticket_on(
    conn: &mut PgConnection,
    ticket: &NewTicket,
) -> Result<IssuedTicket, StoreError> {
    let inserted = sqlx::query_as::<_, Ticket>(
        r#"INSERT INTO tickets (order_id, event_id, qr_token)
           VALUES ($1, $2, $3)
           ON CONFLICT (order_id) DO NOTHING
           RETURNING *"#,
    )
    .bind(ticket.order_id)
    .bind(ticket.event_id)
    .bind(&ticket.qr_token)
    .fetch_optional(&mut *conn)
    .await
    .map_err(unique_violation)?;

    if let Some(ticket) = inserted {
        return Ok(IssuedTicket {
            ticket,
            newly_issued: true,
        });
    }

    let existing = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE order_id = $1")
        .bind(ticket.order_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| {
            StoreError::Inconsistent(format!(
                "ticket insert for order {} conflicted but no ticket exists",
                ticket.order_id
            ))
        })?;

    Ok(IssuedTicket {
        ticket: existing,
        newly_issued: false,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn list_events(&self) -> Result<Vec<Event>, StoreError> {
        let events = sqlx::query_as::<_, Event>("SELECT * FROM events ORDER BY date ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(events)
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let order = sqlx::query_as::<_, Order>(
            r#"INSERT INTO orders (event_id, name, email, phone, amount, gateway, gateway_order_id)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING *"#,
        )
        .bind(order.event_id)
        .bind(&order.name)
        .bind(&order.email)
        .bind(&order.phone)
        .bind(order.amount)
        .bind(&order.gateway)
        .bind(&order.gateway_order_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unique_violation)?;
        Ok(order)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    async fn order_by_gateway_reference(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<Order>, StoreError> {
        let order =
            sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE gateway_order_id = $1")
                .bind(gateway_order_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(order)
    }

    async fn complete_order(
        &self,
        completion: &OrderCompletion,
    ) -> Result<Option<CompletedOrder>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        complete_order_on(&mut *conn, completion).await
    }

    async fn issue_ticket(&self, ticket: NewTicket) -> Result<IssuedTicket, StoreError> {
        let mut conn = self.pool.acquire().await?;
        issue_ticket_on(&mut *conn, &ticket).await
    }

    async fn settle_payment(
        &self,
        completion: &OrderCompletion,
        qr_token: String,
    ) -> Result<Option<Settlement>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let Some(completed) = complete_order_on(&mut *tx, completion).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        let ticket = if completed.order.payment_status == PaymentStatus::Completed {
            let new_ticket = NewTicket {
                order_id: completed.order.id,
                event_id: completed.order.event_id,
                qr_token,
            };
            Some(issue_ticket_on(&mut *tx, &new_ticket).await?)
        } else {
            None
        };

        tx.commit().await?;
        Ok(Some(Settlement::from_completion(completed, ticket)))
    }

    async fn ticket_by_token(&self, token: &str) -> Result<Option<TicketDetails>, StoreError> {
        let ticket =
            sqlx::query_as::<_, TicketDetails>(&format!("{TICKET_DETAILS_SELECT} WHERE t.qr_token = $1"))
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        Ok(ticket)
    }

    async fn ticket_by_id(&self, id: Uuid) -> Result<Option<TicketDetails>, StoreError> {
        let ticket =
            sqlx::query_as::<_, TicketDetails>(&format!("{TICKET_DETAILS_SELECT} WHERE t.id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(ticket)
    }

    async fn check_in(&self, token: &str, actor: &str) -> Result<CheckInOutcome, StoreError> {
        let updated: Option<Uuid> = sqlx::query_scalar(
            r#"UPDATE tickets
               SET checked_in = TRUE, checked_in_at = NOW(), checked_in_by = $2
               WHERE qr_token = $1 AND checked_in = FALSE
               RETURNING id"#,
        )
        .bind(token)
        .bind(actor)
        .fetch_optional(&self.pool)
        .await?;

        if updated.is_some() {
            return match self.ticket_by_token(token).await? {
                Some(details) => Ok(CheckInOutcome::CheckedIn(details)),
                None => Err(StoreError::Inconsistent(
                    "checked-in ticket vanished before it could be read back".to_string(),
                )),
            };
        }

        let previous: Option<Option<DateTime<Utc>>> =
            sqlx::query_scalar("SELECT checked_in_at FROM tickets WHERE qr_token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;

        match previous {
            None => Ok(CheckInOutcome::NotFound),
            Some(Some(checked_in_at)) => Ok(CheckInOutcome::AlreadyCheckedIn { checked_in_at }),
            Some(None) => Err(StoreError::Inconsistent(
                "ticket refused check-in but has no check-in time".to_string(),
            )),
        }
    }

    async fn order_summary(&self) -> Result<OrderSummary, StoreError> {
        let summary = sqlx::query_as::<_, OrderSummary>(
            r#"SELECT
                 COUNT(*) AS total_orders,
                 COUNT(*) FILTER (WHERE payment_status = 'completed') AS completed_orders,
                 COALESCE(SUM(amount) FILTER (WHERE payment_status = 'completed'), 0) AS total_revenue
               FROM orders"#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(summary)
    }

    async fn event_stats(&self) -> Result<Vec<EventStats>, StoreError> {
        // Orders and tickets are aggregated separately; joining both onto
        // events directly would multiply rows.
        let stats = sqlx::query_as::<_, EventStats>(
            r#"SELECT
                 e.id, e.name, e.date, e.venue,
                 COALESCE(o.completed_orders, 0) AS completed_orders,
                 COALESCE(t.tickets_issued, 0) AS tickets_issued,
                 COALESCE(t.checked_in, 0) AS checked_in,
                 COALESCE(o.revenue, 0) AS revenue
               FROM events e
               LEFT JOIN (
                 SELECT event_id, COUNT(*) AS completed_orders, SUM(amount) AS revenue
                 FROM orders
                 WHERE payment_status = 'completed'
                 GROUP BY event_id
               ) o ON o.event_id = e.id
               LEFT JOIN (
                 SELECT event_id,
                        COUNT(*) AS tickets_issued,
                        COUNT(*) FILTER (WHERE checked_in) AS checked_in
                 FROM tickets
                 GROUP BY event_id
               ) t ON t.event_id = e.id
               ORDER BY e.date DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(stats)
    }
}
