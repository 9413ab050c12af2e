use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub order_id: Uuid,
    pub event_id: Uuid,
    pub qr_token: String,
    pub checked_in: bool,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_in_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A ticket joined with its event and the purchaser's details, as shown to
/// venue staff and on the ticket page.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TicketDetails {
    pub id: Uuid,
    pub order_id: Uuid,
    pub event_id: Uuid,
    pub qr_token: String,
    pub checked_in: bool,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_in_by: Option<String>,
    pub event_name: String,
    pub event_date: DateTime<Utc>,
    pub venue: String,
    pub attendee_name: String,
    pub attendee_email: String,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub order_id: Uuid,
    pub event_id: Uuid,
    pub qr_token: String,
}

/// Result of an insert-if-absent on the ticket table.
#[derive(Debug, Clone)]
pub struct IssuedTicket {
    pub ticket: Ticket,
    pub newly_issued: bool,
}

#[derive(Debug, Clone)]
pub enum CheckInOutcome {
    CheckedIn(TicketDetails),
    AlreadyCheckedIn { checked_in_at: DateTime<Utc> },
    NotFound,
}
