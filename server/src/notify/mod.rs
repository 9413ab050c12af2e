//! Ticket delivery to the purchaser.
//!
//! Delivery is best-effort: a failure is reported to the caller, which
//! records it and carries on. Nothing here is retried.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;

pub mod log;
pub mod smtp;

pub use self::log::LogNotifier;
pub use self::smtp::SmtpNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid address '{address}': {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("delivery timed out")]
    Timeout,
}

#[derive(Debug, Clone)]
pub struct TicketNotification {
    pub to_email: String,
    pub to_name: String,
    pub event_name: String,
    pub event_date: DateTime<Utc>,
    pub venue: String,
    pub ticket_id: Uuid,
    pub qr_token: String,
    /// Link to the ticket page on the front end.
    pub ticket_url: String,
    pub qr_svg: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_ticket(&self, notification: &TicketNotification) -> Result<(), NotifyError>;
}

/// SMTP when a relay is configured, otherwise the log sink.
pub fn build_notifier(config: &Config) -> Result<Arc<dyn Notifier>, NotifyError> {
    match &config.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "Ticket email via SMTP");
            Ok(Arc::new(SmtpNotifier::new(smtp)?))
        }
        None => {
            tracing::info!("SMTP_HOST not set, ticket emails will be logged only");
            Ok(Arc::new(LogNotifier))
        }
    }
}

/// Minimal HTML escaping for user-supplied text placed in markup.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
