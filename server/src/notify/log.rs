use async_trait::async_trait;
use tracing::info;

use super::{Notifier, NotifyError, TicketNotification};

/// Logs ticket emails instead of sending them. Used when no SMTP relay is
/// configured.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_ticket(&self, notification: &TicketNotification) -> Result<(), NotifyError> {
        info!(
            to = %notification.to_email,
            event = %notification.event_name,
            ticket_id = %notification.ticket_id,
            ticket_url = %notification.ticket_url,
            "Ticket email (not sent, SMTP disabled)"
        );
        Ok(())
    }
}
