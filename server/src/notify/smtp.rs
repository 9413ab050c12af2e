//! SMTP delivery using Lettre's async Tokio transport.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{escape_html, Notifier, NotifyError, TicketNotification};
use crate::config::SmtpConfig;

const IMPLICIT_TLS_PORT: u16 = 465;

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let relay = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        };
        let builder = relay
            .map_err(|e| NotifyError::Build(format!("SMTP relay error: {e}")))?
            .port(config.port);

        let builder = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => {
                builder.credentials(Credentials::new(user.clone(), pass.clone()))
            }
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
            from: parse_mailbox(&format!("EventPass <{}>", config.from))?,
        })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse().map_err(|e: lettre::address::AddressError| NotifyError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn ticket_html(n: &TicketNotification) -> String {
    let when = n.event_date.format("%A, %d %B %Y at %H:%M UTC");
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Your ticket</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2 style="color: #2563eb;">You're going to {event}!</h2>
        <p>Hi {name}, your payment went through and your ticket is ready.</p>
        <p><strong>{event}</strong><br>{when}<br>{venue}</p>
        <div style="margin: 24px 0;">{qr}</div>
        <p>Show the QR code (attached as ticket-qr.svg) at the entrance.</p>
        <p style="margin: 30px 0;">
            <a href="{url}"
               style="display: inline-block; background-color: #2563eb; color: white; padding: 12px 24px; text-decoration: none; border-radius: 4px;">
                View ticket
            </a>
        </p>
        <p style="color: #666; font-size: 12px;">Ticket ID: {ticket_id}</p>
    </div>
</body>
</html>
"#,
        event = escape_html(&n.event_name),
        name = escape_html(&n.to_name),
        venue = escape_html(&n.venue),
        url = escape_html(&n.ticket_url),
        qr = n.qr_svg,
        ticket_id = n.ticket_id,
    )
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_ticket(&self, notification: &TicketNotification) -> Result<(), NotifyError> {
        let to = parse_mailbox(&notification.to_email)?;
        let svg_type = ContentType::parse("image/svg+xml")
            .map_err(|e| NotifyError::Build(e.to_string()))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(format!("Your ticket for {}", notification.event_name))
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::html(ticket_html(notification)))
                    .singlepart(
                        Attachment::new("ticket-qr.svg".to_string())
                            .body(notification.qr_svg.clone(), svg_type),
                    ),
            )
            .map_err(|e| NotifyError::Build(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        tracing::info!(
            to = %notification.to_email,
            ticket_id = %notification.ticket_id,
            "Ticket email sent"
        );
        Ok(())
    }
}
