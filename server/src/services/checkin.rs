use axum::http::HeaderMap;
use serde::Serialize;

use crate::models::{CheckInOutcome, TicketDetails};
use crate::store::Store;
use crate::utils::error::AppError;

const UNKNOWN_ACTOR: &str = "unknown";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketValidation {
    pub valid: bool,
    pub ticket: TicketDetails,
}

/// Who performed the scan: the explicit actor if given, else the client
/// address from the proxy headers.
pub fn resolve_actor(actor: Option<&str>, headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    actor
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .or_else(|| header("x-forwarded-for"))
        .or_else(|| header("x-real-ip"))
        .unwrap_or(UNKNOWN_ACTOR)
        .to_string()
}

/// Consumes the ticket. Exactly one of any number of concurrent scans of the
/// same token succeeds.
pub async fn check_in(store: &dyn Store, token: &str, actor: &str) -> Result<TicketDetails, AppError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::ValidationError("token is required".to_string()));
    }

    match store.check_in(token, actor).await? {
        CheckInOutcome::CheckedIn(ticket) => {
            tracing::info!(ticket_id = %ticket.id, actor, "Ticket checked in");
            Ok(ticket)
        }
        CheckInOutcome::AlreadyCheckedIn { checked_in_at } => {
            Err(AppError::AlreadyCheckedIn { checked_in_at })
        }
        CheckInOutcome::NotFound => Err(AppError::TicketNotFound),
    }
}

/// Read-only lookup for the scanner: reports whether the ticket can still
/// be used.
pub async fn validate_ticket(store: &dyn Store, token: &str) -> Result<TicketValidation, AppError> {
    let ticket = store
        .ticket_by_token(token.trim())
        .await?
        .ok_or(AppError::TicketNotFound)?;

    Ok(TicketValidation {
        valid: !ticket.checked_in,
        ticket,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_actor_precedence() {
        let mut headers = HeaderMap::new();
        assert_eq!(resolve_actor(None, &headers), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(resolve_actor(None, &headers), "10.0.0.2");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        assert_eq!(resolve_actor(None, &headers), "203.0.113.9");

        assert_eq!(resolve_actor(Some("gate-2"), &headers), "gate-2");
        assert_eq!(resolve_actor(Some("  "), &headers), "203.0.113.9");
    }
}
