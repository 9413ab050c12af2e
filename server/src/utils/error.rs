use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::payment::PaymentError;
use crate::store::StoreError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Ticket not found")]
    TicketNotFound,

    #[error("Ticket already checked in at {checked_in_at}")]
    AlreadyCheckedIn { checked_in_at: DateTime<Utc> },

    #[error("Database error")]
    DatabaseError(#[from] StoreError),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) | AppError::OrderNotFound(_) | AppError::TicketNotFound => {
                StatusCode::NOT_FOUND
            }
            AppError::AlreadyCheckedIn { .. } => StatusCode::CONFLICT,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::InvalidSignature(_) => "INVALID_SIGNATURE",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            AppError::TicketNotFound => "TICKET_NOT_FOUND",
            AppError::AlreadyCheckedIn { .. } => "ALREADY_CHECKED_IN",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::ExternalServiceError(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            // Expected outcomes of normal traffic
            AppError::ValidationError(_)
            | AppError::NotFound(_)
            | AppError::TicketNotFound
            | AppError::AlreadyCheckedIn { .. } => {
                warn!(code = self.code(), message = %self, "Request rejected");
            }
            AppError::InvalidSignature(msg)
            | AppError::AuthError(msg)
            | AppError::OrderNotFound(msg)
            | AppError::ExternalServiceError(msg)
            | AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level message to the client
        let public_message = match &self {
            AppError::ValidationError(msg)
            | AppError::InvalidSignature(msg)
            | AppError::AuthError(msg)
            | AppError::NotFound(msg)
            | AppError::ExternalServiceError(msg) => msg.clone(),
            AppError::OrderNotFound(_) => "Order not found".to_string(),
            AppError::TicketNotFound => "Ticket not found".to_string(),
            AppError::AlreadyCheckedIn { .. } => "Ticket already checked in".to_string(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::InternalServerError(_) => "An internal error occurred".to_string(),
        };

        // Only check-in conflicts carry details
        let details = match &self {
            AppError::AlreadyCheckedIn { checked_in_at } => {
                Some(json!({ "checkedInAt": checked_in_at }))
            }
            _ => None,
        };

        error_response(code, public_message, details, status)
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::SignatureMismatch => AppError::InvalidSignature(err.to_string()),
            PaymentError::MissingField(_) | PaymentError::MalformedCallback(_) => {
                AppError::ValidationError(err.to_string())
            }
            PaymentError::Http(_) | PaymentError::Api { .. } | PaymentError::InvalidResponse(_) => {
                AppError::ExternalServiceError(err.to_string())
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::ValidationError(errors.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(
            AppError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(PaymentError::SignatureMismatch).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::AuthError("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::TicketNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::AlreadyCheckedIn {
                checked_in_at: Utc::now()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(PaymentError::InvalidResponse("x".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::from(StoreError::Inconsistent("x".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_missing_callback_field_is_a_validation_error() {
        let err = AppError::from(PaymentError::MissingField("razorpay_signature"));
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
