use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use constant_time_eq::constant_time_eq;

use crate::services::reporting;
use crate::utils::error::AppError;
use crate::utils::response::success;
use crate::AppState;

/// Rejects requests without `Authorization: Bearer <ADMIN_SECRET>`.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(|| AppError::AuthError("Missing bearer token".to_string()))?;

    if !constant_time_eq(presented.as_bytes(), state.settings.admin_secret.as_bytes()) {
        return Err(AppError::AuthError("Invalid admin credentials".to_string()));
    }

    Ok(next.run(request).await)
}

pub async fn stats(State(state): State<AppState>) -> Result<Response, AppError> {
    let dashboard = reporting::dashboard(state.store.as_ref()).await?;
    Ok(success(dashboard, "Stats retrieved").into_response())
}
