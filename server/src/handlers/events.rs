use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::services::events;
use crate::utils::error::AppError;
use crate::utils::response::success;
use crate::AppState;

pub async fn list_events(State(state): State<AppState>) -> Result<Response, AppError> {
    let events = events::list_events(state.store.as_ref()).await?;
    Ok(success(events, "Events retrieved").into_response())
}

pub async fn get_event(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Response, AppError> {
    let Path(id) = id?;
    let event = events::get_event(state.store.as_ref(), id).await?;
    Ok(success(event, "Event retrieved").into_response())
}
