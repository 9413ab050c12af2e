use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::services::{checkin, tickets};
use crate::utils::error::AppError;
use crate::utils::response::success;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    pub token: String,
    #[serde(default)]
    pub actor: Option<String>,
}

pub async fn validate_ticket(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let validation = checkin::validate_ticket(state.store.as_ref(), &token).await?;
    let message = if validation.valid {
        "Ticket is valid"
    } else {
        "Ticket already checked in"
    };
    Ok(success(validation, message).into_response())
}

pub async fn ticket_qr(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let svg = tickets::ticket_qr(state.store.as_ref(), &token).await?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response())
}

pub async fn ticket_by_id(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Response, AppError> {
    let Path(id) = id?;
    let ticket = tickets::ticket_by_id(state.store.as_ref(), id).await?;
    Ok(success(ticket, "Ticket retrieved").into_response())
}

pub async fn check_in(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CheckInRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload?;
    let actor = checkin::resolve_actor(request.actor.as_deref(), &headers);
    let ticket = checkin::check_in(state.store.as_ref(), &request.token, &actor).await?;
    Ok(success(ticket, "Ticket checked in successfully").into_response())
}
