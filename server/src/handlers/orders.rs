use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use crate::services::orders::{self, CreateOrderRequest};
use crate::utils::error::AppError;
use crate::utils::response::success;
use crate::AppState;

pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload?;
    let checkout = orders::create_order(&state, request).await?;
    Ok(success(checkout, "Order created").into_response())
}

pub async fn get_order(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Response, AppError> {
    let Path(id) = id?;
    let status = orders::order_status(&state, id).await?;
    Ok(success(status, "Order retrieved").into_response())
}
