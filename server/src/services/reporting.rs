use serde::Serialize;

use crate::models::{EventStats, OrderSummary};
use crate::store::Store;
use crate::utils::error::AppError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub summary: OrderSummary,
    pub events: Vec<EventStats>,
}

/// Totals over all orders; revenue counts completed orders only.
pub async fn summary(store: &dyn Store) -> Result<OrderSummary, AppError> {
    Ok(store.order_summary().await?)
}

pub async fn event_stats(store: &dyn Store) -> Result<Vec<EventStats>, AppError> {
    Ok(store.event_stats().await?)
}

pub async fn dashboard(store: &dyn Store) -> Result<Dashboard, AppError> {
    let (summary, events) = tokio::try_join!(summary(store), event_stats(store))?;
    Ok(Dashboard { summary, events })
}
