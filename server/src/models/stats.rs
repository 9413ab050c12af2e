use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub total_orders: i64,
    pub completed_orders: i64,
    pub total_revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EventStats {
    pub id: Uuid,
    pub name: String,
    pub date: DateTime<Utc>,
    pub venue: String,
    pub completed_orders: i64,
    pub tickets_issued: i64,
    pub checked_in: i64,
    pub revenue: Decimal,
}
