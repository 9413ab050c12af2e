use uuid::Uuid;

use crate::models::Event;
use crate::store::Store;
use crate::utils::error::AppError;

pub async fn list_events(store: &dyn Store) -> Result<Vec<Event>, AppError> {
    Ok(store.list_events().await?)
}

pub async fn get_event(store: &dyn Store, id: Uuid) -> Result<Event, AppError> {
    store
        .get_event(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event '{id}' was not found")))
}
