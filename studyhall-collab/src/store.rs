use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::{Room, RoomId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("Store rejected the write: {0}")]
    Rejected(String),
}

/// The row mirrored to the backing store when a room is created.
#[derive(Debug, Clone, Serialize)]
pub struct NewRoomRecord {
    pub id: RoomId,
    pub room_code: String,
    pub name: String,
    pub description: String,
    pub host_id: String,
    pub max_participants: usize,
    pub is_active: bool,
}

impl NewRoomRecord {
    pub fn from_room(room: &Room) -> Self {
        Self {
            id: room.id,
            room_code: room.room_code.clone(),
            name: room.name.clone(),
            description: room.description.clone(),
            host_id: room.host_id.clone(),
            max_participants: room.max_participants,
            is_active: room.is_active,
        }
    }
}

/// A backing store for room metadata. Writes are best-effort: the in-memory
/// registry stays authoritative whether or not they land.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn save_room(&self, record: NewRoomRecord) -> Result<(), StoreError>;
}

/// Store backed by a hosted REST API.
pub struct RestRoomStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestRoomStore {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl RoomStore for RestRoomStore {
    async fn save_room(&self, record: NewRoomRecord) -> Result<(), StoreError> {
        let response = self
            .client
            .post(format!("{}/rest/v1/rooms", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(&record)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            return Err(StoreError::Rejected(format!("{status}: {body}")));
        }

        Ok(())
    }
}

/// Used when no backing store is configured.
pub struct NoStore;

#[async_trait]
impl RoomStore for NoStore {
    async fn save_room(&self, _record: NewRoomRecord) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Fails every write, for exercising the best-effort path.
#[cfg(test)]
pub(crate) struct FailingStore;

#[cfg(test)]
#[async_trait]
impl RoomStore for FailingStore {
    async fn save_room(&self, _record: NewRoomRecord) -> Result<(), StoreError> {
        Err(StoreError::Rejected("the store is down".to_string()))
    }
}
