use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::{ItemId, RoomId, UserId};

/// The single shared "now playing" state of a room.
///
/// At most one record exists per room. Writers always stamp `updated_by` and
/// `updated_at` with their own identity and time of writing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackRecord {
    pub room_id: RoomId,
    pub item_id: Option<ItemId>,
    pub playing: bool,
    /// Position in seconds, never negative.
    pub position: f32,
    pub updated_by: UserId,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A resource in the store doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    /// The store could not be reached or failed internally
    #[error("store is unavailable: {0}")]
    Unavailable(String),
}

/// The shared playback state collaborator: one record per room, with a
/// change feed over row-level updates.
#[async_trait]
pub trait PlaybackStore: Send + Sync + 'static {
    /// Fetches the record for a room, if one exists.
    async fn fetch(&self, room_id: &RoomId) -> Result<Option<PlaybackRecord>, StoreError>;

    /// Creates or replaces the record for `record.room_id`.
    async fn upsert(&self, record: PlaybackRecord) -> Result<PlaybackRecord, StoreError>;

    /// Subscribes to every update of a room's record, including the
    /// subscriber's own writes.
    fn watch(&self, room_id: &RoomId) -> UnboundedReceiver<PlaybackRecord>;
}
