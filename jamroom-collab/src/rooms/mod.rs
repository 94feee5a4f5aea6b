mod room;

use std::sync::Arc;

use log::info;
use thiserror::Error;

pub use room::*;

use jamroom_core::{RoomId, StoreError};

use crate::{CollabContext, CollabEvent, NewRoom};

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("room:{0} doesn't exist")]
    RoomNotFound(RoomId),
    #[error("User is not a member of this room")]
    UserNotInRoom,
    #[error("Input can't be queued: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct RoomManager {
    context: CollabContext,
}

impl RoomManager {
    pub(crate) fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Creates a new room. The host is a member from the start.
    pub async fn create_room(&self, new_room: NewRoom) -> Result<Arc<Room>, RoomError> {
        let host = new_room.host.clone();
        let room_data = self.context.store.create_room(new_room).await?;

        let room = Room::new(&self.context, room_data);
        self.context.rooms.insert(room.id(), room.clone());

        info!("Room {} created", room.data().title);

        self.context.emit(CollabEvent::RoomCreated { room: room.data() });

        room.join(host).await?;

        Ok(room)
    }

    pub fn room_by_id(&self, room_id: &RoomId) -> Result<Arc<Room>, RoomError> {
        self.context
            .rooms
            .get(room_id)
            .map(|r| r.clone())
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))
    }

    /// Get all rooms in memory
    pub fn list_all(&self) -> Vec<Arc<Room>> {
        self.context.rooms.iter().map(|r| r.clone()).collect()
    }
}
