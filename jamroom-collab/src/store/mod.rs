use async_trait::async_trait;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

use jamroom_core::{RoomId, StoreError, UserId};

pub type Result<T> = std::result::Result<T, StoreError>;

/// Represents a type that can store and fetch room data.
#[async_trait]
pub trait RoomStore: Send + Sync + 'static {
    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData>;
    async fn room_by_id(&self, room_id: &RoomId) -> Result<RoomData>;
    async fn list_rooms(&self) -> Result<Vec<RoomData>>;

    /// Adds a member, or returns the existing membership when the user
    /// already joined.
    async fn add_member(&self, room_id: &RoomId, member: RoomMemberData) -> Result<RoomMemberData>;
    async fn remove_member(&self, room_id: &RoomId, user_id: &UserId) -> Result<()>;
    async fn list_members(&self, room_id: &RoomId) -> Result<Vec<RoomMemberData>>;
    async fn update_member_media(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        audio_enabled: bool,
        video_enabled: bool,
    ) -> Result<RoomMemberData>;

    async fn list_queue(&self, room_id: &RoomId) -> Result<Vec<QueueEntryData>>;
    async fn push_queue_entry(
        &self,
        room_id: &RoomId,
        new_entry: NewQueueEntry,
    ) -> Result<QueueEntryData>;
    async fn remove_queue_entry(&self, room_id: &RoomId, entry_id: PrimaryKey) -> Result<()>;

    /// Removes the front entry, moving every other entry one position up.
    async fn pop_queue_front(&self, room_id: &RoomId) -> Result<Option<QueueEntryData>>;

    async fn append_chat_message(
        &self,
        room_id: &RoomId,
        new_message: NewChatMessage,
    ) -> Result<ChatMessageData>;
    async fn recent_chat_messages(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<ChatMessageData>>;
}
