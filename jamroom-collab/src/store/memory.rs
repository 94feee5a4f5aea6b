use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use jamroom_core::{next_id, RoomId, StoreError, UserId};

use super::{
    ChatMessageData, NewChatMessage, NewQueueEntry, NewRoom, PrimaryKey, QueueEntryData, Result,
    RoomData, RoomMemberData, RoomStore,
};

/// An in-memory [RoomStore].
///
/// Durable storage is the surrounding platform's concern; a jamroom server
/// holds its room state in memory for its own lifetime.
#[derive(Default)]
pub struct MemoryStore {
    rooms: DashMap<RoomId, RoomData>,
    members: DashMap<RoomId, Vec<RoomMemberData>>,
    queues: DashMap<RoomId, VecDeque<QueueEntryData>>,
    chats: DashMap<RoomId, Vec<ChatMessageData>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Default::default()
    }

    fn ensure_room(&self, room_id: &RoomId) -> Result<()> {
        if self.rooms.contains_key(room_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                resource: "room",
                identifier: room_id.clone(),
            })
        }
    }

    fn renumber(queue: &mut VecDeque<QueueEntryData>) {
        for (position, entry) in queue.iter_mut().enumerate() {
            entry.position = position as u32;
        }
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        if self.rooms.contains_key(&new_room.id) {
            return Err(StoreError::Conflict {
                resource: "room",
                field: "id",
                value: new_room.id,
            });
        }

        let data = RoomData {
            id: new_room.id.clone(),
            title: new_room.title,
            host: new_room.host,
            created_at: Utc::now(),
        };

        self.rooms.insert(new_room.id.clone(), data.clone());
        self.members.insert(new_room.id.clone(), Default::default());
        self.queues.insert(new_room.id.clone(), Default::default());
        self.chats.insert(new_room.id, Default::default());

        Ok(data)
    }

    async fn room_by_id(&self, room_id: &RoomId) -> Result<RoomData> {
        self.rooms
            .get(room_id)
            .map(|r| r.clone())
            .ok_or(StoreError::NotFound {
                resource: "room",
                identifier: room_id.clone(),
            })
    }

    async fn list_rooms(&self) -> Result<Vec<RoomData>> {
        Ok(self.rooms.iter().map(|r| r.clone()).collect())
    }

    async fn add_member(&self, room_id: &RoomId, member: RoomMemberData) -> Result<RoomMemberData> {
        self.ensure_room(room_id)?;

        let mut members = self.members.entry(room_id.clone()).or_default();

        if let Some(existing) = members.iter().find(|m| m.user == member.user) {
            return Ok(existing.clone());
        }

        members.push(member.clone());

        Ok(member)
    }

    async fn remove_member(&self, room_id: &RoomId, user_id: &UserId) -> Result<()> {
        self.ensure_room(room_id)?;

        if let Some(mut members) = self.members.get_mut(room_id) {
            members.retain(|m| &m.user.user_id != user_id);
        }

        Ok(())
    }

    async fn list_members(&self, room_id: &RoomId) -> Result<Vec<RoomMemberData>> {
        self.ensure_room(room_id)?;

        Ok(self
            .members
            .get(room_id)
            .map(|m| m.clone())
            .unwrap_or_default())
    }

    async fn update_member_media(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        audio_enabled: bool,
        video_enabled: bool,
    ) -> Result<RoomMemberData> {
        self.ensure_room(room_id)?;

        let mut members = self.members.entry(room_id.clone()).or_default();

        let member = members
            .iter_mut()
            .find(|m| &m.user.user_id == user_id)
            .ok_or(StoreError::NotFound {
                resource: "member",
                identifier: user_id.clone(),
            })?;

        member.audio_enabled = audio_enabled;
        member.video_enabled = video_enabled;

        Ok(member.clone())
    }

    async fn list_queue(&self, room_id: &RoomId) -> Result<Vec<QueueEntryData>> {
        self.ensure_room(room_id)?;

        Ok(self
            .queues
            .get(room_id)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn push_queue_entry(
        &self,
        room_id: &RoomId,
        new_entry: NewQueueEntry,
    ) -> Result<QueueEntryData> {
        self.ensure_room(room_id)?;

        let mut queue = self.queues.entry(room_id.clone()).or_default();

        let entry = QueueEntryData {
            id: next_id(),
            room_id: room_id.clone(),
            position: queue.len() as u32,
            item: new_entry.item,
            added_by: new_entry.added_by,
            added_at: Utc::now(),
        };

        queue.push_back(entry.clone());

        Ok(entry)
    }

    async fn remove_queue_entry(&self, room_id: &RoomId, entry_id: PrimaryKey) -> Result<()> {
        self.ensure_room(room_id)?;

        let mut queue = self.queues.entry(room_id.clone()).or_default();

        queue.retain(|e| e.id != entry_id);
        Self::renumber(&mut queue);

        Ok(())
    }

    async fn pop_queue_front(&self, room_id: &RoomId) -> Result<Option<QueueEntryData>> {
        self.ensure_room(room_id)?;

        let mut queue = self.queues.entry(room_id.clone()).or_default();

        let popped = queue.pop_front();
        Self::renumber(&mut queue);

        Ok(popped)
    }

    async fn append_chat_message(
        &self,
        room_id: &RoomId,
        new_message: NewChatMessage,
    ) -> Result<ChatMessageData> {
        self.ensure_room(room_id)?;

        let message = ChatMessageData {
            id: next_id(),
            room_id: room_id.clone(),
            sender: new_message.sender,
            body: new_message.body,
            sent_at: Utc::now(),
        };

        self.chats
            .entry(room_id.clone())
            .or_default()
            .push(message.clone());

        Ok(message)
    }

    async fn recent_chat_messages(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<ChatMessageData>> {
        self.ensure_room(room_id)?;

        let chats = self.chats.entry(room_id.clone()).or_default();
        let skip = chats.len().saturating_sub(limit);

        Ok(chats.iter().skip(skip).cloned().collect())
    }
}
