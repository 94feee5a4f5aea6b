use std::sync::Arc;

use log::info;
use tokio::spawn;

use jamroom_core::{RoomId, UserId};

use crate::{
    items, ChatMessageData, CollabContext, CollabEvent, NewChatMessage, PrimaryKey,
    QueueEntryData, RoomData, RoomMemberData, SongQueue, UserProfile,
};

use super::RoomError;

/// A jamroom room: members, a song queue, chat, and the shared playback
/// record the member sessions synchronize against.
pub struct Room {
    context: CollabContext,
    data: RoomData,
    queue: Arc<SongQueue>,
}

impl Room {
    pub(crate) fn new(context: &CollabContext, data: RoomData) -> Arc<Self> {
        let room = Arc::new(Self {
            context: context.clone(),
            queue: SongQueue::new(context, data.id.clone()),
            data,
        });

        room.spawn_playback_bridge();
        room
    }

    pub fn id(&self) -> RoomId {
        self.data.id.clone()
    }

    pub fn data(&self) -> RoomData {
        self.data.clone()
    }

    pub fn host(&self) -> &UserProfile {
        &self.data.host
    }

    /// Returns true if the user has authoritative control over this room's
    /// shared playback.
    pub fn is_host(&self, user_id: &UserId) -> bool {
        &self.data.host.user_id == user_id
    }

    pub fn queue(&self) -> Arc<SongQueue> {
        self.queue.clone()
    }

    /// Registers a user as a member of the room. Joining twice is fine.
    pub async fn join(&self, user: UserProfile) -> Result<RoomMemberData, RoomError> {
        let member = self
            .context
            .store
            .add_member(&self.id(), RoomMemberData::new(user))
            .await?;

        info!(
            "User {} joined room {}",
            member.user.display_name, self.data.title
        );

        self.context.emit(CollabEvent::UserJoined {
            room_id: self.id(),
            new_member: member.clone(),
        });

        Ok(member)
    }

    pub async fn leave(&self, user_id: &UserId) -> Result<(), RoomError> {
        self.context.store.remove_member(&self.id(), user_id).await?;

        info!("User {} left room {}", user_id, self.data.title);

        self.context.emit(CollabEvent::UserLeft {
            room_id: self.id(),
            user_id: user_id.clone(),
        });

        Ok(())
    }

    pub async fn members(&self) -> Result<Vec<RoomMemberData>, RoomError> {
        Ok(self.context.store.list_members(&self.id()).await?)
    }

    /// Returns the member if it exists in the room
    pub async fn member_by_user_id(&self, user_id: &UserId) -> Result<RoomMemberData, RoomError> {
        self.members()
            .await?
            .into_iter()
            .find(|m| &m.user.user_id == user_id)
            .ok_or(RoomError::UserNotInRoom)
    }

    /// Mirrors a member's local track toggles for the other clients' UI.
    pub async fn set_member_media(
        &self,
        user_id: &UserId,
        audio_enabled: bool,
        video_enabled: bool,
    ) -> Result<RoomMemberData, RoomError> {
        let member = self
            .context
            .store
            .update_member_media(&self.id(), user_id, audio_enabled, video_enabled)
            .await?;

        self.context.emit(CollabEvent::MemberMediaUpdate {
            room_id: self.id(),
            member: member.clone(),
        });

        Ok(member)
    }

    /// Resolves a video link or id and appends it to the queue.
    pub async fn add_to_queue(
        &self,
        user_id: &UserId,
        input: &str,
    ) -> Result<QueueEntryData, RoomError> {
        self.member_by_user_id(user_id).await?;

        let item = items::resolve(input)
            .await
            .map_err(|e| RoomError::InvalidInput(e.to_string()))?;

        Ok(self.queue.push(item, user_id).await?)
    }

    pub async fn remove_from_queue(&self, entry_id: PrimaryKey) -> Result<(), RoomError> {
        Ok(self.queue.remove(entry_id).await?)
    }

    pub async fn send_chat(
        &self,
        user_id: &UserId,
        body: String,
    ) -> Result<ChatMessageData, RoomError> {
        self.member_by_user_id(user_id).await?;

        let message = self
            .context
            .store
            .append_chat_message(
                &self.id(),
                NewChatMessage {
                    sender: user_id.clone(),
                    body,
                },
            )
            .await?;

        self.context.emit(CollabEvent::ChatMessage {
            room_id: self.id(),
            message: message.clone(),
        });

        Ok(message)
    }

    pub async fn recent_chat(&self, limit: usize) -> Result<Vec<ChatMessageData>, RoomError> {
        Ok(self
            .context
            .store
            .recent_chat_messages(&self.id(), limit)
            .await?)
    }

    /// Re-emits the room's playback record feed as collab events, so clients
    /// that only listen to the event stream still see playback move.
    fn spawn_playback_bridge(&self) {
        let mut records = self.context.playback.watch(&self.id());

        let context = self.context.clone();
        let room_id = self.id();

        spawn(async move {
            while let Some(record) = records.recv().await {
                context.emit(CollabEvent::PlaybackUpdate {
                    room_id: room_id.clone(),
                    record,
                });
            }
        });
    }
}
