use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use jamroom_core::PlaybackRecord;

/// Represents a type that can be serialized into an API-facing shape.
pub trait ToSerialized<T> {
    fn to_serialized(&self) -> T;
}

impl<T, S> ToSerialized<Vec<S>> for Vec<T>
where
    T: ToSerialized<S>,
{
    fn to_serialized(&self) -> Vec<S> {
        self.iter().map(|i| i.to_serialized()).collect()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserProfile {
    pub user_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Room {
    pub id: String,
    pub title: String,
    pub host: UserProfile,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomMember {
    pub user: UserProfile,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QueueItem {
    pub id: u64,
    pub position: u32,
    pub item_id: String,
    pub title: String,
    pub channel: Option<String>,
    pub added_by: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChatMessage {
    pub id: u64,
    pub sender: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlaybackState {
    pub item_id: Option<String>,
    pub playing: bool,
    pub position: f32,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

impl ToSerialized<UserProfile> for jamroom_collab::UserProfile {
    fn to_serialized(&self) -> UserProfile {
        UserProfile {
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

impl ToSerialized<Room> for jamroom_collab::RoomData {
    fn to_serialized(&self) -> Room {
        Room {
            id: self.id.clone(),
            title: self.title.clone(),
            host: self.host.to_serialized(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<RoomMember> for jamroom_collab::RoomMemberData {
    fn to_serialized(&self) -> RoomMember {
        RoomMember {
            user: self.user.to_serialized(),
            audio_enabled: self.audio_enabled,
            video_enabled: self.video_enabled,
            joined_at: self.joined_at,
        }
    }
}

impl ToSerialized<QueueItem> for jamroom_collab::QueueEntryData {
    fn to_serialized(&self) -> QueueItem {
        QueueItem {
            id: self.id,
            position: self.position,
            item_id: self.item.item_id.clone(),
            title: self.item.title.clone(),
            channel: self.item.channel.clone(),
            added_by: self.added_by.clone(),
            added_at: self.added_at,
        }
    }
}

impl ToSerialized<ChatMessage> for jamroom_collab::ChatMessageData {
    fn to_serialized(&self) -> ChatMessage {
        ChatMessage {
            id: self.id,
            sender: self.sender.clone(),
            body: self.body.clone(),
            sent_at: self.sent_at,
        }
    }
}

impl ToSerialized<PlaybackState> for PlaybackRecord {
    fn to_serialized(&self) -> PlaybackState {
        PlaybackState {
            item_id: self.item_id.clone(),
            playing: self.playing,
            position: self.position,
            updated_by: self.updated_by.clone(),
            updated_at: self.updated_at,
        }
    }
}
