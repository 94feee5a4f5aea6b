use chrono::{DateTime, Utc};

use jamroom_core::{RoomId, UserId};

use crate::items::ItemDetails;

pub type PrimaryKey = u64;

/// The identity the surrounding platform resolved for a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: UserId,
    pub display_name: String,
}

/// A room as the store knows it. The id doubles as the room's slug and keys
/// the signaling channel and the playback record.
#[derive(Debug, Clone)]
pub struct RoomData {
    pub id: RoomId,
    pub title: String,
    pub host: UserProfile,
    pub created_at: DateTime<Utc>,
}

/// A participant of a room. The media flags mirror the participant's local
/// track toggles for the other clients' UI, nothing in the sync core reads
/// them.
#[derive(Debug, Clone)]
pub struct RoomMemberData {
    pub user: UserProfile,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub joined_at: DateTime<Utc>,
}

impl RoomMemberData {
    pub fn new(user: UserProfile) -> Self {
        Self {
            user,
            audio_enabled: true,
            video_enabled: true,
            joined_at: Utc::now(),
        }
    }
}

/// One entry of a room's song queue, ordered by `position`. The entry at
/// position zero is the currently playing item.
#[derive(Debug, Clone)]
pub struct QueueEntryData {
    pub id: PrimaryKey,
    pub room_id: RoomId,
    pub position: u32,
    pub item: ItemDetails,
    pub added_by: UserId,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ChatMessageData {
    pub id: PrimaryKey,
    pub room_id: RoomId,
    pub sender: UserId,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewRoom {
    pub id: RoomId,
    pub title: String,
    pub host: UserProfile,
}

#[derive(Debug)]
pub struct NewQueueEntry {
    pub item: ItemDetails,
    pub added_by: UserId,
}

#[derive(Debug)]
pub struct NewChatMessage {
    pub sender: UserId,
    pub body: String,
}
