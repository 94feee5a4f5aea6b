use tokio::sync::broadcast;

use jamroom_core::{PlaybackRecord, RoomId, UserId};

use crate::{ChatMessageData, QueueEntryData, RoomData, RoomMemberData};

pub type CollabEventSender = broadcast::Sender<CollabEvent>;
pub type CollabEventReceiver = broadcast::Receiver<CollabEvent>;

/// Events emitted by the collab system, fanned out to every connected client.
#[derive(Debug, Clone)]
pub enum CollabEvent {
    /// A room was created
    RoomCreated { room: RoomData },
    /// A user became a member of a room
    UserJoined {
        room_id: RoomId,
        new_member: RoomMemberData,
    },
    /// A user left a room
    UserLeft { room_id: RoomId, user_id: UserId },
    /// A member toggled its capture tracks, mirrored for UI indicators
    MemberMediaUpdate {
        room_id: RoomId,
        member: RoomMemberData,
    },
    /// A room's queue changed
    QueueUpdate {
        room_id: RoomId,
        entries: Vec<QueueEntryData>,
    },
    /// A chat message was sent to a room
    ChatMessage {
        room_id: RoomId,
        message: ChatMessageData,
    },
    /// A room's shared playback record changed
    PlaybackUpdate {
        room_id: RoomId,
        record: PlaybackRecord,
    },
}
