use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures_util::{stream, Stream};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use utoipa::ToSchema;

use jamroom_collab::CollabEvent;

use crate::{
    context::ServerContext,
    serialized::{ChatMessage, PlaybackState, QueueItem, Room, RoomMember, ToSerialized},
};

pub fn router() -> Router<ServerContext> {
    Router::new().route("/events", get(events))
}

/// Room events as they go out to event stream subscribers.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum ServerEvent {
    /// A room was created
    RoomCreated { room: Room },
    /// A user became a member of a room
    UserJoined { room_id: String, new_member: RoomMember },
    /// A user left a room
    UserLeft { room_id: String, user_id: String },
    /// A member toggled its capture tracks
    MemberMediaUpdate { room_id: String, member: RoomMember },
    /// A room's queue changed
    QueueUpdate {
        room_id: String,
        entries: Vec<QueueItem>,
    },
    /// A chat message was sent to a room
    ChatMessage {
        room_id: String,
        message: ChatMessage,
    },
    /// A room's shared playback record changed
    PlaybackUpdate {
        room_id: String,
        playback: PlaybackState,
    },
}

impl ServerEvent {
    /// Convert a collab event to a friendly server event
    pub fn from_collab_event(event: CollabEvent) -> Self {
        match event {
            CollabEvent::RoomCreated { room } => Self::RoomCreated {
                room: room.to_serialized(),
            },
            CollabEvent::UserJoined {
                room_id,
                new_member,
            } => Self::UserJoined {
                room_id,
                new_member: new_member.to_serialized(),
            },
            CollabEvent::UserLeft { room_id, user_id } => Self::UserLeft { room_id, user_id },
            CollabEvent::MemberMediaUpdate { room_id, member } => Self::MemberMediaUpdate {
                room_id,
                member: member.to_serialized(),
            },
            CollabEvent::QueueUpdate { room_id, entries } => Self::QueueUpdate {
                room_id,
                entries: entries.to_serialized(),
            },
            CollabEvent::ChatMessage { room_id, message } => Self::ChatMessage {
                room_id,
                message: message.to_serialized(),
            },
            CollabEvent::PlaybackUpdate { room_id, record } => Self::PlaybackUpdate {
                room_id,
                playback: record.to_serialized(),
            },
        }
    }
}

/// Streams every room event to the client as server-sent events.
async fn events(
    State(context): State<ServerContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = context.collab.subscribe();

    let stream = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let server_event = ServerEvent::from_collab_event(event);

                    if let Ok(event) = Event::default().json_data(&server_event) {
                        return Some((Ok(event), receiver));
                    }
                }
                // A lagged subscriber just misses the skipped events
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
