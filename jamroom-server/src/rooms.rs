use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, patch},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use jamroom_collab::{NewRoom, UserProfile};
use jamroom_core::PlaybackRecord;

use crate::{
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{
        ChatSchema, JoinRoomSchema, MemberMediaSchema, NewRoomSchema, PlaybackSchema,
        QueueAddSchema, ValidatedJson,
    },
    serialized::{ChatMessage, PlaybackState, QueueItem, Room, RoomMember, ToSerialized},
};

/// How many chat messages are returned when no limit is given.
const DEFAULT_CHAT_LIMIT: usize = 50;

pub fn router() -> Router<ServerContext> {
    Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/:id", get(room))
        .route("/rooms/:id/members", get(members).post(join_room))
        .route(
            "/rooms/:id/members/:user_id",
            patch(update_member_media).delete(leave_room),
        )
        .route("/rooms/:id/queue", get(queue).post(add_to_queue))
        .route("/rooms/:id/queue/:entry_id", delete(remove_queue_entry))
        .route("/rooms/:id/chat", get(chat).post(send_chat))
        .route("/rooms/:id/playback", get(playback).put(write_playback))
}

#[utoipa::path(
    get,
    path = "/v1/rooms",
    tag = "rooms",
    responses(
        (status = 200, body = Vec<Room>)
    )
)]
pub(crate) async fn list_rooms(State(context): State<ServerContext>) -> Json<Vec<Room>> {
    let rooms: Vec<_> = context
        .collab
        .rooms
        .list_all()
        .into_iter()
        .map(|r| r.data().to_serialized())
        .collect();

    Json(rooms)
}

#[utoipa::path(
    post,
    path = "/v1/rooms",
    tag = "rooms",
    request_body = NewRoomSchema,
    responses(
        (status = 200, body = Room)
    )
)]
pub(crate) async fn create_room(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewRoomSchema>,
) -> ServerResult<Json<Room>> {
    let room = context
        .collab
        .rooms
        .create_room(NewRoom {
            id: body.id,
            title: body.title,
            host: UserProfile {
                user_id: body.host.user_id,
                display_name: body.host.display_name,
            },
        })
        .await?;

    Ok(Json(room.data().to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}",
    tag = "rooms",
    responses(
        (status = 200, body = Room)
    )
)]
pub(crate) async fn room(
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
) -> ServerResult<Json<Room>> {
    let room = context.collab.rooms.room_by_id(&room_id)?;

    Ok(Json(room.data().to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/members",
    tag = "rooms",
    responses(
        (status = 200, body = Vec<RoomMember>)
    )
)]
pub(crate) async fn members(
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
) -> ServerResult<Json<Vec<RoomMember>>> {
    let room = context.collab.rooms.room_by_id(&room_id)?;
    let members = room.members().await?;

    Ok(Json(members.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/members",
    tag = "rooms",
    request_body = JoinRoomSchema,
    responses(
        (status = 200, body = RoomMember)
    )
)]
pub(crate) async fn join_room(
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
    ValidatedJson(body): ValidatedJson<JoinRoomSchema>,
) -> ServerResult<Json<RoomMember>> {
    let room = context.collab.rooms.room_by_id(&room_id)?;

    let member = room
        .join(UserProfile {
            user_id: body.user_id,
            display_name: body.display_name,
        })
        .await?;

    Ok(Json(member.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{id}/members/{user_id}",
    tag = "rooms",
    responses(
        (status = 200, description = "The member left the room")
    )
)]
pub(crate) async fn leave_room(
    State(context): State<ServerContext>,
    Path((room_id, user_id)): Path<(String, String)>,
) -> ServerResult<()> {
    let room = context.collab.rooms.room_by_id(&room_id)?;
    room.leave(&user_id).await?;

    Ok(())
}

#[utoipa::path(
    patch,
    path = "/v1/rooms/{id}/members/{user_id}",
    tag = "rooms",
    request_body = MemberMediaSchema,
    responses(
        (status = 200, body = RoomMember)
    )
)]
pub(crate) async fn update_member_media(
    State(context): State<ServerContext>,
    Path((room_id, user_id)): Path<(String, String)>,
    ValidatedJson(body): ValidatedJson<MemberMediaSchema>,
) -> ServerResult<Json<RoomMember>> {
    let room = context.collab.rooms.room_by_id(&room_id)?;

    let member = room
        .set_member_media(&user_id, body.audio_enabled, body.video_enabled)
        .await?;

    Ok(Json(member.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/queue",
    tag = "queue",
    responses(
        (status = 200, body = Vec<QueueItem>)
    )
)]
pub(crate) async fn queue(
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
) -> ServerResult<Json<Vec<QueueItem>>> {
    let room = context.collab.rooms.room_by_id(&room_id)?;
    let entries = room.queue().entries().await?;

    Ok(Json(entries.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/queue",
    tag = "queue",
    request_body = QueueAddSchema,
    responses(
        (status = 200, body = QueueItem)
    )
)]
pub(crate) async fn add_to_queue(
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
    ValidatedJson(body): ValidatedJson<QueueAddSchema>,
) -> ServerResult<Json<QueueItem>> {
    let room = context.collab.rooms.room_by_id(&room_id)?;
    let entry = room.add_to_queue(&body.user_id, &body.input).await?;

    Ok(Json(entry.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{id}/queue/{entry_id}",
    tag = "queue",
    responses(
        (status = 200, description = "The entry was removed from the queue")
    )
)]
pub(crate) async fn remove_queue_entry(
    State(context): State<ServerContext>,
    Path((room_id, entry_id)): Path<(String, u64)>,
) -> ServerResult<()> {
    let room = context.collab.rooms.room_by_id(&room_id)?;
    room.remove_from_queue(entry_id).await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatQuery {
    limit: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/chat",
    tag = "chat",
    responses(
        (status = 200, body = Vec<ChatMessage>)
    )
)]
pub(crate) async fn chat(
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
    Query(query): Query<ChatQuery>,
) -> ServerResult<Json<Vec<ChatMessage>>> {
    let room = context.collab.rooms.room_by_id(&room_id)?;

    let messages = room
        .recent_chat(query.limit.unwrap_or(DEFAULT_CHAT_LIMIT))
        .await?;

    Ok(Json(messages.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/chat",
    tag = "chat",
    request_body = ChatSchema,
    responses(
        (status = 200, body = ChatMessage)
    )
)]
pub(crate) async fn send_chat(
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
    ValidatedJson(body): ValidatedJson<ChatSchema>,
) -> ServerResult<Json<ChatMessage>> {
    let room = context.collab.rooms.room_by_id(&room_id)?;
    let message = room.send_chat(&body.user_id, body.body).await?;

    Ok(Json(message.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/playback",
    tag = "playback",
    responses(
        (status = 200, body = PlaybackState)
    )
)]
pub(crate) async fn playback(
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
) -> ServerResult<Json<PlaybackState>> {
    // The room must exist even when no record does yet
    context.collab.rooms.room_by_id(&room_id)?;

    let record = context
        .collab
        .playback()
        .fetch(&room_id)
        .await?
        .ok_or(ServerError::NotFound {
            resource: "playback",
            identifier: room_id,
        })?;

    Ok(Json(record.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/v1/rooms/{id}/playback",
    tag = "playback",
    request_body = PlaybackSchema,
    responses(
        (status = 200, body = PlaybackState)
    )
)]
pub(crate) async fn write_playback(
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
    ValidatedJson(body): ValidatedJson<PlaybackSchema>,
) -> ServerResult<Json<PlaybackState>> {
    let room = context.collab.rooms.room_by_id(&room_id)?;

    // Shared playback is host-gated
    if !room.is_host(&body.updated_by) {
        return Err(ServerError::NotHost);
    }

    let record = context
        .collab
        .playback()
        .upsert(PlaybackRecord {
            room_id,
            item_id: body.item_id,
            playing: body.playing,
            position: body.position,
            updated_by: body.updated_by,
            updated_at: Utc::now(),
        })
        .await?;

    Ok(Json(record.to_serialized()))
}
