use axum::{response::IntoResponse, Json};
use utoipa::OpenApi;

use crate::schemas;
use crate::serialized;
use crate::sse;

#[derive(OpenApi)]
#[openapi(
    info(description = "jamroom-server exposes endpoints to interact with this jamroom instance"),
    paths(
        crate::rooms::list_rooms,
        crate::rooms::create_room,
        crate::rooms::room,
        crate::rooms::members,
        crate::rooms::join_room,
        crate::rooms::leave_room,
        crate::rooms::update_member_media,
        crate::rooms::queue,
        crate::rooms::add_to_queue,
        crate::rooms::remove_queue_entry,
        crate::rooms::chat,
        crate::rooms::send_chat,
        crate::rooms::playback,
        crate::rooms::write_playback,
    ),
    components(schemas(
        serialized::Room,
        serialized::RoomMember,
        serialized::UserProfile,
        serialized::QueueItem,
        serialized::ChatMessage,
        serialized::PlaybackState,
        schemas::NewRoomSchema,
        schemas::UserProfileSchema,
        schemas::JoinRoomSchema,
        schemas::QueueAddSchema,
        schemas::ChatSchema,
        schemas::MemberMediaSchema,
        schemas::PlaybackSchema,
        sse::ServerEvent,
    ))
)]
pub struct ApiDoc;

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
