use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use jamroom_core::{PlaybackRecord, Signaling, SignalingEvent, SignalingMessage, UserId};

use crate::{context::ServerContext, errors::ServerResult};

pub fn router() -> Router<ServerContext> {
    Router::new().route("/rooms/:id/gateway", get(gateway))
}

/// What the gateway pushes down to a connected client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
enum GatewayEvent {
    /// A negotiation message broadcast on the room's channel
    Signaling { message: SignalingMessage },
    /// Participants that became present on the channel
    PeersJoined { user_ids: Vec<UserId> },
    /// Participants that are no longer present on the channel
    PeersLeft { user_ids: Vec<UserId> },
    /// The room's shared playback record changed
    Playback { record: PlaybackRecord },
}

/// What a connected client may send up through the gateway.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
enum GatewayCommand {
    Signaling { message: SignalingMessage },
}

#[derive(Debug, Deserialize)]
struct GatewayParams {
    user_id: UserId,
}

/// Upgrades a member's connection into its realtime link with the room: the
/// signaling relay, presence, and the playback record feed.
async fn gateway(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    Query(params): Query<GatewayParams>,
    State(context): State<ServerContext>,
) -> ServerResult<Response> {
    let room = context.collab.rooms.room_by_id(&room_id)?;

    // The user must have joined the room before connecting
    room.member_by_user_id(&params.user_id).await?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, context, room_id, params.user_id)))
}

async fn handle_socket(socket: WebSocket, context: ServerContext, room_id: String, user_id: String) {
    let signaling = context.collab.signaling().join(&room_id, &user_id);
    let mut signaling_events = signaling.subscribe();
    let mut playback = context.collab.playback().watch(&room_id);

    let (mut outgoing, mut incoming) = socket.split();

    info!("User {} connected to the {} gateway", user_id, room_id);

    loop {
        tokio::select! {
            message = next_command(&mut incoming) => {
                match message {
                    Some(GatewayCommand::Signaling { message }) => {
                        if let Err(err) = signaling.send(message).await {
                            warn!("Failed to relay signaling message: {}", err);
                        }
                    }
                    None => break,
                }
            }
            event = signaling_events.recv() => {
                let Some(event) = event else { break };

                let outbound = match event {
                    SignalingEvent::Message(message) => GatewayEvent::Signaling { message },
                    SignalingEvent::PeersJoined(user_ids) => GatewayEvent::PeersJoined { user_ids },
                    SignalingEvent::PeersLeft(user_ids) => GatewayEvent::PeersLeft { user_ids },
                };

                if send_event(&mut outgoing, &outbound).await.is_err() {
                    break;
                }
            }
            record = playback.recv() => {
                let Some(record) = record else { break };

                if send_event(&mut outgoing, &GatewayEvent::Playback { record }).await.is_err() {
                    break;
                }
            }
        }
    }

    // Dropping the signaling handle leaves the channel, announcing the
    // departure to the other participants
    info!("User {} disconnected from the {} gateway", user_id, room_id);
}

/// Reads the next well-formed command off the socket. Returns None once the
/// socket is closed or errored.
async fn next_command(incoming: &mut SplitStream<WebSocket>) -> Option<GatewayCommand> {
    loop {
        let message = incoming.next().await?;

        match message {
            Ok(Message::Text(text)) => match serde_json::from_str(&text) {
                Ok(command) => return Some(command),
                Err(err) => debug!("Discarding malformed gateway message: {}", err),
            },
            Ok(Message::Close(_)) => return None,
            Ok(_) => {}
            Err(err) => {
                debug!("Gateway socket errored: {}", err);
                return None;
            }
        }
    }
}

async fn send_event(
    outgoing: &mut SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(text) => outgoing.send(Message::Text(text)).await,
        Err(err) => {
            warn!("Failed to serialize gateway event: {}", err);
            Ok(())
        }
    }
}
