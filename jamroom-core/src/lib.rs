use crossbeam::channel::unbounded;
use dashmap::DashMap;
use log::warn;
use std::sync::Arc;
use tokio::{
    spawn,
    sync::mpsc::UnboundedReceiver,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};

mod capture;
mod config;
mod events;
mod peers;
mod player;
mod queue;
mod signaling;
mod store;
mod sync;
mod util;

pub use capture::*;
pub use config::*;
pub use events::*;
pub use peers::*;
pub use player::*;
pub use queue::*;
pub use signaling::*;
pub use store::*;
pub use sync::*;
pub use util::*;

#[cfg(test)]
mod testing;

/// Participants and rooms are identified by the opaque ids the surrounding
/// platform assigns them.
pub type UserId = String;
pub type RoomId = String;
pub type ItemId = String;

// Reduces verbosity
pub(crate) type Store<Id, T> = Arc<DashMap<Id, Arc<T>>>;

/// Who the local participant is within a room.
///
/// The host flag is decided at join time from room metadata and never changes
/// for the lifetime of the session.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub is_host: bool,
}

/// The external collaborators a session is wired to.
pub struct SessionCollaborators {
    pub signaling: Arc<dyn Signaling>,
    pub connector: Arc<dyn PeerConnector>,
    pub store: Arc<dyn PlaybackStore>,
    pub player: Arc<dyn MediaPlayer>,
    pub queue: Arc<dyn QueueSource>,
    /// Absent when local capture failed or was never requested. Connections
    /// still form, but carry no outbound media.
    pub media: Option<Arc<dyn MediaSource>>,
}

/// A type passed to the session's components, to access identity, config,
/// and emit events.
#[derive(Clone)]
pub struct SessionContext {
    pub config: SessionConfig,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub is_host: bool,

    event_sender: EventSender,
}

impl SessionContext {
    pub fn emit(&self, event: SessionEvent) {
        // The consumer may already be gone while a session tears down
        self.event_sender.send(event).ok();
    }
}

/// One participant's presence in a room: the peer links to every other
/// participant, and the controller keeping local playback in sync with the
/// room's shared record.
pub struct RoomSession {
    context: SessionContext,
    peers: Arc<PeerRegistry>,
    sync: Arc<SyncController>,
    media: Option<Arc<dyn MediaSource>>,

    event_receiver: EventReceiver,
    tasks: Vec<JoinHandle<()>>,
}

impl RoomSession {
    /// Wires the collaborators together and starts the session's event pumps.
    pub fn start(
        config: SessionConfig,
        identity: SessionIdentity,
        collaborators: SessionCollaborators,
    ) -> Self {
        let (event_sender, event_receiver) = unbounded();

        let context = SessionContext {
            config,
            room_id: identity.room_id,
            user_id: identity.user_id,
            is_host: identity.is_host,
            event_sender,
        };

        debug_assert!(
            context.config.has_sane_tolerances(),
            "the write threshold must stay tighter than the follower tolerance"
        );

        let peers = PeerRegistry::new(
            &context,
            collaborators.signaling.clone(),
            collaborators.connector,
            collaborators.media.clone(),
        );

        let sync = Arc::new(SyncController::new(
            &context,
            collaborators.store.clone(),
            collaborators.player.clone(),
            collaborators.queue,
        ));

        let mut tasks = vec![
            spawn_signaling_pump(
                context.clone(),
                peers.clone(),
                collaborators.signaling.subscribe(),
            ),
            spawn_record_pump(sync.clone(), collaborators.store.watch(&context.room_id)),
            spawn_player_pump(sync.clone(), collaborators.player.subscribe()),
        ];

        if context.is_host {
            tasks.push(spawn_host_timer(context.clone(), sync.clone()));
        }

        Self {
            context,
            peers,
            sync,
            media: collaborators.media,
            event_receiver,
            tasks,
        }
    }

    pub fn peers(&self) -> &Arc<PeerRegistry> {
        &self.peers
    }

    pub fn sync(&self) -> &Arc<SyncController> {
        &self.sync
    }

    pub fn is_host(&self) -> bool {
        self.context.is_host
    }

    /// Toggles the local tracks of the given kind without stopping capture.
    pub fn set_track_enabled(&self, kind: TrackKind, enabled: bool) {
        let Some(media) = &self.media else {
            return;
        };

        for track in media.tracks() {
            if track.kind == kind {
                track.set_enabled(enabled);
            }
        }
    }

    /// Receive events from the session.
    pub fn wait_for_event(&self) -> SessionEvent {
        self.event_receiver
            .recv()
            .expect("event is received without error")
    }

    pub fn events(&self) -> &EventReceiver {
        &self.event_receiver
    }

    /// Leaves the room: stops the pumps and closes every peer link.
    pub fn leave(&self) {
        // The pumps stop first so nothing reacts to the teardown itself
        for task in &self.tasks {
            task.abort();
        }

        self.peers.teardown_all();
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        self.leave()
    }
}

/// Dispatches signaling traffic: presence changes drive link lifecycle, and
/// negotiation messages addressed to this participant drive the handshake.
fn spawn_signaling_pump(
    context: SessionContext,
    peers: Arc<PeerRegistry>,
    mut events: UnboundedReceiver<SignalingEvent>,
) -> JoinHandle<()> {
    spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SignalingEvent::PeersJoined(user_ids) => {
                    for user_id in user_ids {
                        if user_id == context.user_id {
                            continue;
                        }

                        // Every existing member initiates toward the
                        // newcomer; the newcomer only answers.
                        if let Err(err) = peers.ensure_link(&user_id, true).await {
                            warn!("Failed to open peer link to {}: {}", user_id, err);
                        }
                    }
                }
                SignalingEvent::PeersLeft(user_ids) => {
                    for user_id in user_ids {
                        peers.teardown_link(&user_id);
                    }
                }
                SignalingEvent::Message(message) => {
                    if message.target() != &context.user_id {
                        continue;
                    }

                    let from = message.from_user().clone();

                    let result = match message {
                        SignalingMessage::Offer { sdp, .. } => peers.handle_offer(&from, sdp).await,
                        SignalingMessage::Answer { sdp, .. } => {
                            peers.handle_answer(&from, sdp).await
                        }
                        SignalingMessage::IceCandidate { candidate, .. } => {
                            peers.handle_candidate(&from, candidate).await
                        }
                    };

                    if let Err(err) = result {
                        warn!("Negotiation with {} failed: {}", from, err);
                    }
                }
            }
        }
    })
}

/// Applies every external change of the shared playback record.
fn spawn_record_pump(
    sync: Arc<SyncController>,
    mut records: UnboundedReceiver<PlaybackRecord>,
) -> JoinHandle<()> {
    spawn(async move {
        while let Some(record) = records.recv().await {
            sync.on_external_update(record).await;
        }
    })
}

/// Reacts to the player surface becoming ready and to items ending.
fn spawn_player_pump(
    sync: Arc<SyncController>,
    mut events: UnboundedReceiver<PlayerEvent>,
) -> JoinHandle<()> {
    spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                PlayerEvent::Ready => {
                    if let Err(err) = sync.load_record().await {
                        warn!("Failed to load playback record: {}", err);
                    }
                }
                PlayerEvent::ItemEnded => sync.on_item_ended().await,
                PlayerEvent::ItemLoaded { .. } => {}
            }
        }
    })
}

/// Periodically samples the host's player into the shared record.
fn spawn_host_timer(context: SessionContext, sync: Arc<SyncController>) -> JoinHandle<()> {
    spawn(async move {
        let mut timer = interval(context.config.host_sync_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            timer.tick().await;
            sync.periodic_host_sync().await;
        }
    })
}
