//! Fake collaborators used by the unit tests in this crate.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crossbeam::atomic::AtomicCell;
use crossbeam::channel::unbounded;
use parking_lot::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::{
    ConnectionEvent, EventReceiver, IceCandidate, ItemId, MediaPlayer, MediaSource, MediaTrack,
    NegotiationError, PeerConnection, PeerConnector, PlaybackRecord, PlaybackStore, PlayerEvent,
    QueueSource, RoomId, SdpKind, SessionConfig, SessionContext, SessionDescription, Signaling,
    SignalingError, SignalingEvent, SignalingMessage, StoreError,
};

pub fn test_context(room_id: &str, user_id: &str, is_host: bool) -> (SessionContext, EventReceiver) {
    let (event_sender, event_receiver) = unbounded();

    let context = SessionContext {
        config: SessionConfig::default(),
        room_id: room_id.to_string(),
        user_id: user_id.to_string(),
        is_host,
        event_sender,
    };

    (context, event_receiver)
}

/// Polls until the predicate holds, panicking after a second.
pub async fn wait_until<F>(predicate: F)
where
    F: Fn() -> bool,
{
    for _ in 0..200 {
        if predicate() {
            return;
        }

        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    panic!("condition was not reached in time");
}

#[derive(Default)]
pub struct FakeSignaling {
    sent: Mutex<Vec<SignalingMessage>>,
    subscribers: Mutex<Vec<UnboundedSender<SignalingEvent>>>,
}

impl FakeSignaling {
    pub fn new() -> Arc<Self> {
        Default::default()
    }

    pub fn sent(&self) -> Vec<SignalingMessage> {
        self.sent.lock().clone()
    }

    pub fn sent_offers(&self) -> Vec<SignalingMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|m| matches!(m, SignalingMessage::Offer { .. }))
            .cloned()
            .collect()
    }

    /// Delivers an event to every subscriber, like the channel would.
    pub fn inject(&self, event: SignalingEvent) {
        for subscriber in self.subscribers.lock().iter() {
            subscriber.send(event.clone()).ok();
        }
    }
}

#[async_trait]
impl Signaling for FakeSignaling {
    async fn send(&self, message: SignalingMessage) -> Result<(), SignalingError> {
        self.sent.lock().push(message);
        Ok(())
    }

    fn subscribe(&self) -> UnboundedReceiver<SignalingEvent> {
        let (sender, receiver) = unbounded_channel();
        self.subscribers.lock().push(sender);
        receiver
    }
}

#[derive(Default)]
pub struct FakeConnector {
    connections: Mutex<Vec<Arc<FakeConnection>>>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Default::default()
    }

    pub fn connections(&self) -> Vec<Arc<FakeConnection>> {
        self.connections.lock().clone()
    }

    pub fn last_connection(&self) -> Arc<FakeConnection> {
        self.connections
            .lock()
            .last()
            .cloned()
            .expect("a connection was created")
    }
}

impl PeerConnector for FakeConnector {
    fn connect(&self, _ice_servers: &[String]) -> Result<Arc<dyn PeerConnection>, NegotiationError> {
        let connection = Arc::new(FakeConnection::default());
        self.connections.lock().push(connection.clone());

        Ok(connection)
    }
}

#[derive(Default)]
pub struct FakeConnection {
    descriptions_created: AtomicCell<u32>,
    pub local_description: Mutex<Option<SessionDescription>>,
    pub remote_description: Mutex<Option<SessionDescription>>,
    candidates: Mutex<Vec<IceCandidate>>,
    tracks: Mutex<Vec<MediaTrack>>,
    closed: AtomicCell<bool>,
    subscribers: Mutex<Vec<UnboundedSender<ConnectionEvent>>>,
}

impl FakeConnection {
    pub fn emit(&self, event: ConnectionEvent) {
        for subscriber in self.subscribers.lock().iter() {
            subscriber.send(event.clone()).ok();
        }
    }

    pub fn applied_candidates(&self) -> Vec<IceCandidate> {
        self.candidates.lock().clone()
    }

    pub fn attached_tracks(&self) -> Vec<MediaTrack> {
        self.tracks.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load()
    }
}

#[async_trait]
impl PeerConnection for FakeConnection {
    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError> {
        let count = self.descriptions_created.fetch_add(1);

        Ok(SessionDescription {
            kind: SdpKind::Offer,
            sdp: format!("offer-{}", count),
        })
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        let count = self.descriptions_created.fetch_add(1);

        Ok(SessionDescription {
            kind: SdpKind::Answer,
            sdp: format!("answer-{}", count),
        })
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        *self.local_description.lock() = Some(description);
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        *self.remote_description.lock() = Some(description);
        Ok(())
    }

    fn has_remote_description(&self) -> bool {
        self.remote_description.lock().is_some()
    }

    async fn add_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        self.candidates.lock().push(candidate);
        Ok(())
    }

    fn add_track(&self, track: MediaTrack) {
        self.tracks.lock().push(track)
    }

    fn subscribe(&self) -> UnboundedReceiver<ConnectionEvent> {
        let (sender, receiver) = unbounded_channel();
        self.subscribers.lock().push(sender);
        receiver
    }

    fn close(&self) {
        self.closed.store(true);
        // Ends the event stream, so link pumps run to completion
        self.subscribers.lock().clear();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Seek(f32),
    Play,
    Pause,
    Load(ItemId),
}

#[derive(Default)]
pub struct FakePlayer {
    position: AtomicCell<f32>,
    playing: AtomicCell<bool>,
    current: Mutex<Option<ItemId>>,
    commands: Mutex<Vec<PlayerCommand>>,
    subscribers: Mutex<Vec<UnboundedSender<PlayerEvent>>>,
}

impl FakePlayer {
    pub fn new() -> Arc<Self> {
        Default::default()
    }

    pub fn set_position(&self, position: f32) {
        self.position.store(position)
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing)
    }

    pub fn set_current(&self, item_id: &str) {
        *self.current.lock() = Some(item_id.to_string())
    }

    pub fn commands(&self) -> Vec<PlayerCommand> {
        self.commands.lock().clone()
    }

    pub fn clear_commands(&self) {
        self.commands.lock().clear()
    }

    pub fn emit(&self, event: PlayerEvent) {
        for subscriber in self.subscribers.lock().iter() {
            subscriber.send(event.clone()).ok();
        }
    }
}

impl MediaPlayer for FakePlayer {
    fn position(&self) -> f32 {
        self.position.load()
    }

    fn is_playing(&self) -> bool {
        self.playing.load()
    }

    fn current_item(&self) -> Option<ItemId> {
        self.current.lock().clone()
    }

    fn seek(&self, position: f32) {
        self.position.store(position);
        self.commands.lock().push(PlayerCommand::Seek(position));
    }

    fn play(&self) {
        self.playing.store(true);
        self.commands.lock().push(PlayerCommand::Play);
    }

    fn pause(&self) {
        self.playing.store(false);
        self.commands.lock().push(PlayerCommand::Pause);
    }

    fn load(&self, item_id: &ItemId) {
        *self.current.lock() = Some(item_id.clone());
        self.position.store(0.);
        self.commands.lock().push(PlayerCommand::Load(item_id.clone()));
    }

    fn subscribe(&self) -> UnboundedReceiver<PlayerEvent> {
        let (sender, receiver) = unbounded_channel();
        self.subscribers.lock().push(sender);
        receiver
    }
}

#[derive(Default)]
pub struct FakeStore {
    record: Mutex<Option<PlaybackRecord>>,
    upserts: Mutex<Vec<PlaybackRecord>>,
    fail_writes: AtomicCell<bool>,
    watchers: Mutex<Vec<UnboundedSender<PlaybackRecord>>>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Default::default()
    }

    pub fn with_record(record: PlaybackRecord) -> Arc<Self> {
        let store = Self::new();
        *store.record.lock() = Some(record);
        store
    }

    pub fn upserts(&self) -> Vec<PlaybackRecord> {
        self.upserts.lock().clone()
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true)
    }
}

#[async_trait]
impl PlaybackStore for FakeStore {
    async fn fetch(&self, _room_id: &RoomId) -> Result<Option<PlaybackRecord>, StoreError> {
        Ok(self.record.lock().clone())
    }

    async fn upsert(&self, record: PlaybackRecord) -> Result<PlaybackRecord, StoreError> {
        if self.fail_writes.load() {
            return Err(StoreError::Unavailable("write failed".to_string()));
        }

        *self.record.lock() = Some(record.clone());
        self.upserts.lock().push(record.clone());

        for watcher in self.watchers.lock().iter() {
            watcher.send(record.clone()).ok();
        }

        Ok(record)
    }

    fn watch(&self, _room_id: &RoomId) -> UnboundedReceiver<PlaybackRecord> {
        let (sender, receiver) = unbounded_channel();
        self.watchers.lock().push(sender);
        receiver
    }
}

#[derive(Default)]
pub struct FakeQueue {
    items: Mutex<VecDeque<ItemId>>,
}

impl FakeQueue {
    pub fn new(items: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(items.iter().map(|i| i.to_string()).collect()),
        })
    }
}

#[async_trait]
impl QueueSource for FakeQueue {
    async fn current(&self) -> Result<Option<ItemId>, StoreError> {
        Ok(self.items.lock().front().cloned())
    }

    async fn advance(&self) -> Result<Option<ItemId>, StoreError> {
        let mut items = self.items.lock();
        items.pop_front();

        Ok(items.front().cloned())
    }
}

pub struct FakeMedia {
    tracks: Vec<MediaTrack>,
}

impl FakeMedia {
    pub fn new(tracks: Vec<MediaTrack>) -> Arc<Self> {
        Arc::new(Self { tracks })
    }
}

impl MediaSource for FakeMedia {
    fn tracks(&self) -> Vec<MediaTrack> {
        self.tracks.clone()
    }
}
