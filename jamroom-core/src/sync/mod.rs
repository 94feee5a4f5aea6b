use std::sync::Arc;

use chrono::{DateTime, Utc};
use crossbeam::atomic::AtomicCell;
use log::warn;
use parking_lot::Mutex;
use thiserror::Error;

use crate::{
    ItemId, MediaPlayer, PlaybackRecord, PlaybackStore, QueueSource, SessionContext, SessionEvent,
    StoreError,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No player control surface is attached yet.
    #[default]
    Uninitialized,
    /// The control surface is attached and reconciliation may run.
    Ready,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("only the host can control shared playback")]
    NotHost,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Keeps the local player within tolerance of the room's shared playback
/// record, and pushes the host's local playback into that record.
///
/// Every participant reconciles on external updates; only the host writes.
pub struct SyncController {
    context: SessionContext,
    store: Arc<dyn PlaybackStore>,
    player: Arc<dyn MediaPlayer>,
    queue: Arc<dyn QueueSource>,

    state: AtomicCell<SyncState>,
    /// Guards against overlapping reconciliation passes.
    is_syncing: AtomicCell<bool>,
    /// Guards against concurrent record writes.
    is_writing: AtomicCell<bool>,

    last_known: Mutex<Option<PlaybackRecord>>,
    last_written_at: Mutex<Option<DateTime<Utc>>>,
}

impl SyncController {
    pub fn new(
        context: &SessionContext,
        store: Arc<dyn PlaybackStore>,
        player: Arc<dyn MediaPlayer>,
        queue: Arc<dyn QueueSource>,
    ) -> Self {
        Self {
            context: context.clone(),
            store,
            player,
            queue,
            state: Default::default(),
            is_syncing: AtomicCell::new(false),
            is_writing: AtomicCell::new(false),
            last_known: Default::default(),
            last_written_at: Default::default(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state.load()
    }

    /// Returns the most recently applied or written record.
    pub fn last_known_record(&self) -> Option<PlaybackRecord> {
        self.last_known.lock().clone()
    }

    /// Loads the room's record once the player surface is attached.
    ///
    /// If no record exists and the local participant is the host, one is
    /// initialized from the front of the queue, paused at position zero.
    pub async fn load_record(&self) -> Result<(), StoreError> {
        self.state.store(SyncState::Ready);

        match self.store.fetch(&self.context.room_id).await? {
            Some(record) => self.reconcile(record),
            None if self.context.is_host => {
                let item_id = self.queue.current().await?;

                if let Some(item_id) = &item_id {
                    self.player.load(item_id);
                }

                let record = self.store.upsert(self.stamped(item_id, false, 0.)).await?;
                self.remember_write(record);
            }
            None => {}
        }

        Ok(())
    }

    /// Handles an external change of the shared record.
    ///
    /// The echo of this client's own last write is skipped, so a host does not
    /// react to the record it just pushed.
    pub async fn on_external_update(&self, record: PlaybackRecord) {
        let is_own_echo = record.updated_by == self.context.user_id
            && Some(record.updated_at) == *self.last_written_at.lock();

        if is_own_echo {
            return;
        }

        self.reconcile(record);
    }

    /// Adjusts the local player towards the record.
    ///
    /// A seek is issued only when the positions diverge beyond the drift
    /// tolerance, and a play or pause command only when the states differ.
    /// Both adjustments are independent and may fire in the same pass.
    pub fn reconcile(&self, record: PlaybackRecord) {
        if self.state.load() != SyncState::Ready {
            *self.last_known.lock() = Some(record);
            return;
        }

        if self.is_syncing.swap(true) {
            // A pass is already in flight. The record is remembered and the
            // next external update or tick applies against it.
            *self.last_known.lock() = Some(record);
            return;
        }

        if record.item_id != self.player.current_item() {
            if let Some(item_id) = &record.item_id {
                self.player.load(item_id);
            }
        }

        let drift = (self.player.position() - record.position).abs();

        if drift > self.context.config.follower_drift_tolerance {
            self.player.seek(record.position);
        }

        if self.player.is_playing() != record.playing {
            if record.playing {
                self.player.play();
            } else {
                self.player.pause();
            }
        }

        self.context.emit(SessionEvent::PlaybackUpdate {
            record: record.clone(),
        });

        *self.last_known.lock() = Some(record);
        self.is_syncing.store(false);
    }

    /// Samples the host's player into the shared record.
    ///
    /// Nothing is written while position and play state are within the write
    /// threshold of the last known record, avoiding a write storm when the
    /// room is paused or idle.
    pub async fn periodic_host_sync(&self) {
        if !self.context.is_host || self.state.load() != SyncState::Ready {
            return;
        }

        let position = self.player.position();
        let playing = self.player.is_playing();

        let should_write = match &*self.last_known.lock() {
            Some(last) => {
                (position - last.position).abs() > self.context.config.host_resync_threshold
                    || playing != last.playing
            }
            None => true,
        };

        if should_write {
            self.write(self.player.current_item(), playing, position).await;
        }
    }

    /// Starts local playback and pushes the new state. Host only.
    pub async fn request_play(&self) -> Result<(), SyncError> {
        self.ensure_host()?;

        self.player.play();
        self.write(self.player.current_item(), true, self.player.position())
            .await;

        Ok(())
    }

    /// Pauses local playback and pushes the new state. Host only.
    pub async fn request_pause(&self) -> Result<(), SyncError> {
        self.ensure_host()?;

        self.player.pause();
        self.write(self.player.current_item(), false, self.player.position())
            .await;

        Ok(())
    }

    /// Advances the queue and moves shared playback to the next entry. Host only.
    pub async fn request_skip(&self) -> Result<(), SyncError> {
        self.ensure_host()?;

        let next = self.queue.advance().await?;

        match &next {
            Some(item_id) => {
                self.player.load(item_id);
                self.player.play();
            }
            None => self.player.pause(),
        }

        self.write(next.clone(), next.is_some(), 0.).await;

        Ok(())
    }

    /// Fired by the player when the current item ends. The host moves the
    /// room to the next queue entry; other participants wait for the record.
    pub async fn on_item_ended(&self) {
        if !self.context.is_host {
            return;
        }

        if let Err(err) = self.request_skip().await {
            warn!("Failed to advance queue after item ended: {}", err);
        }
    }

    fn ensure_host(&self) -> Result<(), SyncError> {
        if self.context.is_host {
            Ok(())
        } else {
            Err(SyncError::NotHost)
        }
    }

    /// Upserts a freshly stamped record. Failures are reported as a session
    /// event and otherwise dropped; the next tick or action writes again.
    async fn write(&self, item_id: Option<ItemId>, playing: bool, position: f32) {
        if self.is_writing.swap(true) {
            return;
        }

        let record = self.stamped(item_id, playing, position);

        match self.store.upsert(record).await {
            Ok(record) => self.remember_write(record),
            Err(err) => {
                warn!("Failed to write playback record: {}", err);

                self.context.emit(SessionEvent::SyncWriteFailed {
                    error: err.to_string(),
                });
            }
        }

        self.is_writing.store(false);
    }

    fn stamped(&self, item_id: Option<ItemId>, playing: bool, position: f32) -> PlaybackRecord {
        PlaybackRecord {
            room_id: self.context.room_id.clone(),
            item_id,
            playing,
            position: position.max(0.),
            updated_by: self.context.user_id.clone(),
            updated_at: Utc::now(),
        }
    }

    fn remember_write(&self, record: PlaybackRecord) {
        *self.last_written_at.lock() = Some(record.updated_at);
        *self.last_known.lock() = Some(record);
    }
}
