use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use log::warn;
use tokio::spawn;
use tokio::sync::broadcast;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use jamroom_core::{PlaybackRecord, PlaybackStore, RoomId, StoreError};

/// How many record updates a slow watcher may fall behind before skipping.
const FEED_CAPACITY: usize = 64;

/// An in-memory playback record store with a per-room change feed.
///
/// Every upsert is delivered to every watcher of that room, including the
/// writer itself, like a database change feed would.
#[derive(Default)]
pub struct MemoryPlaybackStore {
    records: DashMap<RoomId, PlaybackRecord>,
    feeds: DashMap<RoomId, broadcast::Sender<PlaybackRecord>>,
}

impl MemoryPlaybackStore {
    pub fn new() -> Arc<Self> {
        Default::default()
    }

    fn feed(&self, room_id: &RoomId) -> broadcast::Sender<PlaybackRecord> {
        self.feeds
            .entry(room_id.clone())
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
            .clone()
    }

    /// Returns a room's record without going through the async trait surface.
    pub fn record(&self, room_id: &RoomId) -> Option<PlaybackRecord> {
        self.records.get(room_id).map(|r| r.clone())
    }

    /// Drops a room's record and feed. Part of room deletion.
    pub fn clear(&self, room_id: &RoomId) {
        self.records.remove(room_id);
        self.feeds.remove(room_id);
    }
}

#[async_trait]
impl PlaybackStore for MemoryPlaybackStore {
    async fn fetch(&self, room_id: &RoomId) -> Result<Option<PlaybackRecord>, StoreError> {
        Ok(self.records.get(room_id).map(|r| r.clone()))
    }

    async fn upsert(&self, record: PlaybackRecord) -> Result<PlaybackRecord, StoreError> {
        self.records.insert(record.room_id.clone(), record.clone());

        // Nobody watching is fine
        self.feed(&record.room_id).send(record.clone()).ok();

        Ok(record)
    }

    fn watch(&self, room_id: &RoomId) -> UnboundedReceiver<PlaybackRecord> {
        let mut feed = self.feed(room_id).subscribe();
        let (sender, watcher) = unbounded_channel();

        spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(record) => {
                        if sender.send(record).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Playback watcher lagged, skipped {} updates", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        watcher
    }
}
