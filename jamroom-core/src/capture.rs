use std::sync::Arc;

use crossbeam::atomic::AtomicCell;
use serde::{Deserialize, Serialize};

use crate::util::next_id;

pub type TrackId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackKind {
    Audio,
    Video,
}

/// A single captured or received media track.
///
/// Enabling and disabling is shared between every holder of the track, so a
/// local toggle is observed by all peer connections the track is attached to.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    pub id: TrackId,
    pub kind: TrackKind,
    enabled: Arc<AtomicCell<bool>>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            id: next_id(),
            kind,
            enabled: Arc::new(AtomicCell::new(true)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load()
    }

    /// Toggles the track without stopping capture.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled)
    }
}

/// A local capture device, owned by the room session.
///
/// Tracks are mutated only by local user action, never by peer-driven events.
pub trait MediaSource: Send + Sync + 'static {
    /// Returns the captured tracks.
    fn tracks(&self) -> Vec<MediaTrack>;
}
