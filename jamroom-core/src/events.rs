use crossbeam::channel::{Receiver, Sender};

use crate::{ConnectionState, MediaTrack, PlaybackRecord, UserId};

pub type EventSender = Sender<SessionEvent>;
pub type EventReceiver = Receiver<SessionEvent>;

/// Describes the events that can be emitted by a room session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A remote participant's stream gained a track.
    RemoteStreamUpdate {
        user_id: UserId,
        tracks: Vec<MediaTrack>,
    },
    /// A peer link's underlying connection changed state.
    PeerStateUpdate {
        user_id: UserId,
        new_state: ConnectionState,
    },
    /// A peer link was closed and removed, together with its stream.
    PeerClosed { user_id: UserId },
    /// The shared playback record changed and local playback was reconciled
    /// against it.
    PlaybackUpdate { record: PlaybackRecord },
    /// A write to the shared playback record failed. The next periodic tick
    /// or user action will try again; there is no automatic retry.
    SyncWriteFailed { error: String },
}
