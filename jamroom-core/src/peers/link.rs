use std::sync::Arc;

use parking_lot::Mutex;

use crate::{IceCandidate, MediaTrack, NegotiationError, PeerConnection, UserId};

/// One managed connection to a remote participant.
///
/// Holds the connection handle, the stream of tracks received from the remote
/// side, and a buffer for candidates that arrive before a remote description
/// has been committed.
pub struct PeerLink {
    pub user_id: UserId,
    connection: Arc<dyn PeerConnection>,
    remote_tracks: Mutex<Vec<MediaTrack>>,
    pending_candidates: Mutex<Vec<IceCandidate>>,
}

impl PeerLink {
    pub(super) fn new(user_id: UserId, connection: Arc<dyn PeerConnection>) -> Self {
        Self {
            user_id,
            connection,
            remote_tracks: Default::default(),
            pending_candidates: Default::default(),
        }
    }

    pub fn connection(&self) -> &Arc<dyn PeerConnection> {
        &self.connection
    }

    /// Returns the tracks received from the remote participant so far.
    pub fn remote_tracks(&self) -> Vec<MediaTrack> {
        self.remote_tracks.lock().clone()
    }

    pub(super) fn push_remote_track(&self, track: MediaTrack) {
        self.remote_tracks.lock().push(track)
    }

    /// Applies a candidate, or buffers it when no remote description has been
    /// committed yet. Buffered candidates are flushed by [Self::flush_candidates].
    pub(super) async fn apply_candidate(
        &self,
        candidate: IceCandidate,
    ) -> Result<(), NegotiationError> {
        if self.connection.has_remote_description() {
            self.connection.add_candidate(candidate).await
        } else {
            self.pending_candidates.lock().push(candidate);
            Ok(())
        }
    }

    /// Applies every buffered candidate. Called once the remote description
    /// has been committed.
    pub(super) async fn flush_candidates(&self) -> Result<(), NegotiationError> {
        let pending: Vec<_> = self.pending_candidates.lock().drain(..).collect();

        for candidate in pending {
            self.connection.add_candidate(candidate).await?;
        }

        Ok(())
    }

    pub(super) fn close(&self) {
        self.connection.close()
    }
}
