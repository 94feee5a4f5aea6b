use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::{IceCandidate, MediaTrack, SessionDescription};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    /// Returns true if the connection cannot recover from this state and the
    /// link holding it should be torn down.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }
}

/// Events fired by a peer connection handle.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// An inbound media track arrived from the remote side.
    Track(MediaTrack),
    /// A local ICE candidate was discovered and should be relayed.
    Candidate(IceCandidate),
    /// The connection transitioned to a new state.
    StateChange(ConnectionState),
}

#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("failed to create session description: {0}")]
    CreateDescription(String),
    #[error("failed to apply session description: {0}")]
    ApplyDescription(String),
    #[error("failed to apply ice candidate: {0}")]
    ApplyCandidate(String),
    #[error("failed to relay negotiation message: {0}")]
    Relay(String),
    #[error("connection is closed")]
    Closed,
}

/// One point-to-point media connection, owning its ICE and SDP state machine.
#[async_trait]
pub trait PeerConnection: Send + Sync + 'static {
    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError>;
    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError>;
    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError>;

    /// Returns true once a remote description has been committed.
    fn has_remote_description(&self) -> bool;

    async fn add_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError>;

    /// Attaches a local track for sending to the remote side.
    fn add_track(&self, track: MediaTrack);

    /// Subscribes to the connection's events.
    fn subscribe(&self) -> UnboundedReceiver<ConnectionEvent>;

    /// Closes the connection and ends its event stream. Further operations
    /// fail with [NegotiationError::Closed].
    fn close(&self);
}

/// Creates peer connection handles for a session.
pub trait PeerConnector: Send + Sync + 'static {
    /// Creates a new connection configured with the given STUN servers.
    fn connect(&self, ice_servers: &[String]) -> Result<Arc<dyn PeerConnection>, NegotiationError>;
}
