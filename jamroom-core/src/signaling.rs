use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::UserId;

/// A session description produced or consumed during negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// A trickled ICE candidate, relayed as soon as it is discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u32>,
}

/// Negotiation messages exchanged over a room's signaling channel.
///
/// Every participant receives every message broadcast on the channel and
/// discards the ones not addressed to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum SignalingMessage {
    Offer {
        from: UserId,
        target: UserId,
        sdp: SessionDescription,
    },
    Answer {
        from: UserId,
        target: UserId,
        sdp: SessionDescription,
    },
    IceCandidate {
        from: UserId,
        target: UserId,
        candidate: IceCandidate,
    },
}

impl SignalingMessage {
    pub fn from_user(&self) -> &UserId {
        match self {
            Self::Offer { from, .. } => from,
            Self::Answer { from, .. } => from,
            Self::IceCandidate { from, .. } => from,
        }
    }

    pub fn target(&self) -> &UserId {
        match self {
            Self::Offer { target, .. } => target,
            Self::Answer { target, .. } => target,
            Self::IceCandidate { target, .. } => target,
        }
    }
}

/// Messages and membership changes delivered by a room's signaling channel.
#[derive(Debug, Clone)]
pub enum SignalingEvent {
    Message(SignalingMessage),
    /// Participants that became present on the channel.
    PeersJoined(Vec<UserId>),
    /// Participants that are no longer present on the channel.
    PeersLeft(Vec<UserId>),
}

#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("signaling channel is closed")]
    ChannelClosed,
    #[error("failed to relay message: {0}")]
    Relay(String),
}

/// A pub/sub channel scoped to one room, used only to exchange negotiation
/// messages and presence. Media never passes through it.
#[async_trait]
pub trait Signaling: Send + Sync + 'static {
    /// Broadcasts a message to the other participants on the channel.
    async fn send(&self, message: SignalingMessage) -> Result<(), SignalingError>;

    /// Subscribes to messages and presence changes on the channel.
    fn subscribe(&self) -> UnboundedReceiver<SignalingEvent>;
}
