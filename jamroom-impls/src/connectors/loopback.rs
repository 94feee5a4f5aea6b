use std::sync::{Arc, Weak};

use async_trait::async_trait;
use crossbeam::atomic::AtomicCell;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::{distributions::Alphanumeric, Rng};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use jamroom_core::{
    ConnectionEvent, ConnectionState, IceCandidate, MediaTrack, NegotiationError, PeerConnection,
    PeerConnector, SdpKind, SessionDescription,
};

/// Matches loopback connections to each other through their offer/answer
/// exchange, the way two browsers meet through a signaling relay.
///
/// An offer registers its side under a token carried in the SDP; applying the
/// matching answer on the offering side pairs the two connections, after which
/// they trade fabricated candidates, report themselves connected, and deliver
/// each other's attached tracks as inbound tracks.
#[derive(Default)]
pub struct LoopbackNetwork {
    pending_offers: DashMap<String, Arc<LoopbackConnection>>,
    pending_answers: DashMap<String, Arc<LoopbackConnection>>,
}

impl LoopbackNetwork {
    pub fn new() -> Arc<Self> {
        Default::default()
    }

    /// Creates a connector for one participant on this network.
    pub fn connector(self: &Arc<Self>) -> Arc<LoopbackConnector> {
        Arc::new(LoopbackConnector {
            network: self.clone(),
            created: Default::default(),
        })
    }
}

pub struct LoopbackConnector {
    network: Arc<LoopbackNetwork>,
    created: Mutex<Vec<Arc<LoopbackConnection>>>,
}

impl LoopbackConnector {
    /// Returns every connection this connector created, in creation order.
    pub fn created(&self) -> Vec<Arc<LoopbackConnection>> {
        self.created.lock().clone()
    }
}

impl PeerConnector for LoopbackConnector {
    fn connect(&self, _ice_servers: &[String]) -> Result<Arc<dyn PeerConnection>, NegotiationError> {
        let connection = LoopbackConnection::new(self.network.clone());
        self.created.lock().push(connection.clone());

        Ok(connection)
    }
}

pub struct LoopbackConnection {
    me: Weak<Self>,
    network: Arc<LoopbackNetwork>,

    /// The pairing token, taken from the local offer or the remote one.
    token: Mutex<Option<String>>,
    local_description: Mutex<Option<SessionDescription>>,
    remote_description: Mutex<Option<SessionDescription>>,

    local_tracks: Mutex<Vec<MediaTrack>>,
    applied_candidates: Mutex<Vec<IceCandidate>>,

    peer: Mutex<Option<Weak<LoopbackConnection>>>,
    state: AtomicCell<ConnectionState>,
    closed: AtomicCell<bool>,

    subscribers: Mutex<Vec<UnboundedSender<ConnectionEvent>>>,
}

impl LoopbackConnection {
    fn new(network: Arc<LoopbackNetwork>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            network,
            token: Default::default(),
            local_description: Default::default(),
            remote_description: Default::default(),
            local_tracks: Default::default(),
            applied_candidates: Default::default(),
            peer: Default::default(),
            state: AtomicCell::new(ConnectionState::New),
            closed: AtomicCell::new(false),
            subscribers: Default::default(),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state.load()
    }

    pub fn local_description(&self) -> Option<SessionDescription> {
        self.local_description.lock().clone()
    }

    pub fn applied_candidates(&self) -> Vec<IceCandidate> {
        self.applied_candidates.lock().clone()
    }

    fn emit(&self, event: ConnectionEvent) {
        for subscriber in self.subscribers.lock().iter() {
            subscriber.send(event.clone()).ok();
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state);
        self.emit(ConnectionEvent::StateChange(state));
    }

    /// The remote side went away without this side closing.
    fn remote_hung_up(&self) {
        if !self.closed.load() {
            self.set_state(ConnectionState::Disconnected);
        }
    }

    fn ensure_open(&self) -> Result<(), NegotiationError> {
        if self.closed.load() {
            Err(NegotiationError::Closed)
        } else {
            Ok(())
        }
    }

    /// Pairs an offering and an answering connection.
    fn establish(offerer: &Arc<Self>, answerer: &Arc<Self>) {
        *offerer.peer.lock() = Some(Arc::downgrade(answerer));
        *answerer.peer.lock() = Some(Arc::downgrade(offerer));

        for connection in [offerer, answerer] {
            connection.set_state(ConnectionState::Connecting);
            // Discovered candidates trickle out through the registry
            connection.emit(ConnectionEvent::Candidate(fabricated_candidate()));
            connection.set_state(ConnectionState::Connected);
        }

        for track in offerer.local_tracks.lock().iter() {
            answerer.emit(ConnectionEvent::Track(track.clone()));
        }

        for track in answerer.local_tracks.lock().iter() {
            offerer.emit(ConnectionEvent::Track(track.clone()));
        }
    }
}

#[async_trait]
impl PeerConnection for LoopbackConnection {
    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError> {
        self.ensure_open()?;

        let token = nonce();
        *self.token.lock() = Some(token.clone());

        Ok(SessionDescription {
            kind: SdpKind::Offer,
            sdp: format!("loopback-offer {}", token),
        })
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        self.ensure_open()?;

        let token = self
            .token
            .lock()
            .clone()
            .ok_or_else(|| NegotiationError::CreateDescription("no remote offer".to_string()))?;

        Ok(SessionDescription {
            kind: SdpKind::Answer,
            sdp: format!("loopback-answer {}", token),
        })
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.ensure_open()?;

        let me = self
            .me
            .upgrade()
            .ok_or(NegotiationError::Closed)?;

        let token = parse_token(&description)?;

        match description.kind {
            SdpKind::Offer => self.network.pending_offers.insert(token, me),
            SdpKind::Answer => self.network.pending_answers.insert(token, me),
        };

        *self.local_description.lock() = Some(description);

        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.ensure_open()?;

        let token = parse_token(&description)?;
        *self.remote_description.lock() = Some(description.clone());

        match description.kind {
            SdpKind::Offer => {
                // The answer this side produces must carry the same token
                *self.token.lock() = Some(token);
            }
            SdpKind::Answer => {
                let me = self
                    .me
                    .upgrade()
                    .ok_or(NegotiationError::Closed)?;

                self.network.pending_offers.remove(&token);

                if let Some((_, answerer)) = self.network.pending_answers.remove(&token) {
                    Self::establish(&me, &answerer);
                }
            }
        }

        Ok(())
    }

    fn has_remote_description(&self) -> bool {
        self.remote_description.lock().is_some()
    }

    async fn add_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        self.ensure_open()?;

        self.applied_candidates.lock().push(candidate);
        Ok(())
    }

    fn add_track(&self, track: MediaTrack) {
        self.local_tracks.lock().push(track.clone());

        let peer = self.peer.lock().clone();

        if let Some(peer) = peer.and_then(|p| p.upgrade()) {
            peer.emit(ConnectionEvent::Track(track));
        }
    }

    fn subscribe(&self) -> UnboundedReceiver<ConnectionEvent> {
        let (sender, receiver) = unbounded_channel();
        self.subscribers.lock().push(sender);
        receiver
    }

    fn close(&self) {
        if self.closed.swap(true) {
            return;
        }

        if let Some(token) = self.token.lock().clone() {
            self.network.pending_offers.remove(&token);
            self.network.pending_answers.remove(&token);
        }

        self.state.store(ConnectionState::Closed);

        let peer = self.peer.lock().take();

        if let Some(peer) = peer.and_then(|p| p.upgrade()) {
            peer.remote_hung_up();
        }

        // Ends the event stream, so link pumps run to completion
        self.subscribers.lock().clear();
    }
}

fn parse_token(description: &SessionDescription) -> Result<String, NegotiationError> {
    description
        .sdp
        .split_whitespace()
        .last()
        .map(|t| t.to_string())
        .ok_or_else(|| {
            NegotiationError::ApplyDescription("malformed loopback sdp".to_string())
        })
}

fn nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}

fn fabricated_candidate() -> IceCandidate {
    let mut rng = rand::thread_rng();

    IceCandidate {
        candidate: format!(
            "candidate:{} 1 udp 2122260223 198.51.100.{} {} typ host",
            rng.gen_range(100_000_000u32..1_000_000_000),
            rng.gen_range(1u8..=254),
            rng.gen_range(1024u16..=65535),
        ),
        sdp_mid: Some("0".to_string()),
        sdp_mline_index: Some(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jamroom_core::TrackKind;

    async fn handshake(
        offerer: &Arc<dyn PeerConnection>,
        answerer: &Arc<dyn PeerConnection>,
    ) {
        let offer = offerer.create_offer().await.expect("offer is created");
        offerer
            .set_local_description(offer.clone())
            .await
            .expect("offer commits locally");

        answerer
            .set_remote_description(offer)
            .await
            .expect("offer applies remotely");

        let answer = answerer.create_answer().await.expect("answer is created");
        answerer
            .set_local_description(answer.clone())
            .await
            .expect("answer commits locally");

        offerer
            .set_remote_description(answer)
            .await
            .expect("answer applies remotely");
    }

    #[tokio::test]
    async fn handshake_connects_both_sides() {
        let network = LoopbackNetwork::new();
        let a = network.connector();
        let b = network.connector();

        let offerer = a.connect(&[]).expect("connection is created");
        let answerer = b.connect(&[]).expect("connection is created");

        handshake(&offerer, &answerer).await;

        assert_eq!(a.created()[0].state(), ConnectionState::Connected);
        assert_eq!(b.created()[0].state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn attached_tracks_arrive_on_the_other_side() {
        let network = LoopbackNetwork::new();
        let a = network.connector();
        let b = network.connector();

        let offerer = a.connect(&[]).expect("connection is created");
        let answerer = b.connect(&[]).expect("connection is created");

        offerer.add_track(MediaTrack::new(TrackKind::Audio));

        let mut events = answerer.subscribe();

        handshake(&offerer, &answerer).await;

        loop {
            let event = events.try_recv().expect("track event arrived");

            if let ConnectionEvent::Track(track) = event {
                assert_eq!(track.kind, TrackKind::Audio);
                break;
            }
        }
    }

    #[tokio::test]
    async fn closing_disconnects_the_peer() {
        let network = LoopbackNetwork::new();
        let a = network.connector();
        let b = network.connector();

        let offerer = a.connect(&[]).expect("connection is created");
        let answerer = b.connect(&[]).expect("connection is created");

        handshake(&offerer, &answerer).await;

        offerer.close();

        assert_eq!(b.created()[0].state(), ConnectionState::Disconnected);
        assert!(offerer.create_offer().await.is_err());
    }
}
