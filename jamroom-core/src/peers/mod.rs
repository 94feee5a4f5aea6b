mod connection;
mod link;

use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use log::{debug, info, warn};
use tokio::spawn;

pub use connection::*;
pub use link::*;

use crate::{
    IceCandidate, MediaSource, SessionContext, SessionDescription, SessionEvent, Signaling,
    SignalingMessage, Store, UserId,
};

/// Maintains one [PeerLink] per other participant in the room.
///
/// Links are created when a participant joins (the existing members initiate)
/// or when an offer arrives (the newcomer answers), and are removed on
/// presence-leave, terminal connection state, or room exit.
pub struct PeerRegistry {
    me: Weak<PeerRegistry>,
    context: SessionContext,
    signaling: Arc<dyn Signaling>,
    connector: Arc<dyn PeerConnector>,
    media: Option<Arc<dyn MediaSource>>,
    links: Store<UserId, PeerLink>,
}

impl PeerRegistry {
    pub fn new(
        context: &SessionContext,
        signaling: Arc<dyn Signaling>,
        connector: Arc<dyn PeerConnector>,
        media: Option<Arc<dyn MediaSource>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            context: context.clone(),
            signaling,
            connector,
            media,
            links: Default::default(),
        })
    }

    /// Returns the link for a participant, creating it if necessary.
    ///
    /// The check-and-insert against the link map is a single synchronous step,
    /// so racing join notifications for the same participant always resolve to
    /// one link. When `initiator` is true a local offer is committed and
    /// relayed to the remote participant.
    pub async fn ensure_link(
        &self,
        remote_user_id: &UserId,
        initiator: bool,
    ) -> Result<Arc<PeerLink>, NegotiationError> {
        let (link, created) = match self.links.entry(remote_user_id.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let connection = self.connector.connect(&self.context.config.ice_servers)?;
                let link = Arc::new(PeerLink::new(remote_user_id.clone(), connection));

                entry.insert(link.clone());
                (link, true)
            }
        };

        if !created {
            return Ok(link);
        }

        // The local stream may be absent if capture failed, in which case the
        // connection forms but carries no outbound media.
        if let Some(media) = &self.media {
            for track in media.tracks() {
                link.connection().add_track(track);
            }
        }

        self.spawn_link_pump(&link);

        if initiator {
            let offer = link.connection().create_offer().await?;
            link.connection().set_local_description(offer.clone()).await?;

            self.send(SignalingMessage::Offer {
                from: self.context.user_id.clone(),
                target: remote_user_id.clone(),
                sdp: offer,
            })
            .await?;

            info!("Sent offer to {}", remote_user_id);
        }

        Ok(link)
    }

    /// Answers an inbound offer, creating a non-initiating link if none exists.
    pub async fn handle_offer(
        &self,
        from: &UserId,
        sdp: SessionDescription,
    ) -> Result<(), NegotiationError> {
        let link = self.ensure_link(from, false).await?;

        link.connection().set_remote_description(sdp).await?;
        link.flush_candidates().await?;

        let answer = link.connection().create_answer().await?;
        link.connection().set_local_description(answer.clone()).await?;

        self.send(SignalingMessage::Answer {
            from: self.context.user_id.clone(),
            target: from.clone(),
            sdp: answer,
        })
        .await?;

        info!("Answered offer from {}", from);

        Ok(())
    }

    /// Applies an inbound answer. An answer for a link that no longer exists
    /// is not an error, since the initiator may have torn it down already.
    pub async fn handle_answer(
        &self,
        from: &UserId,
        sdp: SessionDescription,
    ) -> Result<(), NegotiationError> {
        let Some(link) = self.link_by_user_id(from) else {
            debug!("Discarding answer from {} without a link", from);
            return Ok(());
        };

        link.connection().set_remote_description(sdp).await?;
        link.flush_candidates().await?;

        Ok(())
    }

    /// Applies an inbound candidate, buffering it if the remote description
    /// is not committed yet. Candidates without a link are discarded.
    pub async fn handle_candidate(
        &self,
        from: &UserId,
        candidate: IceCandidate,
    ) -> Result<(), NegotiationError> {
        let Some(link) = self.link_by_user_id(from) else {
            debug!("Discarding candidate from {} without a link", from);
            return Ok(());
        };

        link.apply_candidate(candidate).await
    }

    pub fn link_by_user_id(&self, user_id: &UserId) -> Option<Arc<PeerLink>> {
        self.links.get(user_id).map(|link| link.clone())
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Closes a link and removes it together with its remote stream.
    pub fn teardown_link(&self, user_id: &UserId) {
        if let Some((_, link)) = self.links.remove(user_id) {
            link.close();

            self.context.emit(SessionEvent::PeerClosed {
                user_id: user_id.clone(),
            });

            info!("Closed peer link to {}", user_id);
        }
    }

    /// Closes every link. Invoked on room exit.
    pub fn teardown_all(&self) {
        let user_ids: Vec<_> = self.links.iter().map(|l| l.user_id.clone()).collect();

        for user_id in user_ids {
            self.teardown_link(&user_id);
        }
    }

    async fn send(&self, message: SignalingMessage) -> Result<(), NegotiationError> {
        self.signaling
            .send(message)
            .await
            .map_err(|e| NegotiationError::Relay(e.to_string()))
    }

    /// Forwards a link's connection events: inbound tracks accumulate into
    /// the remote stream, discovered candidates are trickled out immediately,
    /// and a terminal state tears the link down.
    fn spawn_link_pump(&self, link: &Arc<PeerLink>) {
        let mut events = link.connection().subscribe();

        let me = self.me.clone();
        let link = link.clone();
        let context = self.context.clone();
        let signaling = self.signaling.clone();

        spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    ConnectionEvent::Track(track) => {
                        link.push_remote_track(track);

                        context.emit(SessionEvent::RemoteStreamUpdate {
                            user_id: link.user_id.clone(),
                            tracks: link.remote_tracks(),
                        });
                    }
                    ConnectionEvent::Candidate(candidate) => {
                        let message = SignalingMessage::IceCandidate {
                            from: context.user_id.clone(),
                            target: link.user_id.clone(),
                            candidate,
                        };

                        if let Err(err) = signaling.send(message).await {
                            warn!("Failed to relay candidate to {}: {}", link.user_id, err);
                        }
                    }
                    ConnectionEvent::StateChange(new_state) => {
                        context.emit(SessionEvent::PeerStateUpdate {
                            user_id: link.user_id.clone(),
                            new_state,
                        });

                        if new_state.is_terminal() {
                            if let Some(registry) = me.upgrade() {
                                registry.teardown_link(&link.user_id);
                            }

                            break;
                        }
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use crate::{ConnectionEvent, ConnectionState, MediaTrack, SdpKind, TrackKind};

    fn registry(
        is_host: bool,
    ) -> (
        Arc<PeerRegistry>,
        Arc<FakeSignaling>,
        Arc<FakeConnector>,
        crate::EventReceiver,
    ) {
        let (context, events) = test_context("room", "me", is_host);
        let signaling = FakeSignaling::new();
        let connector = FakeConnector::new();

        let registry = PeerRegistry::new(&context, signaling.clone(), connector.clone(), None);

        (registry, signaling, connector, events)
    }

    fn offer(sdp: &str) -> SessionDescription {
        SessionDescription {
            kind: SdpKind::Offer,
            sdp: sdp.to_string(),
        }
    }

    fn answer(sdp: &str) -> SessionDescription {
        SessionDescription {
            kind: SdpKind::Answer,
            sdp: sdp.to_string(),
        }
    }

    fn candidate(value: &str) -> IceCandidate {
        IceCandidate {
            candidate: value.to_string(),
            sdp_mid: Some("0".to_string()),
            sdp_mline_index: Some(0),
        }
    }

    #[tokio::test]
    async fn ensure_link_is_idempotent() {
        let (registry, signaling, connector, _events) = registry(false);

        let first = registry
            .ensure_link(&"them".to_string(), true)
            .await
            .expect("link is created");
        let second = registry
            .ensure_link(&"them".to_string(), true)
            .await
            .expect("link is returned");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.link_count(), 1);
        assert_eq!(connector.connections().len(), 1);
        // The second call must not fire another offer
        assert_eq!(signaling.sent_offers().len(), 1);
    }

    #[tokio::test]
    async fn initiator_commits_and_relays_offer() {
        let (registry, signaling, connector, _events) = registry(false);

        registry
            .ensure_link(&"them".to_string(), true)
            .await
            .expect("link is created");

        let connection = connector.last_connection();
        let local = connection.local_description.lock().clone();

        assert!(matches!(
            local,
            Some(SessionDescription {
                kind: SdpKind::Offer,
                ..
            })
        ));

        let sent = signaling.sent();
        assert_eq!(sent.len(), 1);

        match &sent[0] {
            SignalingMessage::Offer { from, target, .. } => {
                assert_eq!(from, "me");
                assert_eq!(target, "them");
            }
            other => panic!("expected an offer, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn answerer_never_initiates() {
        let (registry, signaling, _connector, _events) = registry(false);

        registry
            .ensure_link(&"them".to_string(), false)
            .await
            .expect("link is created");

        assert!(signaling.sent().is_empty());
    }

    #[tokio::test]
    async fn answers_inbound_offer() {
        let (registry, signaling, connector, _events) = registry(false);

        registry
            .handle_offer(&"them".to_string(), offer("their-offer"))
            .await
            .expect("offer is handled");

        let connection = connector.last_connection();

        assert!(connection.has_remote_description());

        let sent = signaling.sent();
        assert_eq!(sent.len(), 1);

        match &sent[0] {
            SignalingMessage::Answer { from, target, sdp } => {
                assert_eq!(from, "me");
                assert_eq!(target, "them");
                assert_eq!(sdp.kind, SdpKind::Answer);
            }
            other => panic!("expected an answer, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn answer_without_link_is_ignored() {
        let (registry, _signaling, connector, _events) = registry(false);

        registry
            .handle_answer(&"them".to_string(), answer("stray"))
            .await
            .expect("stray answer is not an error");

        assert!(connector.connections().is_empty());
    }

    #[tokio::test]
    async fn early_candidates_are_buffered_until_remote_description() {
        let (registry, _signaling, connector, _events) = registry(false);

        registry
            .ensure_link(&"them".to_string(), true)
            .await
            .expect("link is created");

        registry
            .handle_candidate(&"them".to_string(), candidate("early"))
            .await
            .expect("candidate is buffered");

        let connection = connector.last_connection();
        assert!(connection.applied_candidates().is_empty());

        registry
            .handle_answer(&"them".to_string(), answer("their-answer"))
            .await
            .expect("answer is applied");

        let applied = connection.applied_candidates();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].candidate, "early");
    }

    #[tokio::test]
    async fn candidate_after_remote_description_applies_directly() {
        let (registry, _signaling, connector, _events) = registry(false);

        registry
            .handle_offer(&"them".to_string(), offer("their-offer"))
            .await
            .expect("offer is handled");

        registry
            .handle_candidate(&"them".to_string(), candidate("late"))
            .await
            .expect("candidate is applied");

        assert_eq!(connector.last_connection().applied_candidates().len(), 1);
    }

    #[tokio::test]
    async fn candidate_without_link_is_discarded() {
        let (registry, _signaling, connector, _events) = registry(false);

        registry
            .handle_candidate(&"them".to_string(), candidate("stray"))
            .await
            .expect("stray candidate is not an error");

        assert!(connector.connections().is_empty());
    }

    #[tokio::test]
    async fn local_tracks_are_attached_to_new_links() {
        let (context, _events) = test_context("room", "me", false);
        let signaling = FakeSignaling::new();
        let connector = FakeConnector::new();
        let media = FakeMedia::new(vec![
            MediaTrack::new(TrackKind::Audio),
            MediaTrack::new(TrackKind::Video),
        ]);

        let registry = PeerRegistry::new(&context, signaling, connector.clone(), Some(media));

        registry
            .ensure_link(&"them".to_string(), false)
            .await
            .expect("link is created");

        assert_eq!(connector.last_connection().attached_tracks().len(), 2);
    }

    #[tokio::test]
    async fn inbound_tracks_accumulate_into_the_remote_stream() {
        let (registry, _signaling, connector, _events) = registry(false);

        let link = registry
            .ensure_link(&"them".to_string(), false)
            .await
            .expect("link is created");

        let connection = connector.last_connection();
        connection.emit(ConnectionEvent::Track(MediaTrack::new(TrackKind::Audio)));
        connection.emit(ConnectionEvent::Track(MediaTrack::new(TrackKind::Video)));

        wait_until(|| link.remote_tracks().len() == 2).await;
    }

    #[tokio::test]
    async fn discovered_candidates_are_relayed_immediately() {
        let (registry, signaling, connector, _events) = registry(false);

        registry
            .ensure_link(&"them".to_string(), false)
            .await
            .expect("link is created");

        connector
            .last_connection()
            .emit(ConnectionEvent::Candidate(candidate("mine")));

        wait_until(|| {
            signaling
                .sent()
                .iter()
                .any(|m| matches!(m, SignalingMessage::IceCandidate { target, .. } if target == "them"))
        })
        .await;
    }

    #[tokio::test]
    async fn terminal_state_tears_the_link_down() {
        let (registry, _signaling, connector, _events) = registry(false);

        registry
            .ensure_link(&"them".to_string(), false)
            .await
            .expect("link is created");

        let connection = connector.last_connection();
        connection.emit(ConnectionEvent::StateChange(ConnectionState::Failed));

        wait_until(|| registry.link_count() == 0).await;
        assert!(connection.is_closed());
    }

    #[tokio::test]
    async fn teardown_all_closes_every_link() {
        let (registry, _signaling, connector, _events) = registry(false);

        registry
            .ensure_link(&"one".to_string(), false)
            .await
            .expect("link is created");
        registry
            .ensure_link(&"two".to_string(), false)
            .await
            .expect("link is created");

        registry.teardown_all();

        assert_eq!(registry.link_count(), 0);
        assert!(connector.connections().iter().all(|c| c.is_closed()));
    }
}
