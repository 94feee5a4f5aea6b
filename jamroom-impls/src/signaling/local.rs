use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use log::warn;
use parking_lot::Mutex;
use tokio::spawn;
use tokio::sync::broadcast;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use jamroom_core::{
    RoomId, Signaling, SignalingError, SignalingEvent, SignalingMessage, UserId,
};

/// How many events a slow subscriber may fall behind before it starts
/// skipping.
const CHANNEL_CAPACITY: usize = 256;

/// An in-process signaling relay, holding one broadcast channel per room.
///
/// Joining announces the newcomer to the members already present, so they can
/// start initiating toward it. Leaving announces the departure.
pub struct SignalingHub {
    channels: DashMap<RoomId, RoomChannel>,
}

struct RoomChannel {
    sender: broadcast::Sender<SignalingEvent>,
    members: Mutex<Vec<UserId>>,
}

impl RoomChannel {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);

        Self {
            sender,
            members: Default::default(),
        }
    }
}

impl SignalingHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            channels: Default::default(),
        })
    }

    /// Joins a room's channel, announcing the new participant to everyone
    /// already on it. The returned handle leaves the channel when dropped.
    pub fn join(self: &Arc<Self>, room_id: &RoomId, user_id: &UserId) -> LocalSignaling {
        let channel = self
            .channels
            .entry(room_id.clone())
            .or_insert_with(RoomChannel::new);

        channel.members.lock().push(user_id.clone());

        // Subscribe before announcing, so the newcomer doesn't miss traffic
        // sent in response to its own join
        let receiver = channel.sender.subscribe();

        channel
            .sender
            .send(SignalingEvent::PeersJoined(vec![user_id.clone()]))
            .ok();

        LocalSignaling {
            hub: self.clone(),
            room_id: room_id.clone(),
            user_id: user_id.clone(),
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Returns the participants currently on a room's channel.
    pub fn members(&self, room_id: &RoomId) -> Vec<UserId> {
        self.channels
            .get(room_id)
            .map(|c| c.members.lock().clone())
            .unwrap_or_default()
    }

    fn leave(&self, room_id: &RoomId, user_id: &UserId) {
        if let Some(channel) = self.channels.get(room_id) {
            let mut members = channel.members.lock();

            if let Some(index) = members.iter().position(|m| m == user_id) {
                members.remove(index);
            }

            channel
                .sender
                .send(SignalingEvent::PeersLeft(vec![user_id.clone()]))
                .ok();
        }

        self.channels
            .remove_if(room_id, |_, channel| channel.members.lock().is_empty());
    }
}

/// One participant's handle on a room's signaling channel.
pub struct LocalSignaling {
    hub: Arc<SignalingHub>,
    room_id: RoomId,
    user_id: UserId,
    receiver: Mutex<Option<broadcast::Receiver<SignalingEvent>>>,
}

impl LocalSignaling {
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }
}

#[async_trait]
impl Signaling for LocalSignaling {
    async fn send(&self, message: SignalingMessage) -> Result<(), SignalingError> {
        let channel = self
            .hub
            .channels
            .get(&self.room_id)
            .ok_or(SignalingError::ChannelClosed)?;

        // Nobody listening is fine for a broadcast relay
        channel.sender.send(SignalingEvent::Message(message)).ok();

        Ok(())
    }

    fn subscribe(&self) -> UnboundedReceiver<SignalingEvent> {
        let mut receiver = self
            .receiver
            .lock()
            .take()
            .unwrap_or_else(|| match self.hub.channels.get(&self.room_id) {
                Some(channel) => channel.sender.subscribe(),
                None => broadcast::channel(CHANNEL_CAPACITY).0.subscribe(),
            });

        let (sender, subscriber) = unbounded_channel();
        let user_id = self.user_id.clone();

        spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        // A participant's own broadcasts are not delivered
                        // back to it
                        if let SignalingEvent::Message(message) = &event {
                            if message.from_user() == &user_id {
                                continue;
                            }
                        }

                        if sender.send(event).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Signaling subscriber lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        subscriber
    }
}

impl Drop for LocalSignaling {
    fn drop(&mut self) {
        self.hub.leave(&self.room_id, &self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomId {
        "room".to_string()
    }

    #[tokio::test]
    async fn join_announces_to_existing_members() {
        let hub = SignalingHub::new();

        let first = hub.join(&room(), &"first".to_string());
        let mut events = first.subscribe();

        // A member observes its own join announcement first
        let own_join = events.recv().await.expect("own join arrives");
        assert!(
            matches!(own_join, SignalingEvent::PeersJoined(ids) if ids == vec!["first".to_string()])
        );

        let _second = hub.join(&room(), &"second".to_string());

        let event = events.recv().await.expect("join event arrives");
        assert!(
            matches!(event, SignalingEvent::PeersJoined(ids) if ids == vec!["second".to_string()])
        );
    }

    #[tokio::test]
    async fn dropping_the_handle_announces_departure() {
        let hub = SignalingHub::new();

        let first = hub.join(&room(), &"first".to_string());
        let mut events = first.subscribe();

        let second = hub.join(&room(), &"second".to_string());
        drop(second);

        loop {
            let event = events.recv().await.expect("events keep arriving");

            if let SignalingEvent::PeersLeft(ids) = event {
                assert_eq!(ids, vec!["second".to_string()]);
                break;
            }
        }

        assert_eq!(hub.members(&room()), vec!["first".to_string()]);
    }

    #[tokio::test]
    async fn own_messages_are_not_delivered_back() {
        let hub = SignalingHub::new();

        let first = hub.join(&room(), &"first".to_string());
        let second = hub.join(&room(), &"second".to_string());

        let mut first_events = first.subscribe();
        let _second_events = second.subscribe();

        let message = SignalingMessage::Answer {
            from: "first".to_string(),
            target: "second".to_string(),
            sdp: jamroom_core::SessionDescription {
                kind: jamroom_core::SdpKind::Answer,
                sdp: "test".to_string(),
            },
        };

        first.send(message).await.expect("message sends");

        // Both join announcements are observed, the own message is not
        for _ in 0..2 {
            let event = first_events.recv().await.expect("event arrives");
            assert!(matches!(event, SignalingEvent::PeersJoined(_)));
        }

        assert!(first_events.try_recv().is_err());
    }
}
