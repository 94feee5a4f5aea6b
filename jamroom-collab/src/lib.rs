mod events;
mod items;
mod queue;
mod rooms;
mod store;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

pub use events::*;
pub use items::*;
pub use queue::*;
pub use rooms::*;
pub use store::*;

use jamroom_core::{PlaybackStore, RoomId};
use jamroom_impls::{MemoryPlaybackStore, SignalingHub};

/// How many events a slow event subscriber may fall behind before skipping.
const EVENT_CAPACITY: usize = 256;

/// The jamroom collab system, facilitating rooms, queues, chat, and the
/// realtime collaborators the member sessions connect to.
pub struct Collab {
    context: CollabContext,

    pub rooms: RoomManager,
}

/// A type passed to various components of the collab system, to access state
/// and emit events.
#[derive(Clone)]
pub struct CollabContext {
    pub store: Arc<dyn RoomStore>,
    pub playback: Arc<dyn PlaybackStore>,
    pub signaling: Arc<SignalingHub>,

    pub rooms: Arc<DashMap<RoomId, Arc<Room>>>,

    event_sender: CollabEventSender,
}

impl CollabContext {
    pub(crate) fn emit(&self, event: CollabEvent) {
        // Nobody listening is fine
        self.event_sender.send(event).ok();
    }

    pub fn subscribe(&self) -> CollabEventReceiver {
        self.event_sender.subscribe()
    }
}

impl Collab {
    pub fn new(
        store: Arc<dyn RoomStore>,
        playback: Arc<dyn PlaybackStore>,
        signaling: Arc<SignalingHub>,
    ) -> Self {
        let (event_sender, _) = broadcast::channel(EVENT_CAPACITY);

        let context = CollabContext {
            store,
            playback,
            signaling,
            rooms: Default::default(),
            event_sender,
        };

        Self {
            rooms: RoomManager::new(&context),
            context,
        }
    }

    /// A self-contained instance holding everything in memory.
    pub fn new_in_memory() -> Self {
        Self::new(
            MemoryStore::new(),
            MemoryPlaybackStore::new(),
            SignalingHub::new(),
        )
    }

    pub fn subscribe(&self) -> CollabEventReceiver {
        self.context.subscribe()
    }

    pub fn signaling(&self) -> &Arc<SignalingHub> {
        &self.context.signaling
    }

    pub fn playback(&self) -> &Arc<dyn PlaybackStore> {
        &self.context.playback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use jamroom_core::QueueSource;

    fn profile(name: &str) -> UserProfile {
        UserProfile {
            user_id: name.to_string(),
            display_name: name.to_string(),
        }
    }

    fn new_room(id: &str) -> NewRoom {
        NewRoom {
            id: id.to_string(),
            title: "Listening party".to_string(),
            host: profile("host"),
        }
    }

    #[tokio::test]
    async fn creating_a_room_registers_the_host_as_member() {
        let collab = Collab::new_in_memory();

        let room = collab
            .rooms
            .create_room(new_room("party"))
            .await
            .expect("room is created");

        let member = room
            .member_by_user_id(&"host".to_string())
            .await
            .expect("host is a member");

        assert_eq!(member.user.display_name, "host");
        assert!(room.is_host(&"host".to_string()));
        assert!(!room.is_host(&"guest".to_string()));
    }

    #[tokio::test]
    async fn the_queue_advances_through_its_entries() {
        let collab = Collab::new_in_memory();

        let room = collab
            .rooms
            .create_room(new_room("party"))
            .await
            .expect("room is created");

        let queue = room.queue();

        queue
            .push(ItemDetails::bare(&"aaaaaaaaaaa".to_string()), &"host".to_string())
            .await
            .expect("entry pushes");
        queue
            .push(ItemDetails::bare(&"bbbbbbbbbbb".to_string()), &"host".to_string())
            .await
            .expect("entry pushes");

        assert_eq!(
            queue.current().await.expect("current reads").as_deref(),
            Some("aaaaaaaaaaa")
        );

        let next = queue.advance().await.expect("queue advances");
        assert_eq!(next.as_deref(), Some("bbbbbbbbbbb"));
    }

    #[tokio::test]
    async fn chat_requires_membership() {
        let collab = Collab::new_in_memory();

        let room = collab
            .rooms
            .create_room(new_room("party"))
            .await
            .expect("room is created");

        let result = room
            .send_chat(&"stranger".to_string(), "hello".to_string())
            .await;

        assert!(matches!(result, Err(RoomError::UserNotInRoom)));

        room.join(profile("guest")).await.expect("guest joins");

        room.send_chat(&"guest".to_string(), "hello".to_string())
            .await
            .expect("member chats");
    }

    #[tokio::test]
    async fn room_events_fan_out_to_subscribers() {
        let collab = Collab::new_in_memory();
        let mut events = collab.subscribe();

        let room = collab
            .rooms
            .create_room(new_room("party"))
            .await
            .expect("room is created");

        room.join(profile("guest")).await.expect("guest joins");

        let mut saw_join = false;

        while let Ok(event) = events.try_recv() {
            if matches!(
                &event,
                CollabEvent::UserJoined { new_member, .. }
                    if new_member.user.user_id == "guest"
            ) {
                saw_join = true;
            }
        }

        assert!(saw_join);
    }

    #[tokio::test]
    async fn unknown_rooms_are_reported() {
        let collab = Collab::new_in_memory();

        let result = collab.rooms.room_by_id(&"nowhere".to_string());

        assert!(matches!(result, Err(RoomError::RoomNotFound(_))));
    }
}
