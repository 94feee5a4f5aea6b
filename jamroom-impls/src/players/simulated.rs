use std::sync::Arc;
use std::time::Instant;

use crossbeam::atomic::AtomicCell;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use jamroom_core::{ItemId, MediaPlayer, PlayerEvent};

/// A clock-driven player control surface.
///
/// Position advances in real time while playing, so a session driving this
/// player behaves like one driving an embedded player, without any media.
#[derive(Default)]
pub struct SimulatedPlayer {
    current_item: Mutex<Option<ItemId>>,
    playing: AtomicCell<bool>,
    /// Position at the last pause, seek, or load.
    base_position: AtomicCell<f32>,
    resumed_at: Mutex<Option<Instant>>,
    durations: DashMap<ItemId, f32>,
    subscribers: Mutex<Vec<UnboundedSender<PlayerEvent>>>,
}

impl SimulatedPlayer {
    pub fn new() -> Arc<Self> {
        Default::default()
    }

    /// Scripts the duration of an item, used to clamp position and to end it.
    pub fn set_duration(&self, item_id: &str, seconds: f32) {
        self.durations.insert(item_id.to_string(), seconds);
    }

    /// Announces the control surface as ready to be driven.
    pub fn mark_ready(&self) {
        self.emit(PlayerEvent::Ready)
    }

    /// Ends the current item, like the media running out would.
    pub fn finish_current(&self) {
        if let Some(duration) = self.current_duration() {
            self.base_position.store(duration);
        }

        self.playing.store(false);
        *self.resumed_at.lock() = None;

        self.emit(PlayerEvent::ItemEnded)
    }

    fn current_duration(&self) -> Option<f32> {
        let current = self.current_item.lock().clone()?;
        self.durations.get(&current).map(|d| *d)
    }

    fn emit(&self, event: PlayerEvent) {
        for subscriber in self.subscribers.lock().iter() {
            subscriber.send(event.clone()).ok();
        }
    }
}

impl MediaPlayer for SimulatedPlayer {
    fn position(&self) -> f32 {
        let mut position = self.base_position.load();

        if let Some(resumed_at) = *self.resumed_at.lock() {
            position += resumed_at.elapsed().as_secs_f32();
        }

        match self.current_duration() {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn is_playing(&self) -> bool {
        self.playing.load()
    }

    fn current_item(&self) -> Option<ItemId> {
        self.current_item.lock().clone()
    }

    fn seek(&self, position: f32) {
        self.base_position.store(position.max(0.));

        let mut resumed_at = self.resumed_at.lock();

        if resumed_at.is_some() {
            *resumed_at = Some(Instant::now());
        }
    }

    fn play(&self) {
        if self.playing.swap(true) {
            return;
        }

        *self.resumed_at.lock() = Some(Instant::now());
    }

    fn pause(&self) {
        if !self.playing.swap(false) {
            return;
        }

        let position = {
            let mut resumed_at = self.resumed_at.lock();
            let elapsed = resumed_at
                .take()
                .map(|r| r.elapsed().as_secs_f32())
                .unwrap_or(0.);

            self.base_position.load() + elapsed
        };

        self.base_position.store(position);
    }

    fn load(&self, item_id: &ItemId) {
        *self.current_item.lock() = Some(item_id.clone());
        self.base_position.store(0.);

        let mut resumed_at = self.resumed_at.lock();

        if resumed_at.is_some() {
            *resumed_at = Some(Instant::now());
        }

        drop(resumed_at);

        self.emit(PlayerEvent::ItemLoaded {
            item_id: item_id.clone(),
        })
    }

    fn subscribe(&self) -> UnboundedReceiver<PlayerEvent> {
        let (sender, receiver) = unbounded_channel();
        self.subscribers.lock().push(sender);
        receiver
    }
}
