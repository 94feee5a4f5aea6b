use tokio::sync::mpsc::UnboundedReceiver;

use crate::ItemId;

/// Events emitted by a player control surface.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// The control surface finished loading and can now be driven.
    Ready,
    /// An item finished loading into the player.
    ItemLoaded { item_id: ItemId },
    /// The current item played to its end.
    ItemEnded,
}

/// The local media player a session reconciles against the shared record.
///
/// This is a control surface over an embedded player, not a decoder. Position
/// is in seconds.
pub trait MediaPlayer: Send + Sync + 'static {
    fn position(&self) -> f32;
    fn is_playing(&self) -> bool;
    fn current_item(&self) -> Option<ItemId>;

    fn seek(&self, position: f32);
    fn play(&self);
    fn pause(&self);
    fn load(&self, item_id: &ItemId);

    /// Subscribes to the player's lifecycle events.
    fn subscribe(&self) -> UnboundedReceiver<PlayerEvent>;
}
