use async_trait::async_trait;

use crate::{ItemId, StoreError};

/// The room's song queue as seen by the sync controller.
///
/// The entry at the front is by convention the currently playing item.
#[async_trait]
pub trait QueueSource: Send + Sync + 'static {
    /// Returns the item at the front of the queue.
    async fn current(&self) -> Result<Option<ItemId>, StoreError>;

    /// Removes the front entry and returns the item that takes its place.
    async fn advance(&self) -> Result<Option<ItemId>, StoreError>;
}
