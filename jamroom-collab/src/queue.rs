use std::sync::Arc;

use async_trait::async_trait;

use jamroom_core::{ItemId, QueueSource, RoomId, StoreError, UserId};

use crate::{CollabContext, CollabEvent, ItemDetails, NewQueueEntry, PrimaryKey, QueueEntryData};

/// A room's song queue.
///
/// Entries keep contiguous integer positions; the entry at position zero is
/// the currently playing item. A host session drives [QueueSource::advance]
/// when an item ends or is skipped.
pub struct SongQueue {
    context: CollabContext,
    room_id: RoomId,
}

impl SongQueue {
    pub(crate) fn new(context: &CollabContext, room_id: RoomId) -> Arc<Self> {
        Arc::new(Self {
            context: context.clone(),
            room_id,
        })
    }

    pub async fn entries(&self) -> Result<Vec<QueueEntryData>, StoreError> {
        self.context.store.list_queue(&self.room_id).await
    }

    /// Appends an item to the back of the queue.
    pub async fn push(
        &self,
        item: ItemDetails,
        added_by: &UserId,
    ) -> Result<QueueEntryData, StoreError> {
        let entry = self
            .context
            .store
            .push_queue_entry(
                &self.room_id,
                NewQueueEntry {
                    item,
                    added_by: added_by.clone(),
                },
            )
            .await?;

        self.emit_update().await?;

        Ok(entry)
    }

    /// Removes an entry by id.
    pub async fn remove(&self, entry_id: PrimaryKey) -> Result<(), StoreError> {
        self.context
            .store
            .remove_queue_entry(&self.room_id, entry_id)
            .await?;

        self.emit_update().await
    }

    async fn emit_update(&self) -> Result<(), StoreError> {
        let entries = self.entries().await?;

        self.context.emit(CollabEvent::QueueUpdate {
            room_id: self.room_id.clone(),
            entries,
        });

        Ok(())
    }
}

#[async_trait]
impl QueueSource for SongQueue {
    async fn current(&self) -> Result<Option<ItemId>, StoreError> {
        let entries = self.entries().await?;

        Ok(entries.first().map(|e| e.item.item_id.clone()))
    }

    async fn advance(&self) -> Result<Option<ItemId>, StoreError> {
        self.context.store.pop_queue_front(&self.room_id).await?;
        self.emit_update().await?;

        self.current().await
    }
}
