mod youtube;

pub use youtube::*;

use thiserror::Error;

use jamroom_core::ItemId;

#[derive(Debug, Error)]
pub enum ItemError {
    #[error("Input is not a video link or id")]
    UnsupportedInput,

    #[error("Input type is supported but the video was not found")]
    NotFound,

    #[error("Failed to fetch video details: {0}")]
    FetchError(String),

    #[error("Failed to parse video details: {0}")]
    ParseError(String),
}

/// Resolved details of a queueable item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDetails {
    pub item_id: ItemId,
    pub title: String,
    pub channel: Option<String>,
}

impl ItemDetails {
    /// Details for an item whose metadata could not be resolved.
    pub fn bare(item_id: &ItemId) -> Self {
        Self {
            item_id: item_id.clone(),
            title: item_id.clone(),
            channel: None,
        }
    }
}
