use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::Deserialize;

use jamroom_core::ItemId;

use super::{ItemDetails, ItemError};

lazy_static! {
    static ref VIDEO_URL_REGEX: Regex =
        Regex::new(r"(?:youtube\.com/watch\?[^\s]*v=|youtu\.be/)([A-Za-z0-9_-]{11})")
            .expect("regex compiles");
    static ref VIDEO_ID_REGEX: Regex =
        Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("regex compiles");
}

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    title: String,
    author_name: String,
}

/// Extracts the video id from a watch link, a short link, or a bare id.
pub fn parse_item_id(input: &str) -> Result<ItemId, ItemError> {
    if let Some(captures) = VIDEO_URL_REGEX.captures(input) {
        return Ok(captures[1].to_string());
    }

    if VIDEO_ID_REGEX.is_match(input) {
        return Ok(input.to_string());
    }

    Err(ItemError::UnsupportedInput)
}

/// Resolves a queue input to item details.
///
/// Metadata comes from the oEmbed endpoint. When the lookup fails the item is
/// still queueable, just with the bare id as its title.
pub async fn resolve(input: &str) -> Result<ItemDetails, ItemError> {
    let item_id = parse_item_id(input)?;

    match fetch_details(&item_id).await {
        Ok(details) => Ok(details),
        Err(err) => {
            debug!("Falling back to bare details for {}: {}", item_id, err);
            Ok(ItemDetails::bare(&item_id))
        }
    }
}

async fn fetch_details(item_id: &ItemId) -> Result<ItemDetails, ItemError> {
    let url = format!(
        "https://www.youtube.com/oembed?url=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3D{}&format=json",
        item_id
    );

    let response = reqwest::get(&url)
        .await
        .map_err(|e| ItemError::FetchError(e.to_string()))?;

    if !response.status().is_success() {
        return Err(ItemError::NotFound);
    }

    let body: OEmbedResponse = response
        .json()
        .await
        .map_err(|e| ItemError::ParseError(e.to_string()))?;

    Ok(ItemDetails {
        item_id: item_id.clone(),
        title: body.title,
        channel: Some(body.author_name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_watch_links() {
        let id = parse_item_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .expect("link parses");

        assert_eq!(id, "dQw4w9WgXcQ");
    }

    #[test]
    fn parses_watch_links_with_extra_params() {
        let id = parse_item_id("https://www.youtube.com/watch?list=abc&v=dQw4w9WgXcQ&t=1")
            .expect("link parses");

        assert_eq!(id, "dQw4w9WgXcQ");
    }

    #[test]
    fn parses_short_links() {
        let id = parse_item_id("https://youtu.be/dQw4w9WgXcQ").expect("link parses");

        assert_eq!(id, "dQw4w9WgXcQ");
    }

    #[test]
    fn parses_bare_ids() {
        let id = parse_item_id("dQw4w9WgXcQ").expect("id parses");

        assert_eq!(id, "dQw4w9WgXcQ");
    }

    #[test]
    fn rejects_other_input() {
        assert!(parse_item_id("not a video").is_err());
        assert!(parse_item_id("https://example.com/watch?v=short").is_err());
    }
}
