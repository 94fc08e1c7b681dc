//! M3U playlist resolution
//!
//! Station URLs may point to an `.m3u` playlist instead of the stream itself.
//! The first entry that is neither a comment nor blank is the stream URL.

use crate::capture::DEFAULT_USER_AGENT;
use crate::error::{Error, Result};
use reqwest::Client;
use tracing::debug;

/// Suffix identifying a playlist URL
pub const M3U_SUFFIX: &str = ".m3u";

/// True if `url` names an M3U playlist
pub fn is_playlist_url(url: &str) -> bool {
    url.trim_end().ends_with(M3U_SUFFIX)
}

/// First stream entry of an M3U document
pub fn first_entry(playlist: &str) -> Option<&str> {
    playlist
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Return `url` unchanged, or the first entry of the playlist it points to
///
/// # Errors
///
/// - [`Error::Http`] / [`Error::HttpStatus`]: the playlist could not be fetched
/// - [`Error::EmptyPlaylist`]: no usable entry
pub async fn resolve_stream_url(client: &Client, url: &str) -> Result<String> {
    if !is_playlist_url(url) {
        return Ok(url.to_string());
    }

    debug!(url, "Seems to be an M3U playlist, trying to parse");
    let response = client
        .get(url.trim())
        .header(reqwest::header::USER_AGENT, DEFAULT_USER_AGENT)
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(Error::HttpStatus {
            status: response.status(),
            url: url.to_string(),
        });
    }

    let body = response.text().await?;
    let entry = first_entry(&body).ok_or_else(|| Error::EmptyPlaylist(url.to_string()))?;
    debug!(stream = entry, "Playlist resolved");
    Ok(entry.to_string())
}
