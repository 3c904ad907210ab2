//! Playback log request bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// API path for both now-playing and scrobble submissions
pub const PLAYBACK_LOG_ENDPOINT: &str = "playbacklogEntries";

/// The service does not need a track length; -1 marks it unknown.
const UNKNOWN_DURATION: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    #[serde(rename = "nowplaying")]
    NowPlaying,
    #[serde(rename = "scrobble")]
    Scrobble,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackLogEntry {
    #[serde(rename = "artistString")]
    pub artist: String,
    #[serde(rename = "albumString")]
    pub album: String,
    #[serde(rename = "trackString")]
    pub track: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timestamp: Option<String>,
}

/// Wrapper the API expects around every entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackLogRequest {
    #[serde(rename = "playbacklogEntry")]
    pub entry: PlaybackLogEntry,
}

impl PlaybackLogEntry {
    pub fn now_playing(artist: &str, album: &str, track: &str) -> Self {
        Self {
            artist: normalize(artist),
            album: normalize(album),
            track: normalize(track),
            entry_type: EntryType::NowPlaying,
            duration: None,
            timestamp: None,
        }
    }

    pub fn scrobble(artist: &str, album: &str, track: &str, played_at: DateTime<Utc>) -> Self {
        Self {
            artist: normalize(artist),
            album: normalize(album),
            track: normalize(track),
            entry_type: EntryType::Scrobble,
            duration: Some(UNKNOWN_DURATION),
            timestamp: Some(format_timestamp(played_at)),
        }
    }

    pub fn into_request(self) -> PlaybackLogRequest {
        PlaybackLogRequest { entry: self }
    }
}

/// Trim surrounding whitespace and lowercase
fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// ISO-8601 UTC with second precision and an explicit `Z`
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
