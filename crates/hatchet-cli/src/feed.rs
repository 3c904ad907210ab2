//! Line protocol for `hatchet feed`.
//!
//! One event per line, fields separated by tabs:
//!
//! ```text
//! np<TAB>artist<TAB>album<TAB>track
//! scrobble<TAB>artist<TAB>album<TAB>track[<TAB>rfc3339 timestamp]
//! ```

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    NowPlaying {
        artist: String,
        album: String,
        track: String,
    },
    Scrobble {
        artist: String,
        album: String,
        track: String,
        played_at: Option<DateTime<Utc>>,
    },
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

pub fn parse_line(line: &str) -> Result<FeedEvent> {
    let fields: Vec<&str> = line.trim_end_matches(&['\r', '\n'][..]).split('\t').collect();
    let (kind, rest) = fields
        .split_first()
        .ok_or_else(|| anyhow!("empty line"))?;

    match (*kind, rest) {
        ("np", [artist, album, track]) => Ok(FeedEvent::NowPlaying {
            artist: artist.to_string(),
            album: album.to_string(),
            track: track.to_string(),
        }),
        ("scrobble", [artist, album, track]) => Ok(FeedEvent::Scrobble {
            artist: artist.to_string(),
            album: album.to_string(),
            track: track.to_string(),
            played_at: None,
        }),
        ("scrobble", [artist, album, track, timestamp]) => Ok(FeedEvent::Scrobble {
            artist: artist.to_string(),
            album: album.to_string(),
            track: track.to_string(),
            played_at: Some(
                parse_timestamp(timestamp)
                    .with_context(|| format!("invalid timestamp {:?}", timestamp))?,
            ),
        }),
        ("np" | "scrobble", _) => bail!("wrong number of fields for {:?}", kind),
        _ => bail!("unknown event type {:?}", kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_now_playing() {
        let event = parse_line("np\tMogwai\tYoung Team\tTracy\n").unwrap();
        assert_eq!(
            event,
            FeedEvent::NowPlaying {
                artist: "Mogwai".to_string(),
                album: "Young Team".to_string(),
                track: "Tracy".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_scrobble_with_offset_timestamp() {
        let event = parse_line("scrobble\ta\tb\tc\t2024-03-09T18:04:05+01:00").unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 3, 9, 17, 4, 5).unwrap();
        assert_eq!(
            event,
            FeedEvent::Scrobble {
                artist: "a".to_string(),
                album: "b".to_string(),
                track: "c".to_string(),
                played_at: Some(expected),
            }
        );
    }

    #[test]
    fn test_parse_scrobble_without_timestamp() {
        match parse_line("scrobble\ta\tb\tc").unwrap() {
            FeedEvent::Scrobble { played_at, .. } => assert!(played_at.is_none()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_line("np\tonly two\tfields").is_err());
        assert!(parse_line("love\ta\tb\tc").is_err());
        assert!(parse_line("scrobble\ta\tb\tc\tyesterday").is_err());
    }
}
