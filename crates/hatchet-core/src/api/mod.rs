//! Submission API for the Hatchet playback log.
//!
//! This module provides the `HatchetClient` for sending now-playing and
//! scrobble events, plus the in-memory retry queue behind it.
//!
//! Every submission is authorized with a short-lived access token obtained
//! through the `auth` module.

pub mod client;
pub mod payload;
pub mod queue;

pub use client::{HatchetClient, QueueReport, SubmitOutcome};
pub use payload::{EntryType, PlaybackLogEntry, PlaybackLogRequest, PLAYBACK_LOG_ENDPOINT};
pub use queue::{QueuedRequest, SubmissionQueue};
