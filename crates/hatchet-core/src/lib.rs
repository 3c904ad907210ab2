//! Client library for the Hatchet scrobbling service.
//!
//! - `auth`: refresh, bearer and access tokens, acquired lazily
//! - `api`: now-playing and scrobble submission with a retry queue
//! - `config`: service endpoints and transport settings

pub mod api;
pub mod auth;
pub mod config;
pub mod error;

pub use api::{HatchetClient, QueueReport, SubmitOutcome};
pub use auth::{ChainState, CredentialManager};
pub use config::ServiceConfig;
pub use error::{AuthError, Error, Result};
