//! Submission client for the Hatchet playback log API.
//!
//! `HatchetClient` owns the credential chain and the retry queue. Scrobbles
//! go through `submit_or_queue`, which parks requests that hit a transport
//! fault until the caller runs `process_queue`. Now-playing updates are sent
//! once and never queued.

use chrono::{DateTime, Utc};
use reqwest::{header, Client, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::CredentialManager;
use crate::config::ServiceConfig;
use crate::error::{Error, Result};

use super::payload::{PlaybackLogEntry, PLAYBACK_LOG_ENDPOINT};
use super::queue::{QueuedRequest, SubmissionQueue};

/// What happened to a queue-aware submission that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Delivered,
    /// Transport fault; the request is in the retry queue
    Queued,
}

/// Result of one `process_queue` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueReport {
    pub delivered: usize,
    pub queued: usize,
}

#[derive(Debug)]
pub struct HatchetClient {
    http: Client,
    config: ServiceConfig,
    client_id: String,
    credentials: CredentialManager,
    queue: SubmissionQueue,
}

impl HatchetClient {
    /// Create a client against the production endpoints.
    /// `client_id` is sent as the `User-Agent` of every submission.
    pub fn new(
        client_id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        Self::with_config(ServiceConfig::default(), client_id, username, password)
    }

    pub fn with_config(
        config: ServiceConfig,
        client_id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let http = config.build_http_client().map_err(Error::Request)?;
        // Clone is cheap - reqwest::Client shares its connection pool
        let credentials = CredentialManager::new(http.clone(), config.clone(), username, password);

        Ok(Self {
            http,
            config,
            client_id: client_id.into(),
            credentials,
            queue: SubmissionQueue::new(),
        })
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    pub fn queue(&self) -> &SubmissionQueue {
        &self.queue
    }

    /// POST `payload` as JSON to `endpoint` with a valid access token.
    /// Any non-2xx status is returned as `Error::Http`.
    pub async fn submit_authenticated<B>(&self, endpoint: &str, payload: &B) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        let token = self.credentials.ensure_access_token().await?;
        let url = self.config.api_url(endpoint);
        debug!(url = %url, "Authenticated POST");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .header(header::USER_AGENT, self.client_id.as_str())
            .json(payload)
            .send()
            .await
            .map_err(Error::from_send)?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::from_status(status, &body))
        }
    }

    /// Submit, queueing the request on a transport fault.
    ///
    /// Success removes a queued copy. A permanent failure also removes the
    /// queued copy, then returns the error.
    pub async fn submit_or_queue(&self, endpoint: &str, payload: Value) -> Result<SubmitOutcome> {
        let request = QueuedRequest::new(endpoint, payload);

        let result = self
            .submit_authenticated(&request.endpoint, &request.payload)
            .await;

        match result {
            Ok(_) => {
                if self.queue.remove(&request).await {
                    debug!(endpoint, "Delivered queued request");
                }
                Ok(SubmitOutcome::Delivered)
            }
            Err(err) if err.is_transient() => {
                if self.queue.push_unique(request).await {
                    warn!(endpoint, error = %err, "Submission failed, queued for retry");
                } else {
                    debug!(endpoint, error = %err, "Submission failed, already queued");
                }
                Ok(SubmitOutcome::Queued)
            }
            Err(err) => {
                if self.queue.remove(&request).await {
                    warn!(endpoint, error = %err, "Dropping queued request after permanent failure");
                }
                Err(err)
            }
        }
    }

    /// Record a finished play. `played_at` defaults to now.
    pub async fn scrobble(
        &self,
        artist: &str,
        album: &str,
        track: &str,
        played_at: Option<DateTime<Utc>>,
    ) -> Result<SubmitOutcome> {
        let entry = PlaybackLogEntry::scrobble(artist, album, track, played_at.unwrap_or_else(Utc::now));
        let body = serde_json::to_value(entry.into_request())?;
        self.submit_or_queue(PLAYBACK_LOG_ENDPOINT, body).await
    }

    /// Announce the track currently playing. Not retried on failure.
    pub async fn now_playing(&self, artist: &str, album: &str, track: &str) -> Result<()> {
        let request = PlaybackLogEntry::now_playing(artist, album, track).into_request();
        self.submit_authenticated(PLAYBACK_LOG_ENDPOINT, &request).await?;
        Ok(())
    }

    /// Resubmit every queued request once, in FIFO order.
    ///
    /// Works on a snapshot, so entries removed during the pass are neither
    /// skipped nor sent twice. Stops at the first permanent failure; that
    /// entry is already dropped and the rest stay queued.
    pub async fn process_queue(&self) -> Result<QueueReport> {
        let pending = self.queue.snapshot().await;
        let mut report = QueueReport::default();
        if pending.is_empty() {
            return Ok(report);
        }

        info!(count = pending.len(), "Processing submission queue");
        for request in pending {
            match self
                .submit_or_queue(&request.endpoint, request.payload)
                .await?
            {
                SubmitOutcome::Delivered => report.delivered += 1,
                SubmitOutcome::Queued => report.queued += 1,
            }
        }

        debug!(delivered = report.delivered, queued = report.queued, "Queue pass finished");
        Ok(report)
    }
}
