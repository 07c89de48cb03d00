//! Retry executor for forum mutations.
//!
//! Every failed attempt is classified:
//!
//! | Failure | Class | Action |
//! |---------|-------|--------|
//! | HTTP 429 | [`FailureClass::RateLimited`] | sleep `Retry-After` seconds (or the attempt number when the hint is missing or unusable), then retry |
//! | HTTP 422 citing a too-short title | [`FailureClass::TitleTooShort`] | pad the title and retry immediately |
//! | anything else | [`FailureClass::Fatal`] | log and return [`SyncError::Remote`] |
//!
//! Backoff is bounded by [`RetryPolicy::max_attempts`] and
//! [`RetryPolicy::deadline`]; running past either returns
//! [`SyncError::RetryExhausted`].

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, warn};

use super::{PublishClient, PublishRequest, PublishResponse, RemoteFailure};
use crate::error::{Result, SyncError};

/// Status Discourse answers with when throttling.
const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Status Discourse answers with for model validation errors.
const STATUS_UNPROCESSABLE: u16 = 422;

/// Limits for the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Rate-limited responses tolerated per request.
    pub max_attempts: u32,
    /// Wall-clock budget per request, measured from the first attempt.
    pub deadline: Duration,
    /// How many times a too-short title may be padded.
    pub max_title_fixes: u32,
    /// Text appended to a title the forum rejected as too short.
    pub title_suffix: String,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            deadline: Duration::from_secs(15 * 60),
            max_title_fixes: 3,
            title_suffix: " (session)".to_owned(),
        }
    }
}

/// Classification of a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureClass {
    /// Throttled; `hint` is the server's wait in seconds, when usable.
    RateLimited {
        /// Parsed `Retry-After` seconds.
        hint: Option<u64>,
    },
    /// The forum rejected the title for being too short.
    TitleTooShort,
    /// Not recoverable.
    Fatal,
}

/// Classify a failed attempt.
pub fn classify(failure: &RemoteFailure) -> FailureClass {
    match failure {
        RemoteFailure::Status {
            status: STATUS_TOO_MANY_REQUESTS,
            retry_after,
            ..
        } => FailureClass::RateLimited {
            hint: retry_after.as_deref().and_then(parse_retry_after),
        },
        RemoteFailure::Status {
            status: STATUS_UNPROCESSABLE,
            body,
            ..
        } if cites_short_title(body) => FailureClass::TitleTooShort,
        _ => FailureClass::Fatal,
    }
}

/// Parse a delta-seconds `Retry-After` value. Zero counts as no hint.
fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().filter(|secs| *secs > 0)
}

/// Discourse reports e.g. `{"errors":["Title is too short (minimum is 15 characters)"]}`.
fn cites_short_title(body: &str) -> bool {
    let body = body.to_lowercase();
    body.contains("title is too short") || body.contains("title too short")
}

/// Wait before retrying after the `attempt`-th rate-limited response.
pub fn backoff_wait(hint: Option<u64>, attempt: u32) -> Duration {
    Duration::from_secs(hint.unwrap_or(u64::from(attempt)))
}

/// Sends requests through a [`PublishClient`], absorbing recoverable failures.
#[derive(Clone)]
pub struct RetryExecutor {
    client: Arc<dyn PublishClient>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("client", &self.client.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl RetryExecutor {
    /// Wrap a client with the given policy.
    pub fn new(client: Arc<dyn PublishClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// The active policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `request` until it succeeds or fails fatally.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Remote`] for unrecoverable failures and
    /// [`SyncError::RetryExhausted`] when throttling outlasts the policy.
    pub async fn execute(&self, mut request: PublishRequest) -> Result<PublishResponse> {
        let started = Instant::now();
        let mut attempt: u32 = 0;
        let mut title_fixes: u32 = 0;

        loop {
            let failure = match self.client.send(&request).await {
                Ok(response) => return Ok(response),
                Err(failure) => failure,
            };

            match classify(&failure) {
                FailureClass::RateLimited { hint } => {
                    attempt += 1;
                    let wait = backoff_wait(hint, attempt);
                    let over_budget = started
                        .elapsed()
                        .checked_add(wait)
                        .is_none_or(|total| total > self.policy.deadline);
                    if attempt > self.policy.max_attempts || over_budget {
                        error!(
                            request = ?request,
                            attempts = attempt,
                            elapsed_secs = started.elapsed().as_secs(),
                            "rate limit backoff exhausted"
                        );
                        return Err(SyncError::RetryExhausted {
                            request,
                            attempts: attempt,
                        });
                    }
                    warn!(
                        request = %request,
                        attempt,
                        wait_secs = wait.as_secs(),
                        "429 rate limited, backing off"
                    );
                    tokio::time::sleep(wait).await;
                }
                FailureClass::TitleTooShort if title_fixes < self.policy.max_title_fixes => {
                    let suffix = &self.policy.title_suffix;
                    match request.title_mut() {
                        Some(title) => {
                            title.push_str(suffix);
                            title_fixes += 1;
                            warn!(title = %title, "title too short, retrying with suffix");
                        }
                        None => return Err(self.fatal(request, failure)),
                    }
                }
                FailureClass::TitleTooShort | FailureClass::Fatal => {
                    return Err(self.fatal(request, failure));
                }
            }
        }
    }

    fn fatal(&self, request: PublishRequest, failure: RemoteFailure) -> SyncError {
        error!(
            client = self.client.name(),
            request = ?request,
            response = %failure,
            "unrecoverable remote failure"
        );
        SyncError::Remote { request, failure }
    }
}
