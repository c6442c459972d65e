//! Evaluation notifier.
//!
//! Delivers the completion payload to the caller-specified callback with
//! bounded exponential backoff. Success is strictly an HTTP 200 within
//! the per-attempt timeout; anything else (network error, timeout,
//! non-200 status) waits and retries. Exhaustion is reported to the
//! caller and never unwinds the repository work that already completed.

use pagesmith_common::{BackoffSchedule, EvaluationPayload, NotifyError};
use std::time::Duration;
use tracing::{info, warn};

// ── Constants ──────────────────────────────────────────────────────────────

/// Delivery attempts before giving up.
const NOTIFY_ATTEMPTS: u32 = 5;

/// Delay after the first failed attempt; doubles per attempt.
const NOTIFY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Per-attempt timeout on the callback POST.
const NOTIFY_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Retrying deliverer of evaluation payloads.
#[derive(Clone)]
pub struct Notifier {
    http: reqwest::Client,
    schedule: BackoffSchedule,
    attempt_timeout: Duration,
}

impl Notifier {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            schedule: BackoffSchedule::exponential(NOTIFY_ATTEMPTS, NOTIFY_BASE_DELAY),
            attempt_timeout: NOTIFY_ATTEMPT_TIMEOUT,
        }
    }

    /// Override the delivery schedule (tests shrink the delays).
    pub fn with_schedule(mut self, schedule: BackoffSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Deliver `payload` to `url`. One POST per attempt, sequential
    /// sleeping backoff between attempts.
    pub async fn notify(
        &self,
        payload: &EvaluationPayload,
        url: &str,
    ) -> Result<(), NotifyError> {
        for attempt in 0..self.schedule.max_attempts {
            match self
                .http
                .post(url)
                .timeout(self.attempt_timeout)
                .json(payload)
                .send()
                .await
            {
                Ok(response) if response.status() == reqwest::StatusCode::OK => {
                    info!(url, attempt = attempt + 1, "evaluator acknowledged payload");
                    return Ok(());
                }
                Ok(response) => {
                    warn!(
                        url,
                        attempt = attempt + 1,
                        status = response.status().as_u16(),
                        "evaluator returned non-success"
                    );
                }
                Err(e) => {
                    warn!(url, attempt = attempt + 1, error = %e, "evaluator unreachable");
                }
            }
            if let Some(delay) = self.schedule.delay_after(attempt) {
                tokio::time::sleep(delay).await;
            }
        }
        Err(NotifyError::Exhausted {
            attempts: self.schedule.max_attempts,
        })
    }
}
