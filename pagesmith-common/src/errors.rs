//! Error types shared across Pagesmith components.

use thiserror::Error;

/// Errors from the repository provider boundary.
///
/// Existence checks never produce `NotFound` through this type — absence
/// is a normal `Ok(None)` outcome at the call sites that probe for it.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("provider transport error: {0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("provider rejected {operation}: HTTP {status}")]
    Rejected { operation: String, status: u16 },

    /// The provider answered, but the body did not parse.
    #[error("unexpected provider response for {operation}: {detail}")]
    BadResponse { operation: String, detail: String },

    /// A content write raced a concurrent update; the caller should
    /// re-check the revision marker and retry.
    #[error("stale revision marker for {path}")]
    StaleMarker { path: String },
}

impl ProviderError {
    /// Whether this error is the expected already-exists conflict on
    /// repository creation.
    pub fn is_create_conflict(&self) -> bool {
        matches!(
            self,
            Self::Rejected { status, .. } if *status == 422 || *status == 409
        )
    }
}

/// Errors from evaluator notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Every attempt failed; carries the attempt count.
    #[error("evaluator did not acknowledge after {attempts} attempts")]
    Exhausted { attempts: u32 },
}
