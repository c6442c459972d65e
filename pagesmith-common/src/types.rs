//! Common types used across Pagesmith components.

use serde::{Deserialize, Serialize};

/// Inbound task submission.
///
/// One logical submission is identified by (email, task, round, nonce);
/// re-delivery of the same round must be tolerated and produce the same
/// repository state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Requester email address; its local part feeds the repository slug.
    pub email: String,
    /// Shared secret; checked before any side effect.
    pub secret: String,
    /// Task name; normalized into the repository slug.
    pub task: String,
    /// Round number (≥ 1). Round 2 updates the repository round 1 created.
    pub round: u32,
    /// Opaque per-round correlation token supplied by the caller.
    pub nonce: String,
    /// Free-text brief templated into the generated landing page.
    pub brief: String,
    /// Verification checks, opaque to this service.
    #[serde(default)]
    pub checks: Vec<serde_json::Value>,
    /// Callback endpoint for the evaluation payload.
    pub evaluation_url: String,
    /// Caller-supplied attachments, decoded best-effort.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// A named attachment: either an inline `data:` URI or a remote URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Relative path the content lands at inside the repository.
    pub name: String,
    /// Inline data URI (`data:<media>;base64,<payload>`) or fetchable URL.
    pub url: String,
}

/// Reference to a repository owned by the external hosting provider.
///
/// Only the identity is held here; full remote state is never cached
/// across requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepo {
    /// Owning account name.
    pub owner: String,
    /// Repository name (the resolved slug).
    pub name: String,
    /// Default branch the provider reported at creation/lookup.
    pub default_branch: String,
    /// Browser URL of the repository.
    pub html_url: String,
    /// Whether this request created the repository or reused an existing one.
    pub newly_created: bool,
}

impl RemoteRepo {
    /// `owner/name` form used in provider API paths.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Payload delivered to the evaluator callback. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationPayload {
    pub email: String,
    pub task: String,
    pub round: u32,
    pub nonce: String,
    /// Browser URL of the provisioned repository.
    pub repo_url: String,
    /// Latest commit identifier, when the observer could determine one.
    pub commit_sha: Option<String>,
    /// Static-hosting URL, when publication enabling succeeded.
    pub pages_url: Option<String>,
}

/// Correlation key for a pending task: (email, task, round, nonce).
///
/// Recorded when a task is accepted; looked up when a confirmation
/// callback arrives. Never mutated, never expired.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingKey {
    pub email: String,
    pub task: String,
    pub round: u32,
    pub nonce: String,
}

impl PendingKey {
    pub fn new(
        email: impl Into<String>,
        task: impl Into<String>,
        round: u32,
        nonce: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            task: task.into(),
            round,
            nonce: nonce.into(),
        }
    }
}

impl std::fmt::Display for PendingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}#{} ({})",
            self.email, self.task, self.round, self.nonce
        )
    }
}

impl From<&TaskRequest> for PendingKey {
    fn from(req: &TaskRequest) -> Self {
        Self::new(
            req.email.clone(),
            req.task.clone(),
            req.round,
            req.nonce.clone(),
        )
    }
}

/// Final status object returned from `POST /task`.
///
/// Repository provisioning and evaluator notification are independent
/// outcomes; both are surfaced here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub status: String,
    pub repo_url: String,
    pub pages_url: Option<String>,
    pub commit_sha: Option<String>,
    /// Whether the evaluator acknowledged the payload with HTTP 200.
    pub evaluation_notified: bool,
    /// Paths from the file set that could not be written this round.
    #[serde(default)]
    pub skipped_paths: Vec<String>,
}

/// Inbound confirmation callback body for `POST /evaluate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub email: String,
    pub task: String,
    pub round: u32,
    pub nonce: String,
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub commit_sha: Option<String>,
    #[serde(default)]
    pub pages_url: Option<String>,
}

impl ConfirmationRequest {
    pub fn key(&self) -> PendingKey {
        PendingKey::new(
            self.email.clone(),
            self.task.clone(),
            self.round,
            self.nonce.clone(),
        )
    }
}
