//! Task reconciliation workflow.
//!
//! Drives one accepted task end to end: resolve the repository identity,
//! decode attachments, build the file set, ensure the repository exists
//! (create on first use, reuse on later rounds and on create races),
//! reconcile each path independently, enable static hosting with branch
//! fallback, and observe the resulting commit under eventual consistency.
//!
//! Per-item failures (one attachment, one path, one hosting attempt)
//! degrade the result and never abort the rest; only a repository that
//! can neither be created nor found fails the task.

use pagesmith_common::{
    Attachment, BackoffSchedule, DecodeOutcome, DecodedAttachment, FileSet, ProviderError,
    RemoteRepo, RepoSlug, TaskRequest, build_file_set, decode_data_uri, is_data_uri,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::github::RepoProvider;

// ── Constants ──────────────────────────────────────────────────────────────

/// Re-checks of a path's revision marker after a stale-marker rejection.
const MARKER_RECHECK_ATTEMPTS: u32 = 2;

/// Commit-listing polls before the observer gives up.
const OBSERVE_ATTEMPTS: u32 = 4;

/// Delay after the first empty commit-listing poll; doubles per attempt.
const OBSERVE_BASE_DELAY: Duration = Duration::from_millis(500);

/// Well-known alternate branch tried when Pages activation on the
/// default branch is rejected.
const ALTERNATE_BRANCH: &str = "master";

/// Fallback when the default branch itself is the alternate.
const PRIMARY_BRANCH: &str = "main";

// ── Outcome types ──────────────────────────────────────────────────────────

/// Per-path reconciliation result.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// The path was created or updated.
    Written { path: String, created: bool },
    /// The path could not be written this round; the rest of the file
    /// set is unaffected.
    Skipped { path: String, reason: String },
}

impl WriteOutcome {
    pub fn path(&self) -> &str {
        match self {
            Self::Written { path, .. } | Self::Skipped { path, .. } => path,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

/// Everything one completed workflow run produced.
#[derive(Debug)]
pub struct TaskOutcome {
    pub repo: RemoteRepo,
    pub pages_url: Option<String>,
    pub commit_sha: Option<String>,
    pub writes: Vec<WriteOutcome>,
    pub decodes: Vec<DecodeOutcome>,
}

// ── Workflow ───────────────────────────────────────────────────────────────

/// One task-publishing workflow over an abstract repository provider.
pub struct Publisher {
    provider: Arc<dyn RepoProvider>,
    http: reqwest::Client,
    observe_schedule: BackoffSchedule,
}

impl Publisher {
    pub fn new(provider: Arc<dyn RepoProvider>, http: reqwest::Client) -> Self {
        Self {
            provider,
            http,
            observe_schedule: BackoffSchedule::exponential(OBSERVE_ATTEMPTS, OBSERVE_BASE_DELAY),
        }
    }

    /// Override the observer schedule (tests shrink the delays).
    pub fn with_observe_schedule(mut self, schedule: BackoffSchedule) -> Self {
        self.observe_schedule = schedule;
        self
    }

    /// Run the full workflow for an accepted task.
    ///
    /// Fails only when the repository can neither be created nor found;
    /// every other failure degrades the outcome (skipped paths, absent
    /// hosting URL, absent commit) and is carried in the report.
    pub async fn run(&self, request: &TaskRequest) -> Result<TaskOutcome, ProviderError> {
        let slug = RepoSlug::resolve(&request.email, &request.task);
        info!(slug = %slug, round = request.round, "starting task workflow");

        let (decoded, decodes) = self.decode_attachments(&request.attachments).await;
        let files = build_file_set(&request.brief, &decoded);

        let repo = self.ensure_repo(&slug, &request.task).await?;
        let writes = self.write_files(&repo, &files).await;
        let pages_url = self.enable_publication(&repo).await;
        let commit_sha = self.observe_commit(&repo).await;

        info!(
            repo = %repo.full_name(),
            written = writes.iter().filter(|w| w.is_written()).count(),
            pages = pages_url.is_some(),
            "task workflow finished"
        );

        Ok(TaskOutcome {
            repo,
            pages_url,
            commit_sha,
            writes,
            decodes,
        })
    }

    // ── Attachment decoding ────────────────────────────────────────────

    /// Decode every attachment independently. Inline data URIs are
    /// decoded in place; remote URLs are fetched with the client's
    /// bounded timeout. Any single failure drops that attachment with a
    /// reported reason.
    pub async fn decode_attachments(
        &self,
        attachments: &[Attachment],
    ) -> (Vec<DecodedAttachment>, Vec<DecodeOutcome>) {
        let mut decoded = Vec::new();
        let mut outcomes = Vec::new();

        for attachment in attachments {
            match self.decode_one(attachment).await {
                Ok(content) => {
                    outcomes.push(DecodeOutcome::Decoded {
                        name: attachment.name.clone(),
                    });
                    decoded.push(DecodedAttachment {
                        name: attachment.name.clone(),
                        content,
                    });
                }
                Err(reason) => {
                    warn!(name = %attachment.name, %reason, "dropping attachment");
                    outcomes.push(DecodeOutcome::Skipped {
                        name: attachment.name.clone(),
                        reason,
                    });
                }
            }
        }
        (decoded, outcomes)
    }

    async fn decode_one(&self, attachment: &Attachment) -> Result<String, String> {
        if is_data_uri(&attachment.url) {
            return decode_data_uri(&attachment.url).map_err(|e| e.to_string());
        }
        let response = self
            .http
            .get(&attachment.url)
            .send()
            .await
            .map_err(|e| format!("fetch failed: {e}"))?;
        if !response.status().is_success() {
            return Err(format!("fetch returned HTTP {}", response.status().as_u16()));
        }
        response
            .text()
            .await
            .map_err(|e| format!("fetch body unreadable: {e}"))
    }

    // ── Repository reconciliation ──────────────────────────────────────

    /// Ensure a repository exists for the slug: reuse when present,
    /// create when absent, and treat a create-time already-exists
    /// conflict as the reuse path (the lookup-then-create race).
    async fn ensure_repo(
        &self,
        slug: &RepoSlug,
        task: &str,
    ) -> Result<RemoteRepo, ProviderError> {
        if let Some(repo) = self.provider.get_repo(slug.as_str()).await? {
            info!(repo = %repo.full_name(), "reusing existing repository");
            return Ok(repo);
        }

        let description = format!("Auto-generated repo for {task}");
        match self.provider.create_repo(slug.as_str(), &description).await {
            Ok(repo) => {
                info!(repo = %repo.full_name(), "created repository");
                Ok(repo)
            }
            Err(e) if e.is_create_conflict() => {
                // A concurrent submission won the create race; fall back
                // to the repository it made.
                info!(slug = %slug, "create conflicted, reusing existing repository");
                self.provider.get_repo(slug.as_str()).await?.ok_or(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Write every path independently: create when absent, update with
    /// the marker from a fresh existence check when present. A stale
    /// marker triggers a bounded re-check; any terminal failure skips
    /// only that path.
    async fn write_files(&self, repo: &RemoteRepo, files: &FileSet) -> Vec<WriteOutcome> {
        let mut outcomes = Vec::new();
        for (path, content) in files {
            outcomes.push(self.write_one(repo, path, content).await);
        }
        outcomes
    }

    async fn write_one(&self, repo: &RemoteRepo, path: &str, content: &str) -> WriteOutcome {
        let mut last_reason = String::new();

        for _attempt in 0..=MARKER_RECHECK_ATTEMPTS {
            let sha = match self.provider.get_file_sha(repo, path).await {
                Ok(sha) => sha,
                Err(e) => {
                    last_reason = e.to_string();
                    break;
                }
            };
            let created = sha.is_none();

            match self.provider.put_file(repo, path, content, sha.as_deref()).await {
                Ok(()) => {
                    return WriteOutcome::Written {
                        path: path.to_string(),
                        created,
                    };
                }
                Err(ProviderError::StaleMarker { .. }) => {
                    // The remote moved under us; re-check the marker and
                    // try again rather than overwrite blind.
                    last_reason = "revision marker went stale".to_string();
                }
                Err(e) => {
                    last_reason = e.to_string();
                    break;
                }
            }
        }

        warn!(repo = %repo.full_name(), path, reason = %last_reason, "skipping path");
        WriteOutcome::Skipped {
            path: path.to_string(),
            reason: last_reason,
        }
    }

    // ── Publication enabling ───────────────────────────────────────────

    /// Activate static hosting: the default branch first, then the
    /// well-known alternate, then a read of the current configuration in
    /// case a prior activation has not become visible yet. Absence of a
    /// hosting URL is reported, not fatal.
    async fn enable_publication(&self, repo: &RemoteRepo) -> Option<String> {
        let alternate = if repo.default_branch == PRIMARY_BRANCH {
            ALTERNATE_BRANCH
        } else {
            PRIMARY_BRANCH
        };

        for branch in [repo.default_branch.as_str(), alternate] {
            match self.provider.enable_pages(repo, branch).await {
                Ok(Some(url)) => {
                    info!(repo = %repo.full_name(), branch, "pages enabled");
                    return Some(url);
                }
                Ok(None) => {
                    // Activation accepted but no URL reported yet; the
                    // configuration read below may already see it.
                    break;
                }
                Err(e) => {
                    warn!(repo = %repo.full_name(), branch, error = %e, "pages activation rejected");
                }
            }
        }

        match self.provider.get_pages_url(repo).await {
            Ok(url) => url,
            Err(e) => {
                warn!(repo = %repo.full_name(), error = %e, "pages configuration unreadable");
                None
            }
        }
    }

    // ── State observation ──────────────────────────────────────────────

    /// Determine the latest published revision, polling because a
    /// just-completed write may not be visible immediately. `None` after
    /// the schedule is exhausted; never blocks indefinitely.
    async fn observe_commit(&self, repo: &RemoteRepo) -> Option<String> {
        for attempt in 0..self.observe_schedule.max_attempts {
            match self.provider.latest_commit(repo).await {
                Ok(Some(sha)) => return Some(sha),
                Ok(None) => {}
                Err(e) => {
                    warn!(repo = %repo.full_name(), error = %e, "commit listing failed");
                }
            }
            if let Some(delay) = self.observe_schedule.delay_after(attempt) {
                tokio::time::sleep(delay).await;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::testing::MockProvider;
    use pagesmith_common::content::{LANDING_PAGE, README};

    fn request_with(attachments: Vec<Attachment>) -> TaskRequest {
        TaskRequest {
            email: "jane.doe@example.com".into(),
            secret: "s".into(),
            task: "landing-page".into(),
            round: 1,
            nonce: "n1".into(),
            brief: "Build a landing page".into(),
            checks: vec![],
            evaluation_url: "http://127.0.0.1:1/cb".into(),
            attachments,
        }
    }

    fn publisher(provider: Arc<MockProvider>) -> Publisher {
        Publisher::new(provider, reqwest::Client::new()).with_observe_schedule(
            BackoffSchedule::fixed(2, Duration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn first_round_creates_and_populates() {
        let provider = Arc::new(MockProvider::new());
        let outcome = publisher(provider.clone())
            .run(&request_with(vec![]))
            .await
            .unwrap();

        assert!(outcome.repo.newly_created);
        assert_eq!(outcome.repo.name, "jane-doe-landing-page");
        assert_eq!(outcome.writes.len(), 3);
        assert!(outcome.writes.iter().all(WriteOutcome::is_written));
        assert!(outcome.commit_sha.is_some());
        assert_eq!(provider.file_count("jane-doe-landing-page"), 3);
    }

    #[tokio::test]
    async fn second_round_reuses_and_updates_without_duplicates() {
        let provider = Arc::new(MockProvider::new());
        let publisher = publisher(provider.clone());
        publisher.run(&request_with(vec![])).await.unwrap();

        let mut second = request_with(vec![]);
        second.round = 2;
        let outcome = publisher.run(&second).await.unwrap();

        assert!(!outcome.repo.newly_created);
        assert!(outcome.writes.iter().all(WriteOutcome::is_written));
        // Same paths, updated in place.
        assert_eq!(provider.file_count("jane-doe-landing-page"), 3);
    }

    #[tokio::test]
    async fn create_conflict_falls_back_to_reuse() {
        let provider = Arc::new(MockProvider::new());
        provider.seed_repo("jane-doe-landing-page", "main");
        provider.hide_repo_from_lookup_once();

        let outcome = publisher(provider.clone())
            .run(&request_with(vec![]))
            .await
            .unwrap();
        assert!(!outcome.repo.newly_created);
    }

    #[tokio::test]
    async fn invalid_attachment_is_dropped_and_rest_survive() {
        let attachments = vec![
            Attachment {
                name: "broken.txt".into(),
                // No comma separator.
                url: "data:text/plain;base64SGVsbG8=".into(),
            },
            Attachment {
                name: "notes.txt".into(),
                url: "data:text/plain;base64,SGVsbG8=".into(),
            },
        ];
        let provider = Arc::new(MockProvider::new());
        let outcome = publisher(provider.clone())
            .run(&request_with(attachments))
            .await
            .unwrap();

        assert_eq!(outcome.decodes.len(), 2);
        assert!(matches!(
            outcome.decodes[0],
            DecodeOutcome::Skipped { .. }
        ));
        assert!(outcome.writes.iter().any(|w| w.path() == "notes.txt"));
        assert!(!outcome.writes.iter().any(|w| w.path() == "broken.txt"));
    }

    #[tokio::test]
    async fn unreachable_remote_attachment_is_dropped() {
        let attachments = vec![Attachment {
            name: "remote.txt".into(),
            url: "http://127.0.0.1:1/never".into(),
        }];
        let provider = Arc::new(MockProvider::new());
        let outcome = publisher(provider.clone())
            .run(&request_with(attachments))
            .await
            .unwrap();

        assert!(matches!(
            outcome.decodes[0],
            DecodeOutcome::Skipped { .. }
        ));
        // Boilerplate still publishes.
        assert!(outcome.writes.iter().any(|w| w.path() == LANDING_PAGE));
        assert!(outcome.writes.iter().any(|w| w.path() == README));
    }

    #[tokio::test]
    async fn one_failing_path_does_not_abort_the_rest() {
        let provider = Arc::new(MockProvider::new());
        provider.fail_writes_to(LANDING_PAGE);

        let outcome = publisher(provider.clone())
            .run(&request_with(vec![]))
            .await
            .unwrap();

        let skipped: Vec<_> = outcome
            .writes
            .iter()
            .filter(|w| !w.is_written())
            .collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].path(), LANDING_PAGE);
        assert_eq!(provider.file_count("jane-doe-landing-page"), 2);
    }

    #[tokio::test]
    async fn stale_marker_is_rechecked_and_retried() {
        let provider = Arc::new(MockProvider::new());
        provider.seed_repo("jane-doe-landing-page", "main");
        provider.stale_marker_once(README);

        let outcome = publisher(provider.clone())
            .run(&request_with(vec![]))
            .await
            .unwrap();
        assert!(outcome.writes.iter().all(WriteOutcome::is_written));
    }

    #[tokio::test]
    async fn pages_fallback_tries_alternate_branch() {
        let provider = Arc::new(MockProvider::new());
        provider.reject_pages_on("main");
        provider.pages_url_for("master", "https://jane.github.io/landing/");

        let outcome = publisher(provider.clone())
            .run(&request_with(vec![]))
            .await
            .unwrap();

        assert_eq!(
            outcome.pages_url.as_deref(),
            Some("https://jane.github.io/landing/")
        );
        assert_eq!(provider.pages_branches_tried(), vec!["main", "master"]);
    }

    #[tokio::test]
    async fn pages_config_read_covers_delayed_activation() {
        let provider = Arc::new(MockProvider::new());
        provider.reject_pages_on("main");
        provider.reject_pages_on("master");
        provider.set_existing_pages_url("https://jane.github.io/landing/");

        let outcome = publisher(provider.clone())
            .run(&request_with(vec![]))
            .await
            .unwrap();
        assert_eq!(
            outcome.pages_url.as_deref(),
            Some("https://jane.github.io/landing/")
        );
    }

    #[tokio::test]
    async fn pages_absence_degrades_to_none() {
        let provider = Arc::new(MockProvider::new());
        provider.reject_pages_on("main");
        provider.reject_pages_on("master");

        let outcome = publisher(provider.clone())
            .run(&request_with(vec![]))
            .await
            .unwrap();
        assert!(outcome.pages_url.is_none());
    }

    #[tokio::test]
    async fn observer_returns_none_after_bounded_retries() {
        let provider = Arc::new(MockProvider::new());
        provider.hide_commits();

        let outcome = publisher(provider.clone())
            .run(&request_with(vec![]))
            .await
            .unwrap();
        assert!(outcome.commit_sha.is_none());
    }

    #[tokio::test]
    async fn observer_sees_commit_on_later_poll() {
        let provider = Arc::new(MockProvider::new());
        provider.delay_commit_visibility(1);

        let outcome = publisher(provider.clone())
            .run(&request_with(vec![]))
            .await
            .unwrap();
        assert!(outcome.commit_sha.is_some());
    }
}
