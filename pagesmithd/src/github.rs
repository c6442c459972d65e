//! Repository provider boundary.
//!
//! [`RepoProvider`] is the seam the workflow drives; [`GitHubClient`] is
//! the production implementation over the GitHub REST API. Every call
//! carries the shared client timeout, and "not found" on existence
//! checks is a normal `Ok(None)`, never an error.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use pagesmith_common::{ProviderError, RemoteRepo};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Abstract repository provider.
///
/// The workflow only ever talks to this trait, so tests can substitute
/// an in-memory provider and the GitHub client stays a thin adapter.
#[async_trait]
pub trait RepoProvider: Send + Sync {
    /// Create a public repository under the owning account.
    ///
    /// An already-exists conflict surfaces as a [`ProviderError`] for
    /// which [`ProviderError::is_create_conflict`] holds; the caller
    /// treats that as the reuse path, not a failure.
    async fn create_repo(&self, name: &str, description: &str)
    -> Result<RemoteRepo, ProviderError>;

    /// Look up an existing repository. `Ok(None)` when absent.
    async fn get_repo(&self, name: &str) -> Result<Option<RemoteRepo>, ProviderError>;

    /// Current revision marker (blob SHA) of a path. `Ok(None)` when the
    /// path does not exist in the repository.
    async fn get_file_sha(
        &self,
        repo: &RemoteRepo,
        path: &str,
    ) -> Result<Option<String>, ProviderError>;

    /// Create or update one file. `existing_sha` must be the marker from
    /// a fresh existence check when updating; a mismatched marker yields
    /// [`ProviderError::StaleMarker`].
    async fn put_file(
        &self,
        repo: &RemoteRepo,
        path: &str,
        content: &str,
        existing_sha: Option<&str>,
    ) -> Result<(), ProviderError>;

    /// Activate static hosting from `branch` at the root path. Returns
    /// the hosting URL when the provider reports one immediately.
    async fn enable_pages(
        &self,
        repo: &RemoteRepo,
        branch: &str,
    ) -> Result<Option<String>, ProviderError>;

    /// Read the current hosting configuration. `Ok(None)` when hosting
    /// was never activated.
    async fn get_pages_url(&self, repo: &RemoteRepo) -> Result<Option<String>, ProviderError>;

    /// Latest commit identifier on the default branch. `Ok(None)` when
    /// the history listing is empty or not yet visible.
    async fn latest_commit(&self, repo: &RemoteRepo) -> Result<Option<String>, ProviderError>;
}

// ── GitHub REST implementation ─────────────────────────────────────────────

/// GitHub REST API client.
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    owner: String,
    token: String,
}

#[derive(Deserialize)]
struct RepoResponse {
    name: String,
    html_url: String,
    #[serde(default = "default_branch_name")]
    default_branch: String,
}

fn default_branch_name() -> String {
    "main".to_string()
}

#[derive(Deserialize)]
struct ContentsResponse {
    sha: String,
}

#[derive(Deserialize)]
struct PagesResponse {
    html_url: Option<String>,
}

#[derive(Deserialize)]
struct CommitResponse {
    sha: String,
}

impl GitHubClient {
    /// Build a client with a shared per-request timeout.
    pub fn new(
        api_base: impl Into<String>,
        owner: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pagesmithd/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_base: api_base.into(),
            owner: owner.into(),
            token: token.into(),
        })
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
    }

    fn repo_url(&self, repo: &RemoteRepo, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.api_base, repo.owner, repo.name, suffix
        )
    }

    async fn send(
        &self,
        operation: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ProviderError> {
        builder
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("{operation}: {e}")))
    }

    fn rejected(operation: &str, status: reqwest::StatusCode) -> ProviderError {
        ProviderError::Rejected {
            operation: operation.to_string(),
            status: status.as_u16(),
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        operation: &str,
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        response
            .json()
            .await
            .map_err(|e| ProviderError::BadResponse {
                operation: operation.to_string(),
                detail: e.to_string(),
            })
    }
}

#[async_trait]
impl RepoProvider for GitHubClient {
    async fn create_repo(
        &self,
        name: &str,
        description: &str,
    ) -> Result<RemoteRepo, ProviderError> {
        let operation = "create_repo";
        let url = format!("{}/user/repos", self.api_base);
        let body = json!({
            "name": name,
            "description": description,
            "private": false,
            "auto_init": false,
        });
        let response = self
            .send(operation, self.request(reqwest::Method::POST, url).json(&body))
            .await?;
        if !response.status().is_success() {
            return Err(Self::rejected(operation, response.status()));
        }
        let parsed: RepoResponse = Self::parse(operation, response).await?;
        Ok(RemoteRepo {
            owner: self.owner.clone(),
            name: parsed.name,
            default_branch: parsed.default_branch,
            html_url: parsed.html_url,
            newly_created: true,
        })
    }

    async fn get_repo(&self, name: &str) -> Result<Option<RemoteRepo>, ProviderError> {
        let operation = "get_repo";
        let url = format!("{}/repos/{}/{}", self.api_base, self.owner, name);
        let response = self
            .send(operation, self.request(reqwest::Method::GET, url))
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::rejected(operation, response.status()));
        }
        let parsed: RepoResponse = Self::parse(operation, response).await?;
        Ok(Some(RemoteRepo {
            owner: self.owner.clone(),
            name: parsed.name,
            default_branch: parsed.default_branch,
            html_url: parsed.html_url,
            newly_created: false,
        }))
    }

    async fn get_file_sha(
        &self,
        repo: &RemoteRepo,
        path: &str,
    ) -> Result<Option<String>, ProviderError> {
        let operation = "get_file_sha";
        let url = self.repo_url(repo, &format!("/contents/{path}"));
        let response = self
            .send(operation, self.request(reqwest::Method::GET, url))
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::rejected(operation, response.status()));
        }
        let parsed: ContentsResponse = Self::parse(operation, response).await?;
        Ok(Some(parsed.sha))
    }

    async fn put_file(
        &self,
        repo: &RemoteRepo,
        path: &str,
        content: &str,
        existing_sha: Option<&str>,
    ) -> Result<(), ProviderError> {
        let operation = "put_file";
        let url = self.repo_url(repo, &format!("/contents/{path}"));
        let message = match existing_sha {
            Some(_) => format!("Update {path}"),
            None => format!("Add {path}"),
        };
        let mut body = json!({
            "message": message,
            "content": BASE64.encode(content.as_bytes()),
        });
        if let Some(sha) = existing_sha {
            body["sha"] = json!(sha);
        }
        let response = self
            .send(operation, self.request(reqwest::Method::PUT, url).json(&body))
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        // 409/422 on a contents write means the marker no longer matches
        // the remote state; the caller re-checks and retries.
        if status == reqwest::StatusCode::CONFLICT
            || status == reqwest::StatusCode::UNPROCESSABLE_ENTITY
        {
            return Err(ProviderError::StaleMarker {
                path: path.to_string(),
            });
        }
        Err(Self::rejected(operation, status))
    }

    async fn enable_pages(
        &self,
        repo: &RemoteRepo,
        branch: &str,
    ) -> Result<Option<String>, ProviderError> {
        let operation = "enable_pages";
        let url = self.repo_url(repo, "/pages");
        let body = json!({
            "source": { "branch": branch, "path": "/" },
        });
        let response = self
            .send(operation, self.request(reqwest::Method::POST, url).json(&body))
            .await?;
        if !response.status().is_success() {
            return Err(Self::rejected(operation, response.status()));
        }
        let parsed: PagesResponse = Self::parse(operation, response).await?;
        Ok(parsed.html_url)
    }

    async fn get_pages_url(&self, repo: &RemoteRepo) -> Result<Option<String>, ProviderError> {
        let operation = "get_pages";
        let url = self.repo_url(repo, "/pages");
        let response = self
            .send(operation, self.request(reqwest::Method::GET, url))
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::rejected(operation, response.status()));
        }
        let parsed: PagesResponse = Self::parse(operation, response).await?;
        Ok(parsed.html_url)
    }

    async fn latest_commit(&self, repo: &RemoteRepo) -> Result<Option<String>, ProviderError> {
        let operation = "latest_commit";
        let url = self.repo_url(repo, "/commits?per_page=1");
        let response = self
            .send(operation, self.request(reqwest::Method::GET, url))
            .await?;
        // An empty repository answers 409 on the commit listing.
        if response.status() == reqwest::StatusCode::CONFLICT
            || response.status() == reqwest::StatusCode::NOT_FOUND
        {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::rejected(operation, response.status()));
        }
        let parsed: Vec<CommitResponse> = Self::parse(operation, response).await?;
        Ok(parsed.into_iter().next().map(|c| c.sha))
    }
}

// ── Test double ────────────────────────────────────────────────────────────
