//! HTTP API for task submission and confirmation callbacks.
//!
//! Provides:
//! - `POST /task` - accept a task brief, reconcile the repository, notify the evaluator
//! - `POST /evaluate` - accept an asynchronous confirmation callback
//! - `GET /health` - basic daemon health check

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tracing::info;

use crate::audit::AuditLog;
use crate::notify::Notifier;
use crate::registry::ConfirmationRegistry;
use crate::workflow::Publisher;
use pagesmith_common::{
    ConfirmationRequest, EvaluationPayload, PendingKey, TaskRequest, TaskResponse,
};

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shared secret every task submission must present.
    pub secret: String,
    /// The reconciliation workflow.
    pub publisher: Arc<Publisher>,
    /// Evaluator callback deliverer.
    pub notifier: Notifier,
    /// Pending-key registry consulted by `/evaluate`.
    pub registry: ConfirmationRegistry,
    /// Append-only log of received tasks.
    pub task_log: AuditLog,
    /// Append-only log of received confirmations.
    pub confirmation_log: AuditLog,
    /// Daemon version.
    pub version: &'static str,
    /// Daemon start time.
    pub started_at: Instant,
}

/// Create the HTTP router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/task", post(task_handler))
        .route("/evaluate", post(evaluate_handler))
        .route("/health", get(health_handler))
        .with_state(Arc::new(state))
}

/// Handler for `POST /task`.
///
/// Secret mismatch rejects with 403 before any side effect. Once
/// accepted, the workflow runs to completion: repository provisioning
/// and evaluator notification are independent outcomes, both surfaced
/// in the response.
async fn task_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TaskRequest>,
) -> impl IntoResponse {
    if request.secret != state.secret {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"detail": "Invalid secret"})),
        )
            .into_response();
    }

    // Audit trail, secret elided.
    state
        .task_log
        .append(&json!({
            "email": request.email,
            "task": request.task,
            "round": request.round,
            "nonce": request.nonce,
            "brief": request.brief,
            "attachments": request.attachments.len(),
        }))
        .await;

    let key = PendingKey::from(&request);
    state.registry.record(key).await;
    info!(email = %request.email, task = %request.task, round = request.round, "task accepted");

    let outcome = match state.publisher.run(&request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({"status": "error", "detail": e.to_string()})),
            )
                .into_response();
        }
    };

    let payload = EvaluationPayload {
        email: request.email.clone(),
        task: request.task.clone(),
        round: request.round,
        nonce: request.nonce.clone(),
        repo_url: outcome.repo.html_url.clone(),
        commit_sha: outcome.commit_sha.clone(),
        pages_url: outcome.pages_url.clone(),
    };
    let notified = state
        .notifier
        .notify(&payload, &request.evaluation_url)
        .await
        .is_ok();

    let response = TaskResponse {
        status: "ok".to_string(),
        repo_url: outcome.repo.html_url,
        pages_url: outcome.pages_url,
        commit_sha: outcome.commit_sha,
        evaluation_notified: notified,
        skipped_paths: outcome
            .writes
            .iter()
            .filter(|w| !w.is_written())
            .map(|w| w.path().to_string())
            .collect(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Handler for `POST /evaluate`.
///
/// Confirmations for unknown keys are still answered with 200 — the
/// upstream caller requires a success status — but are distinguished
/// with `matched: false`.
async fn evaluate_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConfirmationRequest>,
) -> impl IntoResponse {
    state.confirmation_log.append(&request).await;

    let matched = state.registry.lookup(&request.key()).await;
    info!(
        email = %request.email,
        task = %request.task,
        round = request.round,
        matched,
        "confirmation received"
    );

    Json(json!({"status": "received", "matched": matched}))
}

/// Handler for `GET /health`.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": state.version,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::testing::MockProvider;
    use axum::body::Body;
    use axum::http::Request;
    use pagesmith_common::BackoffSchedule;
    use std::time::Duration;
    use tower::ServiceExt;

    fn make_test_state(provider: Arc<MockProvider>, tmp: &tempfile::TempDir) -> AppState {
        let http = reqwest::Client::new();
        let publisher = Publisher::new(provider, http.clone()).with_observe_schedule(
            BackoffSchedule::fixed(2, Duration::from_millis(1)),
        );
        let notifier = Notifier::new(http)
            .with_schedule(BackoffSchedule::exponential(2, Duration::from_millis(5)));
        AppState {
            secret: "s3cr3t".to_string(),
            publisher: Arc::new(publisher),
            notifier,
            registry: ConfirmationRegistry::new(),
            task_log: AuditLog::new(tmp.path().join("tasks.jsonl")),
            confirmation_log: AuditLog::new(tmp.path().join("confirmations.jsonl")),
            version: "0.0.0-test",
            started_at: Instant::now(),
        }
    }

    fn task_body(secret: &str) -> String {
        json!({
            "email": "jane.doe@example.com",
            "secret": secret,
            "task": "landing-page",
            "round": 1,
            "nonce": "n1",
            "brief": "Build a landing page",
            "checks": [],
            "evaluation_url": "http://127.0.0.1:1/cb",
            "attachments": [],
        })
        .to_string()
    }

    fn post_json(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected_without_side_effects() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::new());
        let state = make_test_state(provider.clone(), &tmp);
        let registry = state.registry.clone();
        let router = create_router(state);

        let response = router
            .oneshot(post_json("/task", task_body("wrong")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(registry.len().await, 0);
        assert_eq!(provider.file_count("jane-doe-landing-page"), 0);
        assert!(!tmp.path().join("tasks.jsonl").exists());
    }

    #[tokio::test]
    async fn accepted_task_provisions_and_reports() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::new());
        let state = make_test_state(provider.clone(), &tmp);
        let router = create_router(state);

        let response = router
            .oneshot(post_json("/task", task_body("s3cr3t")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert!(
            body["repo_url"]
                .as_str()
                .unwrap()
                .contains("jane-doe-landing-page")
        );
        assert!(body["pages_url"].is_string());
        assert!(body["commit_sha"].is_string());
        // Evaluator is unreachable in this test; notification failure is
        // surfaced, not fatal.
        assert_eq!(body["evaluation_notified"], false);
        assert_eq!(provider.file_count("jane-doe-landing-page"), 3);
        assert!(tmp.path().join("tasks.jsonl").exists());
    }

    #[tokio::test]
    async fn confirmation_for_recorded_key_matches() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::new());
        let state = make_test_state(provider, &tmp);
        let router = create_router(state);

        let response = router
            .clone()
            .oneshot(post_json("/task", task_body("s3cr3t")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let confirmation = json!({
            "email": "jane.doe@example.com",
            "task": "landing-page",
            "round": 1,
            "nonce": "n1",
            "repo_url": "https://github.com/mock/jane-doe-landing-page",
        })
        .to_string();
        let response = router
            .oneshot(post_json("/evaluate", confirmation))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "received");
        assert_eq!(body["matched"], true);
        assert!(tmp.path().join("confirmations.jsonl").exists());
    }

    #[tokio::test]
    async fn unknown_confirmation_is_answered_not_matched() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::new());
        let state = make_test_state(provider, &tmp);
        let router = create_router(state);

        let confirmation = json!({
            "email": "nobody@example.com",
            "task": "ghost",
            "round": 9,
            "nonce": "zzz",
        })
        .to_string();
        let response = router
            .oneshot(post_json("/evaluate", confirmation))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["matched"], false);
    }

    #[tokio::test]
    async fn malformed_body_is_a_client_error() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::new());
        let state = make_test_state(provider.clone(), &tmp);
        let router = create_router(state);

        let response = router
            .oneshot(post_json("/task", "{\"email\": 42}".to_string()))
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        assert_eq!(provider.file_count("jane-doe-landing-page"), 0);
    }

    #[tokio::test]
    async fn health_reports_version() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::new());
        let state = make_test_state(provider, &tmp);
        let router = create_router(state);

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], "0.0.0-test");
    }
}
