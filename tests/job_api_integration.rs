//! Integration tests for the job REST API.
//!
//! Router tests send requests straight into the Axum router with
//! `tower::ServiceExt::oneshot`; the end-to-end tests bind a random port and
//! drive the real HTTP client and poller against it.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tower::ServiceExt;

use trackgen::api::job_routes;
use trackgen::client::{HttpJobClient, PollOutcome, Poller};
use trackgen::config::{ClientConfig, EngineConfig};
use trackgen::error::ClientError;
use trackgen::jobs::{FailureInjector, JobService, JobStatus, StagePlan};

/// Maximum time any end-to-end test may run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn build_app(failures: FailureInjector) -> (Router, Arc<JobService>) {
    let service = Arc::new(
        JobService::new(&EngineConfig::default())
            .unwrap()
            .with_failure_injector(failures),
    );
    (job_routes(Arc::clone(&service)), service)
}

/// A service whose whole pipeline takes a few tens of milliseconds.
fn fast_service() -> Arc<JobService> {
    let config = EngineConfig {
        start_delay: Duration::from_millis(10),
        stage_gap: Duration::ZERO,
        ..EngineConfig::default()
    };
    Arc::new(
        JobService::new(&config)
            .unwrap()
            .with_stage_plan(StagePlan::uniform(Duration::from_millis(5)))
            .with_failure_injector(FailureInjector::never()),
    )
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).expect("invalid JSON from server")
}

async fn get(app: Router, uri: &str) -> axum::response::Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

async fn post_json(app: Router, uri: &str, body: Value) -> axum::response::Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Start an Axum server on a random port, return its base URL.
async fn start_server(service: Arc<JobService>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let app = job_routes(service);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://127.0.0.1:{port}")
}

fn client_for(base_url: String) -> Arc<HttpJobClient> {
    let config = ClientConfig {
        orchestrator_url: base_url,
        poll_interval: Duration::from_millis(20),
        request_timeout: Duration::from_secs(2),
    };
    Arc::new(HttpJobClient::new(&config).unwrap())
}

// ── Router tests ────────────────────────────────────────────────────────

#[tokio::test]
async fn health_returns_ok() {
    let (app, _) = build_app(FailureInjector::never());
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test(start_paused = true)]
async fn create_track_returns_accepted() {
    let (app, service) = build_app(FailureInjector::never());
    let response = post_json(app, "/create-track", json!({"prompt": "lofi beat"})).await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["status"], "PENDING");
    assert_eq!(json["details"], "Job has been queued.");

    let job_id = json["job_id"].as_str().unwrap();
    assert!(job_id.starts_with("job_"));
    assert_eq!(service.status(job_id).await.unwrap().prompt, "lofi beat");
}

#[tokio::test]
async fn empty_prompt_is_rejected() {
    let (app, service) = build_app(FailureInjector::never());
    let response = post_json(app, "/create-track", json!({"prompt": "  "})).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert!(json["detail"].as_str().unwrap().contains("prompt"));
    assert!(service.list().await.is_empty());
}

#[tokio::test]
async fn missing_prompt_is_rejected() {
    let (app, _) = build_app(FailureInjector::never());
    let response = post_json(app, "/create-track", json!({"reference_track_url": "x"})).await;
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn unknown_job_returns_404() {
    let (app, _) = build_app(FailureInjector::never());
    let response = get(app, "/jobs/nonexistent").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["detail"], "Job not found");
}

#[tokio::test(start_paused = true)]
async fn job_status_reaches_success() {
    let (app, _) = build_app(FailureInjector::never());
    let response = post_json(
        app.clone(),
        "/create-track",
        json!({"prompt": "track", "reference_track_url": "http://x/ref.wav"}),
    )
    .await;
    let job_id = body_json(response).await["job_id"].as_str().unwrap().to_string();

    // Admission delay + first gap: now in the first stage.
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    let json = body_json(get(app.clone(), &format!("/jobs/{job_id}")).await).await;
    assert_eq!(json["status"], "PROCESSING");
    assert_eq!(json["result"]["step"], "Parsing Prompt");
    assert_eq!(json["result"]["progress"], 20);
    assert!(json["result"].get("final_track_url").is_none());

    tokio::time::sleep(Duration::from_secs(30)).await;
    let json = body_json(get(app, &format!("/jobs/{job_id}")).await).await;
    assert_eq!(json["status"], "SUCCESS");
    assert_eq!(json["result"]["step"], "Completed");
    assert_eq!(json["result"]["progress"], 100);
    assert_eq!(
        json["result"]["final_track_url"],
        format!("/audio/final_mix_{job_id}.wav")
    );
    assert_eq!(json["result"]["stems"].as_object().unwrap().len(), 4);
    assert!(json["result"].get("error").is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_job_reports_error() {
    let (app, _) = build_app(FailureInjector::always());
    let response = post_json(app.clone(), "/create-track", json!({"prompt": "lofi beat"})).await;
    let job_id = body_json(response).await["job_id"].as_str().unwrap().to_string();

    tokio::time::sleep(Duration::from_secs(30)).await;
    let json = body_json(get(app, &format!("/jobs/{job_id}")).await).await;
    assert_eq!(json["status"], "FAILURE");
    assert_eq!(json["result"]["step"], "Failed");
    assert_eq!(
        json["result"]["error"],
        "Audio generation failed due to unexpected model error."
    );
    assert!(json["result"].get("final_track_url").is_none());
    assert!(json["result"].get("stems").is_none());
}

#[tokio::test(start_paused = true)]
async fn list_jobs_includes_summary() {
    let (app, service) = build_app(FailureInjector::never());
    service.submit("first", None).await.unwrap();
    service.submit("second", None).await.unwrap();

    let json = body_json(get(app, "/jobs").await).await;
    assert_eq!(json["jobs"].as_array().unwrap().len(), 2);
    assert_eq!(json["summary"]["total"], 2);
    assert_eq!(json["summary"]["pending"], 2);
}

// ── End-to-end over HTTP ────────────────────────────────────────────────

#[tokio::test]
async fn http_client_submits_and_polls_to_completion() {
    timeout(TEST_TIMEOUT, async {
        let base_url = start_server(fast_service()).await;
        let client = client_for(base_url);

        let created = client
            .create_track("lofi beat", Some("http://x/ref.wav"))
            .await
            .unwrap();
        assert_eq!(created.status, JobStatus::Pending);

        let mut steps: Vec<String> = Vec::new();
        let outcome = Poller::new(Arc::clone(&client), Duration::from_millis(20))
            .poll_until_terminal(&created.job_id, |job| {
                if steps.last() != Some(&job.result.step) {
                    steps.push(job.result.step.clone());
                }
            })
            .await;

        let job = match outcome {
            PollOutcome::Finished(job) => job,
            other => panic!("expected finished, got {other:?}"),
        };
        assert_eq!(job.status, JobStatus::Success);
        assert_eq!(job.reference_track_url.as_deref(), Some("http://x/ref.wav"));
        assert_eq!(steps.last().map(String::as_str), Some("Completed"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn http_client_reports_validation_and_not_found() {
    timeout(TEST_TIMEOUT, async {
        let base_url = start_server(fast_service()).await;
        let client = client_for(base_url);

        let err = client.create_track("", None).await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 422, .. }));

        let outcome = Poller::new(Arc::clone(&client), Duration::from_millis(20))
            .poll_until_terminal("nonexistent", |_| {})
            .await;
        match outcome {
            PollOutcome::Aborted { snapshot, error } => {
                assert!(matches!(error, ClientError::NotFound { .. }));
                assert_eq!(snapshot.status, JobStatus::Failure);
            }
            other => panic!("expected aborted, got {other:?}"),
        }

        // Reserved characters stay inside the id segment.
        let err = client.job_status("job_1/../health?x#y").await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound { ref id } if id == "job_1/../health?x#y"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unreachable_server_aborts_poll() {
    timeout(TEST_TIMEOUT, async {
        // Bind then drop to get a port nobody is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = client_for(format!("http://127.0.0.1:{port}"));
        let outcome = Poller::new(client, Duration::from_millis(20))
            .poll_until_terminal("job_1123456", |_| {})
            .await;

        let PollOutcome::Aborted { snapshot, error } = outcome else {
            panic!("expected aborted");
        };
        assert!(matches!(error, ClientError::Request(_)));
        assert_eq!(snapshot.job_id, "job_1123456");
        assert!(snapshot.result.error.unwrap().starts_with("Polling failed"));
    })
    .await
    .expect("test timed out");
}
