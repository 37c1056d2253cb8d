use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use stock_snapshot::models::{JobKey, JobReport, JobRequest};
use stock_snapshot::server::{router, AppState};
use stock_snapshot::{AppError, AppResult, Config, JobRunner, LogHub};
use tokio::sync::Notify;
use tower::ServiceExt;

const BOUNDARY: &str = "stock-snapshot-boundary";

/// 开始后一直等到测试放行才结束
#[derive(Default)]
struct BlockingRunner {
    started: Notify,
    release: Notify,
}

#[async_trait]
impl JobRunner for BlockingRunner {
    async fn run(&self, request: JobRequest) -> AppResult<JobReport> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(JobReport {
            document_url: format!("https://docs.google.com/document/d/{}", request.target.name),
            elapsed: Duration::from_millis(1500),
            artifact_count: 3,
            report_pdf_url: None,
            exported_pdf_url: None,
        })
    }
}

struct FailingRunner;

#[async_trait]
impl JobRunner for FailingRunner {
    async fn run(&self, _request: JobRequest) -> AppResult<JobReport> {
        Err(AppError::NoArtifacts)
    }
}

fn state_with(runner: Arc<dyn JobRunner>, config: Config) -> AppState {
    AppState::new(config, LogHub::new(), runner)
}

fn form_request(fields: &[(&str, &str)]) -> Request<Body> {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            BOUNDARY, name, value
        ));
    }
    body.push_str(&format!("--{}--\r\n", BOUNDARY));

    Request::builder()
        .method("POST")
        .uri("/screenshot")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

#[tokio::test]
async fn test_index_page_is_served() {
    let app = router(state_with(Arc::new(FailingRunner), Config::default()));
    let request = Request::get("/").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("screenshotForm"));

    let request = Request::get("/assets/js/main.js").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("EventSource"));
}

#[tokio::test]
async fn test_missing_stock_name_is_rejected() {
    let app = router(state_with(Arc::new(FailingRunner), Config::default()));

    let (status, body) = send(&app, form_request(&[("comment", "hello")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Missing stock name");

    let (status, _) = send(&app, form_request(&[("stockName", "   ")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_concurrent_request_for_same_stock_conflicts() {
    let runner = Arc::new(BlockingRunner::default());
    let state = state_with(runner.clone(), Config::default());
    let app = router(state.clone());

    let first = tokio::spawn({
        let app = app.clone();
        async move { send(&app, form_request(&[("stockName", "Infosys")])).await }
    });
    runner.started.notified().await;

    // 规范化之后是同一个键
    let (status, body) = send(&app, form_request(&[("stockName", "  INFOSYS ")])).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "A job is already running for INFOSYS");

    runner.release.notify_one();
    let (status, body) = first.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        "Done. Document created: https://docs.google.com/document/d/Infosys\nTotal time: 1.50 seconds"
    );
    assert!(state.jobs.is_empty());
}

#[tokio::test]
async fn test_failed_job_reports_error_and_releases_key() {
    let state = state_with(Arc::new(FailingRunner), Config::default());
    let app = router(state.clone());

    let (status, body) = send(&app, form_request(&[("stockName", "Wipro")])).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Failed to complete the process: No screenshots captured");
    assert!(state.jobs.is_empty());

    // 同一个股票可以马上重新提交
    let (status, _) = send(&app, form_request(&[("stockName", "wipro")])).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_timed_out_job_keeps_running_until_done() {
    let runner = Arc::new(BlockingRunner::default());
    let config = Config {
        job_timeout_secs: 0,
        ..Config::default()
    };
    let state = state_with(runner.clone(), config);
    let app = router(state.clone());

    let (status, _) = send(&app, form_request(&[("stockName", "HDFC Bank")])).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

    let key = JobKey::normalize("hdfc bank").unwrap();
    assert!(state.jobs.contains(&key));

    runner.release.notify_one();
    for _ in 0..100 {
        if state.jobs.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!state.jobs.contains(&key));
}

#[tokio::test]
async fn test_event_stream_starts_with_retry_and_deregisters() {
    let state = state_with(Arc::new(FailingRunner), Config::default());
    let app = router(state.clone());

    let request = Request::get("/events").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );
    assert_eq!(state.hub.listener_count(), 1);

    let mut body = response.into_body();
    let frame = body.frame().await.unwrap().unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.starts_with("retry:"));
    assert!(text.contains("10000"));

    state.hub.line("📸 已截图 1");
    let frame = body.frame().await.unwrap().unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.starts_with("data:"));
    assert!(text.contains("📸 已截图 1"));

    drop(body);
    assert_eq!(state.hub.listener_count(), 0);
}
