//! End-to-end tests of the HTTP surface against the in-memory store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use vsa_api::{create_router, ApiConfig, AppState};
use vsa_db::{MemoryStore, QuotaLedger, QuotaStore, VideoStore};
use vsa_models::{ApiQuota, FileId, JobState, NewUtterance, ScoreDistribution, VideoFile};
use vsa_queue::{JobQueue, JobReceiver, QueueConfig};
use vsa_storage::MockObjectStore;

const OWNER_KEY: &str = "sk_owner";
const OTHER_KEY: &str = "sk_other";
const EXHAUSTED_KEY: &str = "sk_exhausted";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    _receiver: JobReceiver,
}

fn quotas() -> Vec<ApiQuota> {
    let mut exhausted = ApiQuota::new("exhausted", EXHAUSTED_KEY, 5);
    exhausted.request_used = 6;
    vec![
        ApiQuota::new("owner", OWNER_KEY, 100),
        ApiQuota::new("other", OTHER_KEY, 100),
        exhausted,
    ]
}

fn storage_with_uri() -> MockObjectStore {
    let mut storage = MockObjectStore::new();
    storage
        .expect_object_uri()
        .returning(|key| format!("s3://bucket/{key}"));
    storage
}

fn test_app_with(storage: MockObjectStore, config: ApiConfig, capacity: usize) -> TestApp {
    let store = Arc::new(MemoryStore::with_quotas(quotas()));
    let (queue, receiver) = JobQueue::new(QueueConfig { capacity });
    let state = AppState::new(
        config,
        Arc::new(storage),
        store.clone(),
        QuotaLedger::new(store.clone()),
        queue,
    );
    TestApp {
        router: create_router(state, None),
        store,
        _receiver: receiver,
    }
}

fn test_app(storage: MockObjectStore) -> TestApp {
    test_app_with(storage, ApiConfig::default(), 8)
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn owned_file(&self, owner: &str) -> FileId {
        let file = VideoFile::new(FileId::new(), "inference/clip.mp4", owner);
        self.store.create_video(&file).await.unwrap();
        file.id
    }

    async fn state_of(&self, id: &FileId) -> JobState {
        self.store.get_video(id).await.unwrap().unwrap().state
    }
}

fn post_json(uri: &str, key: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = key {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

const BOUNDARY: &str = "vsa-test-boundary";

/// One-part multipart body with the given field name and file name.
fn multipart_upload(field: &str, file_name: &str, content: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(header::AUTHORIZATION, format!("Bearer {OWNER_KEY}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn storage_rejecting_writes() -> MockObjectStore {
    let mut storage = MockObjectStore::new();
    storage.expect_upload_bytes().never();
    storage.expect_create_multipart_upload().never();
    storage
}

fn get(uri: &str, key: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {key}"))
        .body(Body::empty())
        .unwrap()
}

fn utterance(text: &str) -> NewUtterance {
    NewUtterance {
        start_time: 1.5,
        end_time: 4.0,
        text: text.to_string(),
        emotions: ScoreDistribution::from([("joy", 0.8), ("neutral", 0.2)]),
        sentiments: ScoreDistribution::from([("positive", 0.9), ("negative", 0.1)]),
    }
}

#[tokio::test]
async fn test_health_is_public() {
    let app = test_app(MockObjectStore::new());
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_missing_or_unknown_key_is_unauthorized() {
    let app = test_app(MockObjectStore::new());

    let (status, body) = app
        .send(post_json("/api/upload-url", None, json!({"fileName": "a.mp4", "fileType": "video/mp4"})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = app.send(get("/api/quota", "sk_unknown")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_upload_url_rejects_non_video_before_storage() {
    let mut storage = MockObjectStore::new();
    storage.expect_presign_put().never();
    let app = test_app(storage);

    let (status, body) = app
        .send(post_json(
            "/api/upload-url",
            Some(OWNER_KEY),
            json!({"fileName": "video.exe", "fileType": "application/octet-stream"}),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains(".exe"));
}

#[tokio::test]
async fn test_upload_without_file_field_is_rejected() {
    let app = test_app(storage_rejecting_writes());

    let (status, body) = app
        .send(multipart_upload("video", "clip.mp4", &[0; 2048]))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("'file'"));
}

#[tokio::test]
async fn test_upload_rejects_resource_fork_and_non_video_names() {
    let app = test_app(storage_rejecting_writes());

    for name in ["._clip.mp4", "video.exe"] {
        let (status, body) = app.send(multipart_upload("file", name, &[0; 2048])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{name}");
        assert!(body["error"].is_string(), "{name}");
    }
}

#[tokio::test]
async fn test_upload_below_minimum_size_is_rejected() {
    let app = test_app(storage_rejecting_writes());

    let (status, _) = app.send(multipart_upload("file", "clip.mp4", &[0; 999])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_stores_video_and_registers_file() {
    let mut storage = MockObjectStore::new();
    storage
        .expect_upload_bytes()
        .withf(|key, data, content_type| {
            key.starts_with("inference/") && data.len() == 2048 && content_type == "video/mp4"
        })
        .times(1)
        .returning(|_, _, _| Ok(()));
    let app = test_app(storage);

    let (status, body) = app.send(multipart_upload("file", "clip.mp4", &[7; 2048])).await;

    assert_eq!(status, StatusCode::OK);
    let id = FileId::from(body["fileId"].as_str().unwrap().to_string());
    assert_eq!(app.state_of(&id).await, JobState::Pending);
}

#[tokio::test]
async fn test_upload_url_requires_both_fields() {
    let mut storage = MockObjectStore::new();
    storage.expect_presign_put().never();
    let app = test_app(storage);

    let (status, _) = app
        .send(post_json("/api/upload-url", Some(OWNER_KEY), json!({"fileName": "a.mp4"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(post_json("/api/upload-url", Some(OWNER_KEY), json!({"fileType": "video/mp4"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_url_returns_handle_and_registers_file() {
    let mut storage = MockObjectStore::new();
    storage
        .expect_presign_put()
        .times(1)
        .returning(|key, _, _| Ok(format!("https://bucket.example/{key}?sig=1")));
    let app = test_app(storage);

    let (status, body) = app
        .send(post_json(
            "/api/upload-url",
            Some(OWNER_KEY),
            json!({"fileName": "interview.mp4", "fileType": "video/mp4"}),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    let file_id = FileId::from(body["fileId"].as_str().unwrap());
    assert_eq!(body["key"], format!("inference/{file_id}.mp4"));
    assert!(body["uploadUrl"].as_str().unwrap().starts_with("https://"));
    assert_eq!(app.state_of(&file_id).await, JobState::Pending);
}

#[tokio::test]
async fn test_start_analysis_on_foreign_file_is_forbidden() {
    let app = test_app(storage_with_uri());
    let file_id = app.owned_file("owner").await;

    let (status, body) = app
        .send(post_json(
            "/api/start-analysis",
            Some(OTHER_KEY),
            json!({"fileId": file_id}),
        ))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());
    assert_eq!(app.state_of(&file_id).await, JobState::Pending);
    let quota = app.store.find_quota("other").await.unwrap().unwrap();
    assert_eq!(quota.request_used, 0);
}

#[tokio::test]
async fn test_start_analysis_unknown_file_is_not_found() {
    let app = test_app(storage_with_uri());

    let (status, _) = app
        .send(post_json(
            "/api/start-analysis",
            Some(OWNER_KEY),
            json!({"fileId": "does-not-exist"}),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_start_analysis_accepts_then_conflicts() {
    let app = test_app(storage_with_uri());
    let file_id = app.owned_file("owner").await;
    let request = || {
        post_json(
            "/api/start-analysis",
            Some(OWNER_KEY),
            json!({"fileId": file_id}),
        )
    };

    let (status, body) = app.send(request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fileId"], file_id.as_str());
    assert_eq!(body["status"], "processing");
    assert_eq!(app.state_of(&file_id).await, JobState::Processing);

    let (status, _) = app.send(request()).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_start_analysis_with_exhausted_quota_is_rejected() {
    let app = test_app(storage_with_uri());
    let file_id = app.owned_file("exhausted").await;

    let (status, _) = app
        .send(post_json(
            "/api/start-analysis",
            Some(EXHAUSTED_KEY),
            json!({"fileId": file_id}),
        ))
        .await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(app.state_of(&file_id).await, JobState::Pending);
}

#[tokio::test]
async fn test_full_queue_is_service_unavailable() {
    let app = test_app_with(storage_with_uri(), ApiConfig::default(), 1);
    let first = app.owned_file("owner").await;
    let second = app.owned_file("owner").await;

    let (status, _) = app
        .send(post_json("/api/start-analysis", Some(OWNER_KEY), json!({"fileId": first})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(post_json("/api/start-analysis", Some(OWNER_KEY), json!({"fileId": second})))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(app.state_of(&second).await, JobState::Pending);
}

#[tokio::test]
async fn test_status_requires_file_id() {
    let app = test_app(MockObjectStore::new());

    let (status, body) = app.send(get("/api/analysis-status", OWNER_KEY)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "fileId is required");
}

#[tokio::test]
async fn test_status_of_foreign_file_is_forbidden() {
    let app = test_app(MockObjectStore::new());
    let file_id = app.owned_file("owner").await;

    let (status, _) = app
        .send(get(&format!("/api/analysis-status?fileId={file_id}"), OTHER_KEY))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_completed_status_is_stable_across_polls() {
    let app = test_app(MockObjectStore::new());
    let file_id = app.owned_file("owner").await;
    app.store.begin_dispatch(&file_id).await.unwrap();
    app.store
        .complete_job(&file_id, vec![utterance("hello"), utterance("goodbye")])
        .await
        .unwrap();

    let uri = format!("/api/analysis-status?fileId={file_id}");
    let (status, first) = app.send(get(&uri, OWNER_KEY)).await;
    let (_, second) = app.send(get(&uri, OWNER_KEY)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);
    assert_eq!(first["status"], "completed");
    let utterances = first["analysis"]["analysis"]["utterances"].as_array().unwrap();
    assert_eq!(utterances.len(), 2);
    assert_eq!(utterances[0]["text"], "hello");
    assert_eq!(utterances[1]["text"], "goodbye");
    assert_eq!(utterances[0]["start_time"], 1.5);
    assert_eq!(utterances[0]["sentiments"]["positive"], 0.9);
    assert_eq!(app.state_of(&file_id).await, JobState::Completed);
}

#[tokio::test]
async fn test_zero_utterances_reports_failed() {
    let app = test_app(MockObjectStore::new());
    let file_id = app.owned_file("owner").await;
    app.store.begin_dispatch(&file_id).await.unwrap();
    app.store.complete_job(&file_id, Vec::new()).await.unwrap();

    let (status, body) = app
        .send(get(&format!("/api/analysis-status?fileId={file_id}"), OWNER_KEY))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");
    assert!(body.get("analysis").is_none());
}

#[tokio::test]
async fn test_quota_reports_remaining_budget() {
    let app = test_app(MockObjectStore::new());

    let (status, body) = app.send(get("/api/quota", EXHAUSTED_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["maxRequests"], 5);
    assert_eq!(body["requestUsed"], 6);
    assert_eq!(body["remaining"], 0);
    assert!(body["windowResetsAt"].is_string());
}

#[tokio::test]
async fn test_per_ip_rate_limit_applies_to_api_routes() {
    let config = ApiConfig {
        rate_limit_rps: 1,
        rate_limit_burst: 1,
        ..ApiConfig::default()
    };
    let app = test_app_with(MockObjectStore::new(), config, 8);
    let request = || {
        Request::builder()
            .uri("/api/quota")
            .header(header::AUTHORIZATION, format!("Bearer {OWNER_KEY}"))
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = app.send(request()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send(request()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_responses_carry_security_headers_and_request_id() {
    let app = test_app(MockObjectStore::new());
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-request-id"], "req-123");
}
