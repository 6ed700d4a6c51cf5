//! Polling and upload flow against a mocked API.

use std::io::Write;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use vsa_client::{ClientConfig, ClientError, PollConfig, PollingClient};
use vsa_models::{FileId, JobStatus};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "sk_test";

fn client(server: &MockServer, max_attempts: u32) -> PollingClient {
    let config = ClientConfig {
        poll: PollConfig {
            interval: Duration::from_millis(10),
            max_attempts,
        },
        request_timeout: None,
        ..ClientConfig::new(server.uri(), KEY)
    };
    PollingClient::new(config).unwrap()
}

fn processing() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": "processing",
        "message": "Analysis in progress"
    }))
}

fn completed() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": "completed",
        "analysis": {
            "analysis": {
                "utterances": [{
                    "start_time": 0.0,
                    "end_time": 2.5,
                    "text": "great product",
                    "emotions": {"joy": 0.9, "neutral": 0.1},
                    "sentiments": {"positive": 0.95, "negative": 0.05}
                }]
            }
        }
    }))
}

#[tokio::test]
async fn test_polls_until_completed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/analysis-status"))
        .and(query_param("fileId", "f-1"))
        .and(header("authorization", "Bearer sk_test"))
        .respond_with(processing())
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/analysis-status"))
        .respond_with(completed())
        .expect(1)
        .mount(&server)
        .await;

    let status = client(&server, 60)
        .poll_until_terminal(&FileId::from("f-1"))
        .await
        .unwrap();

    assert_eq!(status.status, JobStatus::Completed);
    let analysis = status.analysis.unwrap();
    assert_eq!(analysis.utterances()[0].text, "great product");
}

#[tokio::test]
async fn test_failed_status_is_terminal_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/analysis-status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "failed",
            "message": "Analysis completed but no utterances found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let status = client(&server, 60)
        .poll_until_terminal(&FileId::from("f-1"))
        .await
        .unwrap();

    assert_eq!(status.status, JobStatus::Failed);
    assert!(status.analysis.is_none());
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/analysis-status"))
        .respond_with(processing())
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server, 3)
        .poll_until_terminal(&FileId::from("f-1"))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(matches!(err, ClientError::Timeout { attempts: 3 }));
}

#[tokio::test]
async fn test_cancellation_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/analysis-status"))
        .respond_with(processing())
        .expect(0)
        .mount(&server)
        .await;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    cancel_tx.send(true).unwrap();

    let err = client(&server, 60)
        .poll_with_cancel(&FileId::from("f-1"), cancel_rx)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Cancelled));
}

#[tokio::test]
async fn test_api_error_surfaces_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/analysis-status"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({"error": "Not authorized to access this file"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, 60)
        .poll_until_terminal(&FileId::from("f-1"))
        .await
        .unwrap_err();

    match err {
        ClientError::Api { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "Not authorized to access this file");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_upload_and_analyze_runs_full_flow() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload-url"))
        .and(header("authorization", "Bearer sk_test"))
        .and(body_json(json!({"fileName": "interview.mp4", "fileType": "video/mp4"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uploadUrl": format!("{}/bucket/inference/f-9.mp4", server.uri()),
            "key": "inference/f-9.mp4",
            "fileId": "f-9"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/bucket/inference/f-9.mp4"))
        .and(header("content-type", "video/mp4"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/start-analysis"))
        .and(body_json(json!({"fileId": "f-9"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "fileId": "f-9",
            "status": "processing",
            "message": "Analysis started"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/analysis-status"))
        .and(query_param("fileId", "f-9"))
        .respond_with(completed())
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("interview.mp4");
    let mut file = std::fs::File::create(&video).unwrap();
    file.write_all(&[0u8; 4096]).unwrap();

    let status = client(&server, 60).upload_and_analyze(&video).await.unwrap();
    assert_eq!(status.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_local_checks_run_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();

    let tiny = dir.path().join("clip.mp4");
    std::fs::write(&tiny, [0u8; 10]).unwrap();
    let err = client(&server, 60).upload_and_analyze(&tiny).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    let metadata = dir.path().join("._clip.mp4");
    std::fs::write(&metadata, [0u8; 4096]).unwrap();
    let err = client(&server, 60).upload_and_analyze(&metadata).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    let text = dir.path().join("notes.txt");
    std::fs::write(&text, [0u8; 4096]).unwrap();
    let err = client(&server, 60).upload_and_analyze(&text).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
}
