//! End-to-end uploads through `HttpTransport` against a local mock server.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chunkup_uploader::{UploadConfig, UploadError, UploadEvent, Uploader};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn write_file(dir: &Path, data: &[u8]) -> PathBuf {
    let path = dir.join("payload.bin");
    std::fs::write(&path, data).unwrap();
    path
}

fn config(server: &MockServer, file: &Path, chunk_bytes: usize) -> UploadConfig {
    let mut config = UploadConfig::new(format!("{}/upload", server.uri()), file);
    config.chunk_size = chunk_bytes as f64 / (1024.0 * 1024.0);
    config.delay_before_retry = 0.01;
    config.retries = 3;
    config
}

fn header<'a>(request: &'a Request, name: &str) -> &'a str {
    request
        .headers
        .get(name)
        .unwrap_or_else(|| panic!("missing header {name}"))
        .to_str()
        .unwrap()
}

fn body(request: &Request) -> String {
    String::from_utf8_lossy(&request.body).into_owned()
}

#[tokio::test]
async fn uploads_chunks_as_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), b"aaaaaaaaaabbbbbbbbbbccccc");
    let mut config = config(&server, &file, 10);
    config.headers.insert("x-api-key".into(), "secret".into());
    config.post_params.insert("title".into(), "holiday".into());

    let mut uploader = Uploader::new(config).unwrap();
    let mut events = uploader.take_events().unwrap();
    let summary = uploader.run().await.unwrap();
    assert_eq!(summary.total_chunks, 3);
    assert_eq!(summary.bytes_sent, 25);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);

    for (i, request) in requests.iter().enumerate() {
        assert_eq!(header(request, "uploader-chunk-number"), i.to_string());
        assert_eq!(header(request, "uploader-chunks-total"), "3");
        assert_eq!(header(request, "uploader-file-id"), summary.file_id);
        assert_eq!(header(request, "x-api-key"), "secret");
        assert!(header(request, "content-type").starts_with("multipart/form-data"));

        let body = body(request);
        assert!(body.contains("name=\"file\""));
        assert!(body.contains("filename=\"blob\""));
        assert!(body.contains("application/octet-stream"));
    }

    assert!(body(&requests[0]).contains("aaaaaaaaaa"));
    assert!(body(&requests[2]).contains("ccccc"));
    assert!(!body(&requests[0]).contains("name=\"title\""));
    assert!(!body(&requests[1]).contains("name=\"title\""));
    assert!(body(&requests[2]).contains("name=\"title\""));
    assert!(body(&requests[2]).contains("holiday"));

    let mut progress = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let UploadEvent::Progress { percent } = event {
            progress.push(percent);
        }
    }
    assert_eq!(progress, vec![33, 67, 100]);
}

#[tokio::test]
async fn retries_service_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), b"0123456789");
    let mut uploader = Uploader::new(config(&server, &file, 10)).unwrap();
    let mut events = uploader.take_events().unwrap();

    let summary = uploader.run().await.unwrap();
    assert_eq!(summary.retries, 2);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    assert!(
        requests
            .iter()
            .all(|r| header(r, "uploader-chunk-number") == "0")
    );

    let mut retries = 0;
    let mut last = None;
    while let Ok(event) = events.try_recv() {
        if matches!(event, UploadEvent::Retry { .. }) {
            retries += 1;
        }
        last = Some(event);
    }
    assert_eq!(retries, 2);
    assert_eq!(last, Some(UploadEvent::Finished));
}

#[tokio::test]
async fn forbidden_stops_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), b"0123456789abcdef");
    let mut uploader = Uploader::new(config(&server, &file, 4)).unwrap();

    let err = uploader.run().await.unwrap_err();
    assert!(matches!(
        err,
        UploadError::Rejected {
            chunk: 0,
            status: 403
        }
    ));
}

#[tokio::test]
async fn slow_responses_time_out_and_exhaust_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), b"0123");
    let mut config = config(&server, &file, 4);
    config.chunk_timeout = 100;
    config.retries = 1;

    let mut uploader = Uploader::new(config).unwrap();
    let err = uploader.run().await.unwrap_err();
    match err {
        UploadError::RetriesExhausted { chunk, retries, last } => {
            assert_eq!(chunk, 0);
            assert_eq!(retries, 1);
            assert!(last.contains("timed out"), "unexpected cause: {last}");
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn unreachable_server_is_retried_then_fails() {
    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), b"0123");
    let mut config = UploadConfig::new("http://127.0.0.1:9/upload", &file);
    config.retries = 2;
    config.delay_before_retry = 0.01;

    let mut uploader = Uploader::new(config).unwrap();
    let mut events = uploader.take_events().unwrap();
    let err = uploader.run().await.unwrap_err();
    assert!(matches!(err, UploadError::RetriesExhausted { chunk: 0, .. }));

    let mut retries = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, UploadEvent::Retry { .. }) {
            retries += 1;
        }
    }
    assert_eq!(retries, 2);
}
