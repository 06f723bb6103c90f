mod support;

use std::fs;
use std::time::Duration;

use harvest_engine::{
    DownloadManager, DownloadProgress, DownloadSettings, FailureKind, FetchSettings, HarvestEvent,
};
use pretty_assertions::assert_eq;
use support::{init_logging, RecordingSink};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn manager() -> DownloadManager {
    DownloadManager::new(DownloadSettings {
        fetch: FetchSettings::default(),
        max_attempts: 2,
        retry_delay: Duration::from_millis(10),
    })
    .unwrap()
}

fn progress(events: Vec<HarvestEvent>) -> Vec<DownloadProgress> {
    events
        .into_iter()
        .filter_map(|event| match event {
            HarvestEvent::Progress(progress) => Some(progress),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn streams_body_to_target_and_reports_progress() {
    init_logging();
    let server = MockServer::start().await;
    let body = vec![7u8; 20_000];
    Mock::given(method("GET"))
        .and(path("/files/111.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let target = temp.path().join("files").join("111_source.jpg");
    let sink = RecordingSink::default();

    let report = manager()
        .fetch(
            "111",
            &format!("{}/files/111.jpg", server.uri()),
            &target,
            &sink,
        )
        .await
        .expect("download ok");

    assert_eq!(report.path, target);
    assert_eq!(report.bytes_written, 20_000);
    assert_eq!(report.expected_size, Some(20_000));
    assert_eq!(report.sha256.len(), 64);
    assert_eq!(fs::read(&target).unwrap(), body);

    let updates = progress(sink.take());
    assert_eq!(updates.first().map(|p| p.bytes), Some(0));
    assert_eq!(updates.last().map(|p| p.bytes), Some(20_000));
    assert!(updates.iter().all(|p| p.total == Some(20_000)));
    assert!(updates.windows(2).all(|pair| pair[0].bytes <= pair[1].bytes));
}

#[tokio::test]
async fn identical_bodies_hash_identically() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"same bytes".to_vec()))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let sink = RecordingSink::default();
    let url = format!("{}/a", server.uri());
    let first = manager()
        .fetch("1", &url, &temp.path().join("1.jpg"), &sink)
        .await
        .unwrap();
    let second = manager()
        .fetch("2", &url, &temp.path().join("2.jpg"), &sink)
        .await
        .unwrap();
    assert_eq!(first.sha256, second.sha256);
}

#[tokio::test]
async fn http_error_leaves_no_file_behind() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let target = temp.path().join("222_source.jpg");
    let sink = RecordingSink::default();

    let err = manager()
        .fetch(
            "222",
            &format!("{}/missing.jpg", server.uri()),
            &target,
            &sink,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::HttpStatus(404));
    assert!(!err.is_transient());
    assert!(!target.exists());
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    assert!(progress(sink.take()).is_empty());
}

#[tokio::test]
async fn http_errors_are_not_retried() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let sink = RecordingSink::default();
    let result = manager()
        .fetch(
            "333",
            &format!("{}/boom.jpg", server.uri()),
            &temp.path().join("333_source.jpg"),
            &sink,
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn invalid_url_is_rejected_before_any_request() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("444_source.jpg");
    let sink = RecordingSink::default();

    let err = manager()
        .fetch("444", "not a url", &target, &sink)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
    assert!(!target.exists());
}

#[tokio::test]
async fn empty_body_produces_empty_file() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let target = temp.path().join("555_source.mp4");
    let sink = RecordingSink::default();
    let report = manager()
        .fetch("555", &format!("{}/empty", server.uri()), &target, &sink)
        .await
        .unwrap();
    assert_eq!(report.bytes_written, 0);
    assert_eq!(fs::metadata(&target).unwrap().len(), 0);
}

#[tokio::test]
async fn replaces_an_existing_target_atomically() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fresh".to_vec()))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let target = temp.path().join("666_source.jpg");
    fs::write(&target, b"stale partial").unwrap();
    let sink = RecordingSink::default();

    manager()
        .fetch("666", &format!("{}/x", server.uri()), &target, &sink)
        .await
        .unwrap();
    assert_eq!(fs::read(&target).unwrap(), b"fresh");
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}
