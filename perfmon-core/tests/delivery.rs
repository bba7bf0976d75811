//! End-to-end delivery tests against a local HTTP endpoint
//!
//! A one-shot server answers the first request with a fixed status and hands
//! the raw request back to the test.

use chrono::{TimeZone, Utc};
use perfmon_core::collector::RequestCollector;
use perfmon_core::{CollectorConfig, RequestPayload};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Raw HTTP request as seen by the endpoint
struct CapturedRequest {
    head: String,
    body: String,
}

/// Serve exactly one request, answering with `status`
async fn one_shot_endpoint(status: u16) -> (String, oneshot::Receiver<CapturedRequest>) {
    one_shot_endpoint_with_headers(status, "").await
}

/// Like `one_shot_endpoint`, with extra response header lines (each ending in CRLF)
async fn one_shot_endpoint_with_headers(
    status: u16,
    extra_headers: &'static str,
) -> (String, oneshot::Receiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut chunk = [0u8; 4096];

        let (head, body_start) = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before headers");
            raw.extend_from_slice(&chunk[..n]);
            if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                break (String::from_utf8_lossy(&raw[..pos]).into_owned(), pos + 4);
            }
        };

        let content_length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        while raw.len() < body_start + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            raw.extend_from_slice(&chunk[..n]);
        }
        let body = String::from_utf8_lossy(&raw[body_start..body_start + content_length]).into_owned();

        let response = format!(
            "HTTP/1.1 {} Status\r\n{}Content-Length: 0\r\nConnection: close\r\n\r\n",
            status, extra_headers
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = tx.send(CapturedRequest { head, body });
    });

    (format!("http://{}/requests", addr), rx)
}

fn config(service_url: &str) -> CollectorConfig {
    CollectorConfig {
        service_url: Some(service_url.to_string()),
        api_key: Some("12345".to_string()),
        // Open the gate on the first event
        flush_interval_secs: 0,
        ..Default::default()
    }
}

fn payload(value: Value) -> RequestPayload {
    match value {
        Value::Object(map) => map,
        _ => panic!("payload must be an object"),
    }
}

#[tokio::test]
async fn test_delivers_form_encoded_batch() {
    let (url, captured) = one_shot_endpoint(200).await;
    let collector = RequestCollector::activate(config(&url)).unwrap().unwrap();

    let start = Utc.with_ymd_and_hms(2015, 4, 29, 12, 0, 0).unwrap();
    let finish = Utc.with_ymd_and_hms(2015, 4, 29, 12, 0, 2).unwrap();
    collector.on_event(
        &payload(json!({
            "controller": "PostsController",
            "action": "index",
            "path": "/posts?page=2",
            "params": {"page": "2"}
        })),
        start,
        finish,
    );
    collector.shutdown().await;

    let request = captured.await.unwrap();
    assert!(request.head.starts_with("POST /requests HTTP/1.1"));
    assert!(request
        .head
        .to_ascii_lowercase()
        .contains("content-type: application/x-www-form-urlencoded"));

    let (api_key, requests) = request.body.split_once('&').unwrap();
    assert_eq!(api_key, "api_key=12345");
    let requests = urlencoding::decode(requests.strip_prefix("requests=").unwrap()).unwrap();
    let events: Vec<Value> = serde_json::from_str(&requests).unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["controller"], "PostsController");
    assert_eq!(events[0]["action"], "index");
    assert_eq!(events[0]["total_runtime"], 2000.0);
    assert_eq!(events[0]["time"], "2015-04-29T12:00:00Z");
    assert!(events[0].get("path").is_none());
    assert!(events[0].get("params").is_none());

    assert_eq!(collector.pending_count(), 0);
    assert_eq!(collector.stats().delivered, 1);
    assert!(!collector.is_in_flight());
}

#[tokio::test]
async fn test_server_error_keeps_batch() {
    let (url, captured) = one_shot_endpoint(503).await;
    let collector = RequestCollector::activate(config(&url)).unwrap().unwrap();

    let now = Utc::now();
    collector.on_event(&payload(json!({"controller": "PostsController"})), now, now);
    collector.shutdown().await;

    assert!(captured.await.is_ok());
    assert_eq!(collector.pending_count(), 1);
    assert_eq!(collector.stats().unknown, 1);
    assert!(!collector.is_in_flight());
}

#[tokio::test]
async fn test_redirect_is_an_unhandled_status() {
    let (url, captured) = one_shot_endpoint_with_headers(302, "Location: /landing\r\n").await;
    let collector = RequestCollector::activate(config(&url)).unwrap().unwrap();

    let now = Utc::now();
    collector.on_event(&payload(json!({"controller": "PostsController"})), now, now);
    collector.shutdown().await;

    let request = captured.await.unwrap();
    assert!(request.head.starts_with("POST /requests HTTP/1.1"));
    assert_eq!(collector.pending_count(), 1);
    assert_eq!(collector.stats().unknown, 1);
    assert_eq!(collector.stats().delivered, 0);
}

#[tokio::test]
async fn test_rejected_batch_is_discarded() {
    let (url, captured) = one_shot_endpoint(401).await;
    let collector = RequestCollector::activate(config(&url)).unwrap().unwrap();

    let now = Utc::now();
    collector.on_event(&payload(json!({"controller": "PostsController"})), now, now);
    collector.shutdown().await;

    assert!(captured.await.is_ok());
    assert_eq!(collector.pending_count(), 0);
    assert_eq!(collector.stats().events_discarded, 1);
}

#[tokio::test]
async fn test_unreachable_endpoint_keeps_batch() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let collector = RequestCollector::activate(config(&format!("http://127.0.0.1:{}/", port)))
        .unwrap()
        .unwrap();

    let now = Utc::now();
    collector.on_event(&payload(json!({"controller": "PostsController"})), now, now);
    collector.shutdown().await;

    assert_eq!(collector.pending_count(), 1);
    assert_eq!(collector.stats().failed, 1);
    assert!(!collector.is_in_flight());
}

#[tokio::test]
async fn test_unparsable_endpoint_keeps_batch() {
    let collector = RequestCollector::activate(config("not a url"))
        .unwrap()
        .unwrap();

    let now = Utc::now();
    collector.on_event(&payload(json!({"controller": "PostsController"})), now, now);
    collector.shutdown().await;

    assert_eq!(collector.pending_count(), 1);
    assert_eq!(collector.stats().failed, 1);
}

#[test]
fn test_events_from_host_threads() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();

    let mut config = config("http://127.0.0.1:9/requests");
    config.flush_interval_secs = 300;
    let collector = runtime
        .block_on(async { RequestCollector::activate(config) })
        .unwrap()
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let collector = collector.clone();
            std::thread::spawn(move || {
                for _ in 0..25 {
                    let now = Utc::now();
                    let p = payload(json!({"controller": format!("Controller{}", i)}));
                    collector.on_event(&p, now, now);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(collector.pending_count(), 100);
    assert_eq!(collector.stats().attempts, 0);
    runtime.block_on(collector.shutdown());
}
