//! HTTP classifier against a one-shot local server.

use kiosk_intent::{HttpIntentClassifier, IntentClassifier, IntentError, IntentRouter, MenuIntent};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Answer one request with `status` and `body`; the handle yields the raw request.
/// `None` keeps the connection open without answering.
async fn serve_once(response: Option<(&'static str, &'static str)>) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/classify", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw).to_string();
            if let Some(split) = text.find("\r\n\r\n") {
                let length = text[..split]
                    .lines()
                    .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(0);
                if raw.len() >= split + 4 + length {
                    break;
                }
            }
        }
        let request = String::from_utf8_lossy(&raw).to_string();
        match response {
            Some((status, body)) => {
                let reply = format!(
                    "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
            }
            None => tokio::time::sleep(Duration::from_secs(5)).await,
        }
        request
    });
    (url, handle)
}

#[tokio::test]
async fn posts_text_and_parses_answer() {
    let (url, server) =
        serve_once(Some(("200 OK", r#"{"intent":"attendance","confidence":0.92}"#))).await;
    let classifier =
        HttpIntentClassifier::new(url, Some("secret".into()), Duration::from_secs(2)).unwrap();

    let result = classifier.classify("yoklama").await.unwrap();
    assert_eq!(result.menu_intent(), Some(MenuIntent::Attendance));
    assert_eq!(result.confidence, Some(0.92));

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /classify"));
    assert!(request.to_ascii_lowercase().contains("authorization: bearer secret"));
    assert!(request.contains(r#""text":"yoklama""#));
}

#[tokio::test]
async fn request_carries_the_configured_language() {
    let (url, server) = serve_once(Some(("200 OK", r#"{"intent":"registration"}"#))).await;
    let classifier = HttpIntentClassifier::new(url, None, Duration::from_secs(2))
        .unwrap()
        .with_language("en-GB");

    classifier.classify("registration please").await.unwrap();
    let request = server.await.unwrap();
    assert!(request.contains(r#""language":"en""#));
}

#[tokio::test]
async fn server_error_is_reported_and_router_falls_back() {
    let (url, _server) = serve_once(Some(("500 Internal Server Error", "{}"))).await;
    let classifier = HttpIntentClassifier::new(url, None, Duration::from_secs(2)).unwrap();
    let router = IntentRouter::with_remote(Arc::new(classifier), 0.4);

    let result = router.route("kayıt olmak istiyorum").await;
    assert_eq!(result.menu_intent(), Some(MenuIntent::Registration));
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let (url, _server) = serve_once(Some(("200 OK", "merhaba"))).await;
    let classifier = HttpIntentClassifier::new(url, None, Duration::from_secs(2)).unwrap();
    assert!(matches!(
        classifier.classify("dokuz").await,
        Err(IntentError::Malformed(_))
    ));
}

#[tokio::test]
async fn slow_service_times_out() {
    let (url, _server) = serve_once(None).await;
    let classifier = HttpIntentClassifier::new(url, None, Duration::from_millis(200)).unwrap();
    assert!(matches!(classifier.classify("dokuz").await, Err(IntentError::Timeout)));
}
