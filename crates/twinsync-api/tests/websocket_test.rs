#![allow(clippy::unwrap_used)]
// Integration tests for `WebSocketTransport` against a local tungstenite server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use url::Url;

use twinsync_api::{
    Notification, Request as WireRequest, Transport, TransportConfig, WebSocketTransport,
    notification_url,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// Bind a listener on an ephemeral port and return it with the HTTP base URL
/// a connector would be configured with.
async fn listener() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base = Url::parse(&format!("http://{addr}")).unwrap();
    (listener, base)
}

fn transport() -> WebSocketTransport {
    WebSocketTransport::new(TransportConfig {
        timeout: Duration::from_secs(5),
        ..TransportConfig::default()
    })
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_frames_round_trip_through_server() {
    let (listener, base) = listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let Some(Ok(Message::Text(text))) = ws.next().await else {
            panic!("expected a text frame");
        };
        let request: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(request, json!({ "type": "subscribe", "thing": "root" }));

        let reply = json!({
            "type": "initial",
            "thing": { "metadata": { "name": "root" }, "reportedState": {} }
        });
        ws.send(Message::Text(reply.to_string().into())).await.unwrap();
        ws.close(None).await.unwrap();
    });

    let token = SecretString::from("abc".to_string());
    let url = notification_url(&base, "app", &token).unwrap();
    let mut session = transport().open(&url).await.unwrap();

    assert!(session.sender().send_text(WireRequest::subscribe("root").encode().unwrap()));

    let text = session.recv().await.unwrap();
    let thing = Notification::decode(&text).unwrap().into_thing().unwrap();
    assert_eq!(thing.name(), "root");

    // Server closed: the session reports end of stream.
    assert!(session.recv().await.is_none());
    server.await.unwrap();
}

#[tokio::test]
async fn test_dropping_session_closes_socket() {
    let (listener, base) = listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        // Read until the client goes away.
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    });

    let token = SecretString::from("abc".to_string());
    let url = notification_url(&base, "app", &token).unwrap();
    let session = transport().open(&url).await.unwrap();
    drop(session);

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_token_travels_in_query_string() {
    let (listener, base) = listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut seen = None;
        let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            seen = Some(req.uri().to_string());
            Ok(resp)
        };
        let _ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();
        seen.unwrap()
    });

    let token = SecretString::from("t0k3n".to_string());
    let url = notification_url(&base, "my-app", &token).unwrap();
    let _session = transport().open(&url).await.unwrap();

    let uri = server.await.unwrap();
    assert_eq!(uri, "/api/v1alpha1/things/my-app/notifications?token=t0k3n");
}
