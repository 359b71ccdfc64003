use super::*;
use crate::config::{NavConfig, ServerConfig};
use crate::frame::OutboundFrame;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::Query;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::timeout;

async fn echo_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let target = params.get("target").cloned().unwrap_or_default();
    let source = params.get("source").cloned();
    ws.on_upgrade(move |socket| echo_socket(socket, target, source))
}

async fn echo_socket(mut socket: WebSocket, target: String, source: Option<String>) {
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            WsMessage::Text(text) if text == "bye" => {
                let _ = socket.send(WsMessage::Close(None)).await;
                return;
            }
            WsMessage::Text(text) => {
                let reply = serde_json::json!({
                    "translated_text": format!("{} bytes", text.len()),
                    "language": target,
                    "source": source,
                })
                .to_string();
                if socket.send(WsMessage::Text(reply)).await.is_err() {
                    return;
                }
            }
            WsMessage::Close(_) => return,
            _ => {}
        }
    }
}

async fn spawn_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/ws/video", get(echo_handler));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn server_config(addr: SocketAddr) -> ServerConfig {
    ServerConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        connect_timeout_ms: 2000,
        ..NavConfig::default().server
    }
}

async fn next_event(events: &mut mpsc::Receiver<TransportEvent>) -> TransportEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("event channel closed")
}

#[test]
fn test_endpoint_url_query() {
    let transport = WebSocketTransport::new(&NavConfig::default().server, 2);

    let url = transport
        .endpoint_url(&EndpointParams::new("hi"))
        .unwrap();
    assert_eq!(url.as_str(), "ws://127.0.0.1:8000/ws/video?target=hi");

    let url = transport
        .endpoint_url(&EndpointParams::new("fr").with_source("en"))
        .unwrap();
    assert_eq!(url.as_str(), "ws://127.0.0.1:8000/ws/video?target=fr&source=en");
}

#[tokio::test]
async fn test_websocket_round_trip_with_language_params() {
    let addr = spawn_server().await;
    let transport = WebSocketTransport::new(&server_config(addr), 2);
    let (events_tx, mut events_rx) = mpsc::channel(8);

    let handle = transport
        .open(&EndpointParams::new("hi").with_source("en"), events_tx)
        .await
        .unwrap();
    assert!(handle.is_open());

    handle.send(OutboundFrame::Text("abcd".to_string())).unwrap();

    let TransportEvent::Message(raw) = next_event(&mut events_rx).await else {
        panic!("expected an inbound message");
    };
    let reply: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(reply["translated_text"], "4 bytes");
    assert_eq!(reply["language"], "hi");
    assert_eq!(reply["source"], "en");

    handle.close();
    handle.close();
    assert!(!handle.is_open());
    assert_eq!(
        handle.send(OutboundFrame::Text("late".to_string())),
        Err(TransportError::NotOpen)
    );
}

#[tokio::test]
async fn test_server_close_is_reported() {
    let addr = spawn_server().await;
    let transport = WebSocketTransport::new(&server_config(addr), 2);
    let (events_tx, mut events_rx) = mpsc::channel(8);

    let handle = transport
        .open(&EndpointParams::new("en"), events_tx)
        .await
        .unwrap();
    handle.send(OutboundFrame::Text("bye".to_string())).unwrap();

    assert!(matches!(
        next_event(&mut events_rx).await,
        TransportEvent::Closed { .. }
    ));
    assert!(!handle.is_open());
}

#[tokio::test]
async fn test_connect_refused() {
    // Bind then drop to get a port with nothing listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = WebSocketTransport::new(&server_config(addr), 2);
    let (events_tx, _events_rx) = mpsc::channel(8);
    let result = transport.open(&EndpointParams::new("en"), events_tx).await;

    assert!(matches!(result, Err(TransportError::Connect { .. })));
}

#[tokio::test]
async fn test_handshake_timeout() {
    // Accepts TCP but never answers the upgrade
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let config = ServerConfig {
        connect_timeout_ms: 200,
        ..server_config(addr)
    };
    let transport = WebSocketTransport::new(&config, 2);
    let (events_tx, _events_rx) = mpsc::channel(8);
    let result = transport.open(&EndpointParams::new("en"), events_tx).await;

    assert_eq!(result.unwrap_err(), TransportError::Timeout { timeout_ms: 200 });
    drop(listener);
}

#[tokio::test]
async fn test_handle_backpressure_drops_frames() {
    let (outbound_tx, _outbound_rx) = mpsc::channel(1);
    let (handle, cancel) = TransportHandle::new(outbound_tx);

    handle.send(OutboundFrame::Text("one".to_string())).unwrap();
    assert_eq!(
        handle.send(OutboundFrame::Text("two".to_string())),
        Err(TransportError::Backpressure)
    );

    handle.close();
    assert!(cancel.is_cancelled());
}

#[tokio::test]
async fn test_handle_closed_writer_marks_not_open() {
    let (outbound_tx, outbound_rx) = mpsc::channel(1);
    let (handle, _cancel) = TransportHandle::new(outbound_tx);
    drop(outbound_rx);

    assert_eq!(
        handle.send(OutboundFrame::Binary(vec![1])),
        Err(TransportError::NotOpen)
    );
    assert!(!handle.is_open());
}

#[tokio::test]
async fn test_mock_records_frames_and_replies() {
    let transport = MockTransport::new().with_responder(|frame| {
        Some(format!(r#"{{"translated_text":"{} bytes"}}"#, frame.len()).into_bytes())
    });
    let (events_tx, mut events_rx) = mpsc::channel(8);

    let handle = transport
        .open(&EndpointParams::new("hi"), events_tx)
        .await
        .unwrap();
    handle.send(OutboundFrame::Text("abc".to_string())).unwrap();

    assert_eq!(
        next_event(&mut events_rx).await,
        TransportEvent::Message(br#"{"translated_text":"3 bytes"}"#.to_vec())
    );

    let connection = transport.connection(0).unwrap();
    assert_eq!(connection.params().target_language, "hi");
    assert_eq!(
        connection.sent_frames(),
        vec![OutboundFrame::Text("abc".to_string())]
    );
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test]
async fn test_mock_without_recording_keeps_counters_only() {
    let transport = MockTransport::new()
        .without_recording()
        .with_responder(|_| Some(br#"{"translated_text":"ok"}"#.to_vec()));

    for round in 0..3 {
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let handle = transport
            .open(&EndpointParams::new("en"), events_tx)
            .await
            .unwrap();
        for _ in 0..5 {
            handle.send(OutboundFrame::Text("abc".to_string())).unwrap();
            next_event(&mut events_rx).await;
        }
        handle.close();
        assert_eq!(transport.frames_received(), (round + 1) * 5);
    }

    assert_eq!(transport.attempts(), 3);
    assert!(transport.connections().is_empty());
    assert!(transport.last_connection().is_none());
}

#[tokio::test]
async fn test_mock_manual_open_and_drop() {
    let transport = std::sync::Arc::new(MockTransport::manual());
    let (events_tx, mut events_rx) = mpsc::channel(8);

    let opener = {
        let transport = std::sync::Arc::clone(&transport);
        tokio::spawn(async move { transport.open(&EndpointParams::new("en"), events_tx).await })
    };

    transport.wait_for_attempts(1).await;
    let connection = transport.connection(0).unwrap();
    assert!(!connection.is_open());
    assert!(connection.release());
    assert!(!connection.release());

    let handle = opener.await.unwrap().unwrap();
    assert!(connection.is_open());

    assert!(connection.drop_connection("server restart").await);
    assert!(!handle.is_open());
    assert_eq!(
        next_event(&mut events_rx).await,
        TransportEvent::Closed {
            reason: "server restart".to_string()
        }
    );
}

#[tokio::test]
async fn test_mock_scripted_failure() {
    let transport = MockTransport::new();
    transport.fail_next_open(TransportError::connect("mock", "refused"));
    let (events_tx, _events_rx) = mpsc::channel(8);

    assert!(transport
        .open(&EndpointParams::new("en"), events_tx.clone())
        .await
        .is_err());
    assert!(transport
        .open(&EndpointParams::new("en"), events_tx)
        .await
        .is_ok());
    assert_eq!(transport.attempts(), 2);
}
