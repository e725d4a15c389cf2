mod support;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use event_bus::{EventBus, EventType};
use futures_util::{SinkExt, StreamExt};
use playground_road::platform::Platform;
use playground_road::routes::router;
use playground_road::state::AppState;
use playground_store::PlaygroundStore;
use support::{instance, session, FlakyStore};
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

struct App {
    store: Arc<FlakyStore>,
    events: EventBus,
    router: Router,
}

fn app() -> App {
    let store = FlakyStore::new();
    let events = EventBus::local();
    let platform = Platform::new(store.clone(), events.clone());
    App {
        store,
        events,
        router: router(AppState::with_event_stream(platform)),
    }
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn seed_session(store: &FlakyStore, id: &str, instances: &[&str]) {
    store
        .session_put(session(id, Utc::now(), chrono::Duration::hours(1)))
        .await
        .unwrap();
    for name in instances {
        store.instance_put(instance(name, id)).await.unwrap();
    }
}

#[test_timeout::tokio_timeout_test(10)]
async fn terminal_returns_the_single_instance() {
    let app = app();
    seed_session(&app.store, "s1", &["node1"]).await;

    let (status, body) = get(&app.router, "/sessions/s1/terminal").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["name"], "node1");
    assert_eq!(json["session_id"], "s1");
}

#[test_timeout::tokio_timeout_test(10)]
async fn unknown_session_is_an_empty_404() {
    let app = app();

    let (status, body) = get(&app.router, "/sessions/missing/terminal").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());
}

#[test_timeout::tokio_timeout_test(10)]
async fn session_without_instance_is_a_described_404() {
    let app = app();
    seed_session(&app.store, "s1", &[]).await;

    let (status, body) = get(&app.router, "/sessions/s1/terminal").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "no_instance");
    assert!(json["message"].as_str().unwrap().contains("s1"));
}

#[test_timeout::tokio_timeout_test(10)]
async fn session_with_several_instances_is_ambiguous() {
    let app = app();
    seed_session(&app.store, "s1", &["node1", "node2"]).await;

    let (status, body) = get(&app.router, "/sessions/s1/terminal").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "ambiguous_instance");
}

#[test_timeout::tokio_timeout_test(10)]
async fn storage_failure_is_a_500() {
    let app = app();
    seed_session(&app.store, "s1", &["node1"]).await;
    app.store.break_backend();

    let (status, body) = get(&app.router, "/sessions/s1/terminal").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "store_error");
}

#[test_timeout::tokio_timeout_test(10)]
async fn websocket_route_requires_an_upgrade() {
    let app = app();
    seed_session(&app.store, "s1", &["node1"]).await;

    let (status, _) = get(&app.router, "/sessions/s1/terminal/ws").await;

    assert_eq!(status, StatusCode::UPGRADE_REQUIRED);
}

#[test_timeout::tokio_timeout_test(10)]
async fn websocket_route_resolves_before_upgrading() {
    let app = app();
    seed_session(&app.store, "s1", &["node1", "node2"]).await;

    let (missing, _) = get(&app.router, "/sessions/nope/terminal/ws").await;
    let (ambiguous, _) = get(&app.router, "/sessions/s1/terminal/ws").await;

    assert_eq!(missing, StatusCode::NOT_FOUND);
    assert_eq!(ambiguous, StatusCode::NOT_FOUND);
}

#[test_timeout::tokio_timeout_test(10)]
async fn health_and_metrics_are_served() {
    let app = app();

    let (status, body) = get(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");

    let (status, _) = get(&app.router, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
}

#[test_timeout::tokio_timeout_test(20)]
async fn websocket_streams_session_events_and_forwards_input() {
    let app = app();
    seed_session(&app.store, "s1", &["node1"]).await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let service = app.router.clone().into_make_service();
    let server = tokio::spawn(async move { axum::serve(listener, service).await });

    let url = format!("ws://{addr}/sessions/s1/terminal/ws");
    let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    // The server subscribes after the handshake, so keep publishing until a
    // frame shows up.
    let events = app.events.clone();
    let ticker = tokio::spawn(async move {
        loop {
            events.emit(EventType::SessionTimer, "other", vec!["00:01".into()]);
            events.emit(EventType::SessionTimer, "s1", vec!["00:42".into()]);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    });
    let frame = loop {
        match socket.next().await.unwrap().unwrap() {
            Message::Text(text) => break text,
            _ => continue,
        }
    };
    ticker.abort();
    let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(json["type"], "session timer");
    assert_eq!(json["id"], "s1");
    assert_eq!(json["args"][0], "00:42");

    let mut input = app.events.subscribe(EventType::InstanceTerminalIn);
    socket.send(Message::Text("ls -la\n".into())).await.unwrap();
    let event = input.recv().await.unwrap();
    assert_eq!(event.id, "s1");
    assert_eq!(event.args, ["node1", "ls -la\n"]);

    let _ = socket.close(None).await;
    server.abort();
}
