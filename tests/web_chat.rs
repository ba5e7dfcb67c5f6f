//! WebSocket gateway tests.

mod common;

use std::sync::Arc;

use axum_test::{TestServer, TestWebSocket};
use common::{ann, bob, create_token, TEST_JWT_SECRET};
use gamblr_chat::chat::ANONYMOUS_PROMPT;
use gamblr_chat::config::ChatConfig;
use gamblr_chat::store::MemoryStore;
use gamblr_chat::web::{create_router, ChatWsState};
use serde_json::{json, Value};

/// Create a test server over a fresh in-memory store.
fn create_test_server() -> (TestServer, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(ChatWsState::new(
        Arc::clone(&store),
        TEST_JWT_SECRET,
        ChatConfig::default(),
    ));
    let router = create_router(state, &[]);

    let server = TestServer::builder()
        .http_transport()
        .build(router)
        .expect("Failed to create test server");

    (server, store)
}

/// Connect, optionally with a token, and read the greeting.
async fn connect(server: &TestServer, token: Option<&str>) -> (TestWebSocket, Value) {
    let mut request = server.get_websocket("/api/chat/ws");
    if let Some(token) = token {
        request = request.add_query_param("token", token);
    }
    let mut ws = request.await.into_websocket().await;
    let greeting = ws.receive_json::<Value>().await;
    (ws, greeting)
}

/// Send a client message and read `count` replies.
async fn exchange(ws: &mut TestWebSocket, message: Value, count: usize) -> Vec<Value> {
    ws.send_json(&message).await;
    let mut replies = Vec::with_capacity(count);
    for _ in 0..count {
        replies.push(ws.receive_json::<Value>().await);
    }
    replies
}

#[tokio::test]
async fn test_health_check() {
    let (server, _store) = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("OK");
}

#[tokio::test]
async fn test_invalid_token_is_refused() {
    let (server, _store) = create_test_server();
    let response = server
        .get_websocket("/api/chat/ws")
        .add_query_param("token", "not-a-token")
        .expect_failure()
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_visitor_sees_prompt_and_cannot_send() {
    let (server, store) = create_test_server();
    let (mut ws, greeting) = connect(&server, None).await;

    assert_eq!(greeting["type"], "session");
    assert_eq!(greeting["state"], "signed_out");
    assert_eq!(greeting["can_send"], false);
    assert!(greeting.get("user").is_none());

    let replies = exchange(&mut ws, json!({"type": "open"}), 2).await;
    assert_eq!(replies[0]["status"], "login_prompt");
    assert_eq!(replies[1]["type"], "feed");
    assert_eq!(replies[1]["messages"][0]["text"], ANONYMOUS_PROMPT);
    assert_eq!(replies[1]["messages"][0]["presentation"]["avatar"]["kind"], "bot");

    exchange(&mut ws, json!({"type": "input", "text": "hi"}), 1).await;
    let replies = exchange(&mut ws, json!({"type": "send"}), 2).await;
    assert_eq!(replies[0]["type"], "input");
    assert_eq!(replies[1]["type"], "notice");
    assert_eq!(replies[1]["code"], "not_authenticated");
    assert_eq!(replies[1]["title"], "Login Required");

    assert_eq!(store.append_calls(), 0);
    assert_eq!(store.subscribe_calls(), 0);
}

#[tokio::test]
async fn test_signed_in_send_and_slow_mode() {
    let (server, store) = create_test_server();
    let token = create_token(&ann());
    let (mut ws, greeting) = connect(&server, Some(&token)).await;

    assert_eq!(greeting["state"], "signed_in");
    assert_eq!(greeting["status"], "closed");
    assert_eq!(greeting["user"]["id"], "u1");
    assert_eq!(greeting["can_send"], true);

    let replies = exchange(&mut ws, json!({"type": "open"}), 2).await;
    assert_eq!(replies[0]["status"], "live");
    assert_eq!(replies[1]["messages"], json!([]));

    let replies = exchange(
        &mut ws,
        json!({"type": "input", "text": "<b>gm</b> degens 🚀"}),
        1,
    )
    .await;
    assert_eq!(replies[0]["text"], "gm degens ");
    assert_eq!(replies[0]["remaining"], 150);

    // The input reply comes first, then the delivered message.
    let replies = exchange(&mut ws, json!({"type": "send"}), 2).await;
    assert_eq!(replies[0]["text"], "");
    assert_eq!(replies[1]["type"], "feed");
    let entry = &replies[1]["messages"][0];
    assert_eq!(entry["text"], "gm degens");
    assert_eq!(entry["sender_id"], "u1");
    assert_eq!(entry["presentation"]["alignment"], "right");
    assert_eq!(entry["presentation"]["style"], "own");
    assert_eq!(entry["presentation"]["name"], "Ann");

    exchange(&mut ws, json!({"type": "input", "text": "again"}), 1).await;
    let replies = exchange(&mut ws, json!({"type": "send"}), 2).await;
    assert_eq!(replies[1]["type"], "notice");
    assert_eq!(replies[1]["code"], "rate_limited");
    assert_eq!(replies[1]["title"], "Slow Mode Active");

    let notice_id = replies[1]["id"].as_u64().unwrap();
    let replies = exchange(&mut ws, json!({"type": "dismiss_notice", "id": notice_id}), 0).await;
    assert!(replies.is_empty());

    assert_eq!(store.append_calls(), 1);
}

#[tokio::test]
async fn test_authenticate_after_connect() {
    let (server, store) = create_test_server();
    let (mut ws, _greeting) = connect(&server, None).await;
    exchange(&mut ws, json!({"type": "open"}), 2).await;

    let token = create_token(&bob());
    let replies = exchange(&mut ws, json!({"type": "authenticate", "token": token}), 3).await;
    assert_eq!(replies[0]["type"], "session");
    assert_eq!(replies[0]["state"], "signed_in");
    assert_eq!(replies[0]["status"], "live");
    assert_eq!(replies[0]["user"]["display_name"], "Bob");
    assert_eq!(replies[1]["type"], "feed");
    assert_eq!(replies[2]["type"], "input");
    assert_eq!(store.subscribe_calls(), 1);

    let replies = exchange(&mut ws, json!({"type": "sign_out"}), 3).await;
    assert_eq!(replies[0]["state"], "signed_out");
    assert_eq!(replies[0]["status"], "login_prompt");
    assert_eq!(replies[1]["messages"][0]["text"], ANONYMOUS_PROMPT);
}

#[tokio::test]
async fn test_authenticate_with_bad_token() {
    let (server, _store) = create_test_server();
    let (mut ws, _greeting) = connect(&server, None).await;

    let replies = exchange(&mut ws, json!({"type": "authenticate", "token": "garbage"}), 1).await;
    assert_eq!(replies[0]["type"], "error");
    assert_eq!(replies[0]["code"], "invalid_token");
}

#[tokio::test]
async fn test_messages_reach_other_connections() {
    let (server, _store) = create_test_server();
    let ann_token = create_token(&ann());
    let bob_token = create_token(&bob());
    let (mut ann_ws, _) = connect(&server, Some(&ann_token)).await;
    let (mut bob_ws, _) = connect(&server, Some(&bob_token)).await;

    exchange(&mut ann_ws, json!({"type": "open"}), 2).await;
    exchange(&mut bob_ws, json!({"type": "open"}), 2).await;

    exchange(&mut ann_ws, json!({"type": "input", "text": "gm bob"}), 1).await;
    exchange(&mut ann_ws, json!({"type": "send"}), 2).await;

    let feed = bob_ws.receive_json::<Value>().await;
    assert_eq!(feed["type"], "feed");
    let entry = &feed["messages"][0];
    assert_eq!(entry["text"], "gm bob");
    assert_eq!(entry["presentation"]["alignment"], "left");
    assert_eq!(entry["presentation"]["style"], "other");
    assert_eq!(
        entry["presentation"]["avatar"],
        json!({"kind": "url", "value": "https://cdn.example.com/ann.png"})
    );
}

#[tokio::test]
async fn test_protocol_messages() {
    let (server, _store) = create_test_server();
    let (mut ws, _greeting) = connect(&server, None).await;

    let replies = exchange(&mut ws, json!({"type": "ping"}), 1).await;
    assert_eq!(replies[0]["type"], "pong");

    let replies = exchange(&mut ws, json!({"type": "rules"}), 1).await;
    assert_eq!(replies[0]["rules"].as_array().unwrap().len(), 5);

    let replies = exchange(&mut ws, json!({"type": "delete", "id": 1}), 1).await;
    assert_eq!(replies[0]["type"], "error");
    assert_eq!(replies[0]["code"], "invalid_message");
}

#[tokio::test]
async fn test_flooding_connection_is_told_to_slow_down() {
    let (server, _store) = create_test_server();
    let (mut ws, _greeting) = connect(&server, None).await;

    for _ in 0..40 {
        ws.send_json(&json!({"type": "ping"})).await;
    }
    let mut refused = 0;
    for _ in 0..40 {
        let reply = ws.receive_json::<Value>().await;
        if reply["type"] == "error" {
            assert_eq!(reply["code"], "too_many_messages");
            refused += 1;
        } else {
            assert_eq!(reply["type"], "pong");
        }
    }
    assert!(refused > 0);
}
