use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream;
use serde_json::json;

use sidequest_companion::api::mock::{complete_frame, token_frame};
use sidequest_companion::session::{CONNECTION_LOST, SEND_FAILED};
use sidequest_companion::{ChatSession, HttpCompanionApi, StaticTokenAuth};
use sidequest_core::{ChatError, CompanionApi, ConversationId, Role, SendRequest, SendResponse};

const TOKEN: &str = "good-token";

#[derive(Default)]
struct Backend {
    fail_chat: bool,
    stream_status: Option<StatusCode>,
    frames: Vec<String>,
    posted: Mutex<Vec<SendRequest>>,
    streamed: Mutex<Vec<String>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

async fn history(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "bad token").into_response();
    }
    Json(json!({
        "conversations": [
            {
                "id": "c-srv",
                "messages": [
                    {"role": "user", "content": "Hello", "timestamp": "2024-05-01T12:30:00"},
                    {"role": "assistant", "content": "Hi!", "timestamp": "2024-05-01T12:30:02.250"}
                ]
            },
            {"id": "c-old", "messages": []}
        ]
    }))
    .into_response()
}

async fn chat(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(request): Json<SendRequest>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    backend.posted.lock().unwrap().push(request.clone());
    if backend.fail_chat {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    let conversation_id = request
        .conversation_id
        .unwrap_or_else(|| ConversationId::from("srv-new"));
    Json(SendResponse { conversation_id }).into_response()
}

async fn reply_stream(
    State(backend): State<Arc<Backend>>,
    Path(conversation_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if query.get("token").map(String::as_str) != Some(TOKEN) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if let Some(status) = backend.stream_status {
        return status.into_response();
    }
    backend.streamed.lock().unwrap().push(conversation_id);

    let events = backend
        .frames
        .clone()
        .into_iter()
        .map(|frame| Ok::<_, Infallible>(Event::default().data(frame)));
    Sse::new(stream::iter(events)).into_response()
}

async fn spawn_backend(backend: Arc<Backend>) -> String {
    let app = Router::new()
        .route("/api/v1/companion/history", get(history))
        .route("/api/v1/companion/chat", post(chat))
        .route("/api/v1/companion/stream/:conversation_id", get(reply_stream))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/")
}

fn session_for(base_url: &str) -> ChatSession {
    let api = HttpCompanionApi::new(base_url).unwrap();
    ChatSession::new(Arc::new(api), Arc::new(StaticTokenAuth::new(TOKEN)))
}

async fn settle(session: &ChatSession) -> sidequest_companion::SessionSnapshot {
    tokio::time::timeout(Duration::from_secs(5), session.settled())
        .await
        .expect("session never settled")
}

#[tokio::test]
async fn history_is_fetched_with_bearer_auth() {
    let base = spawn_backend(Arc::new(Backend::default())).await;
    let api = HttpCompanionApi::new(&base).unwrap();

    let (id, messages) = api
        .fetch_history(TOKEN)
        .await
        .unwrap()
        .into_latest()
        .unwrap()
        .unwrap();
    assert_eq!(id.as_str(), "c-srv");
    assert_eq!(messages.len(), 2);
    assert!(messages[0].timestamp < messages[1].timestamp);

    let err = api.fetch_history("wrong").await.unwrap_err();
    assert_eq!(err.http_status(), Some(401));
}

#[tokio::test]
async fn full_exchange_over_http_and_sse() {
    let backend = Arc::new(Backend {
        frames: vec![
            token_frame("Sure"),
            token_frame(", let's"),
            "not an event".to_string(),
            token_frame(" go."),
            complete_frame(),
        ],
        ..Default::default()
    });
    let base = spawn_backend(backend.clone()).await;
    let session = session_for(&base);

    session.load_history().await;
    assert_eq!(session.snapshot().messages.len(), 2);

    session.send_message("Ready?").await;
    let done = settle(&session).await;

    assert_eq!(done.error, None);
    assert_eq!(done.conversation_id, Some(ConversationId::from("c-srv")));
    let last = done.messages.last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.content, "Sure, let's go.");
    assert_eq!(done.messages.len(), 4);

    let posted = backend.posted.lock().unwrap().clone();
    assert_eq!(posted[0].message, "Ready?");
    assert_eq!(posted[0].conversation_id, Some(ConversationId::from("c-srv")));
    assert_eq!(*backend.streamed.lock().unwrap(), vec!["c-srv".to_string()]);
}

#[tokio::test]
async fn first_message_starts_a_conversation() {
    let backend = Arc::new(Backend {
        frames: vec![token_frame("Welcome"), complete_frame()],
        ..Default::default()
    });
    let base = spawn_backend(backend.clone()).await;
    let session = session_for(&base);

    session.send_message("Hi").await;
    let done = settle(&session).await;

    assert_eq!(done.conversation_id, Some(ConversationId::from("srv-new")));
    assert_eq!(backend.posted.lock().unwrap()[0].conversation_id, None);
    assert_eq!(done.last_reply().unwrap().content, "Welcome");
}

#[tokio::test]
async fn server_error_rolls_back_the_send() {
    let backend = Arc::new(Backend {
        fail_chat: true,
        ..Default::default()
    });
    let base = spawn_backend(backend.clone()).await;
    let api = HttpCompanionApi::new(&base).unwrap();

    let request = SendRequest {
        message: "test".into(),
        conversation_id: None,
    };
    let err = api.send_message(TOKEN, &request).await.unwrap_err();
    assert!(matches!(
        err,
        ChatError::Request { status: Some(500), ref message } if message == "boom"
    ));

    let session = session_for(&base);
    session.send_message("test").await;
    let snap = session.snapshot();
    assert!(snap.messages.is_empty());
    assert!(!snap.is_loading);
    assert_eq!(snap.error.as_deref(), Some(SEND_FAILED));
}

#[tokio::test]
async fn rejected_stream_reports_connection_lost() {
    let backend = Arc::new(Backend {
        stream_status: Some(StatusCode::UNAUTHORIZED),
        ..Default::default()
    });
    let base = spawn_backend(backend).await;
    let session = session_for(&base);

    session.send_message("Hi").await;
    let done = settle(&session).await;

    assert_eq!(done.error.as_deref(), Some(CONNECTION_LOST));
    assert_eq!(done.messages.len(), 1);
    assert_eq!(done.messages[0].role, Role::User);
}

#[tokio::test]
async fn stream_without_terminal_event_keeps_partial_reply() {
    let backend = Arc::new(Backend {
        frames: vec![token_frame("half")],
        ..Default::default()
    });
    let base = spawn_backend(backend).await;
    let session = session_for(&base);

    session.send_message("Hi").await;
    let done = settle(&session).await;

    assert_eq!(done.error.as_deref(), Some(CONNECTION_LOST));
    assert_eq!(done.last_reply().unwrap().content, "half");
}
