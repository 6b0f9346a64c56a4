//! Integration tests for the todo HTTP API.
//!
//! Requests are served in-process with `tower::ServiceExt::oneshot`.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use shelf_engine::{CollectionIdentity, MemoryBackend, SyncedCollection};
use shelf_server::config::Config;
use shelf_server::todos::{Todo, TodoService};
use shelf_server::websocket::ClientManager;
use shelf_server::{app, AppState};
use std::sync::Arc;
use tower::ServiceExt;

async fn test_app(backend: MemoryBackend) -> Router {
    let config = Config::default();
    let clients = Arc::new(ClientManager::new());
    let todos = TodoService::start(backend, config.identity(), Arc::clone(&clients)).await;

    app(AppState {
        todos: Arc::new(todos),
        clients,
        config: Arc::new(config),
    })
}

async fn request_json(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();

    if body.is_empty() {
        return (status, Value::Null);
    }
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn health_reports_ready() {
    let app = test_app(MemoryBackend::new()).await;

    let (status, body) = request_json(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["ready"], true);
    assert_eq!(body["database"], "TodoApp");
}

#[tokio::test]
async fn todo_lifecycle() {
    let app = test_app(MemoryBackend::new()).await;

    let (status, created) = request_json(
        &app,
        Method::POST,
        "/todos",
        Some(json!({"id": "1", "text": "a"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["completed"], false);

    let (_, state) = request_json(&app, Method::GET, "/todos", None).await;
    assert_eq!(state["isReady"], true);
    assert_eq!(state["status"], "ready");
    assert_eq!(state["error"], Value::Null);
    assert_eq!(state["data"][0]["text"], "a");

    let (status, updated) = request_json(
        &app,
        Method::PUT,
        "/todos/1",
        Some(json!({"id": "ignored", "text": "b", "completed": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["id"], "1");

    let (status, fetched) = request_json(&app, Method::GET, "/todos/1", None).await;
    assert_eq!(status, StatusCode::OK);
    let fetched: Todo = serde_json::from_value(fetched).unwrap();
    assert_eq!(fetched.text, "b");
    assert!(fetched.completed);

    let (status, _) = request_json(&app, Method::DELETE, "/todos/1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    // Deleting again is not an error.
    let (status, _) = request_json(&app, Method::DELETE, "/todos/1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = request_json(&app, Method::GET, "/todos/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_generates_id() {
    let app = test_app(MemoryBackend::new()).await;

    let (status, created) =
        request_json(&app, Method::POST, "/todos", Some(json!({"text": "no id"}))).await;

    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap();
    let (status, _) = request_json(&app, Method::GET, &format!("/todos/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn duplicate_create_conflicts() {
    let app = test_app(MemoryBackend::new()).await;
    let todo = json!({"id": "1", "text": "a"});

    request_json(&app, Method::POST, "/todos", Some(todo.clone())).await;
    let (status, body) = request_json(&app, Method::POST, "/todos", Some(todo)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "OperationFailed");
    assert!(body["error"].as_str().unwrap().starts_with("Failed to add item"));
}

#[tokio::test]
async fn empty_text_is_rejected() {
    let app = test_app(MemoryBackend::new()).await;

    let (status, _) = request_json(&app, Method::POST, "/todos", Some(json!({"text": "  "}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn clear_empties_the_list() {
    let app = test_app(MemoryBackend::new()).await;
    for id in ["1", "2", "3"] {
        request_json(&app, Method::POST, "/todos", Some(json!({"id": id, "text": id}))).await;
    }

    let (status, _) = request_json(&app, Method::DELETE, "/todos", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = request_json(&app, Method::DELETE, "/todos", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, state) = request_json(&app, Method::GET, "/todos", None).await;
    assert_eq!(state["data"], json!([]));
}

#[tokio::test]
async fn version_conflict_and_reconnect() {
    let backend = MemoryBackend::new();
    let app = test_app(backend.clone()).await;
    request_json(&app, Method::POST, "/todos", Some(json!({"id": "1", "text": "a"}))).await;

    // Another process upgrades the database.
    let upgraded: SyncedCollection<Todo> =
        SyncedCollection::connect(backend, CollectionIdentity::new("TodoApp", 2, "todos")).await;
    assert!(upgraded.is_ready());

    let (_, state) = request_json(&app, Method::GET, "/todos", None).await;
    assert_eq!(state["isReady"], false);
    assert_eq!(state["status"], "conflicted");
    assert_eq!(state["error"]["message"], "Database was updated in another window");

    let (status, body) =
        request_json(&app, Method::POST, "/todos", Some(json!({"id": "2", "text": "b"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Database not initialized");

    let (status, health) = request_json(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["ready"], false);

    let (status, state) = request_json(
        &app,
        Method::POST,
        "/todos/reconnect",
        Some(json!({"version": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["isReady"], true);
    assert_eq!(state["data"][0]["id"], "1");
}

#[tokio::test]
async fn reconnect_without_body_keeps_version() {
    let app = test_app(MemoryBackend::new()).await;

    let (status, state) = request_json(&app, Method::POST, "/todos/reconnect", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["isReady"], true);
}
