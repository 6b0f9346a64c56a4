//! Todo CRUD routes.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use shelf_engine::SchemaVersion;

use crate::error::{AppError, Result};
use crate::handlers::{clear_todos, create_todo, delete_todo, find_todo, save_todo};
use crate::todos::{NewTodo, Todo, TodoState};
use crate::AppState;

/// Body of a reconnect request.
#[derive(Debug, Default, Deserialize)]
pub struct ReconnectRequest {
    /// Schema version to open with; the current one if absent
    #[serde(default)]
    pub version: Option<SchemaVersion>,
}

/// Create todo routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/todos", get(list_handler).post(create_handler).delete(clear_handler))
        .route("/todos/reconnect", post(reconnect_handler))
        .route(
            "/todos/{id}",
            get(get_handler).put(put_handler).delete(delete_handler),
        )
}

/// GET /todos - The cache's observable state.
async fn list_handler(State(state): State<AppState>) -> Json<TodoState> {
    Json(state.todos.state().await)
}

/// POST /todos - Add a todo.
async fn create_handler(
    State(state): State<AppState>,
    Json(new): Json<NewTodo>,
) -> Result<(StatusCode, Json<Todo>)> {
    let todo = create_todo(&state.todos, new).await?;
    Ok((StatusCode::CREATED, Json(todo)))
}

/// GET /todos/{id} - Read one todo from the store.
async fn get_handler(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Todo>> {
    Ok(Json(find_todo(&state.todos, &id).await?))
}

/// PUT /todos/{id} - Insert or overwrite a todo. The path id wins.
async fn put_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut todo): Json<Todo>,
) -> Result<Json<Todo>> {
    todo.id = id;
    Ok(Json(save_todo(&state.todos, todo).await?))
}

/// DELETE /todos/{id} - Remove a todo.
async fn delete_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    delete_todo(&state.todos, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /todos - Remove every todo.
async fn clear_handler(State(state): State<AppState>) -> Result<StatusCode> {
    clear_todos(&state.todos).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /todos/reconnect - Recreate the cache, e.g. after a version conflict.
async fn reconnect_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TodoState>> {
    let request: ReconnectRequest = if body.is_empty() {
        ReconnectRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?
    };
    Ok(Json(state.todos.reconnect(request.version).await))
}
