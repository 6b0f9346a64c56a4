//! Todo operations shared by the HTTP routes and the WebSocket handler.

use crate::error::{AppError, Result};
use crate::todos::{NewTodo, Todo, TodoService};

/// Insert a new todo and return it as stored.
pub async fn create_todo(service: &TodoService, new: NewTodo) -> Result<Todo> {
    if new.text.trim().is_empty() {
        return Err(AppError::BadRequest("text must not be empty".to_string()));
    }

    let todo = new.into_todo();
    service.cache().await.add(&todo).await?;

    tracing::debug!(id = %todo.id, "todo created");
    Ok(todo)
}

pub async fn find_todo(service: &TodoService, id: &str) -> Result<Todo> {
    service
        .cache()
        .await
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("todo {}", id)))
}

/// Insert or overwrite a todo.
pub async fn save_todo(service: &TodoService, todo: Todo) -> Result<Todo> {
    if todo.id.is_empty() {
        return Err(AppError::BadRequest("id must not be empty".to_string()));
    }

    service.cache().await.put(&todo).await?;

    tracing::debug!(id = %todo.id, "todo saved");
    Ok(todo)
}

/// Delete a todo. Deleting an unknown id succeeds.
pub async fn delete_todo(service: &TodoService, id: &str) -> Result<()> {
    service.cache().await.remove(id).await?;

    tracing::debug!(id = %id, "todo deleted");
    Ok(())
}

pub async fn clear_todos(service: &TodoService) -> Result<()> {
    service.cache().await.clear().await?;

    tracing::debug!("todos cleared");
    Ok(())
}
