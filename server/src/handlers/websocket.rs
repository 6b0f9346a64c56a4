//! WebSocket handler for live todo state.
//!
//! Handles WebSocket connections: pushes the current state on connect,
//! forwards every later state change, and dispatches client messages to the
//! todo handlers.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::todos::TodoService;
use crate::websocket::{ClientManager, ClientMessage, ServerMessage};

use super::{clear_todos, create_todo, delete_todo, save_todo};

/// Handle an established WebSocket connection.
///
/// This function:
/// 1. Registers the client with the manager
/// 2. Spawns a task to forward outgoing messages
/// 3. Processes incoming messages in a loop
/// 4. Cleans up on disconnect
pub async fn handle_websocket_connection(
    socket: WebSocket,
    service: Arc<TodoService>,
    clients: Arc<ClientManager>,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let client_id = clients.register(tx);
    tracing::info!(client_id = %client_id, "WebSocket client connected");

    clients.send_to(&client_id, ServerMessage::state(service.state().await));

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        tracing::warn!("Failed to send WebSocket message: {}", e);
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize WebSocket message: {}", e);
                }
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let response = process_message(&text, &service).await;
                clients.send_to(&client_id, response);
            }
            Ok(Message::Binary(_)) => {
                clients.send_to(
                    &client_id,
                    ServerMessage::error("Binary messages not supported", None),
                );
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                tracing::debug!(client_id = %client_id, "WebSocket close frame received");
                break;
            }
            Err(e) => {
                tracing::warn!(client_id = %client_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    clients.unregister(&client_id);
    send_task.abort();

    tracing::info!(
        client_id = %client_id,
        active_clients = clients.client_count(),
        "WebSocket client disconnected"
    );
}

/// Process a client message and return the direct reply.
///
/// State changes caused by a mutation reach every client, this one included,
/// through the state push.
pub async fn process_message(text: &str, service: &TodoService) -> ServerMessage {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            return ServerMessage::error(format!("Invalid message format: {}", e), None);
        }
    };

    match client_msg {
        ClientMessage::GetState { request_id } => ServerMessage::State {
            state: service.state().await,
            request_id,
        },

        ClientMessage::Add { todo, request_id } => match create_todo(service, todo).await {
            Ok(todo) => ServerMessage::Ack {
                id: Some(todo.id),
                request_id,
            },
            Err(e) => ServerMessage::error(e.to_string(), request_id),
        },

        ClientMessage::Put { todo, request_id } => match save_todo(service, todo).await {
            Ok(todo) => ServerMessage::Ack {
                id: Some(todo.id),
                request_id,
            },
            Err(e) => ServerMessage::error(e.to_string(), request_id),
        },

        ClientMessage::Remove { id, request_id } => match delete_todo(service, &id).await {
            Ok(()) => ServerMessage::Ack {
                id: Some(id),
                request_id,
            },
            Err(e) => ServerMessage::error(e.to_string(), request_id),
        },

        ClientMessage::Clear { request_id } => match clear_todos(service).await {
            Ok(()) => ServerMessage::Ack {
                id: None,
                request_id,
            },
            Err(e) => ServerMessage::error(e.to_string(), request_id),
        },

        ClientMessage::Ping => ServerMessage::Pong,
    }
}
