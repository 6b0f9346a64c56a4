//! WebSocket message protocol definitions.
//!
//! All messages are JSON-encoded and use snake_case for the `type` tag and
//! field names. Todo payloads keep their own field names.

use serde::{Deserialize, Serialize};

use crate::todos::{NewTodo, Todo, TodoState};

/// Messages sent from client to server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask for the current state.
    GetState {
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Insert a new todo.
    Add {
        todo: NewTodo,
        /// Request ID for correlating responses
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Insert or overwrite a todo.
    Put {
        todo: Todo,
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Delete a todo by id.
    Remove {
        id: String,
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Delete every todo.
    Clear {
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Keep-alive ping.
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The cache's observable state. Pushed on every change and sent in
    /// reply to `get_state`.
    State {
        state: TodoState,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// A mutation committed. The matching `state` push follows.
    Ack {
        /// Id of the todo the mutation touched, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// Response to ping.
    Pong,

    /// Error message.
    Error {
        /// Error description
        message: String,
        /// Request ID echoed from the request (if applicable)
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl ServerMessage {
    /// Create an unsolicited state push.
    pub fn state(state: TodoState) -> Self {
        ServerMessage::State {
            state,
            request_id: None,
        }
    }

    /// Create an error message.
    pub fn error(message: impl Into<String>, request_id: Option<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            request_id,
        }
    }
}
