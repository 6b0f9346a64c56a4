//! Request handlers for todo operations.

mod todos;
mod websocket;

pub use todos::*;
pub use websocket::*;
