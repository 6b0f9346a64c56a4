//! WebSocket support for live todo state.
//!
//! Clients connect via WebSocket, receive the cache's observable state on
//! every change, and may send mutations over the same socket.

mod manager;
mod protocol;

pub use manager::ClientManager;
pub use protocol::*;
