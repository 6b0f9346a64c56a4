//! WebSocket client registry.
//!
//! Tracks connected WebSocket clients so state changes of the todo cache can
//! be pushed to all of them.

use dashmap::DashMap;
use tokio::sync::mpsc;

use super::ServerMessage;

/// Sender for WebSocket messages.
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

/// Manages connected WebSocket clients.
///
/// Thread-safe and can be shared across handlers via `Arc`.
#[derive(Debug, Default)]
pub struct ClientManager {
    /// Outgoing channel of every client, keyed by client ID.
    clients: DashMap<String, MessageSender>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client.
    ///
    /// Returns the client ID.
    pub fn register(&self, sender: MessageSender) -> String {
        let client_id = uuid::Uuid::new_v4().to_string();
        self.clients.insert(client_id.clone(), sender);

        tracing::debug!(client_id = %client_id, "WebSocket client registered");
        client_id
    }

    pub fn unregister(&self, client_id: &str) {
        if self.clients.remove(client_id).is_some() {
            tracing::debug!(client_id = %client_id, "WebSocket client unregistered");
        }
    }

    /// Broadcast a message to all clients.
    ///
    /// Returns the number of clients that received the message.
    pub fn broadcast_all(&self, message: ServerMessage) -> usize {
        let mut sent_count = 0;

        for entry in self.clients.iter() {
            if entry.value().send(message.clone()).is_ok() {
                sent_count += 1;
            }
        }

        sent_count
    }

    /// Send a message to one client.
    pub fn send_to(&self, client_id: &str, message: ServerMessage) -> bool {
        match self.clients.get(client_id) {
            Some(sender) => sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Get the number of connected clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_unregister() {
        let manager = ClientManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let client_id = manager.register(tx);
        assert_eq!(manager.client_count(), 1);

        manager.unregister(&client_id);
        manager.unregister(&client_id);
        assert_eq!(manager.client_count(), 0);
    }

    #[test]
    fn test_broadcast_all() {
        let manager = ClientManager::new();

        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, rx2) = mpsc::unbounded_channel();

        manager.register(tx1);
        manager.register(tx2);
        drop(rx2);

        // Closed receivers are skipped.
        let sent = manager.broadcast_all(ServerMessage::Pong);
        assert_eq!(sent, 1);
        assert!(matches!(rx1.try_recv().unwrap(), ServerMessage::Pong));
    }

    #[test]
    fn test_send_to() {
        let manager = ClientManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client_id = manager.register(tx);

        assert!(manager.send_to(&client_id, ServerMessage::Pong));
        assert!(!manager.send_to("unknown", ServerMessage::Pong));
        assert!(matches!(rx.try_recv().unwrap(), ServerMessage::Pong));
    }
}
