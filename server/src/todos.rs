//! The todo collection served by this process.
//!
//! [`TodoService`] owns the current [`SyncedCollection`] and swaps it for a
//! fresh one on reconnect, which is the only way out of a version conflict.

use crate::websocket::{ClientManager, ServerMessage};
use serde::{Deserialize, Serialize};
use shelf_engine::{
    CacheState, CollectionIdentity, ConnectionStatus, Error, MemoryBackend, SchemaVersion,
    SyncedCollection,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// A todo item, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
}

/// Body of a create request. A missing id is generated.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTodo {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
}

impl NewTodo {
    pub fn into_todo(self) -> Todo {
        Todo {
            id: self
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            text: self.text,
            description: self.description,
            completed: self.completed,
        }
    }
}

/// Observable state of the todo cache as sent to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoState {
    pub is_ready: bool,
    pub status: ConnectionStatus,
    pub error: Option<Error>,
    pub data: Vec<Todo>,
}

impl From<&CacheState<Todo>> for TodoState {
    fn from(state: &CacheState<Todo>) -> Self {
        Self {
            is_ready: state.is_ready(),
            status: state.status,
            error: state.error.clone(),
            data: state.data.as_ref().clone(),
        }
    }
}

/// Holds the live todo cache and rebuilds it on demand.
pub struct TodoService {
    backend: MemoryBackend,
    identity: RwLock<CollectionIdentity>,
    current: RwLock<Connected>,
    clients: Arc<ClientManager>,
}

/// A cache together with the task pushing its state to clients.
struct Connected {
    cache: Arc<SyncedCollection<Todo>>,
    forwarder: JoinHandle<()>,
}

impl TodoService {
    /// Open the todo cache and start pushing its state to `clients`.
    ///
    /// A failed open is not fatal: the service starts with the failure in
    /// its state, and `reconnect` can retry.
    pub async fn start(
        backend: MemoryBackend,
        identity: CollectionIdentity,
        clients: Arc<ClientManager>,
    ) -> Self {
        let current = connect(&backend, identity.clone(), &clients).await;

        Self {
            backend,
            identity: RwLock::new(identity),
            current: RwLock::new(current),
            clients,
        }
    }

    /// The cache currently in use.
    pub async fn cache(&self) -> Arc<SyncedCollection<Todo>> {
        Arc::clone(&self.current.read().await.cache)
    }

    pub async fn state(&self) -> TodoState {
        TodoState::from(&self.cache().await.state())
    }

    pub fn backend(&self) -> &MemoryBackend {
        &self.backend
    }

    pub async fn identity(&self) -> CollectionIdentity {
        self.identity.read().await.clone()
    }

    /// Tear the current cache down and open a new one, optionally at a new
    /// schema version.
    pub async fn reconnect(&self, version: Option<SchemaVersion>) -> TodoState {
        let mut identity = self.identity.write().await;
        if let Some(version) = version {
            identity.version = version;
        }

        let mut current = self.current.write().await;
        // The old cache's closing state must not reach clients after the new one's.
        current.forwarder.abort();
        let _ = (&mut current.forwarder).await;
        current.cache.close();
        *current = connect(&self.backend, identity.clone(), &self.clients).await;
        let cache = &current.cache;

        tracing::info!(
            database = %identity.database,
            version = identity.version,
            ready = cache.is_ready(),
            "todo cache reconnected"
        );

        TodoState::from(&cache.state())
    }

    /// Close the current cache.
    pub async fn shutdown(&self) {
        self.current.read().await.cache.close();
    }
}

async fn connect(
    backend: &MemoryBackend,
    identity: CollectionIdentity,
    clients: &Arc<ClientManager>,
) -> Connected {
    let cache = Arc::new(SyncedCollection::connect(backend.clone(), identity).await);

    if let Some(error) = cache.error() {
        tracing::warn!(error = %error, "todo cache failed to open");
    }

    let forwarder = tokio::spawn(forward_state(cache.subscribe(), Arc::clone(clients)));
    // The initial state is already published; send it to anyone listening.
    clients.broadcast_all(ServerMessage::state(TodoState::from(&cache.state())));
    Connected { cache, forwarder }
}

/// Broadcast every state change of one cache until that cache is dropped.
async fn forward_state(
    mut changes: tokio::sync::watch::Receiver<CacheState<Todo>>,
    clients: Arc<ClientManager>,
) {
    while changes.changed().await.is_ok() {
        let state = TodoState::from(&*changes.borrow_and_update());
        let sent = clients.broadcast_all(ServerMessage::state(state));
        tracing::trace!(recipients = sent, "state pushed");
    }
}
