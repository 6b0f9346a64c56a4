//! # Shelf Engine
//!
//! A synchronized in-memory mirror of one store in a versioned, persistent
//! key-value database.
//!
//! The engine opens a connection to a named database at a schema version,
//! creates the store on first use, and keeps a complete copy of the store's
//! records that observers can read and subscribe to. Writes always go to the
//! backend first; the mirror is replaced by a fresh scan only after the
//! backend has committed.
//!
//! ## Core Concepts
//!
//! ### Backends
//!
//! A [`Backend`] opens versioned databases and hands out [`Connection`]s.
//! Opening at a higher version runs an upgrade hook once and tells every other
//! open connection to get out of the way. [`MemoryBackend`] is the in-process
//! implementation, with snapshot export and import for persistence.
//!
//! ### The cache
//!
//! A [`SyncedCollection`] owns at most one connection. Its observable state is
//! a [`CacheState`]: the lifecycle [`ConnectionStatus`], the last lifecycle
//! [`Error`] and the mirrored records.
//!
//! - [`ConnectionStatus::Ready`] only while a live connection is held
//! - [`ErrorKind::VersionConflict`] once another actor upgrades or deletes the
//!   database; the cache stays closed until it is reopened
//! - [`ErrorKind::NotInitialized`] for any operation without a live connection
//!
//! ## Quick Start
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use shelf_engine::{CollectionIdentity, MemoryBackend, SyncedCollection};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! struct Todo {
//!     id: String,
//!     text: String,
//!     completed: bool,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), shelf_engine::Error> {
//! let backend = MemoryBackend::new();
//! let todos: SyncedCollection<Todo> =
//!     SyncedCollection::connect(backend, CollectionIdentity::new("TodoApp", 1, "todos")).await;
//! assert!(todos.is_ready());
//!
//! todos
//!     .add(&Todo {
//!         id: "1".into(),
//!         text: "write docs".into(),
//!         completed: false,
//!     })
//!     .await?;
//!
//! assert_eq!(todos.data().len(), 1);
//! assert_eq!(todos.get("1").await?.map(|t| t.text), Some("write docs".into()));
//! # Ok(())
//! # }
//! ```
//!
//! ## Persistence
//!
//! Use [`MemoryBackend::export_snapshot`] and [`MemoryBackend::from_snapshot`]
//! with [`BackendSnapshot`]. Snapshots serialize to JSON with deterministic
//! ordering.

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod key;
pub mod operation;
pub mod record;
pub mod snapshot;
pub mod state;

// Re-export main types at crate root
pub use backend::{
    Backend, Connection, MemoryBackend, MemoryConnection, Opened, UpgradeHook,
    UpgradeTransaction, VersionChange, VersionChangeReceiver, DEFAULT_BLOCKED_TIMEOUT,
};
pub use cache::SyncedCollection;
pub use config::{CacheOptions, CollectionIdentity, ReadPolicy};
pub use error::{
    Error, ErrorKind, StoreError, StoreResult, NOT_INITIALIZED_MESSAGE, VERSION_CONFLICT_MESSAGE,
};
pub use key::{Key, KeyPath};
pub use operation::Operation;
pub use record::Record;
pub use snapshot::{
    BackendSnapshot, DatabaseSnapshot, SnapshotMetadata, StoreSnapshot, SNAPSHOT_FORMAT_VERSION,
};
pub use state::{CacheState, ConnectionStatus, LifecycleEvent};

/// Type aliases for clarity
pub type DatabaseName = String;
pub type StoreName = String;
pub type SchemaVersion = u32;
pub type Generation = u64;
