//! The contract between the cache and a persistent keyed store.
//!
//! A backend must provide:
//! - versioned open with a one-time upgrade hook
//! - atomic per-key mutations (`add`, `put`, `delete`, `clear`)
//! - point reads and a full ordered scan
//! - a push channel announcing that another actor changed the version
//!
//! [`MemoryBackend`] implements it in-process with the semantics of a
//! browser object store.

mod memory;

pub use memory::{MemoryBackend, MemoryConnection, DEFAULT_BLOCKED_TIMEOUT};

use crate::{error::StoreResult, Key, KeyPath, SchemaVersion, StoreName};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Announcement that another actor wants to change the database version.
///
/// `new_version` is `None` when the database is being deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionChange {
    pub old_version: SchemaVersion,
    pub new_version: Option<SchemaVersion>,
}

/// Receiving end of a connection's version-change channel.
pub type VersionChangeReceiver = mpsc::UnboundedReceiver<VersionChange>;

/// Schema changes allowed while a database is being upgraded.
pub trait UpgradeTransaction: Send {
    fn database(&self) -> &str;

    /// Version before the upgrade (0 for a database that did not exist).
    fn old_version(&self) -> SchemaVersion;

    fn new_version(&self) -> SchemaVersion;

    fn store_names(&self) -> Vec<StoreName>;

    fn contains_store(&self, name: &str) -> bool;

    /// Create a store whose records are keyed by `key_path`.
    ///
    /// Fails if the store already exists.
    fn create_store(&mut self, name: &str, key_path: KeyPath) -> StoreResult<()>;
}

/// Callback run once when an open raises the database version.
///
/// Returning an error aborts the open and discards every schema change.
pub type UpgradeHook<'a> =
    Box<dyn FnOnce(&mut dyn UpgradeTransaction) -> StoreResult<()> + Send + 'a>;

/// A freshly opened connection with its version-change channel.
#[derive(Debug)]
pub struct Opened<C> {
    pub connection: C,
    pub version_changes: VersionChangeReceiver,
}

/// A versioned keyed store that connections can be opened against.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    type Connection: Connection;

    /// Open `database` at `version`, creating it if absent.
    ///
    /// The upgrade hook runs only when `version` is higher than the stored
    /// version. Opening below the stored version fails.
    async fn open(
        &self,
        database: &str,
        version: SchemaVersion,
        upgrade: UpgradeHook<'_>,
    ) -> StoreResult<Opened<Self::Connection>>;
}

/// A live handle on one database.
///
/// Every async method is one atomic unit: it either commits completely or
/// leaves the store unchanged. Calls on a closed connection fail with
/// [`StoreError::InvalidState`](crate::StoreError::InvalidState).
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    fn database(&self) -> &str;

    fn version(&self) -> SchemaVersion;

    fn is_closed(&self) -> bool;

    /// Close the connection. Idempotent.
    fn close(&self);

    async fn get(&self, store: &str, key: &Key) -> StoreResult<Option<Value>>;

    /// Every record of `store` in key order.
    async fn get_all(&self, store: &str) -> StoreResult<Vec<Value>>;

    /// Insert a record; fails if its key is already present.
    async fn add(&self, store: &str, record: Value) -> StoreResult<Key>;

    /// Insert or overwrite a record by key.
    async fn put(&self, store: &str, record: Value) -> StoreResult<Key>;

    /// Delete a record. Deleting an absent key succeeds.
    async fn delete(&self, store: &str, key: &Key) -> StoreResult<()>;

    async fn clear(&self, store: &str) -> StoreResult<()>;
}
