//! In-process backend with the semantics of a browser object store.
//!
//! Cloned handles share one registry of databases, so several caches (or a
//! test acting as "another window") observe the same data and the same
//! version changes.

use super::{Backend, Connection, Opened, UpgradeHook, UpgradeTransaction, VersionChange};
use crate::snapshot::{BackendSnapshot, DatabaseSnapshot, StoreSnapshot, SNAPSHOT_FORMAT_VERSION};
use crate::{error::StoreResult, DatabaseName, Key, KeyPath, SchemaVersion, StoreError, StoreName};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;

/// How long an upgrade or delete waits for other connections to close.
pub const DEFAULT_BLOCKED_TIMEOUT: Duration = Duration::from_secs(5);

type ConnectionId = u64;

#[derive(Debug, Clone)]
struct ObjectStore {
    key_path: KeyPath,
    records: BTreeMap<Key, Value>,
}

impl ObjectStore {
    fn new(key_path: KeyPath) -> Self {
        Self {
            key_path,
            records: BTreeMap::new(),
        }
    }

    fn key_of(&self, record: &Value) -> StoreResult<Key> {
        self.key_path.extract(record).ok_or_else(|| {
            StoreError::Data(format!(
                "record has no valid key at path '{}'",
                self.key_path
            ))
        })
    }
}

#[derive(Debug, Default)]
struct Database {
    version: SchemaVersion,
    stores: BTreeMap<StoreName, ObjectStore>,
    /// Version-change senders of every live connection.
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<VersionChange>>,
}

#[derive(Debug, Default)]
struct Shared {
    databases: Mutex<BTreeMap<DatabaseName, Database>>,
    /// Signalled whenever a connection closes.
    closed: Notify,
    next_id: AtomicU64,
}

/// Shared in-memory registry of versioned databases.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
    blocked_timeout: Duration,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            blocked_timeout: DEFAULT_BLOCKED_TIMEOUT,
        }
    }

    /// Set how long opens and deletes wait for other connections to close
    /// before failing with [`StoreError::Blocked`].
    pub fn with_blocked_timeout(mut self, timeout: Duration) -> Self {
        self.blocked_timeout = timeout;
        self
    }

    /// Name and version of every database.
    pub fn databases(&self) -> Vec<(DatabaseName, SchemaVersion)> {
        self.shared
            .databases
            .lock()
            .iter()
            .map(|(name, db)| (name.clone(), db.version))
            .collect()
    }

    /// Store names of a database, or `None` if it does not exist.
    pub fn store_names(&self, database: &str) -> Option<Vec<StoreName>> {
        self.shared
            .databases
            .lock()
            .get(database)
            .map(|db| db.stores.keys().cloned().collect())
    }

    /// Number of live connections to a database.
    pub fn connection_count(&self, database: &str) -> usize {
        self.shared
            .databases
            .lock()
            .get(database)
            .map_or(0, |db| db.connections.len())
    }

    /// Delete a database.
    ///
    /// Live connections receive a [`VersionChange`] with no new version and
    /// the delete waits for them to close. Deleting an absent database
    /// succeeds.
    pub async fn delete_database(&self, database: &str) -> StoreResult<()> {
        let deadline = Instant::now() + self.blocked_timeout;
        let mut notified = HashSet::new();

        loop {
            let closed = self.shared.closed.notified();
            tokio::pin!(closed);
            closed.as_mut().enable();

            {
                let mut databases = self.shared.databases.lock();
                let Some(db) = databases.get(database) else {
                    return Ok(());
                };

                if db.connections.is_empty() {
                    databases.remove(database);
                    tracing::debug!(database, "database deleted");
                    return Ok(());
                }

                let change = VersionChange {
                    old_version: db.version,
                    new_version: None,
                };
                for (id, sender) in &db.connections {
                    if notified.insert(*id) {
                        let _ = sender.send(change);
                    }
                }
            }

            if tokio::time::timeout_at(deadline, closed).await.is_err() {
                tracing::warn!(database, "delete blocked by open connections");
                return Err(StoreError::Blocked {
                    database: database.to_string(),
                });
            }
        }
    }

    /// Capture every database for persistence.
    pub fn export_snapshot(&self) -> BackendSnapshot {
        let databases = self.shared.databases.lock();
        let mut snapshot = BackendSnapshot::new();

        for (name, db) in databases.iter() {
            let mut database = DatabaseSnapshot::new(db.version);
            for (store_name, store) in &db.stores {
                database.stores.insert(
                    store_name.clone(),
                    StoreSnapshot {
                        key_path: store.key_path.clone(),
                        records: store.records.values().cloned().collect(),
                    },
                );
            }
            snapshot.databases.insert(name.clone(), database);
        }

        snapshot
    }

    /// Build a backend holding the contents of a snapshot.
    ///
    /// Every record must carry a valid, unique key at its store's key path.
    pub fn from_snapshot(snapshot: BackendSnapshot) -> StoreResult<Self> {
        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(StoreError::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        let mut databases = BTreeMap::new();
        for (name, database) in snapshot.databases {
            if database.version == 0 {
                return Err(StoreError::InvalidSnapshot(format!(
                    "database '{}' has version 0",
                    name
                )));
            }

            let mut stores = BTreeMap::new();
            for (store_name, store) in database.stores {
                let mut object_store = ObjectStore::new(store.key_path);
                for record in store.records {
                    let key = object_store
                        .key_of(&record)
                        .map_err(|e| StoreError::InvalidSnapshot(format!("{}: {}", store_name, e)))?;
                    if object_store.records.insert(key.clone(), record).is_some() {
                        return Err(StoreError::InvalidSnapshot(format!(
                            "duplicate key {} in store '{}'",
                            key, store_name
                        )));
                    }
                }
                stores.insert(store_name, object_store);
            }

            databases.insert(
                name,
                Database {
                    version: database.version,
                    stores,
                    connections: HashMap::new(),
                },
            );
        }

        let backend = Self::new();
        *backend.shared.databases.lock() = databases;
        Ok(backend)
    }

    fn register(&self, name: &str, db: &mut Database) -> Opened<MemoryConnection> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        db.connections.insert(id, sender);

        tracing::debug!(database = name, version = db.version, connection = id, "connection opened");

        Opened {
            connection: MemoryConnection {
                id,
                database: name.to_string(),
                version: db.version,
                shared: Arc::clone(&self.shared),
                closed: AtomicBool::new(false),
            },
            version_changes: receiver,
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    type Connection = MemoryConnection;

    async fn open(
        &self,
        database: &str,
        version: SchemaVersion,
        upgrade: UpgradeHook<'_>,
    ) -> StoreResult<Opened<MemoryConnection>> {
        if version == 0 {
            return Err(StoreError::Data("version must be at least 1".into()));
        }

        let deadline = Instant::now() + self.blocked_timeout;
        let mut upgrade = Some(upgrade);
        let mut notified = HashSet::new();

        loop {
            let closed = self.shared.closed.notified();
            tokio::pin!(closed);
            closed.as_mut().enable();

            {
                let mut databases = self.shared.databases.lock();
                let db = databases.entry(database.to_string()).or_default();

                if version < db.version {
                    return Err(StoreError::Version {
                        requested: version,
                        current: db.version,
                    });
                }
                if version == db.version {
                    return Ok(self.register(database, db));
                }

                if db.connections.is_empty() {
                    let old_version = db.version;
                    let hook = upgrade
                        .take()
                        .ok_or_else(|| StoreError::Aborted("upgrade hook already consumed".into()))?;
                    let mut tx = MemoryUpgrade {
                        database,
                        old_version,
                        new_version: version,
                        stores: db.stores.clone(),
                    };

                    match hook(&mut tx) {
                        Ok(()) => {
                            db.stores = tx.stores;
                            db.version = version;
                            tracing::info!(database, old_version, version, "database upgraded");
                            return Ok(self.register(database, db));
                        }
                        Err(e) => {
                            if old_version == 0 {
                                databases.remove(database);
                            }
                            tracing::warn!(database, version, error = %e, "upgrade aborted");
                            return Err(StoreError::Aborted(e.to_string()));
                        }
                    }
                }

                let change = VersionChange {
                    old_version: db.version,
                    new_version: Some(version),
                };
                for (id, sender) in &db.connections {
                    if notified.insert(*id) {
                        let _ = sender.send(change);
                    }
                }
            }

            if tokio::time::timeout_at(deadline, closed).await.is_err() {
                tracing::warn!(database, version, "upgrade blocked by open connections");
                return Err(StoreError::Blocked {
                    database: database.to_string(),
                });
            }
        }
    }
}

struct MemoryUpgrade<'a> {
    database: &'a str,
    old_version: SchemaVersion,
    new_version: SchemaVersion,
    stores: BTreeMap<StoreName, ObjectStore>,
}

impl UpgradeTransaction for MemoryUpgrade<'_> {
    fn database(&self) -> &str {
        self.database
    }

    fn old_version(&self) -> SchemaVersion {
        self.old_version
    }

    fn new_version(&self) -> SchemaVersion {
        self.new_version
    }

    fn store_names(&self) -> Vec<StoreName> {
        self.stores.keys().cloned().collect()
    }

    fn contains_store(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    fn create_store(&mut self, name: &str, key_path: KeyPath) -> StoreResult<()> {
        if self.stores.contains_key(name) {
            return Err(StoreError::Data(format!(
                "object store '{}' already exists",
                name
            )));
        }
        self.stores.insert(name.to_string(), ObjectStore::new(key_path));
        Ok(())
    }
}

/// A connection to one database of a [`MemoryBackend`].
///
/// Dropping the connection closes it.
#[derive(Debug)]
pub struct MemoryConnection {
    id: ConnectionId,
    database: DatabaseName,
    version: SchemaVersion,
    shared: Arc<Shared>,
    closed: AtomicBool,
}

impl MemoryConnection {
    /// Run `f` against one store as a single atomic unit.
    fn transact<R>(
        &self,
        store: &str,
        f: impl FnOnce(&mut ObjectStore) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mut databases = self.shared.databases.lock();

        // Checked under the lock so a commit either precedes close or fails.
        if self.is_closed() {
            return Err(StoreError::InvalidState(format!(
                "connection to '{}' is closed",
                self.database
            )));
        }

        let db = databases.get_mut(&self.database).ok_or_else(|| {
            StoreError::InvalidState(format!("database '{}' no longer exists", self.database))
        })?;
        let object_store = db
            .stores
            .get_mut(store)
            .ok_or_else(|| StoreError::NotFound(store.to_string()))?;

        f(object_store)
    }
}

fn checked_key(key: &Key) -> StoreResult<()> {
    if key.is_valid() {
        Ok(())
    } else {
        Err(StoreError::Data(format!("{} is not a valid key", key)))
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn database(&self) -> &str {
        &self.database
    }

    fn version(&self) -> SchemaVersion {
        self.version
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(db) = self.shared.databases.lock().get_mut(&self.database) {
            db.connections.remove(&self.id);
        }
        self.shared.closed.notify_waiters();

        tracing::debug!(database = %self.database, connection = self.id, "connection closed");
    }

    async fn get(&self, store: &str, key: &Key) -> StoreResult<Option<Value>> {
        checked_key(key)?;
        // Completion is delivered on a later tick, like a request callback.
        tokio::task::yield_now().await;
        self.transact(store, |s| Ok(s.records.get(key).cloned()))
    }

    async fn get_all(&self, store: &str) -> StoreResult<Vec<Value>> {
        tokio::task::yield_now().await;
        self.transact(store, |s| Ok(s.records.values().cloned().collect()))
    }

    async fn add(&self, store: &str, record: Value) -> StoreResult<Key> {
        tokio::task::yield_now().await;
        self.transact(store, |s| {
            let key = s.key_of(&record)?;
            if s.records.contains_key(&key) {
                return Err(StoreError::Constraint {
                    store: store.to_string(),
                    key,
                });
            }
            s.records.insert(key.clone(), record);
            Ok(key)
        })
    }

    async fn put(&self, store: &str, record: Value) -> StoreResult<Key> {
        tokio::task::yield_now().await;
        self.transact(store, |s| {
            let key = s.key_of(&record)?;
            s.records.insert(key.clone(), record);
            Ok(key)
        })
    }

    async fn delete(&self, store: &str, key: &Key) -> StoreResult<()> {
        checked_key(key)?;
        tokio::task::yield_now().await;
        self.transact(store, |s| {
            s.records.remove(key);
            Ok(())
        })
    }

    async fn clear(&self, store: &str) -> StoreResult<()> {
        tokio::task::yield_now().await;
        self.transact(store, |s| {
            s.records.clear();
            Ok(())
        })
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.close();
    }
}
