//! The synchronized collection cache.
//!
//! A [`SyncedCollection`] owns at most one connection to a backend store and
//! keeps a mirror of that store's full contents. Writes go to the backend
//! first; only after the backend has committed does the cache rescan the
//! store and replace the mirror, so the mirror never shows uncommitted data.
//!
//! # Concurrency
//!
//! Operations are not serialized against each other. Each mutation commits
//! on its own and then refreshes the mirror. Refreshes run one at a time
//! (scan and publish happen under one lock), so when several mutations
//! finish concurrently the mirror shows the scan that ran last. That scan
//! started after every commit that had completed before it, so once all
//! in-flight mutations have resolved the mirror equals the store: last write
//! wins.
//!
//! # Lifecycle
//!
//! Every open and teardown bumps a generation counter. Work started under an
//! older generation (a refresh racing a teardown, an open racing a reopen)
//! is discarded instead of published, so observers never see data from a
//! previous connection.

use crate::backend::{Backend, Connection, UpgradeHook, UpgradeTransaction, VersionChangeReceiver};
use crate::record::{decode, decode_all, encode};
use crate::state::{CacheState, ConnectionStatus, LifecycleEvent};
use crate::{
    error::Result, CacheOptions, CollectionIdentity, Error, Generation, Key, MemoryBackend,
    Operation, ReadPolicy, Record, SchemaVersion, StoreError, StoreName,
};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Connection-owning state guarded by one lock.
struct Slot<C> {
    connection: Option<Arc<C>>,
    /// Store the live connection was opened for.
    store: StoreName,
    generation: Generation,
    listener: Option<JoinHandle<()>>,
}

impl<C: Connection> Slot<C> {
    /// Close and forget the connection and its version-change listener.
    fn release(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

/// Everything an operation needs from the live connection.
struct Live<C> {
    connection: Arc<C>,
    store: StoreName,
    generation: Generation,
}

struct Inner<T, B: Backend> {
    backend: B,
    options: CacheOptions,
    identity: Mutex<CollectionIdentity>,
    slot: Mutex<Slot<B::Connection>>,
    state: watch::Sender<CacheState<T>>,
    refresh_lock: tokio::sync::Mutex<()>,
}

/// A reactive mirror of one store of a versioned key-value backend.
///
/// Dropping the cache tears it down.
pub struct SyncedCollection<T, B: Backend = MemoryBackend> {
    inner: Arc<Inner<T, B>>,
}

impl<T: Record, B: Backend> SyncedCollection<T, B> {
    /// Create a closed cache. Call [`open`](Self::open) to connect.
    pub fn new(backend: B, identity: CollectionIdentity) -> Self {
        Self::with_options(backend, identity, CacheOptions::default())
    }

    pub fn with_options(backend: B, identity: CollectionIdentity, options: CacheOptions) -> Self {
        let (state, _) = watch::channel(CacheState::default());
        let store = identity.store.clone();

        Self {
            inner: Arc::new(Inner {
                backend,
                options,
                identity: Mutex::new(identity),
                slot: Mutex::new(Slot {
                    connection: None,
                    store,
                    generation: 0,
                    listener: None,
                }),
                state,
                refresh_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Create a cache and open it.
    ///
    /// Always returns the cache; an open failure is left in
    /// [`error`](Self::error) with [`is_ready`](Self::is_ready) false.
    pub async fn connect(backend: B, identity: CollectionIdentity) -> Self {
        let cache = Self::new(backend, identity);
        if let Err(error) = cache.open().await {
            tracing::debug!(error = %error, "initial open failed");
        }
        cache
    }

    /// Open the configured store, replacing any current connection.
    ///
    /// On success the cache is ready, its error slot is clear and the mirror
    /// holds a full scan of the store.
    pub async fn open(&self) -> Result<()> {
        self.inner.open().await
    }

    /// Close the connection. The error slot and the mirror are kept.
    pub fn close(&self) {
        self.inner.teardown();
    }

    /// Point the cache at another store: tear down, then open with `identity`.
    pub async fn reconfigure(&self, identity: CollectionIdentity) -> Result<()> {
        {
            let mut current = self.inner.identity.lock();
            if *current == identity && self.is_ready() {
                return Ok(());
            }
            *current = identity;
        }
        self.inner.open().await
    }

    pub fn identity(&self) -> CollectionIdentity {
        self.inner.identity.lock().clone()
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Current observable state.
    pub fn state(&self) -> CacheState<T> {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every change of the observable state.
    pub fn subscribe(&self) -> watch::Receiver<CacheState<T>> {
        self.inner.state.subscribe()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.borrow().status
    }

    pub fn is_ready(&self) -> bool {
        self.inner.state.borrow().is_ready()
    }

    pub fn error(&self) -> Option<Error> {
        self.inner.state.borrow().error.clone()
    }

    /// The mirror as of the last refresh.
    pub fn data(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.inner.state.borrow().data)
    }

    /// Insert a record. Fails if a record with the same key exists.
    pub async fn add(&self, record: &T) -> Result<()> {
        let live = self.inner.live()?;
        let value = encode(record).map_err(|source| Error::OperationFailed {
            operation: Operation::Add,
            source,
        })?;

        live.connection
            .add(&live.store, value)
            .await
            .map_err(|e| Error::from_store(Operation::Add, e))?;

        self.inner.refresh(Operation::Add, &live).await.map(|_| ())
    }

    /// Read one record straight from the store.
    ///
    /// An absent key is `Ok(None)`, not an error.
    pub async fn get(&self, key: impl Into<Key>) -> Result<Option<T>> {
        let key = key.into();
        let live = self.inner.live()?;

        let value = live
            .connection
            .get(&live.store, &key)
            .await
            .map_err(|e| Error::from_store(Operation::Get, e))?;

        value
            .map(decode::<T>)
            .transpose()
            .map_err(|source| Error::OperationFailed {
                operation: Operation::Get,
                source,
            })
    }

    /// Every record of the store.
    ///
    /// With [`ReadPolicy::Cached`] this is the mirror; with
    /// [`ReadPolicy::Fresh`] the store is rescanned and the mirror replaced
    /// first.
    pub async fn get_all(&self) -> Result<Arc<Vec<T>>> {
        let live = self.inner.live()?;

        match self.inner.options.read_policy {
            ReadPolicy::Cached => Ok(self.data()),
            ReadPolicy::Fresh => self.inner.refresh(Operation::GetAll, &live).await,
        }
    }

    /// Insert or overwrite a record by key.
    pub async fn put(&self, record: &T) -> Result<()> {
        let live = self.inner.live()?;
        let value = encode(record).map_err(|source| Error::OperationFailed {
            operation: Operation::Put,
            source,
        })?;

        live.connection
            .put(&live.store, value)
            .await
            .map_err(|e| Error::from_store(Operation::Put, e))?;

        self.inner.refresh(Operation::Put, &live).await.map(|_| ())
    }

    /// Delete a record. Removing an absent key succeeds.
    pub async fn remove(&self, key: impl Into<Key>) -> Result<()> {
        let key = key.into();
        let live = self.inner.live()?;

        live.connection
            .delete(&live.store, &key)
            .await
            .map_err(|e| Error::from_store(Operation::Remove, e))?;

        self.inner.refresh(Operation::Remove, &live).await.map(|_| ())
    }

    /// Delete every record.
    pub async fn clear(&self) -> Result<()> {
        let live = self.inner.live()?;

        live.connection
            .clear(&live.store)
            .await
            .map_err(|e| Error::from_store(Operation::Clear, e))?;

        self.inner.refresh(Operation::Clear, &live).await.map(|_| ())
    }
}

impl<T, B: Backend> Drop for SyncedCollection<T, B> {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl<T, B: Backend> std::fmt::Debug for SyncedCollection<T, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("SyncedCollection")
            .field("identity", &*self.inner.identity.lock())
            .field("status", &state.status)
            .field("records", &state.data.len())
            .finish()
    }
}

impl<T: Record, B: Backend> Inner<T, B> {
    fn live(&self) -> Result<Live<B::Connection>> {
        let slot = self.slot.lock();
        if !self.state.borrow().is_ready() {
            return Err(Error::NotInitialized);
        }
        match &slot.connection {
            Some(connection) if !connection.is_closed() => Ok(Live {
                connection: Arc::clone(connection),
                store: slot.store.clone(),
                generation: slot.generation,
            }),
            _ => Err(Error::NotInitialized),
        }
    }

    async fn open(self: &Arc<Self>) -> Result<()> {
        let identity = self.identity.lock().clone();

        let generation = {
            let mut slot = self.slot.lock();
            slot.release();
            slot.generation += 1;
            slot.store = identity.store.clone();
            let generation = slot.generation;

            self.state.send_modify(|state| {
                state.advance(LifecycleEvent::OpenRequested);
                state.data = Arc::new(Vec::new());
                state.generation = generation;
            });
            generation
        };

        tracing::debug!(
            database = %identity.database,
            store = %identity.store,
            version = identity.version,
            generation,
            "opening store"
        );

        if let Err(source) = identity.validate() {
            return self.fail_open(generation, source);
        }

        let store = identity.store.clone();
        let key_path = self.options.key_path.clone();
        let upgrade: UpgradeHook<'_> = Box::new(move |tx: &mut dyn UpgradeTransaction| {
            if !tx.contains_store(&store) {
                tx.create_store(&store, key_path)?;
            }
            Ok(())
        });

        let opened = match self
            .backend
            .open(&identity.database, identity.version, upgrade)
            .await
        {
            Ok(opened) => opened,
            Err(source) => return self.fail_open(generation, source),
        };
        let connection = Arc::new(opened.connection);

        {
            let mut slot = self.slot.lock();
            if slot.generation != generation {
                // Torn down or reopened while the backend was opening.
                connection.close();
                return Err(Error::NotInitialized);
            }

            slot.connection = Some(Arc::clone(&connection));
            slot.listener = Some(tokio::spawn(listen_for_version_change(
                Arc::downgrade(self),
                generation,
                opened.version_changes,
            )));
        }

        let live = Live {
            connection,
            store: identity.store.clone(),
            generation,
        };
        match self.refresh(Operation::GetAll, &live).await {
            Ok(_) => {}
            // A version change or teardown won the race; state already says so.
            Err(Error::NotInitialized) => return Err(self.interrupted()),
            Err(e) => {
                let source = e
                    .store_error()
                    .cloned()
                    .unwrap_or_else(|| StoreError::Aborted(e.to_string()));
                self.abandon(generation);
                return self.fail_open(generation, source);
            }
        }

        {
            let slot = self.slot.lock();
            if slot.generation != generation || slot.connection.is_none() {
                return Err(self.interrupted());
            }
            self.state.send_modify(|state| {
                state.advance(LifecycleEvent::OpenSucceeded);
                state.error = None;
            });
        }

        tracing::info!(
            database = %identity.database,
            store = %identity.store,
            version = identity.version,
            generation,
            "store ready"
        );
        Ok(())
    }

    /// The error an open reports when something else ended its connection.
    fn interrupted(&self) -> Error {
        match self.state.borrow().status {
            ConnectionStatus::Conflicted => Error::VersionConflict,
            _ => Error::NotInitialized,
        }
    }

    /// Drop the connection of `generation` without touching the status.
    fn abandon(&self, generation: Generation) {
        let mut slot = self.slot.lock();
        if slot.generation == generation {
            slot.release();
        }
    }

    fn fail_open(&self, generation: Generation, source: StoreError) -> Result<()> {
        let error = Error::OpenFailed(source);
        let slot = self.slot.lock();

        if slot.generation == generation {
            self.state.send_modify(|state| {
                state.advance(LifecycleEvent::OpenFailed);
                state.error = Some(error.clone());
            });
        }
        drop(slot);

        tracing::warn!(error = %error, generation, "open failed");
        Err(error)
    }

    /// Rescan the store and publish the result as the mirror.
    ///
    /// Fails with `NotInitialized` if the connection that `live` describes is
    /// no longer current by the time the scan finishes.
    async fn refresh(&self, operation: Operation, live: &Live<B::Connection>) -> Result<Arc<Vec<T>>> {
        let _guard = self.refresh_lock.lock().await;

        let values = live
            .connection
            .get_all(&live.store)
            .await
            .map_err(|e| Error::from_store(operation, e))?;
        let records = Arc::new(decode_all::<T>(values).map_err(|source| {
            tracing::warn!(store = %live.store, error = %source, "mirror refresh failed");
            Error::OperationFailed { operation, source }
        })?);

        let slot = self.slot.lock();
        if slot.generation != live.generation || slot.connection.is_none() {
            return Err(Error::NotInitialized);
        }
        self.state.send_modify(|state| {
            state.data = Arc::clone(&records);
        });
        drop(slot);

        tracing::debug!(
            store = %live.store,
            operation = operation.name(),
            records = records.len(),
            generation = live.generation,
            "mirror refreshed"
        );

        Ok(records)
    }
}

impl<T, B: Backend> Inner<T, B> {
    fn on_version_change(
        &self,
        generation: Generation,
        old_version: SchemaVersion,
        new_version: Option<SchemaVersion>,
    ) {
        let mut slot = self.slot.lock();
        if slot.generation != generation || slot.connection.is_none() {
            return;
        }

        if let Some(connection) = slot.connection.take() {
            connection.close();
        }
        // The listener is the task running this; let it finish on its own.
        slot.listener = None;

        self.state.send_modify(|state| {
            state.advance(LifecycleEvent::VersionChanged);
            state.error = Some(Error::VersionConflict);
        });
        drop(slot);

        tracing::warn!(
            old_version,
            new_version = ?new_version,
            generation,
            "database changed by another connection; closed"
        );
    }

    fn teardown(&self) {
        let mut slot = self.slot.lock();
        let had_connection = slot.connection.is_some();
        slot.release();
        slot.generation += 1;
        let generation = slot.generation;

        self.state.send_modify(|state| {
            state.advance(LifecycleEvent::TornDown);
            state.generation = generation;
        });
        drop(slot);

        if had_connection {
            tracing::info!(generation, "store closed");
        }
    }
}

async fn listen_for_version_change<T: Record, B: Backend>(
    inner: Weak<Inner<T, B>>,
    generation: Generation,
    mut changes: VersionChangeReceiver,
) {
    // `None` means the connection closed before anyone asked for a change.
    let Some(change) = changes.recv().await else {
        return;
    };
    if let Some(inner) = inner.upgrade() {
        inner.on_version_change(generation, change.old_version, change.new_version);
    }
}
