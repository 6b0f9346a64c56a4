//! Cache configuration: which store to mirror and how.

use crate::{DatabaseName, KeyPath, SchemaVersion, StoreError, StoreName};
use serde::{Deserialize, Serialize};

/// Identifies the store a cache mirrors.
///
/// Handed to the cache once. Changing it goes through
/// [`SyncedCollection::reconfigure`](crate::SyncedCollection::reconfigure),
/// which tears down the old connection first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionIdentity {
    /// Database name
    #[serde(rename = "dbName")]
    pub database: DatabaseName,
    /// Schema version requested on open (>= 1)
    pub version: SchemaVersion,
    /// Store (table) inside the database
    #[serde(rename = "storeName")]
    pub store: StoreName,
}

impl CollectionIdentity {
    pub fn new(
        database: impl Into<DatabaseName>,
        version: SchemaVersion,
        store: impl Into<StoreName>,
    ) -> Self {
        Self {
            database: database.into(),
            version,
            store: store.into(),
        }
    }

    /// Check the identity before any backend call is made.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.database.is_empty() {
            return Err(StoreError::Data("database name must not be empty".into()));
        }
        if self.store.is_empty() {
            return Err(StoreError::Data("store name must not be empty".into()));
        }
        if self.version == 0 {
            return Err(StoreError::Data("schema version must be at least 1".into()));
        }
        Ok(())
    }
}

/// How [`SyncedCollection::get_all`](crate::SyncedCollection::get_all) answers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadPolicy {
    /// Return the mirror as last refreshed.
    #[default]
    Cached,
    /// Rescan the store, publish the result as the new mirror, return it.
    Fresh,
}

/// Options that are not part of the store's identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheOptions {
    /// Field holding each record's key. Used when the store is created.
    pub key_path: KeyPath,
    pub read_policy: ReadPolicy,
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_path(mut self, key_path: impl Into<KeyPath>) -> Self {
        self.key_path = key_path.into();
        self
    }

    pub fn with_read_policy(mut self, read_policy: ReadPolicy) -> Self {
        self.read_policy = read_policy;
        self
    }
}
