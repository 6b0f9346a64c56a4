//! Snapshot types for persisting and restoring backend state.
//!
//! Snapshots are the bridge between the in-memory backend and durable
//! storage. They use `BTreeMap` so serialization is deterministic.

use crate::{error::StoreResult, DatabaseName, KeyPath, SchemaVersion, StoreError, StoreName};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Records of one store, in key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Key path the store was created with
    pub key_path: KeyPath,
    /// Full records; keys are re-derived from `key_path` on restore
    pub records: Vec<Value>,
}

/// One database at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSnapshot {
    /// Schema version of the database
    pub version: SchemaVersion,
    /// Stores by name
    pub stores: BTreeMap<StoreName, StoreSnapshot>,
}

impl DatabaseSnapshot {
    pub fn new(version: SchemaVersion) -> Self {
        Self {
            version,
            stores: BTreeMap::new(),
        }
    }
}

/// A point-in-time snapshot of every database in a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Databases by name
    pub databases: BTreeMap<DatabaseName, DatabaseSnapshot>,
}

impl Default for BackendSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendSnapshot {
    /// Create a new empty snapshot.
    pub fn new() -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            databases: BTreeMap::new(),
        }
    }

    /// Get the records of one store.
    pub fn get_store(&self, database: &str, store: &str) -> Option<&StoreSnapshot> {
        self.databases.get(database)?.stores.get(store)
    }

    /// Count records across all databases and stores.
    pub fn record_count(&self) -> usize {
        self.databases
            .values()
            .flat_map(|db| db.stores.values())
            .map(|store| store.records.len())
            .sum()
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> StoreResult<String> {
        serde_json::to_string(self).map_err(|e| StoreError::InvalidSnapshot(e.to_string()))
    }

    /// Serialize to pretty JSON with deterministic ordering.
    pub fn to_json_pretty(&self) -> StoreResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| StoreError::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| StoreError::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(StoreError::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        Ok(snapshot)
    }
}

/// Metadata about a snapshot (without the full data).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub format_version: u32,
    pub database_count: usize,
    pub store_count: usize,
    pub record_count: usize,
}

impl From<&BackendSnapshot> for SnapshotMetadata {
    fn from(snapshot: &BackendSnapshot) -> Self {
        Self {
            format_version: snapshot.format_version,
            database_count: snapshot.databases.len(),
            store_count: snapshot.databases.values().map(|db| db.stores.len()).sum(),
            record_count: snapshot.record_count(),
        }
    }
}
