//! Error types for the Shelf engine.
//!
//! Two layers: [`StoreError`] is what a backend reports for a single call,
//! [`Error`] is what the cache surfaces to its caller or its error slot.

use crate::{Key, Operation, SchemaVersion};
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Message reported when another actor upgrades or deletes the database.
pub const VERSION_CONFLICT_MESSAGE: &str = "Database was updated in another window";

/// Message reported when an operation runs without a live connection.
pub const NOT_INITIALIZED_MESSAGE: &str = "Database not initialized";

/// Failures reported by a storage backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Unique key violated by an insert.
    #[error("a record with key {key} already exists in '{store}'")]
    Constraint { store: String, key: Key },

    /// Missing or invalid key, version or payload.
    #[error("invalid data: {0}")]
    Data(String),

    #[error("requested version {requested} is lower than the existing version {current}")]
    Version {
        requested: SchemaVersion,
        current: SchemaVersion,
    },

    #[error("open of '{database}' blocked by connections that did not close")]
    Blocked { database: String },

    #[error("object store not found: {0}")]
    NotFound(String),

    /// The connection is closed or closing.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("transaction aborted: {0}")]
    Aborted(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Result type for backend calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Classification of a cache error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    OpenFailed,
    VersionConflict,
    NotInitialized,
    OperationFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::OpenFailed => write!(f, "OpenFailed"),
            ErrorKind::VersionConflict => write!(f, "VersionConflict"),
            ErrorKind::NotInitialized => write!(f, "NotInitialized"),
            ErrorKind::OperationFailed => write!(f, "OperationFailed"),
        }
    }
}

/// All errors surfaced by a [`SyncedCollection`](crate::SyncedCollection).
///
/// `OpenFailed` and `VersionConflict` end the connection and are kept in the
/// cache's error slot. `NotInitialized` and `OperationFailed` are local to the
/// call that produced them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Failed to open database: {0}")]
    OpenFailed(#[source] StoreError),

    #[error("{}", VERSION_CONFLICT_MESSAGE)]
    VersionConflict,

    #[error("{}", NOT_INITIALIZED_MESSAGE)]
    NotInitialized,

    #[error("Failed to {operation}: {source}")]
    OperationFailed {
        operation: Operation,
        source: StoreError,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::OpenFailed(_) => ErrorKind::OpenFailed,
            Error::VersionConflict => ErrorKind::VersionConflict,
            Error::NotInitialized => ErrorKind::NotInitialized,
            Error::OperationFailed { .. } => ErrorKind::OperationFailed,
        }
    }

    /// The backend failure behind this error, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Error::OpenFailed(source) | Error::OperationFailed { source, .. } => Some(source),
            Error::VersionConflict | Error::NotInitialized => None,
        }
    }

    /// Map a backend failure of `operation` into a cache error.
    ///
    /// A closed connection means the operation lost a race with teardown or a
    /// version change, which callers see as `NotInitialized`.
    pub(crate) fn from_store(operation: Operation, source: StoreError) -> Self {
        match source {
            StoreError::InvalidState(_) => Error::NotInitialized,
            source => Error::OperationFailed { operation, source },
        }
    }
}

/// Errors serialize as `{ "kind": ..., "message": ... }` for observers.
impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Error", 2)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;
