//! Records: caller-owned values the cache stores as JSON.
//!
//! The cache never looks inside a record beyond its key path.

use crate::{error::StoreResult, StoreError};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// Anything that can be stored in and read back from a cached store.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Record for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

pub(crate) fn encode<T: Record>(record: &T) -> StoreResult<Value> {
    serde_json::to_value(record).map_err(|e| StoreError::Data(e.to_string()))
}

pub(crate) fn decode<T: Record>(value: Value) -> StoreResult<T> {
    serde_json::from_value(value).map_err(|e| StoreError::Data(e.to_string()))
}

pub(crate) fn decode_all<T: Record>(values: Vec<Value>) -> StoreResult<Vec<T>> {
    values.into_iter().map(decode).collect()
}
