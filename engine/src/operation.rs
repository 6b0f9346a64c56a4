//! The operations a cache exposes, used to label errors and log lines.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An operation against the cached store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Add,
    Get,
    GetAll,
    Put,
    Remove,
    Clear,
}

impl Operation {
    /// Whether the operation writes to the store (and so refreshes the mirror).
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            Operation::Add | Operation::Put | Operation::Remove | Operation::Clear
        )
    }

    /// Short name used in log fields.
    pub fn name(self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Get => "get",
            Operation::GetAll => "getAll",
            Operation::Put => "put",
            Operation::Remove => "remove",
            Operation::Clear => "clear",
        }
    }
}

/// Human-readable phrase completing "Failed to ...".
impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phrase = match self {
            Operation::Add => "add item",
            Operation::Get => "get item",
            Operation::GetAll => "get items",
            Operation::Put => "update item",
            Operation::Remove => "delete item",
            Operation::Clear => "clear store",
        };
        f.write_str(phrase)
    }
}
