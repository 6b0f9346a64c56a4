//! Connection lifecycle state machine and the observable cache state.

use crate::{Error, Generation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where a cache's connection is in its lifecycle.
///
/// ```text
///            OpenRequested               OpenSucceeded
///  Closed ─────────────────▶ Opening ─────────────────▶ Ready
///    ▲                          │                         │
///    │                          │ OpenFailed              │ VersionChanged
///    │ TornDown                 ▼                         ▼
///    └──────────────────────  Failed                 Conflicted
/// ```
///
/// `OpenRequested` and `TornDown` are accepted from every state.
/// `VersionChanged` also applies while `Opening`, since the connection
/// exists before the first mirror load finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionStatus {
    #[default]
    Closed,
    Opening,
    Ready,
    Conflicted,
    Failed,
}

/// Inputs of the lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    OpenRequested,
    OpenSucceeded,
    OpenFailed,
    VersionChanged,
    TornDown,
}

impl ConnectionStatus {
    pub fn is_ready(self) -> bool {
        self == ConnectionStatus::Ready
    }

    /// The state reached from `self` on `event`, or `None` if the event is
    /// not valid here.
    pub fn next(self, event: LifecycleEvent) -> Option<ConnectionStatus> {
        use ConnectionStatus::*;
        use LifecycleEvent::*;

        match (self, event) {
            (_, OpenRequested) => Some(Opening),
            (_, TornDown) => Some(Closed),
            (Opening, OpenSucceeded) => Some(Ready),
            (Opening, LifecycleEvent::OpenFailed) => Some(Failed),
            (Opening | Ready, VersionChanged) => Some(Conflicted),
            _ => None,
        }
    }
}

/// Snapshot of everything a cache exposes to observers.
#[derive(Debug, Clone)]
pub struct CacheState<T> {
    pub status: ConnectionStatus,
    /// Last lifecycle error; cleared only by a successful open.
    pub error: Option<Error>,
    /// The mirror: every record of the store as of the last refresh.
    pub data: Arc<Vec<T>>,
    /// Bumped on every open and teardown.
    pub generation: Generation,
}

impl<T> Default for CacheState<T> {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Closed,
            error: None,
            data: Arc::new(Vec::new()),
            generation: 0,
        }
    }
}

impl<T> CacheState<T> {
    pub fn is_ready(&self) -> bool {
        self.status.is_ready()
    }

    /// Apply a lifecycle event. Invalid events leave the status unchanged.
    pub(crate) fn advance(&mut self, event: LifecycleEvent) {
        match self.status.next(event) {
            Some(next) => self.status = next,
            None => {
                tracing::debug!(status = ?self.status, ?event, "ignored lifecycle event");
            }
        }
    }
}
