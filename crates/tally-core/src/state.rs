//! Shared sync state types.

use serde::Serialize;

/// Coarse state of the sync engine, suitable for a status indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Syncing,
    Offline,
    Error,
}

/// Point-in-time view of the sync engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub state: SyncState,
    /// Unix ms of the last drain that emptied the queue.
    pub last_synced_at: Option<i64>,
    pub queue_length: usize,
}
