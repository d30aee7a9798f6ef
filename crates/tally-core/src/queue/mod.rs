//! Durable, ordered queue of pending mutation commands.
//!
//! The whole queue lives in a single persisted value. Every mutation reads
//! the full sequence before writing it back, so clones of one queue share a
//! write lock that serialises those passes. Separate queues over the same
//! store do not coordinate.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::{CommandId, MutationCommand};
use crate::storage::KeyValueStore;

/// Key under which the ordered command list is persisted
pub const QUEUE_KEY: &str = "app_sync_queue";

#[derive(Debug, Clone)]
pub struct MutationQueue<S: KeyValueStore> {
    store: S,
    write_lock: Arc<Mutex<()>>,
}

impl<S: KeyValueStore> MutationQueue<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// All pending commands in delivery order; empty when nothing was persisted
    pub async fn read_all(&self) -> Result<Vec<MutationCommand>> {
        match self.store.get(QUEUE_KEY).await? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    /// Add a command at the tail
    pub async fn append(&self, command: MutationCommand) -> Result<()> {
        let _write = self.write_lock.lock().await;
        let mut queue = self.read_all().await?;
        tracing::debug!(
            command_id = %command.id,
            kind = %command.kind(),
            entity_id = %command.entity_id,
            position = queue.len(),
            "Queued mutation"
        );
        queue.push(command);
        self.save(&queue).await
    }

    /// Drop the command with `id`; absent ids leave the queue untouched
    pub async fn remove_by_id(&self, id: &CommandId) -> Result<()> {
        let _write = self.write_lock.lock().await;
        let queue = self.read_all().await?;
        let before = queue.len();
        let remaining: Vec<MutationCommand> = queue
            .into_iter()
            .filter(|command| command.id != *id)
            .collect();
        if remaining.len() == before {
            return Ok(());
        }
        self.save(&remaining).await
    }

    /// Delete the persisted queue entirely
    pub async fn clear(&self) -> Result<()> {
        let _write = self.write_lock.lock().await;
        self.store.remove(QUEUE_KEY).await
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.read_all().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    async fn save(&self, queue: &[MutationCommand]) -> Result<()> {
        let raw = serde_json::to_string(queue)?;
        self.store.set(QUEUE_KEY, &raw).await
    }
}
