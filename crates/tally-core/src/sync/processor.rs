use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{CommandExecutor, Connectivity, SessionTerminator, SyncTrigger};
use crate::http::{ApiError, ErrorClass};
use crate::models::MutationCommand;
use crate::queue::MutationQueue;
use crate::state::{SyncState, SyncStatus};
use crate::storage::KeyValueStore;
use crate::util::unix_timestamp_millis;

/// How a drain ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Another drain held the flag; nothing was done
    AlreadyRunning,
    /// No connectivity; the queue was not read
    Offline,
    /// The queue was empty when read
    Empty,
    /// Every command was delivered or discarded
    Completed,
    /// A timeout, transport or server failure stopped the drain
    Deferred,
    /// The server rejected the session; the local session was ended
    SessionExpired,
    /// The queue could not be read or rewritten
    StorageFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub outcome: DrainOutcome,
    pub delivered: usize,
    pub discarded: usize,
}

impl DrainReport {
    const fn new(outcome: DrainOutcome) -> Self {
        Self {
            outcome,
            delivered: 0,
            discarded: 0,
        }
    }
}

/// Clears the drain flag when dropped, including when the drain task is
/// cancelled mid-flight.
struct DrainGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> DrainGuard<'a> {
    fn acquire(running: &'a AtomicBool) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { running })
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy)]
struct Progress {
    state: SyncState,
    last_synced_at: Option<i64>,
}

/// Replays queued mutations in order.
///
/// At most one drain runs per processor; overlapping [`trigger`](Self::trigger)
/// calls return immediately. Per failed command:
///
/// * 401: stop, keep this and later commands, end the local session
/// * other 4xx: discard the command and continue
/// * timeout, transport failure, 5xx: stop and keep everything remaining
pub struct SyncProcessor<S, X, N, L>
where
    S: KeyValueStore,
    X: CommandExecutor,
    N: Connectivity,
    L: SessionTerminator,
{
    inner: Arc<ProcessorInner<S, X, N, L>>,
}

struct ProcessorInner<S: KeyValueStore, X, N, L> {
    queue: MutationQueue<S>,
    executor: X,
    connectivity: N,
    session: L,
    running: AtomicBool,
    progress: Mutex<Progress>,
}

impl<S, X, N, L> Clone for SyncProcessor<S, X, N, L>
where
    S: KeyValueStore,
    X: CommandExecutor,
    N: Connectivity,
    L: SessionTerminator,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

enum Step {
    Delivered,
    Discarded,
    Stop(DrainOutcome),
}

impl<S, X, N, L> SyncProcessor<S, X, N, L>
where
    S: KeyValueStore,
    X: CommandExecutor,
    N: Connectivity,
    L: SessionTerminator,
{
    pub fn new(queue: MutationQueue<S>, executor: X, connectivity: N, session: L) -> Self {
        Self {
            inner: Arc::new(ProcessorInner {
                queue,
                executor,
                connectivity,
                session,
                running: AtomicBool::new(false),
                progress: Mutex::new(Progress {
                    state: SyncState::Idle,
                    last_synced_at: None,
                }),
            }),
        }
    }

    pub fn queue(&self) -> &MutationQueue<S> {
        &self.inner.queue
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Drain the queue. Safe to call at any time and from any number of
    /// tasks; only one drain proceeds.
    ///
    /// Commands appended while a pass is running are picked up by a further
    /// pass once the current one has delivered everything it read.
    pub async fn trigger(&self) -> DrainReport {
        let Some(_guard) = DrainGuard::acquire(&self.inner.running) else {
            tracing::debug!("Drain already running");
            return DrainReport::new(DrainOutcome::AlreadyRunning);
        };

        if !self.inner.connectivity.is_online().await {
            tracing::debug!("Offline; keeping queued commands");
            self.record(SyncState::Offline, false);
            return DrainReport::new(DrainOutcome::Offline);
        }

        self.record(SyncState::Syncing, false);
        let mut report = DrainReport::new(DrainOutcome::Empty);
        loop {
            let commands = match self.inner.queue.read_all().await {
                Ok(commands) => commands,
                Err(error) => {
                    tracing::error!("Failed to read sync queue: {}", error);
                    report.outcome = DrainOutcome::StorageFailed;
                    break;
                }
            };
            if commands.is_empty() {
                break;
            }

            tracing::info!(pending = commands.len(), "Replaying queued commands");
            report.outcome = DrainOutcome::Completed;
            for command in &commands {
                match self.replay(command).await {
                    Step::Delivered => report.delivered += 1,
                    Step::Discarded => report.discarded += 1,
                    Step::Stop(outcome) => {
                        report.outcome = outcome;
                        break;
                    }
                }
            }
            if report.outcome != DrainOutcome::Completed {
                break;
            }
        }

        match report.outcome {
            DrainOutcome::Empty | DrainOutcome::Completed => self.record(SyncState::Idle, true),
            _ => self.record(SyncState::Error, false),
        }
        tracing::info!(
            outcome = ?report.outcome,
            delivered = report.delivered,
            discarded = report.discarded,
            "Drain finished"
        );
        report
    }

    /// Send a single command through the executor without touching the queue
    pub async fn execute_one(&self, command: &MutationCommand) -> Result<Value, ApiError> {
        self.inner.executor.execute(command).await
    }

    async fn replay(&self, command: &MutationCommand) -> Step {
        tracing::debug!(
            command_id = %command.id,
            kind = %command.kind(),
            entity_id = %command.entity_id,
            "Replaying command"
        );
        let step = match self.execute_one(command).await {
            Ok(_) => Step::Delivered,
            Err(error) => match error.class() {
                ErrorClass::Unauthorized => {
                    tracing::warn!(
                        command_id = %command.id,
                        "Session expired; keeping queued commands for the next sign-in"
                    );
                    self.inner.session.force_logout().await;
                    return Step::Stop(DrainOutcome::SessionExpired);
                }
                ErrorClass::Client => {
                    tracing::warn!(
                        command_id = %command.id,
                        kind = %command.kind(),
                        status = error.status(),
                        "Discarding rejected command: {}",
                        error.message()
                    );
                    Step::Discarded
                }
                ErrorClass::Timeout | ErrorClass::Transport | ErrorClass::Server => {
                    tracing::info!(
                        command_id = %command.id,
                        status = error.status(),
                        "Deferring remaining commands: {}",
                        error.message()
                    );
                    return Step::Stop(DrainOutcome::Deferred);
                }
            },
        };

        if let Err(error) = self.inner.queue.remove_by_id(&command.id).await {
            tracing::error!(command_id = %command.id, "Failed to remove replayed command: {}", error);
            return Step::Stop(DrainOutcome::StorageFailed);
        }
        step
    }

    fn record(&self, state: SyncState, synced: bool) {
        let mut progress = self
            .inner
            .progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        progress.state = state;
        if synced {
            progress.last_synced_at = Some(unix_timestamp_millis());
        }
    }

    /// Current state, last successful drain and queue length
    pub async fn status(&self) -> SyncStatus {
        let progress = *self
            .inner
            .progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let queue_length = match self.inner.queue.len().await {
            Ok(length) => length,
            Err(error) => {
                tracing::warn!("Failed to read sync queue length: {}", error);
                0
            }
        };
        let state = if self.is_running() {
            SyncState::Syncing
        } else {
            progress.state
        };
        SyncStatus {
            state,
            last_synced_at: progress.last_synced_at,
            queue_length,
        }
    }

    /// Run a drain on the current runtime without waiting for it
    pub fn schedule(&self) -> Option<JoinHandle<DrainReport>> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime; drain not scheduled");
            return None;
        };
        let processor = self.clone();
        Some(runtime.spawn(async move { processor.trigger().await }))
    }

    /// Drain whenever the watched connectivity goes from offline to online
    pub fn spawn_connectivity_listener(&self, mut online: watch::Receiver<bool>) -> JoinHandle<()> {
        let processor = self.clone();
        let mut was_online = *online.borrow_and_update();
        tokio::spawn(async move {
            while online.changed().await.is_ok() {
                let is_online = *online.borrow_and_update();
                if is_online && !was_online {
                    tracing::info!("Connectivity restored; draining queue");
                    processor.trigger().await;
                }
                was_online = is_online;
            }
        })
    }
}

impl<S, X, N, L> SyncTrigger for SyncProcessor<S, X, N, L>
where
    S: KeyValueStore,
    X: CommandExecutor,
    N: Connectivity,
    L: SessionTerminator,
{
    fn request_sync(&self) {
        let _ = self.schedule();
    }
}
