//! Local reconciliation layer.
//!
//! [`CounterStore`] owns the local view of counters. Every user action is
//! applied to the view first and persisted; for signed-in users the matching
//! command is then queued and a drain requested. Queue and drain failures are
//! logged and never fail the action. A failed local write restores the view
//! captured before the action.

mod events;

use std::sync::{PoisonError, RwLock};

use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{
    Counter, CounterId, CounterKind, CounterPatch, IncrementPayload, Mutation, MutationCommand,
    GUEST_OWNER_ID,
};
use crate::queue::MutationQueue;
use crate::storage::KeyValueStore;
use crate::sync::SyncTrigger;

pub use events::{RemoteEvent, COUNTER_UPDATE_EVENT};

/// Key under which the local counter view is persisted
pub const LOCAL_COUNTERS_KEY: &str = "local_counters";

/// Who local actions are performed as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// No server session; changes stay on this device
    Guest,
    Account { user_id: String },
}

impl Identity {
    pub fn owner_id(&self) -> &str {
        match self {
            Self::Guest => GUEST_OWNER_ID,
            Self::Account { user_id } => user_id,
        }
    }

    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest)
    }
}

pub struct CounterStore<S: KeyValueStore, T: SyncTrigger> {
    store: S,
    queue: MutationQueue<S>,
    trigger: T,
    identity: RwLock<Identity>,
    view: Mutex<Vec<Counter>>,
}

impl<S: KeyValueStore, T: SyncTrigger> CounterStore<S, T> {
    pub fn new(store: S, queue: MutationQueue<S>, trigger: T, identity: Identity) -> Self {
        Self {
            store,
            queue,
            trigger,
            identity: RwLock::new(identity),
            view: Mutex::new(Vec::new()),
        }
    }

    /// Replace the in-memory view with the persisted one
    pub async fn load(&self) -> Result<Vec<Counter>> {
        let counters: Vec<Counter> = match self.store.get(LOCAL_COUNTERS_KEY).await? {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)?,
            _ => Vec::new(),
        };
        self.view.lock().await.clone_from(&counters);
        Ok(counters)
    }

    pub async fn counters(&self) -> Vec<Counter> {
        self.view.lock().await.clone()
    }

    pub async fn get(&self, id: &CounterId) -> Option<Counter> {
        self.view
            .lock()
            .await
            .iter()
            .find(|counter| counter.id == *id)
            .cloned()
    }

    pub fn identity(&self) -> Identity {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_identity(&self, identity: Identity) {
        *self
            .identity
            .write()
            .unwrap_or_else(PoisonError::into_inner) = identity;
    }

    pub async fn create(&self, title: &str, color: Option<&str>) -> Result<Counter> {
        self.reconcile(|view, identity| {
            let counter = Counter::new(title, color, identity.owner_id())?;
            view.push(counter.clone());
            let command = MutationCommand::create(&counter);
            Ok((counter, vec![command]))
        })
        .await
    }

    pub async fn increment(&self, id: &CounterId, amount: i64) -> Result<Counter> {
        if amount == 0 {
            return Err(Error::InvalidInput(
                "Increment amount must not be zero".into(),
            ));
        }
        self.reconcile(|view, _| {
            let counter = find_mut(view, id)?;
            counter.count = counter.count.checked_add(amount).ok_or_else(|| {
                Error::InvalidInput(format!("Counter {id} would overflow"))
            })?;
            let command =
                MutationCommand::new(id.clone(), Mutation::Increment(IncrementPayload { amount }));
            Ok((counter.clone(), vec![command]))
        })
        .await
    }

    pub async fn update(&self, id: &CounterId, patch: CounterPatch) -> Result<Counter> {
        let patch = patch.normalized()?;
        self.reconcile(|view, _| {
            let counter = find_mut(view, id)?;
            patch.apply(counter);
            let command = MutationCommand::new(id.clone(), Mutation::Update(patch));
            Ok((counter.clone(), vec![command]))
        })
        .await
    }

    /// Destroy a counter the user owns
    pub async fn delete(&self, id: &CounterId) -> Result<Counter> {
        self.reconcile(|view, _| {
            let removed = take(view, id)?;
            Ok((removed, vec![MutationCommand::new(id.clone(), Mutation::Delete)]))
        })
        .await
    }

    /// Leave a shared counter; it keeps existing for its other participants
    pub async fn remove_shared(&self, id: &CounterId) -> Result<Counter> {
        self.reconcile(|view, _| {
            let is_shared = find_mut(view, id)?.kind == CounterKind::Shared;
            if !is_shared {
                return Err(Error::InvalidInput(format!(
                    "Counter {id} is not shared; delete it instead"
                )));
            }
            let removed = take(view, id)?;
            Ok((removed, vec![MutationCommand::new(id.clone(), Mutation::Remove)]))
        })
        .await
    }

    /// Merge a realtime event into the view. Only counters already present
    /// are updated; nothing is queued.
    pub async fn apply_remote_event(&self, event: RemoteEvent) -> Result<bool> {
        let RemoteEvent::CounterUpdated(snapshot) = event;
        let mut view = self.view.lock().await;
        let Some(index) = view.iter().position(|counter| counter.id == snapshot.id) else {
            tracing::debug!(counter_id = %snapshot.id, "Realtime update for unknown counter ignored");
            return Ok(false);
        };
        let previous = view.clone();
        view[index].merge_from(&snapshot);
        self.persist_or_restore(&mut view, previous).await?;
        Ok(true)
    }

    /// Re-own every guest counter to `user_id` and queue a `CREATE` for each.
    /// Returns how many counters were handed over.
    pub async fn consolidate_guest_counters(&self, user_id: &str) -> Result<usize> {
        self.set_identity(Identity::Account {
            user_id: user_id.to_string(),
        });
        let handed_over = self
            .reconcile(|view, identity| {
                let commands: Vec<MutationCommand> = view
                    .iter_mut()
                    .filter(|counter| counter.is_guest_owned())
                    .map(|counter| {
                        counter.owner_id = identity.owner_id().to_string();
                        MutationCommand::create(counter)
                    })
                    .collect();
                Ok((commands.len(), commands))
            })
            .await?;
        if handed_over > 0 {
            tracing::info!(count = handed_over, "Consolidated guest counters into account");
        }
        Ok(handed_over)
    }

    /// Adopt the server's list as the local view.
    ///
    /// Skipped while commands are still queued, since the server does not
    /// reflect them yet. Returns whether the view was replaced.
    pub async fn sync_from_remote(&self, remote: Vec<Counter>) -> Result<bool> {
        if self.identity().is_guest() {
            return Ok(false);
        }
        let mut view = self.view.lock().await;
        if !self.queue.is_empty().await? {
            tracing::debug!("Pending commands; keeping local view");
            return Ok(false);
        }
        let previous = std::mem::replace(&mut *view, remote);
        self.persist_or_restore(&mut view, previous).await?;
        Ok(true)
    }

    /// Add or refresh a counter joined through an invite code
    pub async fn apply_joined(&self, counter: Counter) -> Result<()> {
        self.reconcile(|view, _| {
            match view.iter_mut().find(|existing| existing.id == counter.id) {
                Some(existing) => *existing = counter,
                None => view.push(counter),
            }
            Ok(((), Vec::new()))
        })
        .await
    }

    async fn reconcile<R>(
        &self,
        change: impl FnOnce(&mut Vec<Counter>, &Identity) -> Result<(R, Vec<MutationCommand>)>,
    ) -> Result<R> {
        let identity = self.identity();
        let mut view = self.view.lock().await;
        let previous = view.clone();
        let (outcome, commands) = match change(&mut view, &identity) {
            Ok(changed) => changed,
            Err(error) => {
                *view = previous;
                return Err(error);
            }
        };
        self.persist_or_restore(&mut view, previous).await?;

        if identity.is_guest() || commands.is_empty() {
            return Ok(outcome);
        }
        // Queued under the view lock so queue order matches the order
        // actions were applied locally.
        for command in commands {
            let command_id = command.id;
            if let Err(error) = self.queue.append(command).await {
                tracing::error!(%command_id, "Failed to queue mutation: {}", error);
            }
        }
        drop(view);
        self.trigger.request_sync();
        Ok(outcome)
    }

    async fn persist_or_restore(&self, view: &mut Vec<Counter>, previous: Vec<Counter>) -> Result<()> {
        let written = match serde_json::to_string(&*view) {
            Ok(raw) => self.store.set(LOCAL_COUNTERS_KEY, &raw).await,
            Err(error) => Err(error.into()),
        };
        if let Err(error) = written {
            tracing::warn!("Failed to persist local counters; rolling back: {}", error);
            *view = previous;
            return Err(error);
        }
        Ok(())
    }
}

fn find_mut<'a>(view: &'a mut [Counter], id: &CounterId) -> Result<&'a mut Counter> {
    view.iter_mut()
        .find(|counter| counter.id == *id)
        .ok_or_else(|| Error::NotFound(id.to_string()))
}

fn take(view: &mut Vec<Counter>, id: &CounterId) -> Result<Counter> {
    let index = view
        .iter()
        .position(|counter| counter.id == *id)
        .ok_or_else(|| Error::NotFound(id.to_string()))?;
    Ok(view.remove(index))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::MutationKind;
    use crate::storage::MemoryKeyValueStore;

    #[derive(Clone, Default)]
    struct CountingTrigger {
        requests: Arc<AtomicUsize>,
    }

    impl CountingTrigger {
        fn count(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }

    impl SyncTrigger for CountingTrigger {
        fn request_sync(&self) {
            self.requests.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Memory store whose writes to the counter view can be made to fail
    #[derive(Clone, Default)]
    struct FlakyStore {
        inner: MemoryKeyValueStore,
        fail_view_writes: Arc<AtomicBool>,
    }

    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            if key == LOCAL_COUNTERS_KEY && self.fail_view_writes.load(Ordering::SeqCst) {
                return Err(Error::Storage("disk full".into()));
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key).await
        }
    }

    struct Harness {
        counters: CounterStore<FlakyStore, CountingTrigger>,
        store: FlakyStore,
        queue: MutationQueue<FlakyStore>,
        trigger: CountingTrigger,
    }

    fn harness(identity: Identity) -> Harness {
        let store = FlakyStore::default();
        let queue = MutationQueue::new(store.clone());
        let trigger = CountingTrigger::default();
        let counters = CounterStore::new(store.clone(), queue.clone(), trigger.clone(), identity);
        Harness {
            counters,
            store,
            queue,
            trigger,
        }
    }

    fn account() -> Identity {
        Identity::Account {
            user_id: "user-1".into(),
        }
    }

    async fn queued_kinds(queue: &MutationQueue<FlakyStore>) -> Vec<MutationKind> {
        queue
            .read_all()
            .await
            .unwrap()
            .iter()
            .map(MutationCommand::kind)
            .collect()
    }

    #[tokio::test]
    async fn account_create_persists_queues_and_triggers() {
        let h = harness(account());

        let counter = h.counters.create("Water", Some("#00aaff")).await.unwrap();

        assert_eq!(counter.owner_id, "user-1");
        assert_eq!(counter.color, "#00AAFF");
        assert_eq!(h.counters.counters().await, vec![counter.clone()]);
        let queued = h.queue.read_all().await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].entity_id, counter.id);
        assert_eq!(queued[0].kind(), MutationKind::Create);
        assert_eq!(h.trigger.count(), 1);

        let persisted = h.store.get(LOCAL_COUNTERS_KEY).await.unwrap().unwrap();
        let persisted: Vec<Counter> = serde_json::from_str(&persisted).unwrap();
        assert_eq!(persisted, vec![counter]);
    }

    #[tokio::test]
    async fn guest_actions_stay_local() {
        let h = harness(Identity::Guest);

        let counter = h.counters.create("Steps", None).await.unwrap();
        h.counters.increment(&counter.id, 5).await.unwrap();

        assert_eq!(counter.owner_id, GUEST_OWNER_ID);
        assert_eq!(h.counters.get(&counter.id).await.unwrap().count, 5);
        assert!(h.queue.is_empty().await.unwrap());
        assert_eq!(h.trigger.count(), 0);
    }

    #[tokio::test]
    async fn actions_queue_commands_in_order() {
        let h = harness(account());
        let counter = h.counters.create("Coffee", None).await.unwrap();

        h.counters.increment(&counter.id, 2).await.unwrap();
        h.counters
            .update(
                &counter.id,
                CounterPatch {
                    title: Some("Espresso".into()),
                    color: None,
                },
            )
            .await
            .unwrap();
        h.counters.increment(&counter.id, -1).await.unwrap();
        h.counters.delete(&counter.id).await.unwrap();

        assert_eq!(
            queued_kinds(&h.queue).await,
            vec![
                MutationKind::Create,
                MutationKind::Increment,
                MutationKind::Update,
                MutationKind::Increment,
                MutationKind::Delete,
            ]
        );
        assert!(h.counters.counters().await.is_empty());
        assert_eq!(h.trigger.count(), 5);
    }

    #[tokio::test]
    async fn failed_persist_rolls_back_and_queues_nothing() {
        let h = harness(account());
        let counter = h.counters.create("Laps", None).await.unwrap();
        h.store.fail_view_writes.store(true, Ordering::SeqCst);

        let error = h.counters.increment(&counter.id, 3).await.unwrap_err();

        assert!(matches!(error, Error::Storage(_)));
        assert_eq!(h.counters.get(&counter.id).await.unwrap().count, 0);
        assert_eq!(queued_kinds(&h.queue).await, vec![MutationKind::Create]);
        assert_eq!(h.trigger.count(), 1);
    }

    #[tokio::test]
    async fn missing_counter_is_not_found() {
        let h = harness(account());
        let error = h
            .counters
            .increment(&CounterId::from("absent"), 1)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
        assert!(h.queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn zero_increment_is_rejected() {
        let h = harness(account());
        let counter = h.counters.create("Laps", None).await.unwrap();
        assert!(h.counters.increment(&counter.id, 0).await.is_err());
    }

    #[tokio::test]
    async fn remove_shared_requires_a_shared_counter() {
        let h = harness(account());
        let personal = h.counters.create("Mine", None).await.unwrap();
        assert!(h.counters.remove_shared(&personal.id).await.is_err());

        let mut shared = Counter::new("Team", None, "user-2").unwrap();
        shared.kind = CounterKind::Shared;
        h.counters.apply_joined(shared.clone()).await.unwrap();
        h.counters.remove_shared(&shared.id).await.unwrap();

        assert_eq!(
            queued_kinds(&h.queue).await,
            vec![MutationKind::Create, MutationKind::Remove]
        );
        assert_eq!(h.counters.counters().await, vec![personal]);
    }

    #[tokio::test]
    async fn remote_event_merges_known_counters_without_queueing() {
        let h = harness(account());
        let counter = h.counters.create("Laps", None).await.unwrap();
        h.queue.clear().await.unwrap();

        let mut snapshot = counter.clone();
        snapshot.count = 42;
        snapshot.title = "Pool laps".into();
        let merged = h
            .counters
            .apply_remote_event(RemoteEvent::CounterUpdated(snapshot))
            .await
            .unwrap();
        let stranger = Counter::new("Unknown", None, "user-9").unwrap();
        let ignored = h
            .counters
            .apply_remote_event(RemoteEvent::CounterUpdated(stranger))
            .await
            .unwrap();

        assert!(merged);
        assert!(!ignored);
        let local = h.counters.get(&counter.id).await.unwrap();
        assert_eq!(local.count, 42);
        assert_eq!(local.title, "Pool laps");
        assert_eq!(h.counters.counters().await.len(), 1);
        assert!(h.queue.is_empty().await.unwrap());

        let reloaded = h.counters.load().await.unwrap();
        assert_eq!(reloaded[0].count, 42);
    }

    #[tokio::test]
    async fn guest_counters_consolidate_into_create_commands() {
        let h = harness(Identity::Guest);
        let mut created = Vec::new();
        for title in ["One", "Two", "Three"] {
            created.push(h.counters.create(title, None).await.unwrap());
        }
        assert!(h.queue.is_empty().await.unwrap());

        let handed_over = h.counters.consolidate_guest_counters("user-7").await.unwrap();

        assert_eq!(handed_over, 3);
        let queued = h.queue.read_all().await.unwrap();
        assert_eq!(queued.len(), 3);
        for (command, counter) in queued.iter().zip(&created) {
            assert_eq!(command.kind(), MutationKind::Create);
            assert_eq!(command.entity_id, counter.id);
        }
        assert!(h
            .counters
            .counters()
            .await
            .iter()
            .all(|counter| counter.owner_id == "user-7"));
        assert_eq!(
            h.counters.identity(),
            Identity::Account {
                user_id: "user-7".into()
            }
        );
        assert_eq!(h.trigger.count(), 1);
    }

    #[tokio::test]
    async fn remote_list_replaces_view_only_when_queue_is_empty() {
        let h = harness(account());
        h.counters.create("Pending", None).await.unwrap();
        let remote = vec![Counter::new("Server", None, "user-1").unwrap()];

        assert!(!h.counters.sync_from_remote(remote.clone()).await.unwrap());
        assert_eq!(h.counters.counters().await[0].title, "Pending");

        h.queue.clear().await.unwrap();
        assert!(h.counters.sync_from_remote(remote.clone()).await.unwrap());
        assert_eq!(h.counters.counters().await, remote);
    }

    #[tokio::test]
    async fn load_reads_persisted_view() {
        let h = harness(Identity::Guest);
        let counter = h.counters.create("Persisted", None).await.unwrap();

        let reopened = CounterStore::new(
            h.store.clone(),
            h.queue.clone(),
            CountingTrigger::default(),
            Identity::Guest,
        );
        assert!(reopened.counters().await.is_empty());
        assert_eq!(reopened.load().await.unwrap(), vec![counter]);
    }
}
