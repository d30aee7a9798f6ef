//! Queued mutation commands

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::counter::{Counter, CounterId, CounterPatch};
use crate::util::unix_timestamp_millis;

/// Unique identifier of a queued command, using UUID v7 (time-sortable).
///
/// Also sent as the idempotency key, so a replayed command is recognised by
/// the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(Uuid);

impl CommandId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CommandId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Kind of remote resource a command targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[default]
    Counter,
}

/// Body of a `CREATE` command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCounterPayload {
    pub id: CounterId,
    pub title: String,
    pub color: String,
    pub count: i64,
}

impl From<&Counter> for CreateCounterPayload {
    fn from(counter: &Counter) -> Self {
        Self {
            id: counter.id.clone(),
            title: counter.title.clone(),
            color: counter.color.clone(),
            count: counter.count,
        }
    }
}

/// Body of an `INCREMENT` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementPayload {
    pub amount: i64,
}

/// The change a command carries, one payload shape per command type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mutation {
    Create(CreateCounterPayload),
    Update(CounterPatch),
    Increment(IncrementPayload),
    /// Destroy a counter the user owns
    Delete,
    /// Leave a shared counter; the resource itself survives
    Remove,
}

/// Payload-free tag of a [`Mutation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Update,
    Increment,
    Delete,
    Remove,
}

impl MutationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Increment => "INCREMENT",
            Self::Delete => "DELETE",
            Self::Remove => "REMOVE",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Mutation {
    pub const fn kind(&self) -> MutationKind {
        match self {
            Self::Create(_) => MutationKind::Create,
            Self::Update(_) => MutationKind::Update,
            Self::Increment(_) => MutationKind::Increment,
            Self::Delete => MutationKind::Delete,
            Self::Remove => MutationKind::Remove,
        }
    }
}

/// A single queued intent to change remote state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationCommand {
    pub id: CommandId,
    #[serde(default)]
    pub entity: EntityKind,
    pub entity_id: CounterId,
    /// Persisted as top-level `type` and `payload` fields
    #[serde(flatten)]
    pub mutation: Mutation,
    /// Creation time (Unix ms), for display only; queue position decides replay order
    pub timestamp: i64,
    /// Reserved for back-off policies
    #[serde(default)]
    pub retry_count: u32,
}

impl MutationCommand {
    /// Build a fresh counter command with a new id
    #[must_use]
    pub fn new(entity_id: CounterId, mutation: Mutation) -> Self {
        Self {
            id: CommandId::new(),
            entity: EntityKind::Counter,
            entity_id,
            mutation,
            timestamp: unix_timestamp_millis(),
            retry_count: 0,
        }
    }

    #[must_use]
    pub fn create(counter: &Counter) -> Self {
        Self::new(
            counter.id.clone(),
            Mutation::Create(CreateCounterPayload::from(counter)),
        )
    }

    pub const fn kind(&self) -> MutationKind {
        self.mutation.kind()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_command_ids_are_unique() {
        let counter = CounterId::from("c-1");
        let a = MutationCommand::new(counter.clone(), Mutation::Delete);
        let b = MutationCommand::new(counter, Mutation::Delete);
        assert_ne!(a.id, b.id);
        assert_eq!(a.retry_count, 0);
    }

    #[test]
    fn test_command_id_parse() {
        let id = CommandId::new();
        let parsed: CommandId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_increment_command_persisted_shape() {
        let mut command = MutationCommand::new(
            CounterId::from("c-1"),
            Mutation::Increment(IncrementPayload { amount: 2 }),
        );
        command.timestamp = 1_700_000_000_000;
        let value = serde_json::to_value(&command).unwrap();

        assert_eq!(
            value,
            json!({
                "id": command.id.as_str(),
                "entity": "counter",
                "entityId": "c-1",
                "type": "INCREMENT",
                "payload": { "amount": 2 },
                "timestamp": 1_700_000_000_000_i64,
                "retryCount": 0
            })
        );
    }

    #[test]
    fn test_unit_mutations_read_back_without_payload() {
        let raw = json!({
            "id": CommandId::new().as_str(),
            "entityId": "c-9",
            "type": "REMOVE",
            "timestamp": 1
        });
        let command: MutationCommand = serde_json::from_value(raw).unwrap();
        assert_eq!(command.kind(), MutationKind::Remove);
        assert_eq!(command.entity, EntityKind::Counter);
    }

    #[test]
    fn test_create_command_snapshots_counter() {
        let counter = Counter::new("Steps", Some("#112233"), "user-1").unwrap();
        let command = MutationCommand::create(&counter);
        assert_eq!(command.entity_id, counter.id);
        match command.mutation {
            Mutation::Create(payload) => {
                assert_eq!(payload.title, "Steps");
                assert_eq!(payload.color, "#112233");
                assert_eq!(payload.count, 0);
            }
            other => panic!("expected CREATE, got {other:?}"),
        }
    }
}
