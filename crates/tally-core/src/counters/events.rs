//! Inbound realtime events.

use serde_json::Value;

use crate::error::Result;
use crate::models::Counter;

pub const COUNTER_UPDATE_EVENT: &str = "counter-update";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEvent {
    /// Full snapshot of a counter someone changed
    CounterUpdated(Counter),
}

impl RemoteEvent {
    /// Decode a named event; events this client does not handle yield `None`
    pub fn from_message(name: &str, payload: Value) -> Result<Option<Self>> {
        match name {
            COUNTER_UPDATE_EVENT => Ok(Some(Self::CounterUpdated(serde_json::from_value(payload)?))),
            other => {
                tracing::debug!(event = other, "Ignoring unhandled realtime event");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::CounterId;

    #[test]
    fn decodes_counter_update() {
        let event = RemoteEvent::from_message(
            COUNTER_UPDATE_EVENT,
            json!({
                "id": "c-1", "title": "Laps", "color": "#00FF00", "count": 9,
                "ownerId": "user-2", "type": "SHARED"
            }),
        )
        .unwrap();
        let Some(RemoteEvent::CounterUpdated(counter)) = event else {
            panic!("expected counter update");
        };
        assert_eq!(counter.id, CounterId::from("c-1"));
        assert_eq!(counter.count, 9);
    }

    #[test]
    fn unknown_events_are_ignored() {
        assert_eq!(
            RemoteEvent::from_message("presence", json!({})).unwrap(),
            None
        );
    }

    #[test]
    fn malformed_snapshot_is_an_error() {
        assert!(RemoteEvent::from_message(COUNTER_UPDATE_EVENT, json!({ "id": 1 })).is_err());
    }
}
