//! Data models for Tally

mod command;
mod counter;

pub use command::{
    CommandId, CreateCounterPayload, EntityKind, IncrementPayload, Mutation, MutationCommand,
    MutationKind,
};
pub use counter::{
    normalize_color, Counter, CounterId, CounterKind, CounterPatch, DEFAULT_COUNTER_COLOR,
    GUEST_OWNER_ID,
};
