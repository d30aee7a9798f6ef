//! tally-core - Core library for Tally
//!
//! This crate contains the counter models, the durable mutation queue, the
//! HTTP access layer, and the sync engine shared by every Tally interface.

pub mod auth;
pub mod config;
pub mod counters;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod queue;
pub mod state;
pub mod storage;
pub mod sync;
pub mod util;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use models::{CommandId, Counter, CounterId, Mutation, MutationCommand};
