//! Queue replay.
//!
//! [`SyncProcessor`] drains the mutation queue against the API in order,
//! one drain at a time. The seams it depends on are traits so the drain can
//! be driven by fakes in tests and by the real HTTP client in production.

mod connectivity;
mod processor;

use std::future::Future;

use serde_json::Value;

use crate::auth::CredentialStore;
use crate::http::{counter_route, ApiClient, ApiError};
use crate::models::MutationCommand;

pub use connectivity::{ManualConnectivity, ProbeConnectivity};
pub use processor::{DrainOutcome, DrainReport, SyncProcessor};

/// Delivers one queued command to the server
pub trait CommandExecutor: Send + Sync + 'static {
    fn execute(
        &self,
        command: &MutationCommand,
    ) -> impl Future<Output = Result<Value, ApiError>> + Send;
}

pub trait Connectivity: Send + Sync + 'static {
    fn is_online(&self) -> impl Future<Output = bool> + Send;
}

/// Ends the local session once the server has rejected renewed credentials
pub trait SessionTerminator: Send + Sync + 'static {
    fn force_logout(&self) -> impl Future<Output = ()> + Send;
}

/// Fire-and-forget request for a drain
pub trait SyncTrigger: Clone + Send + Sync + 'static {
    fn request_sync(&self);
}

impl<C: CredentialStore> CommandExecutor for ApiClient<C> {
    async fn execute(&self, command: &MutationCommand) -> Result<Value, ApiError> {
        let request = counter_route(command)?;
        self.request(&request).await
    }
}
