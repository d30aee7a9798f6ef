use std::io;

use tally_core::auth::AuthError;
use tally_core::http::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tally_core::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Counter ID cannot be empty")]
    EmptyCounterId,
    #[error("Counter not found for id/prefix: {0}")]
    CounterNotFound(String),
    #[error("{0}")]
    AmbiguousCounterId(String),
    #[error("Invite code cannot be empty")]
    EmptyInviteCode,
    #[error("Nothing to update; pass --title and/or --color")]
    EmptyUpdate,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Not signed in. Run `tally auth login` first.")]
    NotSignedIn,
    #[error("The API at {0} is unreachable")]
    Offline(String),
}

impl From<AuthError> for CliError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::NoSession => Self::NotSignedIn,
            other => Self::Auth(other.to_string()),
        }
    }
}
