//! Account session handling: stored credentials and the login, cold-start
//! check and logout flows built on the HTTP layer.

mod credentials;
mod service;

use thiserror::Error;

use crate::http::ApiError;

pub use credentials::{AuthUser, CredentialKey, CredentialStore, MemoryCredentialStore, TokenPair};
pub use service::{AuthService, AuthStatus, LoginRequest};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error(transparent)]
    Request(#[from] ApiError),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
    #[error("No active session")]
    NoSession,
}

pub type AuthResult<T> = Result<T, AuthError>;
