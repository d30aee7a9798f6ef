//! Credential persistence surface and the values kept in it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::{AuthError, AuthResult};

/// Slots in the credential store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    AccessToken,
    RefreshToken,
    UserProfile,
}

impl CredentialKey {
    pub const ALL: [Self; 3] = [Self::AccessToken, Self::RefreshToken, Self::UserProfile];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
            Self::UserProfile => "auth_user_profile",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Access credential plus the refresh credential issued for persistent sessions
#[derive(Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TokenPair")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Get/set/remove over secure storage.
///
/// Implementations own the persisted values; callers only hold copies for
/// the duration of one exchange.
pub trait CredentialStore: Clone + Send + Sync + 'static {
    fn get(&self, key: CredentialKey) -> AuthResult<Option<String>>;
    fn set(&self, key: CredentialKey, value: &str) -> AuthResult<()>;
    fn remove(&self, key: CredentialKey) -> AuthResult<()>;

    /// Persist whichever tokens the pair carries; absent ones are left alone
    fn store_tokens(&self, tokens: &TokenPair) -> AuthResult<()> {
        if let Some(access) = tokens.access_token.as_deref() {
            self.set(CredentialKey::AccessToken, access)?;
        }
        if let Some(refresh) = tokens.refresh_token.as_deref() {
            self.set(CredentialKey::RefreshToken, refresh)?;
        }
        Ok(())
    }

    fn cached_user(&self) -> AuthResult<Option<AuthUser>> {
        match self.get(CredentialKey::UserProfile)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn cache_user(&self, user: &AuthUser) -> AuthResult<()> {
        let raw = serde_json::to_string(user)?;
        self.set(CredentialKey::UserProfile, &raw)
    }

    /// True when at least one token is stored
    fn has_tokens(&self) -> AuthResult<bool> {
        Ok(self.get(CredentialKey::AccessToken)?.is_some()
            || self.get(CredentialKey::RefreshToken)?.is_some())
    }

    /// Remove tokens and cached profile
    fn clear_local_auth(&self) -> AuthResult<()> {
        for key in CredentialKey::ALL {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// In-memory credential store.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    values: Arc<Mutex<HashMap<CredentialKey, String>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AuthResult<std::sync::MutexGuard<'_, HashMap<CredentialKey, String>>> {
        self.values
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: CredentialKey) -> AuthResult<Option<String>> {
        Ok(self.lock()?.get(&key).cloned())
    }

    fn set(&self, key: CredentialKey, value: &str) -> AuthResult<()> {
        self.lock()?.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: CredentialKey) -> AuthResult<()> {
        self.lock()?.remove(&key);
        Ok(())
    }
}
