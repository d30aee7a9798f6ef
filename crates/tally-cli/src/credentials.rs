//! Keychain-backed credential store.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use tally_core::auth::{AuthError, AuthResult, CredentialKey, CredentialStore};

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "tally-cli";

/// Credentials for one API, kept apart from those of other base URLs
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    scope: String,
}

impl KeyringCredentialStore {
    pub fn new(api_base_url: &str) -> Self {
        Self {
            scope: api_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn username(&self, key: CredentialKey) -> String {
        format!("{}:{}", key.as_str(), self.scope)
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self, key: CredentialKey) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username(key))
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }
}

impl CredentialStore for KeyringCredentialStore {
    #[cfg(not(test))]
    fn get(&self, key: CredentialKey) -> AuthResult<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn get(&self, key: CredentialKey) -> AuthResult<Option<String>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        Ok(guard.get(&self.username(key)).cloned())
    }

    #[cfg(not(test))]
    fn set(&self, key: CredentialKey, value: &str) -> AuthResult<()> {
        self.entry(key)?
            .set_password(value)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    #[cfg(test)]
    fn set(&self, key: CredentialKey, value: &str) -> AuthResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.insert(self.username(key), value.to_string());
        Ok(())
    }

    #[cfg(not(test))]
    fn remove(&self, key: CredentialKey) -> AuthResult<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn remove(&self, key: CredentialKey) -> AuthResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.remove(&self.username(key));
        Ok(())
    }
}
