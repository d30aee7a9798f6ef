//! Client configuration for the HTTP access layer.
//!
//! Values come from a serialized config (the CLI's profile file) or from the
//! environment. Nothing secret lives here; credentials go through the
//! credential store.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

const ENV_API_URL: &str = "TALLY_API_URL";
const ENV_REQUEST_TIMEOUT: &str = "TALLY_REQUEST_TIMEOUT_SECS";
const ENV_AUTH_MODE: &str = "TALLY_AUTH_MODE";

/// How the access credential reaches the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Read the stored access token and send `Authorization: Bearer`.
    #[default]
    Bearer,
    /// Rely on the session cookie the client's cookie jar attaches.
    Cookie,
}

impl std::str::FromStr for AuthMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bearer" => Ok(Self::Bearer),
            "cookie" => Ok(Self::Cookie),
            other => Err(Error::InvalidInput(format!(
                "auth mode must be 'bearer' or 'cookie', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub auth_mode: AuthMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            auth_mode: AuthMode::Bearer,
        }
    }
}

impl ClientConfig {
    pub fn new(api_base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_base_url: normalize_api_base_url(api_base_url.into())?,
            ..Self::default()
        })
    }

    /// Build from `TALLY_*` environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Overlay environment values onto this config
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Self::default().with_overrides(lookup)
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = normalize_text_option(lookup(ENV_API_URL)) {
            self.api_base_url = url;
        }
        if let Some(raw) = normalize_text_option(lookup(ENV_REQUEST_TIMEOUT)) {
            self.request_timeout_secs = raw.parse().map_err(|_| {
                Error::InvalidInput(format!("{ENV_REQUEST_TIMEOUT} must be a whole number"))
            })?;
        }
        if let Some(raw) = normalize_text_option(lookup(ENV_AUTH_MODE)) {
            self.auth_mode = raw.parse()?;
        }
        self.normalized()
    }

    /// Validate the base URL and timeout
    pub fn normalized(mut self) -> Result<Self> {
        self.api_base_url = normalize_api_base_url(self.api_base_url)?;
        if self.request_timeout_secs == 0 {
            return Err(Error::InvalidInput(
                "request timeout must be at least one second".to_string(),
            ));
        }
        Ok(self)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

pub fn normalize_api_base_url(raw: String) -> Result<String> {
    let url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::InvalidInput("API base URL must not be empty".to_string()))?;
    if is_http_url(&url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "API base URL must include http:// or https://".to_string(),
        ))
    }
}
