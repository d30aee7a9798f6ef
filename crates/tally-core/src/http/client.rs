use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::ApiError;
use crate::auth::{CredentialKey, CredentialStore, TokenPair};
use crate::config::{AuthMode, ClientConfig};
use crate::error::Result;

const JSON_CONTENT_TYPE: &str = "application/json";
pub const REFRESH_ENDPOINT: &str = "/auth/refresh";

/// Standard response wrapper returned by the API
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Sent as-is; the content type is only set when provided
    Raw {
        bytes: Vec<u8>,
        content_type: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PUT, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    #[must_use]
    pub fn raw(mut self, bytes: Vec<u8>, content_type: Option<String>) -> Self {
        self.body = RequestBody::Raw {
            bytes,
            content_type,
        };
        self
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers
            .iter()
            .any(|(header, _)| header.eq_ignore_ascii_case(name))
    }
}

type RenewalFuture = Shared<BoxFuture<'static, bool>>;

/// HTTP access layer shared by the sync processor, auth flows and live calls.
///
/// Cloning is cheap; clones share the connection pool, cookie jar and the
/// in-flight credential renewal.
#[derive(Clone)]
pub struct ApiClient<C: CredentialStore> {
    inner: Arc<ClientInner<C>>,
}

struct ClientInner<C: CredentialStore> {
    http: reqwest::Client,
    config: ClientConfig,
    credentials: C,
    renewal: Mutex<Option<RenewalFuture>>,
}

impl<C: CredentialStore> ApiClient<C> {
    pub fn new(config: ClientConfig, credentials: C) -> Result<Self> {
        let config = config.normalized()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .cookie_store(true)
            .build()?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                config,
                credentials,
                renewal: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn credentials(&self) -> &C {
        &self.inner.credentials
    }

    /// Issue a request, renewing the access credential once on 401.
    ///
    /// A retried request that fails again with 401 is returned as-is.
    pub async fn request(&self, request: &ApiRequest) -> std::result::Result<Value, ApiError> {
        match self.inner.send_once(request).await {
            Err(error) if error.is_unauthorized() => {
                if self.renew_credentials().await {
                    tracing::debug!(endpoint = %request.endpoint, "Retrying after credential renewal");
                    self.inner.send_once(request).await
                } else {
                    Err(error)
                }
            }
            outcome => outcome,
        }
    }

    /// Issue a request and decode the envelope's `data` as `T`
    pub async fn request_data<T>(&self, request: &ApiRequest) -> std::result::Result<Option<T>, ApiError>
    where
        T: serde::de::DeserializeOwned,
    {
        let value = self.request(request).await?;
        let envelope: ApiEnvelope<T> = serde_json::from_value(value)
            .map_err(|error| ApiError::Transport(format!("Unexpected response shape: {error}")))?;
        Ok(envelope.data)
    }

    /// Join the in-flight renewal or start one. Resolves to whether new
    /// credentials are in place.
    pub async fn renew_credentials(&self) -> bool {
        let renewal = {
            let mut slot = self
                .inner
                .renewal
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(in_flight) = slot.as_ref() {
                in_flight.clone()
            } else {
                let inner = Arc::clone(&self.inner);
                let renewal = async move {
                    let renewed = inner.execute_renewal().await;
                    inner.finish_renewal();
                    renewed
                }
                .boxed()
                .shared();
                *slot = Some(renewal.clone());
                renewal
            }
        };
        renewal.await
    }
}

impl<C: CredentialStore> ClientInner<C> {
    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.api_base_url, endpoint)
    }

    fn access_token(&self) -> Option<String> {
        if self.config.auth_mode != AuthMode::Bearer {
            return None;
        }
        match self.credentials.get(CredentialKey::AccessToken) {
            Ok(token) => token,
            Err(error) => {
                tracing::warn!("Failed to read access token: {}", error);
                None
            }
        }
    }

    async fn send_once(&self, request: &ApiRequest) -> std::result::Result<Value, ApiError> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.url(&request.endpoint));
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let caller_set_content_type = request.has_header(CONTENT_TYPE.as_str());
        builder = match &request.body {
            RequestBody::Empty => {
                if caller_set_content_type {
                    builder
                } else {
                    builder.header(CONTENT_TYPE, JSON_CONTENT_TYPE)
                }
            }
            RequestBody::Json(value) => {
                let builder = if caller_set_content_type {
                    builder
                } else {
                    builder.header(CONTENT_TYPE, JSON_CONTENT_TYPE)
                };
                builder.body(value.to_string())
            }
            RequestBody::Raw {
                bytes,
                content_type,
            } => {
                let builder = match content_type {
                    Some(content_type) if !caller_set_content_type => {
                        builder.header(CONTENT_TYPE, content_type.as_str())
                    }
                    _ => builder,
                };
                builder.body(bytes.clone())
            }
        };
        if let Some(token) = self.access_token() {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|error| ApiError::from_reqwest(&error))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|error| ApiError::from_reqwest(&error))?;

        if !status.is_success() {
            let error = ApiError::from_response(status.as_u16(), &body);
            tracing::debug!(
                endpoint = %request.endpoint,
                status = status.as_u16(),
                "API request failed: {}",
                error.message()
            );
            return Err(error);
        }
        if status == StatusCode::NO_CONTENT || body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_slice(&body)
            .map_err(|error| ApiError::Transport(format!("Invalid JSON response: {error}")))
    }

    async fn execute_renewal(&self) -> bool {
        let mut builder = self
            .http
            .post(self.url(REFRESH_ENDPOINT))
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        if self.config.auth_mode == AuthMode::Bearer {
            let refresh_token = match self.credentials.get(CredentialKey::RefreshToken) {
                Ok(Some(token)) => token,
                Ok(None) => {
                    tracing::debug!("No refresh token stored; skipping renewal");
                    return false;
                }
                Err(error) => {
                    tracing::warn!("Failed to read refresh token: {}", error);
                    return false;
                }
            };
            builder = builder.body(serde_json::json!({ "refreshToken": refresh_token }).to_string());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!("Credential renewal request failed: {}", error);
                return false;
            }
        };
        if !response.status().is_success() {
            tracing::info!(status = response.status().as_u16(), "Credential renewal rejected");
            return false;
        }
        if self.config.auth_mode == AuthMode::Cookie {
            return true;
        }

        let envelope = match response.json::<ApiEnvelope<TokenPair>>().await {
            Ok(envelope) => envelope,
            Err(error) => {
                tracing::warn!("Credential renewal returned an unreadable body: {}", error);
                return false;
            }
        };
        if let Some(tokens) = envelope.data {
            if let Err(error) = self.credentials.store_tokens(&tokens) {
                tracing::warn!("Failed to store renewed credentials: {}", error);
                return false;
            }
        }
        tracing::info!("Renewed access credential");
        true
    }

    fn finish_renewal(&self) {
        let mut slot = self
            .renewal
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = None;
    }
}
