use serde::Deserialize;
use serde_json::{json, Value};

use super::{AuthError, AuthResult, AuthUser, CredentialStore};
use crate::config::AuthMode;
use crate::http::{ApiClient, ApiRequest};
use crate::sync::SessionTerminator;

pub const LOGIN_ENDPOINT: &str = "/auth/login";
pub const LOGOUT_ENDPOINT: &str = "/auth/logout";
pub const CHECK_ENDPOINT: &str = "/auth/check";

#[derive(Clone)]
pub struct LoginRequest {
    /// Email address, or phone number when it has no `@`
    pub identifier: String,
    pub password: String,
    pub remember_me: bool,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("LoginRequest")
            .field("identifier", &self.identifier)
            .field("password", &"[REDACTED]")
            .field("remember_me", &self.remember_me)
            .finish()
    }
}

impl LoginRequest {
    fn to_body(&self, force_remember_me: bool) -> AuthResult<Value> {
        let identifier = self.identifier.trim();
        if identifier.is_empty() {
            return Err(AuthError::Api("Email or phone is required".to_string()));
        }
        if self.password.trim().is_empty() {
            return Err(AuthError::Api("Password is required".to_string()));
        }
        let remember_me = self.remember_me || force_remember_me;
        Ok(if identifier.contains('@') {
            json!({ "email": identifier, "password": self.password, "rememberMe": remember_me })
        } else {
            json!({ "phone": identifier, "password": self.password, "rememberMe": remember_me })
        })
    }
}

/// Outcome of the cold-start session check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    SignedOut,
    /// The server confirmed the session
    Verified(AuthUser),
    /// The server was unreachable; the cached profile is trusted
    Cached(AuthUser),
    /// Renewal failed too; local credentials were cleared
    Expired,
}

impl AuthStatus {
    pub const fn user(&self) -> Option<&AuthUser> {
        match self {
            Self::Verified(user) | Self::Cached(user) => Some(user),
            Self::SignedOut | Self::Expired => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionData {
    user: Option<AuthUser>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Clone)]
pub struct AuthService<C: CredentialStore> {
    client: ApiClient<C>,
}

impl<C: CredentialStore> AuthService<C> {
    pub const fn new(client: ApiClient<C>) -> Self {
        Self { client }
    }

    fn credentials(&self) -> &C {
        self.client.credentials()
    }

    /// Sign in and store the issued credentials and profile.
    ///
    /// Bearer clients always ask for a persistent session so a refresh
    /// credential is issued.
    pub async fn login(&self, request: &LoginRequest) -> AuthResult<AuthUser> {
        let force_remember_me = self.client.config().auth_mode == AuthMode::Bearer;
        let body = request.to_body(force_remember_me)?;
        let data: Option<SessionData> = self
            .client
            .request_data(&ApiRequest::post(LOGIN_ENDPOINT).json(body))
            .await?;
        let Some(SessionData {
            user: Some(user),
            access_token,
            refresh_token,
        }) = data
        else {
            return Err(AuthError::Api("Login failed".to_string()));
        };

        self.credentials().cache_user(&user)?;
        self.credentials().store_tokens(&super::TokenPair {
            access_token,
            refresh_token,
        })?;
        tracing::info!(user_id = %user.id, "Signed in");
        Ok(user)
    }

    /// Cold-start check: validate the stored session with the server,
    /// falling back to the cached profile when the server cannot be reached
    pub async fn initialize(&self) -> AuthResult<AuthStatus> {
        let cached = self.credentials().cached_user()?;
        let has_session = match self.client.config().auth_mode {
            AuthMode::Bearer => self.credentials().has_tokens()?,
            AuthMode::Cookie => cached.is_some(),
        };
        if !has_session {
            return Ok(AuthStatus::SignedOut);
        }

        match self
            .client
            .request_data::<SessionData>(&ApiRequest::get(CHECK_ENDPOINT))
            .await
        {
            Ok(Some(SessionData {
                user: Some(user), ..
            })) => {
                self.credentials().cache_user(&user)?;
                Ok(AuthStatus::Verified(user))
            }
            Ok(_) => Err(AuthError::Api("Auth check failed".to_string())),
            Err(error) if error.is_unauthorized() => {
                tracing::warn!("Session expired; signing out");
                self.logout(false).await?;
                Ok(AuthStatus::Expired)
            }
            Err(error) => {
                tracing::warn!(
                    "Auth check failed ({}); trusting cached profile",
                    error.message()
                );
                cached.map_or(Err(AuthError::Request(error)), |user| {
                    Ok(AuthStatus::Cached(user))
                })
            }
        }
    }

    /// End the session. The server call is best-effort; local credentials
    /// are always cleared.
    pub async fn logout(&self, notify_server: bool) -> AuthResult<()> {
        if notify_server {
            if let Err(error) = self
                .client
                .request(&ApiRequest::post(LOGOUT_ENDPOINT))
                .await
            {
                tracing::warn!("Server logout failed: {}", error);
            }
        }
        self.credentials().clear_local_auth()?;
        tracing::info!("Signed out");
        Ok(())
    }

    /// Profile stored by the last login or successful check
    pub fn current_user(&self) -> AuthResult<Option<AuthUser>> {
        self.credentials().cached_user()
    }

    /// Signed-in user or [`AuthError::NoSession`]
    pub fn require_user(&self) -> AuthResult<AuthUser> {
        self.current_user()?.ok_or(AuthError::NoSession)
    }
}

impl<C: CredentialStore> SessionTerminator for AuthService<C> {
    async fn force_logout(&self) {
        if let Err(error) = self.logout(false).await {
            tracing::error!("Failed to clear local credentials: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::auth::{CredentialKey, MemoryCredentialStore};
    use crate::config::ClientConfig;
    use crate::testing::{unreachable_base_url, Reply, TestServer};

    fn service(base_url: &str, credentials: MemoryCredentialStore) -> AuthService<MemoryCredentialStore> {
        let client = ApiClient::new(ClientConfig::new(base_url).unwrap(), credentials).unwrap();
        AuthService::new(client)
    }

    fn user(id: &str) -> AuthUser {
        AuthUser {
            id: id.to_string(),
            email: Some(format!("{id}@example.com")),
            phone: None,
        }
    }

    #[tokio::test]
    async fn login_forces_remember_me_and_stores_session() {
        let server = TestServer::spawn(|_| {
            Reply::json(
                200,
                &json!({
                    "success": true,
                    "data": {
                        "user": { "id": "user-1", "email": "user-1@example.com" },
                        "accessToken": "access-1",
                        "refreshToken": "refresh-1"
                    }
                }),
            )
        })
        .await;
        let credentials = MemoryCredentialStore::new();
        let auth = service(&server.base_url, credentials.clone());

        let signed_in = auth
            .login(&LoginRequest {
                identifier: "user-1@example.com".into(),
                password: "hunter22".into(),
                remember_me: false,
            })
            .await
            .unwrap();

        assert_eq!(signed_in, user("user-1"));
        assert_eq!(
            server.requests()[0].json(),
            json!({ "email": "user-1@example.com", "password": "hunter22", "rememberMe": true })
        );
        assert_eq!(
            credentials.get(CredentialKey::AccessToken).unwrap().as_deref(),
            Some("access-1")
        );
        assert_eq!(
            credentials.get(CredentialKey::RefreshToken).unwrap().as_deref(),
            Some("refresh-1")
        );
        assert_eq!(credentials.cached_user().unwrap(), Some(user("user-1")));
    }

    #[tokio::test]
    async fn login_with_phone_sends_phone_field() {
        let server = TestServer::spawn(|_| {
            Reply::json(200, &json!({ "success": true, "data": { "user": { "id": "u" } } }))
        })
        .await;
        let auth = service(&server.base_url, MemoryCredentialStore::new());

        auth.login(&LoginRequest {
            identifier: "+15551234".into(),
            password: "pw".into(),
            remember_me: true,
        })
        .await
        .unwrap();

        assert_eq!(server.requests()[0].json()["phone"], "+15551234");
    }

    #[tokio::test]
    async fn initialize_without_tokens_is_signed_out() {
        let base_url = unreachable_base_url().await;
        let auth = service(&base_url, MemoryCredentialStore::new());
        assert_eq!(auth.initialize().await.unwrap(), AuthStatus::SignedOut);
    }

    #[tokio::test]
    async fn initialize_trusts_cache_when_offline() {
        let base_url = unreachable_base_url().await;
        let credentials = MemoryCredentialStore::new();
        credentials.set(CredentialKey::AccessToken, "access-1").unwrap();
        credentials.cache_user(&user("user-1")).unwrap();
        let auth = service(&base_url, credentials);

        assert_eq!(
            auth.initialize().await.unwrap(),
            AuthStatus::Cached(user("user-1"))
        );
    }

    #[tokio::test]
    async fn initialize_refreshes_cached_profile() {
        let server = TestServer::spawn(|_| {
            Reply::json(
                200,
                &json!({ "success": true, "data": { "user": { "id": "user-1", "phone": "+1555" } } }),
            )
        })
        .await;
        let credentials = MemoryCredentialStore::new();
        credentials.set(CredentialKey::AccessToken, "access-1").unwrap();
        credentials.cache_user(&user("user-1")).unwrap();
        let auth = service(&server.base_url, credentials.clone());

        let status = auth.initialize().await.unwrap();

        let expected = AuthUser {
            id: "user-1".into(),
            email: None,
            phone: Some("+1555".into()),
        };
        assert_eq!(status, AuthStatus::Verified(expected.clone()));
        assert_eq!(credentials.cached_user().unwrap(), Some(expected));
        assert_eq!(server.requests()[0].path, CHECK_ENDPOINT);
    }

    #[tokio::test]
    async fn initialize_clears_session_when_renewal_fails() {
        let server = TestServer::spawn(|_| Reply::json(401, &json!({ "message": "expired" }))).await;
        let credentials = MemoryCredentialStore::new();
        credentials.set(CredentialKey::AccessToken, "access-1").unwrap();
        credentials.set(CredentialKey::RefreshToken, "refresh-1").unwrap();
        credentials.cache_user(&user("user-1")).unwrap();
        let auth = service(&server.base_url, credentials.clone());

        assert_eq!(auth.initialize().await.unwrap(), AuthStatus::Expired);
        assert!(!credentials.has_tokens().unwrap());
        assert_eq!(credentials.cached_user().unwrap(), None);
        assert_eq!(server.hits("POST", LOGOUT_ENDPOINT), 0);
    }

    #[tokio::test]
    async fn logout_clears_credentials_even_when_server_is_down() {
        let base_url = unreachable_base_url().await;
        let credentials = MemoryCredentialStore::new();
        credentials.set(CredentialKey::AccessToken, "access-1").unwrap();
        let auth = service(&base_url, credentials.clone());

        auth.logout(true).await.unwrap();

        assert!(!credentials.has_tokens().unwrap());
    }

    #[tokio::test]
    async fn logout_notifies_server_when_asked() {
        let server = TestServer::spawn(|_| Reply::empty(204)).await;
        let auth = service(&server.base_url, MemoryCredentialStore::new());

        auth.logout(true).await.unwrap();

        assert_eq!(server.hits("POST", LOGOUT_ENDPOINT), 1);
    }
}
