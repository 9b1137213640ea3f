use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, instrument, warn};

use crate::client::AuthApi;
use crate::config::{SessionConfig, TokenKeys, endpoints};
use crate::errors::{FlAuthError, Result};
use crate::models::{LoginResponse, UserRecord};
use crate::request::{ApiRequest, ApiResponse};
use crate::store::SecureStore;

/// Number of refresh-and-retry rounds a single request may trigger
pub const MAX_REFRESH_ATTEMPTS: u32 = 1;

/// Access/refresh token pair
///
/// Both halves are set together on login and cleared together on logout or
/// when a refresh cannot recover the session.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialPair {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token.is_some()
    }
}

impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |token: &Option<String>| token.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("CredentialPair")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

impl From<&LoginResponse> for CredentialPair {
    fn from(response: &LoginResponse) -> Self {
        Self::new(response.access_token.clone(), response.refresh_token.clone())
    }
}

/// Owner of the authenticated session
///
/// Holds the credential pair in memory, mirrors it to the secure store,
/// authorizes outgoing requests and recovers from expired access tokens by
/// refreshing once per request. Construct one per process and share it
/// behind an `Arc`.
pub struct SessionManager {
    api: AuthApi,
    store: Arc<dyn SecureStore>,
    keys: TokenKeys,
    share_inflight_refresh: bool,
    credentials: watch::Sender<CredentialPair>,
    /// Bumped whenever the access token changes
    epoch: AtomicU64,
    refresh_gate: Mutex<()>,
}

impl SessionManager {
    pub fn new(config: SessionConfig, store: Arc<dyn SecureStore>) -> Result<Self> {
        Ok(Self::with_api(AuthApi::new(config)?, store))
    }

    pub fn with_api(api: AuthApi, store: Arc<dyn SecureStore>) -> Self {
        let config = api.config();
        Self {
            keys: config.token_keys.clone(),
            share_inflight_refresh: config.share_inflight_refresh,
            api,
            store,
            credentials: watch::Sender::new(CredentialPair::default()),
            epoch: AtomicU64::new(0),
            refresh_gate: Mutex::new(()),
        }
    }

    pub fn api(&self) -> &AuthApi {
        &self.api
    }

    /// Snapshot of the in-memory credential pair
    pub fn credentials(&self) -> CredentialPair {
        self.credentials.borrow().clone()
    }

    /// Observe every change to the in-memory credential pair
    pub fn subscribe(&self) -> watch::Receiver<CredentialPair> {
        self.credentials.subscribe()
    }

    /// Current access token: memory first, secure store on cold start
    pub async fn access_token(&self) -> Option<String> {
        let in_memory = self.credentials.borrow().access_token.clone();
        match in_memory {
            Some(token) => Some(token),
            None => self.store.get(&self.keys.access).await,
        }
    }

    /// Current refresh token: memory first, secure store on cold start
    pub async fn refresh_token(&self) -> Option<String> {
        let in_memory = self.credentials.borrow().refresh_token.clone();
        match in_memory {
            Some(token) => Some(token),
            None => self.store.get(&self.keys.refresh).await,
        }
    }

    /// Add `Authorization: Bearer` (unless the caller set one) and a JSON
    /// content type (unless the caller set one)
    pub async fn attach_authorization(&self, request: ApiRequest) -> Result<ApiRequest> {
        let mut request = request;
        if !request.has_header(&AUTHORIZATION)
            && let Some(token) = self.access_token().await
        {
            request = request.with_bearer(&token)?;
        }
        if !request.has_header(&CONTENT_TYPE) {
            request = request.header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        Ok(request)
    }

    /// Send an authorized request, refreshing the access token once on 401
    ///
    /// A successful refresh is invisible to the caller: the retried response
    /// is returned as if the first attempt had succeeded. When the refresh
    /// itself fails the refresh error is returned and the session is cleared.
    #[instrument(skip(self, request), fields(method = %request.method(), path = %request.path()))]
    pub async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut request = request.clone();
        let mut attempt = 0;

        loop {
            let epoch = self.epoch.load(Ordering::SeqCst);
            let prepared = self.attach_authorization(request.clone()).await?;
            let response = self.api.send(&prepared).await?;

            if response.status() != StatusCode::UNAUTHORIZED || attempt >= MAX_REFRESH_ATTEMPTS {
                return response.into_result();
            }

            attempt += 1;
            debug!(attempt, "Request rejected with 401, attempting token refresh");
            let access_token = self.recover_unauthorized(epoch, response).await?;
            request = request.with_bearer(&access_token)?;
        }
    }

    /// Produce a usable access token after a 401, or fail and clear the session
    async fn recover_unauthorized(&self, sent_epoch: u64, rejected: ApiResponse) -> Result<String> {
        let _guard = if self.share_inflight_refresh {
            Some(self.refresh_gate.lock().await)
        } else {
            None
        };

        if self.share_inflight_refresh && self.epoch.load(Ordering::SeqCst) != sent_epoch {
            let current = self.credentials.borrow().access_token.clone();
            if let Some(token) = current {
                debug!("Access token was refreshed while this request was in flight");
                return Ok(token);
            }
        }

        let Some(refresh_token) = self.refresh_token().await else {
            warn!("No refresh token available, clearing session");
            self.clear_credentials().await;
            return Err(rejected.into_error());
        };

        match self.api.refresh(&refresh_token).await {
            Ok(access_token) => {
                let pair = CredentialPair::new(access_token.clone(), refresh_token);
                if let Err(e) = self.persist(&pair).await {
                    warn!("Failed to persist refreshed token, keeping it in memory only: {}", e);
                    self.publish(pair);
                }
                info!("Access token refreshed");
                Ok(access_token)
            }
            Err(e) => {
                warn!("Token refresh failed, clearing session: {}", e);
                self.clear_credentials().await;
                Err(FlAuthError::RefreshFailed(Box::new(e)))
            }
        }
    }

    /// Password login. Persists the returned pair before returning it.
    ///
    /// Bypasses 401 recovery: a rejected password is reported as-is.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let response = self.api.login(email, password).await?;
        self.persist(&CredentialPair::from(&response)).await?;
        info!(username = %response.user.username, "Logged in");
        Ok(response)
    }

    /// Google OAuth login with an authorization code
    #[instrument(skip(self, code))]
    pub async fn login_with_google(&self, code: &str) -> Result<LoginResponse> {
        let response = self.api.google_login(code).await?;
        self.persist(&CredentialPair::from(&response)).await?;
        info!(username = %response.user.username, "Logged in with Google");
        Ok(response)
    }

    /// Fetch the authenticated user (`GET /auth/me`)
    pub async fn fetch_current_user(&self) -> Result<UserRecord> {
        self.dispatch(&ApiRequest::get(endpoints::ME)).await?.json()
    }

    /// Load a persisted pair into memory on cold start
    ///
    /// A half-present pair cannot be used and is cleared.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> CredentialPair {
        let access = self.store.get(&self.keys.access).await;
        let refresh = self.store.get(&self.keys.refresh).await;

        match (access, refresh) {
            (Some(access), Some(refresh)) => {
                let pair = CredentialPair::new(access, refresh);
                self.publish(pair.clone());
                debug!("Restored persisted credentials");
                pair
            }
            (None, None) => CredentialPair::default(),
            _ => {
                warn!("Persisted credentials are incomplete, clearing them");
                self.clear_credentials().await;
                CredentialPair::default()
            }
        }
    }

    /// Drop the session. Secure store failures are logged, never returned.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        self.clear_credentials().await;
        info!("Logged out");
    }

    async fn persist(&self, pair: &CredentialPair) -> Result<()> {
        if let (Some(access), Some(refresh)) = (&pair.access_token, &pair.refresh_token) {
            self.store.set(&self.keys.access, access).await?;
            self.store.set(&self.keys.refresh, refresh).await?;
        }
        self.publish(pair.clone());
        Ok(())
    }

    fn publish(&self, pair: CredentialPair) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.credentials.send_replace(pair);
    }

    async fn clear_credentials(&self) {
        let had_credentials = !self.credentials.borrow().is_empty();
        if had_credentials {
            self.publish(CredentialPair::default());
        }
        for key in [&self.keys.access, &self.keys.refresh] {
            if let Err(e) = self.store.delete(key).await {
                warn!("Failed to delete {} from secure store: {}", key, e);
            }
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("api", &self.api)
            .field("keys", &self.keys)
            .field("credentials", &*self.credentials.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_tokens() {
        let pair = CredentialPair::new("secret-access", "secret-refresh");
        let printed = format!("{pair:?}");
        assert!(!printed.contains("secret"));
        assert!(printed.contains("REDACTED"));
    }

    #[test]
    fn test_default_pair_is_empty() {
        let pair = CredentialPair::default();
        assert!(pair.is_empty());
        assert!(!pair.has_access_token());
    }
}
