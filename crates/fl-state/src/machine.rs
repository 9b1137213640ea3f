use std::future::Future;
use std::sync::Arc;

use fl_auth::{CredentialPair, ErrorKind, LoginResponse, SessionManager, UserRecord};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::gate::ActiveTree;
use crate::state::{AuthState, AuthStatus};

/// Message shown when the backend gives no reason for a failed login
pub const DEFAULT_LOGIN_ERROR: &str = "Login failed";

/// Drives [`AuthState`] through login and logout
///
/// The only writer of the state. UI code issues intents and reads
/// snapshots or subscribes to changes.
#[derive(Debug, Clone)]
pub struct AuthStateMachine {
    session: Arc<SessionManager>,
    state: Arc<watch::Sender<AuthState>>,
}

impl AuthStateMachine {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self {
            session,
            state: Arc::new(watch::Sender::new(AuthState::default())),
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Start a password login
    ///
    /// The state moves to `Loading` before this returns; the returned future
    /// completes the transition to `Succeeded` or `Failed`.
    pub fn login(&self, email: &str, password: &str) -> impl Future<Output = ()> + Send + use<> {
        let session = Arc::clone(&self.session);
        let email = email.to_owned();
        let password = password.to_owned();
        self.run_login(async move { session.login(&email, &password).await })
    }

    /// Fire-and-forget password login; observe the outcome through the state
    pub fn spawn_login(&self, email: &str, password: &str) -> JoinHandle<()> {
        tokio::spawn(self.login(email, password))
    }

    /// Start a Google OAuth login with an authorization code
    pub fn login_with_google(&self, code: &str) -> impl Future<Output = ()> + Send + use<> {
        let session = Arc::clone(&self.session);
        let code = code.to_owned();
        self.run_login(async move { session.login_with_google(&code).await })
    }

    fn run_login<F>(&self, call: F) -> impl Future<Output = ()> + Send + use<F>
    where
        F: Future<Output = fl_auth::Result<LoginResponse>> + Send + 'static,
    {
        self.state.send_modify(|state| {
            state.status = AuthStatus::Loading;
            state.last_error = None;
        });

        let state = Arc::clone(&self.state);
        async move {
            match call.await {
                Ok(response) => {
                    info!(username = %response.user.username, "Login succeeded");
                    state.send_modify(|state| {
                        state.credentials = CredentialPair::from(&response);
                        state.user = Some(response.user);
                        state.status = AuthStatus::Succeeded;
                        state.last_error = None;
                    });
                }
                Err(e) => {
                    warn!("Login failed: {}", e);
                    let message = e
                        .server_message()
                        .unwrap_or(DEFAULT_LOGIN_ERROR)
                        .to_string();
                    state.send_modify(|state| {
                        state.status = AuthStatus::Failed;
                        state.last_error = Some(message);
                    });
                }
            }
        }
    }

    /// Drop the session and return to `Idle`. Always succeeds.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        self.session.logout().await;
        self.state.send_replace(AuthState::default());
    }

    /// Resume a persisted session on cold start
    ///
    /// Returns true when the stored tokens are still accepted and the user
    /// record could be fetched. Tokens the backend rejects leave the state
    /// `Idle`; any other failure (offline, 5xx) keeps the tokens in the state
    /// and marks it `Failed` with no user, so a later restore can retry.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> bool {
        let credentials = self.session.restore().await;
        if credentials.is_empty() {
            debug!("No persisted session");
            return false;
        }

        self.state.send_modify(|state| {
            state.status = AuthStatus::Loading;
            state.last_error = None;
        });

        match self.session.fetch_current_user().await {
            Ok(user) => {
                info!(username = %user.username, "Session restored");
                let credentials = self.session.credentials();
                self.state.send_modify(|state| {
                    state.user = Some(user);
                    state.credentials = credentials;
                    state.status = AuthStatus::Succeeded;
                });
                true
            }
            Err(e) if e.kind() == ErrorKind::Unauthorized => {
                warn!("Stored session was rejected: {}", e);
                self.state.send_replace(AuthState::default());
                false
            }
            Err(e) => {
                warn!("Could not restore session, keeping stored tokens: {}", e);
                let credentials = self.session.credentials();
                self.state.send_modify(|state| {
                    state.credentials = credentials;
                    state.status = AuthStatus::Failed;
                    state.last_error = Some(e.to_string());
                });
                false
            }
        }
    }

    /// Mirror session-side credential changes (refresh, forced clear) into
    /// the state until the session is dropped
    pub fn track_session(&self) -> JoinHandle<()> {
        let mut credentials = self.session.subscribe();
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            while credentials.changed().await.is_ok() {
                let pair = credentials.borrow_and_update().clone();
                state.send_if_modified(|state| mirror_credentials(state, &pair));
            }
        })
    }

    /// Current state snapshot
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn status(&self) -> AuthStatus {
        self.state.borrow().status
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.borrow().last_error.clone()
    }

    pub fn user(&self) -> Option<UserRecord> {
        self.state.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn active_tree(&self) -> ActiveTree {
        self.state.borrow().active_tree()
    }
}

/// Apply a session credential change; returns whether the state changed
fn mirror_credentials(state: &mut AuthState, pair: &CredentialPair) -> bool {
    if pair.is_empty() {
        if state.credentials.is_empty() {
            return false;
        }
        debug!("Session credentials cleared, returning to idle");
        *state = AuthState::default();
        return true;
    }

    if state.status != AuthStatus::Loading
        && state.credentials.has_access_token()
        && state.credentials != *pair
    {
        state.credentials = pair.clone();
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in() -> AuthState {
        AuthState {
            user: Some(UserRecord::new("ada", ["admin"])),
            credentials: CredentialPair::new("T1", "R1"),
            status: AuthStatus::Succeeded,
            last_error: None,
        }
    }

    #[test]
    fn test_mirror_refreshed_token() {
        let mut state = signed_in();
        assert!(mirror_credentials(&mut state, &CredentialPair::new("T2", "R1")));
        assert_eq!(state.credentials.access_token.as_deref(), Some("T2"));
        assert!(state.is_authenticated());
    }

    #[test]
    fn test_mirror_refreshed_token_after_failed_relogin() {
        let mut state = AuthState {
            status: AuthStatus::Failed,
            last_error: Some("Login failed".to_string()),
            ..signed_in()
        };
        assert!(mirror_credentials(&mut state, &CredentialPair::new("T2", "R1")));
        assert_eq!(state.credentials.access_token.as_deref(), Some("T2"));
        assert_eq!(state.status, AuthStatus::Failed);
    }

    #[test]
    fn test_mirror_clear_deauthenticates() {
        let mut state = signed_in();
        assert!(mirror_credentials(&mut state, &CredentialPair::default()));
        assert_eq!(state, AuthState::default());
        assert_eq!(state.active_tree(), ActiveTree::Public);
    }

    #[test]
    fn test_mirror_ignores_pair_while_loading() {
        let mut state = AuthState {
            status: AuthStatus::Loading,
            ..AuthState::default()
        };
        assert!(!mirror_credentials(&mut state, &CredentialPair::new("T1", "R1")));
        assert!(state.credentials.is_empty());
    }

    #[test]
    fn test_mirror_clear_when_already_idle_is_noop() {
        let mut state = AuthState::default();
        assert!(!mirror_credentials(&mut state, &CredentialPair::default()));
    }
}
