use fl_auth::{CredentialPair, UserRecord};

use crate::gate::{ActiveTree, select_active_tree};

/// Progress of the latest login attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AuthStatus {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed,
}

impl std::fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Observable session state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<UserRecord>,
    pub credentials: CredentialPair,
    pub status: AuthStatus,
    pub last_error: Option<String>,
}

impl AuthState {
    /// An access token and a user are both present
    pub fn is_authenticated(&self) -> bool {
        self.credentials.has_access_token() && self.user.is_some()
    }

    pub fn active_tree(&self) -> ActiveTree {
        select_active_tree(self.is_authenticated(), self.user.as_ref())
    }
}
