use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Role that unlocks the privileged navigation tree
pub const ADMIN_ROLE: &str = "admin";

/// `POST /auth/login` request body
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// `POST /auth/google` request body
#[derive(Debug, Clone, Serialize)]
pub struct GoogleLoginRequest<'a> {
    pub code: &'a str,
}

/// Login response (password and Google flows share it)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserRecord,
}

/// `POST /auth/refresh` response. The refresh token is reused unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Error body returned by the backend
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// Authenticated user as reported by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserRecord {
    pub fn new<I, S>(username: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            username: username.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            id: None,
            email: None,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_record_from_backend_payload() {
        let payload = r#"{
            "id": 7,
            "username": "ada",
            "email": "ada@example.com",
            "roles": ["student", "admin"],
            "profile": {"bio": null},
            "is_active": true
        }"#;
        let user: UserRecord = serde_json::from_str(payload).unwrap();
        assert_eq!(user.username, "ada");
        assert_eq!(user.id, Some(7));
        assert!(user.is_admin());
        assert!(user.has_role("student"));
        assert!(!user.has_role("teacher"));
    }

    #[test]
    fn test_user_record_without_roles() {
        let user: UserRecord = serde_json::from_str(r#"{"username": "bob"}"#).unwrap();
        assert!(user.roles.is_empty());
        assert!(!user.is_admin());
    }

    #[test]
    fn test_refresh_response_missing_token() {
        let body: RefreshResponse = serde_json::from_str("{}").unwrap();
        assert!(body.access_token.is_none());
    }
}
