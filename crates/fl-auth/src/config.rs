use std::time::Duration;
use url::Url;

use crate::errors::Result;

/// Backend endpoints, relative to the configured base URL
pub mod endpoints {
    pub const LOGIN: &str = "auth/login";
    pub const REFRESH: &str = "auth/refresh";
    pub const GOOGLE: &str = "auth/google";
    pub const ME: &str = "auth/me";
}

/// Base URL used when neither settings nor environment provide one
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api/v1/";

/// Environment variables consulted by [`SessionConfig::from_env`], in order
pub const BASE_URL_ENV: &[&str] = &["FLASHY_API_URL", "EXPO_PUBLIC_API_URL"];

pub const DEFAULT_USER_AGENT: &str = "flashy-client";

/// Secure store keys for the two secrets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenKeys {
    pub access: String,
    pub refresh: String,
}

impl Default for TokenKeys {
    fn default() -> Self {
        Self {
            access: "flashy_access_token".to_string(),
            refresh: "flashy_refresh_token".to_string(),
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: Duration::from_secs(15),
        }
    }
}

/// Configuration for SessionManager
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// API root; always ends with a slash so endpoints join underneath it
    pub base_url: Url,

    /// HTTP client timeouts
    pub http_timeouts: HttpTimeouts,

    /// Custom user agent (optional)
    pub user_agent: Option<String>,

    /// Secure store keys
    pub token_keys: TokenKeys,

    /// Serialize refreshes so concurrent 401s share one refresh call.
    /// When false every rejected request refreshes on its own.
    pub share_inflight_refresh: bool,
}

impl SessionConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            http_timeouts: HttpTimeouts::default(),
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            token_keys: TokenKeys::default(),
            share_inflight_refresh: true,
        })
    }

    /// Build a config from `FLASHY_API_URL` / `EXPO_PUBLIC_API_URL`, falling back
    /// to the local development backend
    pub fn from_env() -> Result<Self> {
        let base = BASE_URL_ENV
            .iter()
            .find_map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::new(&base)
    }

    pub fn with_timeouts(mut self, http_timeouts: HttpTimeouts) -> Self {
        self.http_timeouts = http_timeouts;
        self
    }

    pub fn with_token_keys(mut self, token_keys: TokenKeys) -> Self {
        self.token_keys = token_keys;
        self
    }

    pub fn with_shared_refresh(mut self, enabled: bool) -> Self {
        self.share_inflight_refresh = enabled;
        self
    }

    /// Resolve an API path (leading slash optional) against the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }
}

fn normalize_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.ends_with('/') {
        Ok(Url::parse(trimmed)?)
    } else {
        Ok(Url::parse(&format!("{trimmed}/"))?)
    }
}
