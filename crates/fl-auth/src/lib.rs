//! Authenticated HTTP session for the Flashy backend
//!
//! This crate owns the access/refresh token pair of the single signed-in
//! user, keeps it in a secure store across restarts, and authorizes every
//! API call made on the user's behalf.
//!
//! # Request Flow
//!
//! 1. [`SessionManager::attach_authorization`] adds `Authorization: Bearer`
//!    and `Content-Type: application/json` unless the caller set them
//! 2. The request is sent
//! 3. On `401` the refresh token is exchanged at `POST /auth/refresh` and the
//!    request is retried once with the new access token
//! 4. If no refresh token exists, or the refresh fails, both tokens are
//!    cleared from memory and from the secure store
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fl_auth::{ApiRequest, MemorySecureStore, SessionConfig, SessionManager};
//!
//! #[tokio::main]
//! async fn main() -> fl_auth::Result<()> {
//!     let config = SessionConfig::from_env()?;
//!     let session = SessionManager::new(config, Arc::new(MemorySecureStore::new()))?;
//!
//!     let login = session.login("ada@example.com", "correct horse").await?;
//!     println!("Logged in as: {}", login.user.username);
//!
//!     // Expired access tokens are refreshed transparently
//!     let response = session.dispatch(&ApiRequest::get("/flashcards")).await?;
//!     println!("{}", response.text());
//!
//!     session.logout().await;
//!     Ok(())
//! }
//! ```
//!
//! # Secure Storage
//!
//! Tokens are persisted through the [`SecureStore`] trait:
//!
//! - [`MemorySecureStore`] for tests
//! - [`FileSecureStore`], AES-256-GCM encrypted files with the key held in
//!   the OS keyring (Argon2id passphrase fallback)
//! - `KeyringSecureStore` (feature `keyring-support`), tokens stored directly
//!   in the OS credential manager
//!
//! ```
//! use fl_auth::{MemorySecureStore, SecureStore};
//!
//! # async fn example() -> fl_auth::Result<()> {
//! let store = MemorySecureStore::new();
//! store.set("flashy_access_token", "T1").await?;
//! assert_eq!(store.get("flashy_access_token").await.as_deref(), Some("T1"));
//! store.delete("flashy_access_token").await?;
//! # Ok(())
//! # }
//! # tokio_test::block_on(example()).unwrap();
//! ```
//!
//! Tokens are never logged; `Debug` output of credential types is redacted.

pub mod client;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod file_store;
pub mod key_manager;
#[cfg(feature = "keyring-support")]
pub mod keyring_store;
pub mod models;
pub mod request;
pub mod secret;
pub mod session;
pub mod store;

pub use client::AuthApi;
pub use config::{HttpTimeouts, SessionConfig, TokenKeys};
pub use errors::{ErrorKind, FlAuthError, Result};
pub use file_store::FileSecureStore;
pub use key_manager::KeySource;
#[cfg(feature = "keyring-support")]
pub use keyring_store::KeyringSecureStore;
pub use models::{ADMIN_ROLE, LoginResponse, UserRecord};
pub use request::{ApiRequest, ApiResponse};
pub use secret::{EnvSecretProvider, NoSecretProvider, SecretProvider, StaticSecretProvider};
pub use session::{CredentialPair, SessionManager};
pub use store::{MemorySecureStore, SecureStore};
