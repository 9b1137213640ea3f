use crate::errors::{FlAuthError, Result};
use crate::store::SecureStore;

/// Secure store backed directly by the OS credential manager
/// (macOS Keychain, Windows Credential Manager, Linux Secret Service)
#[derive(Debug, Clone)]
pub struct KeyringSecureStore {
    service: String,
}

impl KeyringSecureStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, key)
            .map_err(|e| FlAuthError::Keyring(format!("Failed to access keyring: {e}")))
    }
}

impl Default for KeyringSecureStore {
    fn default() -> Self {
        Self::new("flashy")
    }
}

#[async_trait::async_trait]
impl SecureStore for KeyringSecureStore {
    async fn get(&self, key: &str) -> Option<String> {
        let entry = match self.entry(key) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!("{}", e);
                return None;
            }
        };

        match entry.get_password() {
            Ok(value) => Some(value),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                tracing::error!("Failed to read {} from keyring: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| FlAuthError::Keyring(format!("Failed to write {key} to keyring: {e}")))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(FlAuthError::Keyring(format!(
                "Failed to delete {key} from keyring: {e}"
            ))),
        }
    }
}
