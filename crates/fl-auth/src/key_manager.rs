use std::path::Path;
use std::sync::Arc;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use tokio::fs;
use zeroize::Zeroizing;

use crate::crypto::{EncryptionKey, fill_random};
use crate::errors::{FlAuthError, Result};
use crate::secret::SecretProvider;

const SALT_LEN: usize = 32;
const META_FILE: &str = "meta.json";
const PASSPHRASE_PROMPT: &str = "Enter passphrase for token storage";

#[cfg(feature = "keyring-support")]
const KEYRING_SERVICE: &str = "flashy";
#[cfg(feature = "keyring-support")]
const KEYRING_USER: &str = "fl-auth:store-key:v1";

/// Argon2id parameters recorded next to the store so a later change of the
/// defaults never orphans existing files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Base64 salt
    pub salt: String,
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl KdfParams {
    fn generate() -> Result<Self> {
        let mut salt = [0u8; SALT_LEN];
        fill_random(&mut salt)?;
        Ok(Self {
            salt: STANDARD.encode(salt),
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 1,
        })
    }

    /// Stretch a passphrase into a store key
    pub fn derive(&self, passphrase: &str) -> Result<EncryptionKey> {
        let salt = STANDARD
            .decode(&self.salt)
            .map_err(|_| FlAuthError::CorruptedStore)?;
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, Some(32))
            .map_err(|e| FlAuthError::Crypto(format!("Invalid Argon2 params: {e}")))?;

        let mut out = Zeroizing::new([0u8; 32]);
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(passphrase.as_bytes(), &salt, &mut out[..])
            .map_err(|e| FlAuthError::Crypto(format!("Key derivation failed: {e}")))?;

        Ok(EncryptionKey::from_bytes(*out))
    }
}

/// Contents of `meta.json` in the store directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMeta {
    pub version: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Present once a passphrase-derived key has been used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kdf: Option<KdfParams>,
}

impl Default for KeyMeta {
    fn default() -> Self {
        Self {
            version: 1,
            created_at: chrono::Utc::now(),
            kdf: None,
        }
    }
}

/// Where the file store key comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Random key kept in the OS keyring; passphrase when the keyring is unusable
    Keyring,
    /// Always derive from the passphrase
    Passphrase,
}

impl Default for KeySource {
    fn default() -> Self {
        if cfg!(feature = "keyring-support") {
            Self::Keyring
        } else {
            Self::Passphrase
        }
    }
}

/// Resolves the key that encrypts the file store
pub struct KeyManager {
    meta: KeyMeta,
    key: EncryptionKey,
}

impl KeyManager {
    pub async fn new(
        storage_dir: &Path,
        secret_provider: Arc<dyn SecretProvider>,
        source: KeySource,
    ) -> Result<Self> {
        let meta_path = storage_dir.join(META_FILE);
        let mut meta = if fs::try_exists(&meta_path).await? {
            let content = fs::read_to_string(&meta_path).await?;
            serde_json::from_str(&content)
                .map_err(|e| FlAuthError::Storage(format!("Invalid {META_FILE}: {e}")))?
        } else {
            KeyMeta::default()
        };

        let key = match source {
            KeySource::Keyring => keyring_or_passphrase(&mut meta, secret_provider.as_ref()).await?,
            KeySource::Passphrase => from_passphrase(&mut meta, secret_provider.as_ref()).await?,
        };

        let meta_json = serde_json::to_string_pretty(&meta)?;
        fs::write(&meta_path, meta_json).await?;

        Ok(Self { meta, key })
    }

    pub fn key(&self) -> &EncryptionKey {
        &self.key
    }

    pub fn meta(&self) -> &KeyMeta {
        &self.meta
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("meta", &self.meta)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

async fn from_passphrase(
    meta: &mut KeyMeta,
    secret_provider: &dyn SecretProvider,
) -> Result<EncryptionKey> {
    let params = match &meta.kdf {
        Some(params) => params.clone(),
        None => KdfParams::generate()?,
    };

    let passphrase = secret_provider
        .get_passphrase(PASSPHRASE_PROMPT)
        .await
        .ok_or(FlAuthError::UserCancelled)?;

    let key = params.derive(&passphrase)?;
    meta.kdf = Some(params);
    Ok(key)
}

#[cfg(not(feature = "keyring-support"))]
async fn keyring_or_passphrase(
    meta: &mut KeyMeta,
    secret_provider: &dyn SecretProvider,
) -> Result<EncryptionKey> {
    from_passphrase(meta, secret_provider).await
}

/// Use the keyring key, minting one on first run. A store that was already
/// passphrase-protected keeps using its passphrase.
#[cfg(feature = "keyring-support")]
async fn keyring_or_passphrase(
    meta: &mut KeyMeta,
    secret_provider: &dyn SecretProvider,
) -> Result<EncryptionKey> {
    if meta.kdf.is_some() {
        return from_passphrase(meta, secret_provider).await;
    }

    match keyring_slot::load() {
        Ok(Some(key)) => {
            tracing::debug!("Loaded store key from OS keyring");
            return Ok(key);
        }
        Ok(None) => {
            let key = EncryptionKey::generate()?;
            match keyring_slot::save(&key) {
                Ok(()) => {
                    tracing::debug!("Stored new store key in OS keyring");
                    return Ok(key);
                }
                Err(e) => tracing::warn!("Failed to save store key to keyring: {}", e),
            }
        }
        Err(e) => tracing::debug!("Keyring unavailable ({}), using passphrase", e),
    }

    from_passphrase(meta, secret_provider).await
}

#[cfg(feature = "keyring-support")]
mod keyring_slot {
    use base64::{Engine, engine::general_purpose::STANDARD};

    use super::{KEYRING_SERVICE, KEYRING_USER};
    use crate::crypto::EncryptionKey;
    use crate::errors::{FlAuthError, Result};

    fn entry() -> Result<keyring::Entry> {
        keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)
            .map_err(|e| FlAuthError::Keyring(format!("Failed to access keyring: {e}")))
    }

    pub(super) fn load() -> Result<Option<EncryptionKey>> {
        let encoded = match entry()?.get_password() {
            Ok(encoded) => encoded,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(e) => {
                return Err(FlAuthError::Keyring(format!(
                    "Failed to read from keyring: {e}"
                )));
            }
        };

        let bytes: [u8; 32] = STANDARD
            .decode(encoded)
            .map_err(|_| FlAuthError::CorruptedStore)?
            .try_into()
            .map_err(|_| FlAuthError::CorruptedStore)?;
        Ok(Some(EncryptionKey::from_bytes(bytes)))
    }

    pub(super) fn save(key: &EncryptionKey) -> Result<()> {
        entry()?
            .set_password(&STANDARD.encode(key.as_bytes()))
            .map_err(|e| FlAuthError::Keyring(format!("Failed to write to keyring: {e}")))
    }
}
