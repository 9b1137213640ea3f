use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fs2::FileExt;
use tokio::fs;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use zeroize::Zeroizing;

use crate::crypto::{self, EncryptedBlob};
use crate::errors::{FlAuthError, Result};
use crate::key_manager::{KeyManager, KeySource};
use crate::secret::SecretProvider;
use crate::store::SecureStore;

/// How long a writer waits for another process holding the store lock
const LOCK_WAIT: Duration = Duration::from_secs(5);

/// File-based encrypted secure store
///
/// Each key is stored as an AES-256-GCM blob in its own file. The
/// encryption key comes from the OS keyring, with an Argon2id passphrase
/// fallback.
///
/// # Directory Structure
/// ```text
/// ~/.config/flashy/fl-auth/
/// ├── meta.json                      # Key derivation metadata
/// ├── lock                           # Advisory lock file
/// └── secrets/
///     ├── flashy_access_token.json
///     └── flashy_refresh_token.json
/// ```
#[derive(Debug)]
pub struct FileSecureStore {
    secrets_dir: PathBuf,
    lock_file: PathBuf,
    key_manager: KeyManager,
    cache: RwLock<HashMap<String, Zeroizing<String>>>,
    writer: Mutex<()>,
}

/// Held for the duration of a write or delete
struct WriteGuard<'a> {
    _lock_file: std::fs::File,
    _writer: MutexGuard<'a, ()>,
}

impl FileSecureStore {
    pub async fn new(
        storage_dir: impl AsRef<Path>,
        secret_provider: Arc<dyn SecretProvider>,
    ) -> Result<Self> {
        Self::with_key_source(storage_dir, secret_provider, KeySource::default()).await
    }

    pub async fn with_key_source(
        storage_dir: impl AsRef<Path>,
        secret_provider: Arc<dyn SecretProvider>,
        key_source: KeySource,
    ) -> Result<Self> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        let secrets_dir = storage_dir.join("secrets");
        let lock_file = storage_dir.join("lock");

        fs::create_dir_all(&secrets_dir).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            std::fs::set_permissions(&storage_dir, perms.clone())?;
            std::fs::set_permissions(&secrets_dir, perms)?;
        }

        let key_manager = KeyManager::new(&storage_dir, secret_provider, key_source).await?;

        Ok(Self {
            secrets_dir,
            lock_file,
            key_manager,
            cache: RwLock::new(HashMap::new()),
            writer: Mutex::new(()),
        })
    }

    /// Default storage directory for the current platform
    pub fn default_storage_dir() -> Result<PathBuf> {
        let project_dirs = directories::ProjectDirs::from("", "", "flashy").ok_or_else(|| {
            FlAuthError::Storage("Could not determine config directory".to_string())
        })?;

        Ok(project_dirs.config_dir().join("fl-auth"))
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(FlAuthError::Storage(format!("Invalid store key: {key:?}")));
        }
        Ok(self.secrets_dir.join(format!("{key}.json")))
    }

    /// Serialize writers in this process, then take the advisory lock that
    /// guards against other processes
    async fn acquire_lock(&self) -> Result<WriteGuard<'_>> {
        let writer = self.writer.lock().await;

        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_file)?;
        let locking = tokio::task::spawn_blocking(move || {
            lock_file.lock_exclusive().map(|()| lock_file)
        });

        let lock_file = tokio::time::timeout(LOCK_WAIT, locking)
            .await
            .map_err(|_| FlAuthError::LockTimeout)?
            .map_err(|e| FlAuthError::Storage(format!("Lock task failed: {e}")))??;

        Ok(WriteGuard {
            _lock_file: lock_file,
            _writer: writer,
        })
    }

    async fn read_from_disk(&self, key: &str) -> Result<Option<Zeroizing<String>>> {
        let path = self.entry_path(key)?;
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        let blob: EncryptedBlob = serde_json::from_str(&content)
            .map_err(|e| FlAuthError::Storage(format!("Invalid encrypted data: {e}")))?;

        let plaintext = crypto::decrypt(self.key_manager.key(), &blob, key)?;
        let value = String::from_utf8(plaintext.to_vec()).map_err(|_| FlAuthError::CorruptedStore)?;

        Ok(Some(Zeroizing::new(value)))
    }

    async fn write_to_disk(&self, key: &str, value: &str) -> Result<()> {
        let path = self.entry_path(key)?;

        let blob = crypto::encrypt(self.key_manager.key(), value.as_bytes(), key)?;
        let blob_json = serde_json::to_string_pretty(&blob)?;

        // Write to a temp file and rename so readers never see a torn value
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, blob_json).await?;
        fs::File::open(&temp_path).await?.sync_all().await?;
        fs::rename(&temp_path, &path).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl SecureStore for FileSecureStore {
    async fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.cache.read().await.get(key) {
            return Some(value.to_string());
        }

        match self.read_from_disk(key).await {
            Ok(Some(value)) => {
                let out = value.to_string();
                self.cache.write().await.insert(key.to_string(), value);
                Some(out)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::error!("Failed to read secret {}: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.acquire_lock().await?;

        self.write_to_disk(key, value).await?;
        self.cache
            .write()
            .await
            .insert(key.to_string(), Zeroizing::new(value.to_string()));

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.acquire_lock().await?;

        let path = self.entry_path(key)?;
        if fs::try_exists(&path).await? {
            fs::remove_file(&path).await?;
        }
        self.cache.write().await.remove(key);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::StaticSecretProvider;
    use tempfile::TempDir;

    async fn create_test_store(dir: &Path) -> FileSecureStore {
        let secret_provider = Arc::new(StaticSecretProvider::new("test-passphrase"));
        FileSecureStore::with_key_source(dir, secret_provider, KeySource::Passphrase)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let temp = TempDir::new().unwrap();
        let store = create_test_store(temp.path()).await;

        store.set("flashy_access_token", "T1").await.unwrap();
        assert_eq!(store.get("flashy_access_token").await.as_deref(), Some("T1"));
        assert!(store.get("flashy_refresh_token").await.is_none());
    }

    #[tokio::test]
    async fn test_values_survive_reopen_and_are_encrypted() {
        let temp = TempDir::new().unwrap();
        {
            let store = create_test_store(temp.path()).await;
            store.set("flashy_refresh_token", "R-secret").await.unwrap();
        }

        let raw = std::fs::read_to_string(temp.path().join("secrets/flashy_refresh_token.json")).unwrap();
        assert!(!raw.contains("R-secret"));

        let reopened = create_test_store(temp.path()).await;
        assert_eq!(
            reopened.get("flashy_refresh_token").await.as_deref(),
            Some("R-secret")
        );
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = create_test_store(temp.path()).await;

        store.set("flashy_access_token", "T1").await.unwrap();
        store.delete("flashy_access_token").await.unwrap();
        store.delete("flashy_access_token").await.unwrap();

        assert!(store.get("flashy_access_token").await.is_none());
        assert!(!temp.path().join("secrets/flashy_access_token.json").exists());
    }

    #[tokio::test]
    async fn test_wrong_passphrase_reads_as_absent() {
        let temp = TempDir::new().unwrap();
        {
            let store = create_test_store(temp.path()).await;
            store.set("flashy_access_token", "T1").await.unwrap();
        }

        let other = FileSecureStore::with_key_source(
            temp.path(),
            Arc::new(StaticSecretProvider::new("another-passphrase")),
            KeySource::Passphrase,
        )
        .await
        .unwrap();
        assert!(other.get("flashy_access_token").await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_set_and_delete_both_apply() {
        let temp = TempDir::new().unwrap();
        let store = create_test_store(temp.path()).await;
        store.set("flashy_access_token", "T1").await.unwrap();
        store.set("flashy_refresh_token", "R1").await.unwrap();

        let (set, delete) = tokio::join!(
            store.set("flashy_access_token", "T2"),
            store.delete("flashy_refresh_token"),
        );
        set.unwrap();
        delete.unwrap();

        assert_eq!(store.get("flashy_access_token").await.as_deref(), Some("T2"));
        assert!(store.get("flashy_refresh_token").await.is_none());
        assert!(!temp.path().join("secrets/flashy_refresh_token.json").exists());
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let temp = TempDir::new().unwrap();
        let store = create_test_store(temp.path()).await;

        assert!(matches!(
            store.set("../escape", "x").await,
            Err(FlAuthError::Storage(_))
        ));
    }
}
