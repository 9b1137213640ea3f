use zeroize::Zeroizing;

/// Source of the passphrase used to derive the file store key
///
/// Consulted only when the OS keyring is unavailable or the crate is built
/// without `keyring-support`.
#[async_trait::async_trait]
pub trait SecretProvider: Send + Sync {
    /// Returns None if the user cancels or no passphrase is available.
    async fn get_passphrase(&self, prompt: &str) -> Option<Zeroizing<String>>;
}

/// Keyring-only: never supplies a passphrase
#[derive(Debug, Clone, Default)]
pub struct NoSecretProvider;

#[async_trait::async_trait]
impl SecretProvider for NoSecretProvider {
    async fn get_passphrase(&self, _prompt: &str) -> Option<Zeroizing<String>> {
        None
    }
}

/// Fixed passphrase, for tests and headless hosts
#[derive(Debug, Clone)]
pub struct StaticSecretProvider {
    secret: Zeroizing<String>,
}

impl StaticSecretProvider {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
        }
    }
}

#[async_trait::async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn get_passphrase(&self, _prompt: &str) -> Option<Zeroizing<String>> {
        Some(self.secret.clone())
    }
}

/// Passphrase read from an environment variable
#[derive(Debug, Clone)]
pub struct EnvSecretProvider {
    var: String,
}

impl EnvSecretProvider {
    pub const DEFAULT_VAR: &'static str = "FLASHY_STORE_PASSPHRASE";

    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvSecretProvider {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VAR)
    }
}

#[async_trait::async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn get_passphrase(&self, _prompt: &str) -> Option<Zeroizing<String>> {
        std::env::var(&self.var)
            .ok()
            .filter(|v| !v.is_empty())
            .map(Zeroizing::new)
    }
}
