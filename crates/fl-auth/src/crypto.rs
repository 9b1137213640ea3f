use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::errors::{FlAuthError, Result};

const NONCE_LEN: usize = 12;
const AAD_VERSION: &str = "v1";

/// AES-256 key (32 bytes)
#[derive(Clone, ZeroizeOnDrop)]
pub struct EncryptionKey {
    key: [u8; 32],
}

impl EncryptionKey {
    /// Generate a new random encryption key
    pub fn generate() -> Result<Self> {
        let mut key = [0u8; 32];
        fill_random(&mut key)?;
        Ok(Self { key })
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { key: bytes }
    }

    /// Get key bytes (sensitive)
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

/// Encrypted value with nonce and authentication tag
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EncryptedBlob {
    /// Base64url-encoded nonce (12 bytes)
    pub nonce: String,
    /// Base64url-encoded ciphertext + tag
    pub ciphertext: String,
    pub aad_version: String,
}

pub(crate) fn fill_random(buf: &mut [u8]) -> Result<()> {
    getrandom::fill(buf).map_err(|e| FlAuthError::Crypto(format!("OS randomness unavailable: {e}")))
}

fn aad(version: &str, entry_key: &str) -> String {
    format!("fl-auth|{version}|{entry_key}")
}

/// Encrypt a secret with AES-256-GCM, binding it to its store key
pub fn encrypt(key: &EncryptionKey, plaintext: &[u8], entry_key: &str) -> Result<EncryptedBlob> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_LEN];
    fill_random(&mut nonce_bytes)?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let aad = aad(AAD_VERSION, entry_key);
    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: aad.as_bytes(),
            },
        )
        .map_err(|e| FlAuthError::Crypto(format!("Encryption failed: {e}")))?;

    Ok(EncryptedBlob {
        nonce: URL_SAFE_NO_PAD.encode(nonce_bytes),
        ciphertext: URL_SAFE_NO_PAD.encode(ciphertext),
        aad_version: AAD_VERSION.to_string(),
    })
}

/// Decrypt a blob produced by [`encrypt`] for the same store key
pub fn decrypt(key: &EncryptionKey, blob: &EncryptedBlob, entry_key: &str) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let nonce_bytes = URL_SAFE_NO_PAD
        .decode(&blob.nonce)
        .map_err(|e| FlAuthError::Crypto(format!("Invalid nonce: {e}")))?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(FlAuthError::CorruptedStore);
    }
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = URL_SAFE_NO_PAD
        .decode(&blob.ciphertext)
        .map_err(|e| FlAuthError::Crypto(format!("Invalid ciphertext: {e}")))?;

    let aad = aad(&blob.aad_version, entry_key);
    let plaintext = cipher
        .decrypt(
            nonce,
            Payload {
                msg: &ciphertext,
                aad: aad.as_bytes(),
            },
        )
        .map_err(|_| FlAuthError::CorruptedStore)?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = EncryptionKey::generate().unwrap();
        let encrypted = encrypt(&key, b"refresh-token-value", "flashy_refresh_token").unwrap();
        let decrypted = decrypt(&key, &encrypted, "flashy_refresh_token").unwrap();
        assert_eq!(decrypted.as_slice(), b"refresh-token-value");
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = EncryptionKey::generate().unwrap();
        let key2 = EncryptionKey::generate().unwrap();

        let encrypted = encrypt(&key1, b"secret", "k").unwrap();
        let result = decrypt(&key2, &encrypted, "k");

        assert!(matches!(result, Err(FlAuthError::CorruptedStore)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = EncryptionKey::generate().unwrap();
        let mut encrypted = encrypt(&key, b"secret", "k").unwrap();

        let mut ct_bytes = URL_SAFE_NO_PAD.decode(&encrypted.ciphertext).unwrap();
        ct_bytes[0] ^= 0xFF;
        encrypted.ciphertext = URL_SAFE_NO_PAD.encode(ct_bytes);

        assert!(matches!(
            decrypt(&key, &encrypted, "k"),
            Err(FlAuthError::CorruptedStore)
        ));
    }

    // A blob copied from the access-token slot must not decrypt as the refresh token
    #[test]
    fn test_blob_bound_to_entry_key() {
        let key = EncryptionKey::generate().unwrap();
        let encrypted = encrypt(&key, b"secret", "flashy_access_token").unwrap();
        let result = decrypt(&key, &encrypted, "flashy_refresh_token");

        assert!(matches!(result, Err(FlAuthError::CorruptedStore)));
    }
}
