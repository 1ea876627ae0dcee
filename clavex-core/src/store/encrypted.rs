//! Encrypted file-backed credential store.
//!
//! The whole key-value map is serialized to JSON and sealed with
//! AES-256-GCM under a key derived from a caller-supplied device secret.
//! Whole-file writes make every logical update atomic: a reader sees the
//! previous map or the new one, never a mixture.

use std::collections::HashMap;
use std::path::PathBuf;

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::credentials::CredentialKey;
use crate::error::StorageError;
use crate::ports::CredentialStore;

const NONCE_SIZE: usize = 12;
const SALT_SIZE: usize = 16;
const STORE_VERSION: u32 = 1;
const KEY_DERIVATION_INFO: &[u8] = b"clavex-credential-store-v1";

/// Encrypted envelope written to disk.
#[derive(Debug, Serialize, Deserialize)]
struct EncryptedEnvelope {
    /// Base64 encoded nonce
    nonce: String,
    /// Base64 encoded encrypted data
    ciphertext: String,
    /// When this data was encrypted
    encrypted_at: DateTime<Utc>,
    /// Version for future compatibility
    version: u32,
    /// Base64 encoded salt used for key derivation
    salt: String,
}

/// Credential store sealed to a device secret.
///
/// The secret is typically a hardware fingerprint or keystore-wrapped value;
/// data written on one device cannot be read with another secret. Operations
/// serialize through an internal lock so concurrent writers cannot tear the
/// read-modify-write cycle.
pub struct EncryptedFileStore {
    path: PathBuf,
    device_secret: String,
    lock: Mutex<()>,
}

impl std::fmt::Debug for EncryptedFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The device secret never appears in debug output.
        f.debug_struct("EncryptedFileStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl EncryptedFileStore {
    /// Store writing to `path`, keyed by `device_secret`.
    pub fn new(path: PathBuf, device_secret: &str) -> Self {
        Self {
            path,
            device_secret: device_secret.to_string(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the encrypted file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Whether an encrypted map exists on disk.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn derive_key(&self, salt: &[u8]) -> Result<Key<Aes256Gcm>, StorageError> {
        let hk = hkdf::Hkdf::<sha2::Sha256>::new(Some(salt), self.device_secret.as_bytes());
        let mut okm = [0u8; 32];
        hk.expand(KEY_DERIVATION_INFO, &mut okm)
            .map_err(|_| StorageError::InitFailed("HKDF expand failed".to_string()))?;
        Ok(*Key::<Aes256Gcm>::from_slice(&okm))
    }

    async fn load_map(&self) -> Result<HashMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let json = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| StorageError::ReadFailed(e.to_string()))?;
        let envelope: EncryptedEnvelope =
            serde_json::from_str(&json).map_err(|_| StorageError::CorruptedData)?;

        if envelope.version != STORE_VERSION {
            log::warn!(
                "Unsupported credential store version: {}",
                envelope.version
            );
            return Err(StorageError::CorruptedData);
        }

        let nonce_bytes = BASE64
            .decode(&envelope.nonce)
            .map_err(|_| StorageError::CorruptedData)?;
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(StorageError::CorruptedData);
        }
        let ciphertext = BASE64
            .decode(&envelope.ciphertext)
            .map_err(|_| StorageError::CorruptedData)?;
        let salt = BASE64
            .decode(&envelope.salt)
            .map_err(|_| StorageError::CorruptedData)?;

        let cipher = Aes256Gcm::new(&self.derive_key(&salt)?);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| StorageError::DecryptionFailed)?;

        serde_json::from_slice(&plaintext).map_err(|_| StorageError::CorruptedData)
    }

    async fn save_map(&self, map: &HashMap<String, String>) -> Result<(), StorageError> {
        let plaintext = serde_json::to_vec(map).map_err(|_| StorageError::EncryptionFailed)?;

        let mut salt = [0u8; SALT_SIZE];
        getrandom::fill(&mut salt).map_err(|e| StorageError::InitFailed(e.to_string()))?;

        let cipher = Aes256Gcm::new(&self.derive_key(&salt)?);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_ref())
            .map_err(|_| StorageError::EncryptionFailed)?;

        let envelope = EncryptedEnvelope {
            nonce: BASE64.encode(nonce),
            ciphertext: BASE64.encode(ciphertext),
            encrypted_at: Utc::now(),
            version: STORE_VERSION,
            salt: BASE64.encode(salt),
        };
        let json = serde_json::to_string_pretty(&envelope)
            .map_err(|_| StorageError::EncryptionFailed)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        }
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;

        log::debug!("Saved encrypted credentials to {:?}", self.path);
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for EncryptedFileStore {
    async fn get(&self, key: CredentialKey) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.load_map().await?.get(key.as_str()).cloned())
    }

    async fn put(&self, key: CredentialKey, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut map = self.load_map().await?;
        map.insert(key.as_str().to_string(), value.to_string());
        self.save_map(&map).await
    }

    async fn delete(&self, key: CredentialKey) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut map = self.load_map().await?;
        if map.remove(key.as_str()).is_some() {
            self.save_map(&map).await?;
        }
        Ok(())
    }

    async fn put_many(&self, entries: &[(CredentialKey, String)]) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut map = self.load_map().await?;
        for (key, value) in entries {
            map.insert(key.as_str().to_string(), value.clone());
        }
        // Single file write: the whole logical update commits at once.
        self.save_map(&map).await
    }
}
