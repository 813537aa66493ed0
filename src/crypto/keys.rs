//! Master key providers.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;

use super::error::CryptoError;
use crate::config::EncryptionConfig;

/// Size of an AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;

/// A 256-bit key used to wrap per-record data keys.
#[derive(Clone)]
pub struct MasterKey([u8; KEY_SIZE]);

impl MasterKey {
    #[must_use]
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Generate a random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parse key material given either as 64 hex characters or 32 raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` if the material has the wrong length
    /// or is not valid hex.
    pub fn parse(material: &[u8]) -> Result<Self, CryptoError> {
        let trimmed = material.trim_ascii();
        if trimmed.len() == KEY_SIZE * 2 {
            let decoded = hex::decode(trimmed).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
            return Self::from_slice(&decoded);
        }
        if material.len() == KEY_SIZE {
            return Self::from_slice(material);
        }
        Err(CryptoError::InvalidKey(format!(
            "expected {KEY_SIZE} raw bytes or {} hex characters, got {} bytes",
            KEY_SIZE * 2,
            material.len()
        )))
    }

    fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey(format!("expected {KEY_SIZE} bytes")))?;
        Ok(Self(key))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Hex encoding of the key, for `keygen` output.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// Source of the master key.
pub trait KeyProvider: Send + Sync + fmt::Debug {
    /// Load the current master key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be loaded or parsed.
    fn master_key(&self) -> Result<MasterKey, CryptoError>;

    /// Identifier recorded alongside encrypted data.
    fn key_id(&self) -> String;
}

/// Fixed in-memory key, mostly for tests.
#[derive(Debug, Clone)]
pub struct StaticKeyProvider {
    key: MasterKey,
}

impl StaticKeyProvider {
    #[must_use]
    pub fn new(key: MasterKey) -> Self {
        Self { key }
    }

    #[must_use]
    pub fn random() -> Self {
        Self::new(MasterKey::generate())
    }
}

impl KeyProvider for StaticKeyProvider {
    fn master_key(&self) -> Result<MasterKey, CryptoError> {
        Ok(self.key.clone())
    }

    fn key_id(&self) -> String {
        "static".to_string()
    }
}

/// Key read from an environment variable on each use.
#[derive(Debug, Clone)]
pub struct EnvKeyProvider {
    var: String,
}

impl EnvKeyProvider {
    #[must_use]
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl KeyProvider for EnvKeyProvider {
    fn master_key(&self) -> Result<MasterKey, CryptoError> {
        let value =
            std::env::var(&self.var).map_err(|_| CryptoError::MissingEnvKey(self.var.clone()))?;
        MasterKey::parse(value.as_bytes())
    }

    fn key_id(&self) -> String {
        format!("env:{}", self.var)
    }
}

/// Key read from a file containing hex or raw bytes.
#[derive(Debug, Clone)]
pub struct FileKeyProvider {
    path: PathBuf,
}

impl FileKeyProvider {
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl KeyProvider for FileKeyProvider {
    fn master_key(&self) -> Result<MasterKey, CryptoError> {
        let bytes = std::fs::read(&self.path).map_err(|source| CryptoError::KeyFile {
            path: self.path.clone(),
            source,
        })?;
        MasterKey::parse(&bytes)
    }

    fn key_id(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Build the key provider described by the configuration.
///
/// # Errors
///
/// Returns `CryptoError::NoKeyConfigured` when neither a file nor an
/// environment variable is configured.
pub fn key_provider_from_config(
    config: &EncryptionConfig,
) -> Result<Arc<dyn KeyProvider>, CryptoError> {
    if let Some(path) = &config.key_file {
        return Ok(Arc::new(FileKeyProvider::new(path)));
    }
    if let Some(var) = &config.key_env {
        return Ok(Arc::new(EnvKeyProvider::new(var)));
    }
    Err(CryptoError::NoKeyConfigured)
}

/// Generate a random master key as a hex string.
#[must_use]
pub fn generate_key_hex() -> String {
    MasterKey::generate().to_hex()
}
