//! Envelope encryption.
//!
//! Each payload is sealed with a fresh data key, and the data key is sealed
//! with the master key. Both layers use AES-256-GCM with the canonical
//! encryption context as associated data, so a record copied to another
//! user or project fails to decrypt.

use std::collections::BTreeMap;
use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::error::CryptoError;
use super::keys::{KeyProvider, KEY_SIZE};

/// Current envelope format version.
pub const ENVELOPE_VERSION: u8 = 1;

const NONCE_SIZE: usize = 12;

/// Key/value pairs bound to a ciphertext as associated data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptionContext(BTreeMap<String, String>);

impl EncryptionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Context for a user's credentials on a project.
    #[must_use]
    pub fn for_credentials(user_id: &str, project_id: &str) -> Self {
        Self::new()
            .with("user_id", user_id)
            .with("project_id", project_id)
            .with("purpose", "gcp_credentials")
    }

    /// Canonical byte form: sorted pairs with every key and value written
    /// as `<byte length>:<bytes>`, so distinct contexts never collide.
    #[must_use]
    pub fn canonical(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for part in self.0.iter().flat_map(|(k, v)| [k, v]) {
            out.extend_from_slice(part.len().to_string().as_bytes());
            out.push(b':');
            out.extend_from_slice(part.as_bytes());
        }
        out
    }
}

/// Sealed payload with its wrapped data key. Binary fields are base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub version: u8,
    pub wrapped_key: String,
    pub key_nonce: String,
    pub nonce: String,
    pub ciphertext: String,
}

/// A single named string field, sealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedField {
    pub field_name: String,
    pub envelope: EncryptedEnvelope,
}

/// Envelope cipher backed by a master key provider.
#[derive(Debug, Clone)]
pub struct EnvelopeCipher {
    provider: Arc<dyn KeyProvider>,
}

impl EnvelopeCipher {
    #[must_use]
    pub fn new(provider: Arc<dyn KeyProvider>) -> Self {
        Self { provider }
    }

    /// Identifier of the master key in use.
    #[must_use]
    pub fn key_id(&self) -> String {
        self.provider.key_id()
    }

    /// Encrypt `plaintext` under a fresh data key.
    ///
    /// # Errors
    ///
    /// Returns an error if the master key cannot be loaded or sealing fails.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        context: &EncryptionContext,
    ) -> Result<EncryptedEnvelope, CryptoError> {
        let master = self.provider.master_key()?;
        let aad = context.canonical();

        let mut data_key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut data_key);

        let (nonce, ciphertext) = seal(&data_key, plaintext, &aad)?;
        let (key_nonce, wrapped_key) = seal(master.as_bytes(), &data_key, &aad)?;

        Ok(EncryptedEnvelope {
            version: ENVELOPE_VERSION,
            wrapped_key: STANDARD.encode(wrapped_key),
            key_nonce: STANDARD.encode(key_nonce),
            nonce: STANDARD.encode(nonce),
            ciphertext: STANDARD.encode(ciphertext),
        })
    }

    /// Decrypt an envelope sealed with the same context.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Decrypt` if the data was tampered with or the
    /// context differs, and `CryptoError::Encoding` for malformed fields.
    pub fn decrypt(
        &self,
        envelope: &EncryptedEnvelope,
        context: &EncryptionContext,
    ) -> Result<Vec<u8>, CryptoError> {
        if envelope.version != ENVELOPE_VERSION {
            return Err(CryptoError::UnsupportedVersion(envelope.version));
        }
        let master = self.provider.master_key()?;
        let aad = context.canonical();

        let wrapped_key = decode("wrapped_key", &envelope.wrapped_key)?;
        let key_nonce = decode("key_nonce", &envelope.key_nonce)?;
        let nonce = decode("nonce", &envelope.nonce)?;
        let ciphertext = decode("ciphertext", &envelope.ciphertext)?;

        let data_key = open(master.as_bytes(), &key_nonce, &wrapped_key, &aad)?;
        open(&data_key, &nonce, &ciphertext, &aad)
    }

    /// Encrypt a single string field, binding its name into the context.
    ///
    /// # Errors
    ///
    /// See [`EnvelopeCipher::encrypt`].
    pub fn encrypt_field(
        &self,
        field_name: &str,
        value: &str,
        context: &EncryptionContext,
    ) -> Result<EncryptedField, CryptoError> {
        let context = context.clone().with("field", field_name);
        Ok(EncryptedField {
            field_name: field_name.to_string(),
            envelope: self.encrypt(value.as_bytes(), &context)?,
        })
    }

    /// Decrypt a field produced by [`EnvelopeCipher::encrypt_field`].
    ///
    /// # Errors
    ///
    /// See [`EnvelopeCipher::decrypt`]. Non-UTF-8 plaintext is reported as
    /// `CryptoError::Decrypt`.
    pub fn decrypt_field(
        &self,
        field: &EncryptedField,
        context: &EncryptionContext,
    ) -> Result<String, CryptoError> {
        let context = context.clone().with("field", field.field_name.as_str());
        let bytes = self.decrypt(&field.envelope, &context)?;
        String::from_utf8(bytes).map_err(|_| CryptoError::Decrypt)
    }
}

fn seal(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<([u8; NONCE_SIZE], Vec<u8>), CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::Encrypt)?;
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::Encrypt)?;
    Ok((nonce, ciphertext))
}

fn open(key: &[u8], nonce: &[u8], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if nonce.len() != NONCE_SIZE {
        return Err(CryptoError::Decrypt);
    }
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::Decrypt)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::Decrypt)
}

fn decode(field: &'static str, value: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(value)
        .map_err(|source| CryptoError::Encoding { field, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{MasterKey, StaticKeyProvider};

    fn cipher() -> EnvelopeCipher {
        EnvelopeCipher::new(Arc::new(StaticKeyProvider::random()))
    }

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = cipher();
        let context = EncryptionContext::for_credentials("user-1", "acme-health");
        let envelope = cipher.encrypt(b"{\"type\":\"service_account\"}", &context).unwrap();

        assert_eq!(envelope.version, ENVELOPE_VERSION);
        assert_ne!(envelope.ciphertext, STANDARD.encode(b"{\"type\":\"service_account\"}"));

        let plaintext = cipher.decrypt(&envelope, &context).unwrap();
        assert_eq!(plaintext, b"{\"type\":\"service_account\"}");
    }

    #[test]
    fn test_context_mismatch_fails() {
        let cipher = cipher();
        let envelope = cipher
            .encrypt(b"secret", &EncryptionContext::for_credentials("user-1", "proj-a"))
            .unwrap();

        let result = cipher.decrypt(&envelope, &EncryptionContext::for_credentials("user-2", "proj-a"));
        assert!(matches!(result, Err(CryptoError::Decrypt)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let cipher = cipher();
        let context = EncryptionContext::new().with("purpose", "test");
        let mut envelope = cipher.encrypt(b"secret payload", &context).unwrap();

        let mut bytes = STANDARD.decode(&envelope.ciphertext).unwrap();
        bytes[0] ^= 0xff;
        envelope.ciphertext = STANDARD.encode(bytes);

        assert!(matches!(
            cipher.decrypt(&envelope, &context),
            Err(CryptoError::Decrypt)
        ));
    }

    #[test]
    fn test_wrong_master_key_fails() {
        let context = EncryptionContext::new();
        let envelope = cipher().encrypt(b"secret", &context).unwrap();
        let other = EnvelopeCipher::new(Arc::new(StaticKeyProvider::new(MasterKey::new([9; KEY_SIZE]))));

        assert!(matches!(
            other.decrypt(&envelope, &context),
            Err(CryptoError::Decrypt)
        ));
    }

    #[test]
    fn test_malformed_base64_reports_field() {
        let cipher = cipher();
        let context = EncryptionContext::new();
        let mut envelope = cipher.encrypt(b"x", &context).unwrap();
        envelope.nonce = "not base64!".to_string();

        let err = cipher.decrypt(&envelope, &context).unwrap_err();
        assert!(matches!(err, CryptoError::Encoding { field: "nonce", .. }));
    }

    #[test]
    fn test_unsupported_version() {
        let cipher = cipher();
        let context = EncryptionContext::new();
        let mut envelope = cipher.encrypt(b"x", &context).unwrap();
        envelope.version = 7;

        assert!(matches!(
            cipher.decrypt(&envelope, &context),
            Err(CryptoError::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn test_field_name_is_bound() {
        let cipher = cipher();
        let context = EncryptionContext::for_credentials("u", "p");
        let field = cipher.encrypt_field("private_key", "-----BEGIN", &context).unwrap();
        assert_eq!(cipher.decrypt_field(&field, &context).unwrap(), "-----BEGIN");

        let renamed = EncryptedField {
            field_name: "client_email".to_string(),
            envelope: field.envelope,
        };
        assert!(cipher.decrypt_field(&renamed, &context).is_err());
    }

    #[test]
    fn test_canonical_context_is_sorted() {
        let context = EncryptionContext::new().with("b", "2").with("a", "1");
        assert_eq!(context.canonical(), b"1:a1:11:b1:2");
    }

    #[test]
    fn test_canonical_context_is_unambiguous() {
        let split = EncryptionContext::new().with("a", "1").with("b", "2");
        let packed = EncryptionContext::new().with("a", "1;b=2");
        let shifted = EncryptionContext::new().with("a", "1:b").with("", "2");
        assert_ne!(split.canonical(), packed.canonical());
        assert_ne!(split.canonical(), shifted.canonical());
        assert_ne!(packed.canonical(), shifted.canonical());
    }

    #[test]
    fn test_lookalike_context_fails_to_decrypt() {
        let cipher = cipher();
        let owner = EncryptionContext::new().with("project_id", "acme").with("user_id", "u1");
        let envelope = cipher.encrypt(b"secret", &owner).unwrap();

        let lookalike = EncryptionContext::new().with("project_id", "acme;user_id=u1");
        assert!(matches!(
            cipher.decrypt(&envelope, &lookalike),
            Err(CryptoError::Decrypt)
        ));
        assert_eq!(cipher.decrypt(&envelope, &owner).unwrap(), b"secret");
    }
}
