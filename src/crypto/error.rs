//! Crypto error types.

use std::path::PathBuf;

/// Errors that can occur during key loading or envelope encryption.
#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    /// No master key source configured.
    #[error("No master key configured (set encryption.key_file or encryption.key_env)")]
    NoKeyConfigured,

    /// Environment variable holding the key is not set.
    #[error("Master key environment variable {0} is not set")]
    MissingEnvKey(String),

    /// Key file could not be read.
    #[error("Failed to read key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Key material is not 32 bytes of raw or hex data.
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    /// Encryption failed.
    #[error("Encryption failed")]
    Encrypt,

    /// Decryption failed: wrong key, wrong context or tampered data.
    #[error("Decryption failed")]
    Decrypt,

    /// Envelope field is not valid base64.
    #[error("Malformed envelope field {field}: {source}")]
    Encoding {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    /// Envelope version is not supported.
    #[error("Unsupported envelope version {0}")]
    UnsupportedVersion(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_env_key_display() {
        let err = CryptoError::MissingEnvKey("COMPLIANTGUARD_MASTER_KEY".to_string());
        assert_eq!(
            err.to_string(),
            "Master key environment variable COMPLIANTGUARD_MASTER_KEY is not set"
        );
    }

    #[test]
    fn test_key_file_display() {
        let err = CryptoError::KeyFile {
            path: PathBuf::from("/etc/cg/master.key"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("/etc/cg/master.key"));
    }
}
