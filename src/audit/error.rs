//! Errors raised by the audit trail.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum AuditError {
    /// The audit database could not be opened or initialized.
    #[error("Cannot open audit trail at {path}: {source}")]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Audit query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// An event document or context map failed to (de)serialize.
    #[error("Audit document encoding failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A stored record has an unreadable timestamp, enum or sequence.
    #[error("Corrupt audit record: {0}")]
    Corrupt(String),

    #[error("Audit task cancelled before completion")]
    TaskCancelled,

    #[error("Cannot create audit directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_failure_names_path() {
        let err = AuditError::DatabaseOpen {
            path: PathBuf::from("/var/lib/compliantguard/guard.db"),
            source: rusqlite::Error::InvalidQuery,
        };
        let text = err.to_string();
        assert!(text.starts_with("Cannot open audit trail"));
        assert!(text.contains("/var/lib/compliantguard/guard.db"));
    }

    #[test]
    fn test_corrupt_record() {
        let err = AuditError::Corrupt("bad timestamp on sequence 12".to_string());
        assert_eq!(err.to_string(), "Corrupt audit record: bad timestamp on sequence 12");
    }

    #[test]
    fn test_json_errors_convert() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: AuditError = source.into();
        assert!(matches!(err, AuditError::Serialize(_)));
    }
}
