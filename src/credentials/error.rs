//! Credential service error types.

use crate::crypto::CryptoError;
use crate::store::StoreError;

/// Errors from validating, storing and loading service account keys.
#[derive(thiserror::Error, Debug)]
pub enum CredentialError {
    #[error("Invalid JSON file format")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Invalid service account file. Missing fields: {}", field_list(.0))]
    MissingFields(Vec<&'static str>),

    #[error("File must be a service account key")]
    NotServiceAccount,

    #[error("Service account project ({key_project}) doesn't match specified project ({requested})")]
    ProjectMismatch {
        key_project: String,
        requested: String,
    },

    #[error("Invalid project id: {0}")]
    InvalidProjectId(String),

    #[error("GCP credentials not found for this project")]
    NotFound,

    #[error("GCP credentials are not active")]
    Inactive,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn field_list(fields: &[&str]) -> String {
    let quoted: Vec<String> = fields.iter().map(|f| format!("'{f}'")).collect();
    format!("[{}]", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_display() {
        let err = CredentialError::MissingFields(vec!["private_key", "client_id"]);
        assert_eq!(
            err.to_string(),
            "Invalid service account file. Missing fields: ['private_key', 'client_id']"
        );
    }

    #[test]
    fn test_project_mismatch_display() {
        let err = CredentialError::ProjectMismatch {
            key_project: "other".to_string(),
            requested: "acme".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Service account project (other) doesn't match specified project (acme)"
        );
    }
}
