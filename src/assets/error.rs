//! Asset inventory error types.

use std::path::PathBuf;

/// Errors that can occur while loading an asset inventory.
#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    /// No exported inventory exists for the project.
    #[error("No asset inventory found for project {project_id} at {path}")]
    NotFound { project_id: String, path: PathBuf },

    /// Inventory file could not be read.
    #[error("Failed to read asset inventory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document or line did not parse.
    #[error("Invalid asset JSON at line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// The document parsed but has an unexpected shape.
    #[error("Unrecognised asset inventory format: {0}")]
    Format(String),

    /// Service account key could not be used to sign an assertion.
    #[error("Failed to sign token assertion: {0}")]
    Assertion(#[from] jsonwebtoken::errors::Error),

    /// The live source requires credentials.
    #[error("Credentials are required to query the Cloud Asset API")]
    MissingCredentials,

    /// Transport failure.
    #[error("Cloud Asset request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from Google APIs.
    #[error("Cloud Asset API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
}

impl AssetError {
    /// Caller-facing explanation for API status codes.
    #[must_use]
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Api { status: 403, .. } => {
                Some("Service account lacks required 'Cloud Asset Viewer' permission")
            }
            Self::Api { status: 404, .. } => Some("Project not found or Cloud Asset API not enabled"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = AssetError::NotFound {
            project_id: "acme-health".to_string(),
            path: PathBuf::from("assets/acme-health.json"),
        };
        assert_eq!(
            err.to_string(),
            "No asset inventory found for project acme-health at assets/acme-health.json"
        );
    }

    #[test]
    fn test_api_hints() {
        let forbidden = AssetError::Api {
            status: 403,
            message: "denied".to_string(),
        };
        assert!(forbidden.hint().unwrap().contains("Cloud Asset Viewer"));

        let server = AssetError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert!(server.hint().is_none());
    }
}
