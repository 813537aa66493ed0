//! Scanner error types.

use crate::assets::AssetError;
use crate::credentials::CredentialError;
use crate::store::StoreError;

/// Errors that can occur while selecting policies or evaluating a project.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// A requested policy pack does not exist.
    #[error("Unknown policy pack: {0}")]
    UnknownPolicy(String),

    /// Custom scans must name the packs to run.
    #[error("Custom scans require at least one included policy")]
    EmptyCustomScan,

    /// Policy engine output is not in the expected shape.
    #[error("Invalid OPA output: {0}")]
    OpaOutput(String),

    /// Policy engine output is not JSON.
    #[error("Invalid OPA output: {0}")]
    Json(#[from] serde_json::Error),

    /// Asset inventory could not be loaded.
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// Stored credentials could not be loaded.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// The report could not be saved.
    #[error(transparent)]
    Store(#[from] StoreError),
}
