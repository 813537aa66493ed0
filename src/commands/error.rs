//! Command error types.

use std::path::PathBuf;

use crate::api::{ApiError, StartupError};
use crate::assets::AssetError;
use crate::audit::AuditError;
use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::retention::RetentionError;
use crate::scanner::ScanError;
use crate::store::StoreError;

/// Errors surfaced by CLI commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Could not read an input file.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not serialize output.
    #[error("Failed to serialize output: {0}")]
    Output(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Startup(#[from] StartupError),

    #[error(transparent)]
    Server(#[from] ApiError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Retention(#[from] RetentionError),

    /// The audit chain failed verification.
    #[error("Audit chain broken at sequence {0}")]
    ChainBroken(u64),
}
