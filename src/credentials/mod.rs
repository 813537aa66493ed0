//! GCP service account credentials, encrypted at rest.

mod error;
mod service;
mod types;

pub use error::CredentialError;
pub use service::CredentialService;
pub use types::{
    validate_service_account, ConnectionStatus, ProjectInfo, ProjectStatus, ServiceAccountKey,
    StoredKeyInfo, REQUIRED_FIELDS,
};
