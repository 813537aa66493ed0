//! Service account key and project views.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::CredentialError;
use crate::store::{CredentialStatus, StoredCredential};

/// Fields every service account key file must carry.
pub const REQUIRED_FIELDS: [&str; 8] = [
    "type",
    "project_id",
    "private_key_id",
    "private_key",
    "client_email",
    "client_id",
    "auth_uri",
    "token_uri",
];

const SERVICE_ACCOUNT_TYPE: &str = "service_account";

/// A GCP service account key file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub project_id: String,
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    pub client_id: String,
    pub auth_uri: String,
    pub token_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_provider_x509_cert_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_x509_cert_url: Option<String>,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .finish_non_exhaustive()
    }
}

/// Validate a key file against the project it is being attached to.
///
/// # Errors
///
/// Returns `InvalidJson`, `MissingFields`, `NotServiceAccount` or
/// `ProjectMismatch`.
pub fn validate_service_account(
    json: &str,
    project_id: &str,
) -> Result<ServiceAccountKey, CredentialError> {
    let value: Value = serde_json::from_str(json).map_err(CredentialError::InvalidJson)?;

    let missing: Vec<&'static str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| value.get(*field).map_or(true, Value::is_null))
        .collect();
    if !missing.is_empty() {
        return Err(CredentialError::MissingFields(missing));
    }

    if value.get("type").and_then(Value::as_str) != Some(SERVICE_ACCOUNT_TYPE) {
        return Err(CredentialError::NotServiceAccount);
    }

    let key: ServiceAccountKey =
        serde_json::from_value(value).map_err(CredentialError::InvalidJson)?;
    if key.project_id != project_id {
        return Err(CredentialError::ProjectMismatch {
            key_project: key.project_id,
            requested: project_id.to_string(),
        });
    }
    Ok(key)
}

/// Result of storing a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredKeyInfo {
    pub project_id: String,
    pub credential_id: String,
    pub service_account_email: String,
    /// True when an earlier key for the project was replaced.
    pub replaced: bool,
}

/// A project the user has attached credentials to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub project_id: String,
    pub service_account_email: String,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub status: CredentialStatus,
}

impl From<&StoredCredential> for ProjectInfo {
    fn from(credential: &StoredCredential) -> Self {
        Self {
            project_id: credential.project_id.clone(),
            service_account_email: credential.service_account_email.clone(),
            created_at: credential.created_at,
            last_used: credential.last_used,
            status: credential.status,
        }
    }
}

/// Connection state of a project's credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// Status view of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStatus {
    pub project_id: String,
    pub status: CredentialStatus,
    pub service_account_email: String,
    pub last_used: Option<DateTime<Utc>>,
    pub connection_status: ConnectionStatus,
}

impl From<ProjectInfo> for ProjectStatus {
    fn from(info: ProjectInfo) -> Self {
        let connection_status = match info.status {
            CredentialStatus::Active => ConnectionStatus::Connected,
            CredentialStatus::Revoked => ConnectionStatus::Disconnected,
        };
        Self {
            project_id: info.project_id,
            status: info.status,
            service_account_email: info.service_account_email,
            last_used: info.last_used,
            connection_status,
        }
    }
}
