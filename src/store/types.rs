//! Stored record types.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::StoreError;
use crate::compliance::ScanSummary;
use crate::crypto::EncryptedEnvelope;

/// Lifecycle state of stored credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    Active,
    Revoked,
}

impl CredentialStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
        }
    }

    /// Parse a stored status, treating unknown values as revoked.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "active" => Self::Active,
            _ => Self::Revoked,
        }
    }
}

/// A service account key as persisted, still encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredential {
    pub user_id: String,
    pub project_id: String,
    pub credential_id: Uuid,
    pub service_account_email: String,
    pub key_type: String,
    pub envelope: EncryptedEnvelope,
    /// Master key the envelope was wrapped with.
    pub key_id: String,
    pub status: CredentialStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// One page of scan summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPage {
    pub scans: Vec<ScanSummary>,
    pub total: u64,
}

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp written by [`format_timestamp`].
///
/// # Errors
///
/// Returns `StoreError::Corrupt` if the value is not RFC 3339.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp {value:?}: {e}")))
}

pub(crate) fn parse_optional_timestamp(
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    value.as_deref().map(parse_timestamp).transpose()
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value).map_err(|e| StoreError::Corrupt(format!("uuid {value:?}: {e}")))
}
