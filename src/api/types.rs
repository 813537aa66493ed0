//! Request and response bodies for the HTTP endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audit::{AccessPattern, AuditRecord};
use crate::auth::PublicUser;
use crate::compliance::ScanSummary;
use crate::credentials::ProjectInfo;

/// Maximum allowed limit for report listings.
pub const MAX_REPORTS_LIMIT: u32 = 100;

/// Maximum allowed limit for audit trail queries.
pub const MAX_TRAIL_LIMIT: u32 = 1000;

/// Longest anomaly detection window, in hours.
pub const MAX_ANOMALY_HOURS: i64 = 24 * 30;

/// Response for `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub environment: String,
}

/// Response for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`.
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub environment: String,
    pub services: HealthServices,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthServices {
    pub database: String,
}

/// Response for `GET /api/v1/auth/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub user: PublicUser,
}

/// Query parameters for `GET /api/v1/reports`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportsQuery {
    #[serde(default = "default_reports_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl ReportsQuery {
    /// Get the effective limit, capped at `MAX_REPORTS_LIMIT`.
    #[must_use]
    pub fn effective_limit(&self) -> u32 {
        self.limit.min(MAX_REPORTS_LIMIT)
    }
}

impl Default for ReportsQuery {
    fn default() -> Self {
        Self {
            limit: default_reports_limit(),
            offset: 0,
        }
    }
}

const fn default_reports_limit() -> u32 {
    10
}

/// Response for `GET /api/v1/reports`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsResponse {
    pub reports: Vec<ScanSummary>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

/// Body of `POST /api/v1/gcp/credentials`.
///
/// The key may be sent as a JSON string or as an embedded object.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialRequest {
    pub project_id: String,
    pub service_account_json: Value,
}

impl CredentialRequest {
    /// The key file as text.
    #[must_use]
    pub fn key_text(&self) -> String {
        match &self.service_account_json {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

/// Query parameters for `POST /api/v1/gcp/credentials/upload`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadQuery {
    pub project_id: String,
}

/// Response after storing credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialResponse {
    pub message: String,
    pub project_id: String,
    pub credential_id: String,
    pub service_account_email: String,
}

/// Plain confirmation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response for `GET /api/v1/gcp/projects`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectsResponse {
    pub projects: Vec<ProjectInfo>,
}

/// Query parameters for `GET /api/v1/audit/trail`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrailQuery {
    #[serde(default = "default_trail_limit")]
    pub limit: u32,
}

impl TrailQuery {
    #[must_use]
    pub fn effective_limit(&self) -> u32 {
        self.limit.min(MAX_TRAIL_LIMIT)
    }
}

const fn default_trail_limit() -> u32 {
    100
}

/// Response for `GET /api/v1/audit/trail`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailResponse {
    pub records: Vec<AuditRecord>,
}

/// Query parameters for `GET /api/v1/audit/anomalies`.
#[derive(Debug, Clone, Deserialize)]
pub struct AnomalyQuery {
    #[serde(default = "default_anomaly_hours")]
    pub hours: i64,
}

impl AnomalyQuery {
    /// Window clamped to one hour..thirty days.
    #[must_use]
    pub fn effective_hours(&self) -> i64 {
        self.hours.clamp(1, MAX_ANOMALY_HOURS)
    }
}

const fn default_anomaly_hours() -> i64 {
    24
}

/// Response for `GET /api/v1/audit/anomalies`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomaliesResponse {
    pub hours: i64,
    pub patterns: Vec<AccessPattern>,
}
