//! Audit event types for access logging and security monitoring.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of an audited access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessResult {
    Success,
    Denied,
    Error,
    NotFound,
    Partial,
}

impl AccessResult {
    /// Returns the string representation for database storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Denied => "denied",
            Self::Error => "error",
            Self::NotFound => "not_found",
            Self::Partial => "partial",
        }
    }
}

/// Type of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Read or write of customer data.
    DataAccess,
    UserLogin,
    UserLogout,
    AdminAction,
    /// Maintenance performed by the service itself.
    SystemEvent,
    SecurityEvent,
    /// Access to protected health information.
    PhiAccess,
    BulkOperation,
    DataExport,
    DataDeletion,
    EncryptionEvent,
    PermissionChange,
}

impl EventType {
    /// Returns the string representation for database storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataAccess => "data_access",
            Self::UserLogin => "user_login",
            Self::UserLogout => "user_logout",
            Self::AdminAction => "admin_action",
            Self::SystemEvent => "system_event",
            Self::SecurityEvent => "security_event",
            Self::PhiAccess => "phi_access",
            Self::BulkOperation => "bulk_operation",
            Self::DataExport => "data_export",
            Self::DataDeletion => "data_deletion",
            Self::EncryptionEvent => "encryption_event",
            Self::PermissionChange => "permission_change",
        }
    }
}

/// Kind of security event raised by the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    BruteForceAttempt,
    UnusualIpAccess,
    BulkDataOperation,
    MultipleFailedLogins,
    SuspiciousUserAgent,
    PrivilegeEscalation,
    DataExfiltrationAttempt,
    UnauthorizedApiAccess,
}

impl SecurityEventType {
    /// Returns the string representation for database storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BruteForceAttempt => "brute_force_attempt",
            Self::UnusualIpAccess => "unusual_ip_access",
            Self::BulkDataOperation => "bulk_data_operation",
            Self::MultipleFailedLogins => "multiple_failed_logins",
            Self::SuspiciousUserAgent => "suspicious_user_agent",
            Self::PrivilegeEscalation => "privilege_escalation",
            Self::DataExfiltrationAttempt => "data_exfiltration_attempt",
            Self::UnauthorizedApiAccess => "unauthorized_api_access",
        }
    }
}

/// Severity of a security event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Returns the string representation for database storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// High and critical events are broadcast as alerts.
    #[must_use]
    pub fn is_alert(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

/// An audited access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique audit record ID.
    pub audit_id: Uuid,
    /// Acting user, or the attempted login for failed logins.
    pub user_id: String,
    /// What was done (`login`, `store_credentials`, `scan`, ...).
    pub action: String,
    /// Kind of resource acted on.
    pub resource_type: String,
    /// Specific resource, if any.
    pub resource_id: Option<String>,
    pub result: AccessResult,
    pub event_type: EventType,
    /// When the access occurred.
    pub timestamp: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: Option<u64>,
    /// Data classification such as `PHI`.
    pub data_classification: Option<String>,
    #[serde(default)]
    pub compliance_tags: Vec<String>,
    /// Free-form context (`purpose`, `minimum_necessary`, ...).
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl AuditEvent {
    /// Create a new builder for an audit event.
    #[must_use]
    pub fn builder(
        user_id: impl Into<String>,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        result: AccessResult,
    ) -> AuditEventBuilder {
        AuditEventBuilder::new(user_id.into(), action.into(), resource_type.into(), result)
    }

    /// Whether this access touched protected health information.
    #[must_use]
    pub fn is_phi(&self) -> bool {
        self.event_type == EventType::PhiAccess
            || self.data_classification.as_deref() == Some("PHI")
    }
}

/// Builder for creating audit events.
#[derive(Debug, Clone)]
pub struct AuditEventBuilder {
    event: AuditEvent,
}

impl AuditEventBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(user_id: String, action: String, resource_type: String, result: AccessResult) -> Self {
        Self {
            event: AuditEvent {
                audit_id: Uuid::new_v4(),
                user_id,
                action,
                resource_type,
                resource_id: None,
                result,
                event_type: EventType::DataAccess,
                timestamp: Utc::now(),
                ip_address: None,
                user_agent: None,
                error_message: None,
                duration_ms: None,
                data_classification: None,
                compliance_tags: Vec::new(),
                context: BTreeMap::new(),
            },
        }
    }

    #[must_use]
    pub fn event_type(mut self, event_type: EventType) -> Self {
        self.event.event_type = event_type;
        self
    }

    #[must_use]
    pub fn resource_id(mut self, id: impl Into<String>) -> Self {
        self.event.resource_id = Some(id.into());
        self
    }

    /// Set a custom timestamp.
    #[must_use]
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.event.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn ip_address(mut self, ip: Option<String>) -> Self {
        self.event.ip_address = ip;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, agent: Option<String>) -> Self {
        self.event.user_agent = agent;
        self
    }

    #[must_use]
    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.event.error_message = Some(message.into());
        self
    }

    #[must_use]
    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.event.duration_ms = Some(ms);
        self
    }

    #[must_use]
    pub fn classification(mut self, classification: impl Into<String>) -> Self {
        self.event.data_classification = Some(classification.into());
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.event.compliance_tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn context(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.event.context.insert(key.into(), value.into());
        self
    }

    /// Build the audit event.
    #[must_use]
    pub fn build(self) -> AuditEvent {
        self.event
    }
}

/// A stored audit event with its chain position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub sequence_number: u64,
    pub previous_hash: String,
    pub hash: String,
    /// When the record was written.
    pub logged_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AuditEvent,
}

/// A security-relevant event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub security_event_id: Uuid,
    pub event_type: SecurityEventType,
    pub severity: Severity,
    pub user_id: Option<String>,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub ip_address: Option<String>,
    /// Always `automated` for events raised by the audit log.
    pub detection_method: String,
}

impl SecurityEvent {
    #[must_use]
    pub fn new(event_type: SecurityEventType, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            security_event_id: Uuid::new_v4(),
            event_type,
            severity,
            user_id: None,
            description: description.into(),
            timestamp: Utc::now(),
            ip_address: None,
            detection_method: "automated".to_string(),
        }
    }

    #[must_use]
    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn ip_address(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }
}

/// An unusual access pattern found by anomaly detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPattern {
    pub user_id: String,
    /// `excessive_failed_logins`, `multiple_ip_addresses` or `high_volume_access`.
    pub pattern_type: String,
    pub frequency: u64,
    /// Window analysed, e.g. `24h`.
    pub time_window: String,
    pub baseline_frequency: f64,
    pub deviation_score: f64,
    pub timestamp: DateTime<Utc>,
    pub suspicious: bool,
}

/// Filter for [`AuditLog::trail`](super::AuditLog::trail).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailFilter {
    pub user_id: Option<String>,
    pub event_type: Option<EventType>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: u32,
}

impl Default for TrailFilter {
    fn default() -> Self {
        Self {
            user_id: None,
            event_type: None,
            start: None,
            end: None,
            limit: 100,
        }
    }
}

impl TrailFilter {
    /// Records of one user, newest first.
    #[must_use]
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }
}

/// Result of re-computing the hash chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    pub records_checked: u64,
    /// Sequence number of the first record whose hash or link is wrong.
    pub first_broken: Option<u64>,
}

impl ChainVerification {
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.first_broken.is_none()
    }
}

/// Audit activity summary for a reporting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditComplianceReport {
    pub report_id: Uuid,
    pub compliance_type: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_access_events: u64,
    pub phi_access_events: u64,
    pub unauthorized_attempts: u64,
    pub unique_users: u64,
    pub by_event_type: BTreeMap<String, u64>,
    pub by_result: BTreeMap<String, u64>,
    pub by_action: BTreeMap<String, u64>,
    pub security_events_by_severity: BTreeMap<String, u64>,
    pub generated_at: DateTime<Utc>,
}
