//! Compliance domain types shared by the scanner, store and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a compliance violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ViolationSeverity {
    /// Returns the string representation for storage and display.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Category of a compliance violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    HipaaViolation,
    HipaaReviewRequired,
    SecurityRisk,
    ComplianceGap,
}

impl ViolationType {
    /// Returns the string representation for storage and display.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HipaaViolation => "hipaa_violation",
            Self::HipaaReviewRequired => "hipaa_review_required",
            Self::SecurityRisk => "security_risk",
            Self::ComplianceGap => "compliance_gap",
        }
    }
}

/// A single violation found in a scanned project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub violation_type: ViolationType,
    pub severity: ViolationSeverity,
    pub title: String,
    pub description: String,
    pub resource_type: String,
    pub resource_name: String,
    pub project_id: String,
    pub hipaa_section: Option<String>,
    #[serde(default)]
    pub remediation_steps: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    #[default]
    Completed,
    Failed,
}

impl ScanStatus {
    /// Returns the string representation for database storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse a stored status, treating unknown values as failed.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "completed" => Self::Completed,
            _ => Self::Failed,
        }
    }
}

/// Number of violations at each severity level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl SeverityCounts {
    /// Count violations by severity.
    #[must_use]
    pub fn from_violations(violations: &[Violation]) -> Self {
        let mut counts = Self::default();
        for violation in violations {
            counts.record(violation.severity);
        }
        counts
    }

    /// Record a single violation of the given severity.
    pub fn record(&mut self, severity: ViolationSeverity) {
        match severity {
            ViolationSeverity::Critical => self.critical += 1,
            ViolationSeverity::High => self.high += 1,
            ViolationSeverity::Medium => self.medium += 1,
            ViolationSeverity::Low => self.low += 1,
        }
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.critical + self.high + self.medium + self.low
    }
}

/// Full result of a compliance scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub scan_id: Uuid,
    pub user_id: String,
    pub project_id: String,
    pub scan_timestamp: DateTime<Utc>,
    pub violations: Vec<Violation>,
    pub total_violations: u32,
    pub critical_violations: u32,
    pub high_violations: u32,
    pub medium_violations: u32,
    pub low_violations: u32,
    pub compliance_score: f64,
    pub status: ScanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComplianceReport {
    /// Severity counts as recorded on the report.
    #[must_use]
    pub fn counts(&self) -> SeverityCounts {
        SeverityCounts {
            critical: self.critical_violations,
            high: self.high_violations,
            medium: self.medium_violations,
            low: self.low_violations,
        }
    }

    /// Summary view without the violation list.
    #[must_use]
    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            scan_id: self.scan_id,
            project_id: self.project_id.clone(),
            scan_timestamp: self.scan_timestamp,
            total_violations: self.total_violations,
            compliance_score: self.compliance_score,
            status: self.status,
        }
    }
}

/// Report listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub scan_id: Uuid,
    pub project_id: String,
    pub scan_timestamp: DateTime<Utc>,
    pub total_violations: u32,
    pub compliance_score: f64,
    pub status: ScanStatus,
}

/// Violation totals shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationSummary {
    pub total_violations: u32,
    pub critical_violations: u32,
    pub high_violations: u32,
    pub medium_violations: u32,
    pub low_violations: u32,
}

impl From<SeverityCounts> for ViolationSummary {
    fn from(counts: SeverityCounts) -> Self {
        Self {
            total_violations: counts.total(),
            critical_violations: counts.critical,
            high_violations: counts.high,
            medium_violations: counts.medium,
            low_violations: counts.low,
        }
    }
}

/// Per-user dashboard aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardData {
    pub user_id: String,
    pub total_scans: u64,
    pub total_projects: u64,
    pub overall_compliance_score: f64,
    pub recent_scans: Vec<ScanSummary>,
    pub last_scan_date: Option<DateTime<Utc>>,
    pub violation_summary: ViolationSummary,
}

/// Depth of a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    #[default]
    Full,
    Quick,
    Custom,
}

/// Request to scan a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanRequest {
    pub project_id: String,
    #[serde(default)]
    pub scan_type: ScanType,
    #[serde(default)]
    pub include_policies: Vec<String>,
    #[serde(default)]
    pub exclude_policies: Vec<String>,
}

impl ScanRequest {
    /// Full scan of a project with no policy filters.
    #[must_use]
    pub fn full(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Default::default()
        }
    }
}
