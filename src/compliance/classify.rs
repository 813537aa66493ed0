//! Classification of policy violation text.
//!
//! Policy engines report violations as human-readable sentences such as
//! `Firewall rule 'default-allow-ssh' allows unrestricted access to sensitive
//! port 22 (Network Security)`. These helpers turn that text into structured
//! severity, resource, HIPAA section and remediation data.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use uuid::Uuid;

use super::types::{Violation, ViolationSeverity, ViolationType};

const CRITICAL_KEYWORDS: &[&str] = &[
    "public access",
    "unrestricted",
    "allows all",
    "open to internet",
    "no encryption",
    "default service account",
    "admin access",
];

const HIGH_KEYWORDS: &[&str] = &[
    "session timeout",
    "logging",
    "audit",
    "access control",
    "firewall",
    "ssh",
    "rdp",
    "breach detection",
];

const MEDIUM_KEYWORDS: &[&str] = &[
    "iam policies",
    "minimum necessary",
    "review required",
    "configuration",
    "permissions",
];

/// HIPAA and SOC 2 references, checked in order.
const HIPAA_SECTIONS: &[(&str, &str)] = &[
    ("Technical Safeguards", "§164.312"),
    ("Admin Safeguards", "§164.308"),
    ("Administrative Safeguards", "§164.308"),
    ("Physical Safeguards", "§164.310"),
    ("Network Security", "§164.312(e)"),
    ("Breach Notification", "§164.400"),
    ("Minimum Necessary", "§164.502(b)"),
    ("Environment Separation", "§164.308(a)(3)"),
    ("SOC 2 Security", "SOC 2 CC6.1"),
    ("Processing Integrity", "SOC 2 CC7.1"),
];

/// Resource kinds recognised by their leading phrase.
const RESOURCE_PREFIXES: &[(&str, &str)] = &[
    ("Storage bucket", "storage.bucket"),
    ("Firewall rule", "compute.firewall"),
    ("Compute instance", "compute.instance"),
    ("Cloud SQL instance", "sql.instance"),
    ("GKE cluster", "container.cluster"),
    ("Cloud Function", "cloudfunctions.function"),
    ("Log sink", "logging.sink"),
    ("Cloud KMS key", "kms.cryptokey"),
    ("Project IAM policy", "resourcemanager.project"),
];

static HIGH_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bHigh\b").expect("valid regex"));

static QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'([^']+)'").expect("valid regex"));

/// Maximum title length when the text has no ` - ` separator.
const TITLE_MAX_CHARS: usize = 50;

/// Classify the severity of a violation from its text.
///
/// Explicit severity markers win over keyword heuristics.
#[must_use]
pub fn classify_severity(text: &str) -> ViolationSeverity {
    if text.contains("Critical") || text.contains("critical") {
        return ViolationSeverity::Critical;
    }
    if text.contains("Violation (High)") || HIGH_MARKER.is_match(text) {
        return ViolationSeverity::High;
    }
    if text.contains("Violation (Medium)") {
        return ViolationSeverity::Medium;
    }
    if text.contains("Violation (Low)") || text.contains("Review Required") || text.contains("Warning")
    {
        return ViolationSeverity::Low;
    }

    let lower = text.to_lowercase();
    let has_any = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    if has_any(CRITICAL_KEYWORDS) {
        ViolationSeverity::Critical
    } else if has_any(HIGH_KEYWORDS) {
        ViolationSeverity::High
    } else if has_any(MEDIUM_KEYWORDS) {
        ViolationSeverity::Medium
    } else {
        ViolationSeverity::Low
    }
}

/// Find the HIPAA (or SOC 2) section a violation refers to.
#[must_use]
pub fn extract_hipaa_section(text: &str) -> Option<&'static str> {
    HIPAA_SECTIONS
        .iter()
        .find(|(name, _)| text.contains(name))
        .map(|(_, code)| *code)
}

/// Extract `(resource_type, resource_name)` from violation text.
#[must_use]
pub fn extract_resource(text: &str) -> (String, String) {
    let Some((_, resource_type)) = RESOURCE_PREFIXES
        .iter()
        .find(|(prefix, _)| text.contains(prefix))
    else {
        return ("Unknown".to_string(), "Unknown".to_string());
    };

    let name = QUOTED
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or_else(|| "Unknown".to_string(), |m| m.as_str().to_string());

    ((*resource_type).to_string(), name)
}

/// Short title for a violation.
#[must_use]
pub fn violation_title(text: &str) -> String {
    match text.split_once(" - ") {
        Some((head, _)) => head.to_string(),
        None => text.chars().take(TITLE_MAX_CHARS).collect(),
    }
}

/// One-line business impact statement.
#[must_use]
pub fn business_impact(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    if lower.contains("public access") {
        "PHI data could be publicly accessible on the internet"
    } else if lower.contains("firewall") && (lower.contains("ssh") || lower.contains("rdp")) {
        "Remote access could be exploited to access PHI systems"
    } else if lower.contains("session timeout") {
        "Users may remain logged in beyond necessary timeframes"
    } else if lower.contains("default service account") {
        "Default accounts have excessive permissions and poor audit trails"
    } else if lower.contains("logging") || lower.contains("breach detection") {
        "Cannot detect or investigate potential PHI breaches"
    } else if lower.contains("iam") || lower.contains("minimum necessary") {
        "Excessive permissions could lead to unauthorized PHI access"
    } else {
        "Potential HIPAA compliance violation affecting PHI security"
    }
}

fn steps(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Remediation steps for a violation.
#[must_use]
pub fn remediation_steps(text: &str) -> Vec<String> {
    let env_separation = text.contains("Environment Separation");

    if text.contains("Storage bucket") && text.contains("public access") {
        steps(&[
            "Review bucket IAM policies",
            "Remove public access permissions",
            "Implement least privilege access",
            "Enable uniform bucket-level access",
        ])
    } else if text.contains("Firewall rule") && text.contains("unrestricted access") {
        steps(&[
            "Review firewall rule configuration",
            "Restrict source IP ranges",
            "Implement network segmentation",
            "Enable VPC flow logs",
        ])
    } else if text.contains("service account") {
        steps(&[
            "Create custom service account",
            "Assign minimal required permissions",
            "Remove default service account usage",
            "Implement service account keys rotation",
        ])
    } else if env_separation && text.contains("tagging") {
        steps(&[
            "Implement environment tagging strategy (dev/staging/prod)",
            "Create environment-specific resource naming conventions",
            "Apply consistent labels to all cloud resources",
            "Set up automated tagging policies and compliance monitoring",
            "Document environment classification procedures",
        ])
    } else if env_separation && text.contains("network") {
        steps(&[
            "Create environment-specific VPCs or networks",
            "Implement network segmentation between environments",
            "Configure environment-specific security groups and firewall rules",
            "Enable network monitoring and flow logs",
            "Document network architecture and separation controls",
        ])
    } else if env_separation && text.contains("access controls") {
        steps(&[
            "Implement environment-specific IAM roles and policies",
            "Create separate service accounts for each environment",
            "Configure conditional access based on environment",
            "Enable audit logging for cross-environment access attempts",
            "Regular review of environment access permissions",
        ])
    } else if text.contains("production-grade configuration") {
        steps(&[
            "Enable versioning and lifecycle policies for production storage",
            "Implement backup and disaster recovery procedures",
            "Configure monitoring and alerting for production resources",
            "Apply security hardening specific to production environments",
            "Document production environment standards and procedures",
        ])
    } else {
        steps(&[
            "Review the identified resource configuration",
            "Implement HIPAA-compliant security controls",
            "Document remediation actions",
            "Schedule regular compliance reviews",
        ])
    }
}

/// Build a structured violation from policy output text.
#[must_use]
pub fn parse_violation(text: &str, violation_type: ViolationType, project_id: &str) -> Violation {
    let (resource_type, resource_name) = extract_resource(text);
    Violation {
        id: Uuid::new_v4(),
        violation_type,
        severity: classify_severity(text),
        title: violation_title(text),
        description: text.to_string(),
        resource_type,
        resource_name,
        project_id: project_id.to_string(),
        hipaa_section: extract_hipaa_section(text).map(str::to_string),
        remediation_steps: remediation_steps(text),
        created_at: Utc::now(),
    }
}
