//! Colored terminal output for scan reports and maintenance commands.

use std::io::{self, Write};

use owo_colors::OwoColorize;

use crate::audit::{AuditComplianceReport, ChainVerification};
use crate::compliance::{ComplianceReport, ScanStatus, Violation, ViolationSeverity};
use crate::retention::RetentionSummary;

/// Maximum length for resource names in violation headers.
const RESOURCE_MAX_LEN: usize = 60;

/// Truncate a string to a maximum number of characters, adding an ellipsis
/// if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{kept}...")
}

fn severity_label(severity: ViolationSeverity) -> String {
    let label = format!("[{}]", severity.as_str().to_uppercase());
    match severity {
        ViolationSeverity::Critical => label.red().bold().to_string(),
        ViolationSeverity::High => label.red().to_string(),
        ViolationSeverity::Medium => label.yellow().to_string(),
        ViolationSeverity::Low => label.blue().to_string(),
    }
}

fn score_label(score: f64) -> String {
    let text = format!("{score:.1}");
    if score >= 80.0 {
        text.green().bold().to_string()
    } else if score >= 60.0 {
        text.yellow().bold().to_string()
    } else {
        text.red().bold().to_string()
    }
}

fn write_violation(out: &mut impl Write, violation: &Violation) -> io::Result<()> {
    writeln!(
        out,
        "{} {} {}",
        severity_label(violation.severity),
        violation.title.bold(),
        truncate(&violation.resource_name, RESOURCE_MAX_LEN).dimmed()
    )?;
    writeln!(out, "    {}", violation.description)?;
    if let Some(section) = &violation.hipaa_section {
        writeln!(out, "    {} {}", "HIPAA:".cyan(), section)?;
    }
    for step in &violation.remediation_steps {
        writeln!(out, "    {} {}", "-".dimmed(), step)?;
    }
    Ok(())
}

/// Write a report, most severe violations first.
///
/// # Errors
///
/// Returns any error from the writer.
pub fn write_report(out: &mut impl Write, report: &ComplianceReport) -> io::Result<()> {
    writeln!(
        out,
        "{} project={} scan={}",
        "[SCAN]".blue().bold(),
        report.project_id.cyan(),
        report.scan_id.dimmed()
    )?;

    if report.status == ScanStatus::Failed {
        writeln!(
            out,
            "{} {}",
            "[FAILED]".red().bold(),
            report.message.as_deref().unwrap_or("Scan failed")
        )?;
        return Ok(());
    }

    writeln!(
        out,
        "Compliance score: {}  violations: {} (critical {}, high {}, medium {}, low {})",
        score_label(report.compliance_score),
        report.total_violations,
        report.critical_violations,
        report.high_violations,
        report.medium_violations,
        report.low_violations
    )?;

    let mut violations: Vec<&Violation> = report.violations.iter().collect();
    violations.sort_by(|a, b| b.severity.cmp(&a.severity));
    for violation in violations {
        writeln!(out)?;
        write_violation(out, violation)?;
    }

    if report.violations.is_empty() {
        writeln!(out, "{}", "No violations found".green())?;
    }
    Ok(())
}

/// Print a report to stdout.
pub fn print_report(report: &ComplianceReport) {
    let mut stdout = io::stdout().lock();
    let _ = write_report(&mut stdout, report);
    let _ = stdout.flush();
}

/// Print the result of an audit chain check.
pub fn print_chain_verification(result: &ChainVerification) {
    match result.first_broken {
        None => println!(
            "{} {} records verified",
            "[OK]".green().bold(),
            result.records_checked
        ),
        Some(sequence) => println!(
            "{} chain broken at sequence {} ({} records checked)",
            "[TAMPERED]".red().bold(),
            sequence,
            result.records_checked
        ),
    }
}

/// Print an audit activity summary.
pub fn print_audit_report(report: &AuditComplianceReport) {
    println!(
        "{} {} {} .. {}",
        "[AUDIT]".blue().bold(),
        report.compliance_type,
        report.start.format("%Y-%m-%d"),
        report.end.format("%Y-%m-%d")
    );
    println!(
        "events={} phi_access={} unauthorized={} users={}",
        report.total_access_events,
        report.phi_access_events,
        if report.unauthorized_attempts > 0 {
            report.unauthorized_attempts.red().to_string()
        } else {
            report.unauthorized_attempts.to_string()
        },
        report.unique_users
    );
    for (title, counts) in [
        ("By event type", &report.by_event_type),
        ("By result", &report.by_result),
        ("Security events by severity", &report.security_events_by_severity),
    ] {
        if counts.is_empty() {
            continue;
        }
        println!("{}", title.bold());
        for (key, count) in counts {
            println!("    {key}: {count}");
        }
    }
}

/// Print what a retention run deleted.
pub fn print_retention_summary(summary: &RetentionSummary) {
    println!(
        "{} scans deleted={} audit records deleted={}",
        "[RETENTION]".blue().bold(),
        summary.scans_deleted,
        summary.audit_records_deleted
    );
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::compliance::ViolationType;

    fn violation(severity: ViolationSeverity, title: &str) -> Violation {
        Violation {
            id: Uuid::new_v4(),
            violation_type: ViolationType::HipaaViolation,
            severity,
            title: title.to_string(),
            description: "desc".to_string(),
            resource_type: "storage.bucket".to_string(),
            resource_name: "phi-exports".to_string(),
            project_id: "acme".to_string(),
            hipaa_section: Some("164.312(a)(1)".to_string()),
            remediation_steps: vec!["Remove allUsers".to_string()],
            created_at: Utc::now(),
        }
    }

    fn report(violations: Vec<Violation>) -> ComplianceReport {
        ComplianceReport {
            scan_id: Uuid::new_v4(),
            user_id: "cli".to_string(),
            project_id: "acme".to_string(),
            scan_timestamp: Utc::now(),
            total_violations: u32::try_from(violations.len()).unwrap(),
            critical_violations: 0,
            high_violations: 0,
            medium_violations: 0,
            low_violations: 0,
            violations,
            compliance_score: 82.0,
            status: ScanStatus::Completed,
            message: None,
        }
    }

    fn render(report: &ComplianceReport) -> String {
        let mut out = Vec::new();
        write_report(&mut out, report).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer resource name", 10), "a longe...");
        assert_eq!(truncate("anything", 2), "...");
        assert_eq!(truncate("ééééééé", 5), "éé...");
    }

    #[test]
    fn test_report_sorted_by_severity() {
        let text = render(&report(vec![
            violation(ViolationSeverity::Low, "Low finding"),
            violation(ViolationSeverity::Critical, "Critical finding"),
        ]));
        let critical = text.find("Critical finding").unwrap();
        let low = text.find("Low finding").unwrap();
        assert!(critical < low);
        assert!(text.contains("164.312(a)(1)"));
        assert!(text.contains("Remove allUsers"));
    }

    #[test]
    fn test_failed_report_shows_message() {
        let mut failed = report(Vec::new());
        failed.status = ScanStatus::Failed;
        failed.message = Some("Asset fetch failed".to_string());
        let text = render(&failed);
        assert!(text.contains("Asset fetch failed"));
        assert!(!text.contains("Compliance score"));
    }

    #[test]
    fn test_clean_report() {
        let text = render(&report(Vec::new()));
        assert!(text.contains("No violations found"));
    }
}
