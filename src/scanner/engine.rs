//! Rule selection and report building.

use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use super::error::ScanError;
use super::policy::{Finding, PolicyPack};
use super::rules::{Rule, RULES};
use crate::assets::AssetInventory;
use crate::compliance::{
    parse_violation, ComplianceReport, ScanRequest, ScanStatus, ScanType, ScoringModel,
    SeverityCounts,
};

/// Evaluates asset inventories against the built-in rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scanner {
    scoring: ScoringModel,
}

fn parse_packs(names: &[String]) -> Result<HashSet<PolicyPack>, ScanError> {
    names.iter().map(|name| name.parse()).collect()
}

impl Scanner {
    #[must_use]
    pub fn new(scoring: ScoringModel) -> Self {
        Self { scoring }
    }

    #[must_use]
    pub fn scoring(&self) -> ScoringModel {
        self.scoring
    }

    /// Rules selected by the scan type and policy filters.
    ///
    /// Quick scans keep only rules flagged quick. A non-empty include list
    /// restricts to those packs, and custom scans require one. Exclusions
    /// always win.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::UnknownPolicy` for an unrecognised pack name and
    /// `ScanError::EmptyCustomScan` for a custom scan with nothing included.
    pub fn select_rules(&self, request: &ScanRequest) -> Result<Vec<&'static Rule>, ScanError> {
        let include = parse_packs(&request.include_policies)?;
        let exclude = parse_packs(&request.exclude_policies)?;
        if request.scan_type == ScanType::Custom && include.is_empty() {
            return Err(ScanError::EmptyCustomScan);
        }

        Ok(RULES
            .iter()
            .filter(|rule| request.scan_type != ScanType::Quick || rule.quick)
            .filter(|rule| include.is_empty() || include.contains(&rule.pack))
            .filter(|rule| !exclude.contains(&rule.pack))
            .collect())
    }

    /// Run the selected rules over every asset.
    ///
    /// # Errors
    ///
    /// See [`Scanner::select_rules`].
    pub fn evaluate(
        &self,
        inventory: &AssetInventory,
        request: &ScanRequest,
    ) -> Result<Vec<Finding>, ScanError> {
        let rules = self.select_rules(request)?;
        let mut findings = Vec::new();

        for asset in &inventory.assets {
            for rule in &rules {
                for text in rule.check(asset) {
                    findings.push(Finding {
                        policy: rule.pack,
                        violation_type: rule.pack.violation_type(),
                        text,
                        resource_type: rule.resource_type.to_string(),
                        resource_name: asset.display_name().to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            project_id = %inventory.project_id,
            assets = inventory.len(),
            rules = rules.len(),
            findings = findings.len(),
            "Evaluated inventory"
        );
        Ok(findings)
    }

    /// Classify findings and assemble a completed report.
    #[must_use]
    pub fn build_report(&self, user_id: &str, project_id: &str, findings: &[Finding]) -> ComplianceReport {
        let violations: Vec<_> = findings
            .iter()
            .map(|finding| {
                let mut violation = parse_violation(&finding.text, finding.violation_type, project_id);
                violation.resource_type.clone_from(&finding.resource_type);
                violation.resource_name.clone_from(&finding.resource_name);
                violation
            })
            .collect();

        let counts = SeverityCounts::from_violations(&violations);
        ComplianceReport {
            scan_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            project_id: project_id.to_string(),
            scan_timestamp: Utc::now(),
            total_violations: counts.total(),
            critical_violations: counts.critical,
            high_violations: counts.high,
            medium_violations: counts.medium,
            low_violations: counts.low,
            compliance_score: self.scoring.score(&counts),
            violations,
            status: ScanStatus::Completed,
            message: None,
        }
    }

    /// Report for a scan that could not run.
    #[must_use]
    pub fn failed_report(&self, user_id: &str, project_id: &str, message: impl Into<String>) -> ComplianceReport {
        ComplianceReport {
            scan_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            project_id: project_id.to_string(),
            scan_timestamp: Utc::now(),
            violations: Vec::new(),
            total_violations: 0,
            critical_violations: 0,
            high_violations: 0,
            medium_violations: 0,
            low_violations: 0,
            compliance_score: 0.0,
            status: ScanStatus::Failed,
            message: Some(message.into()),
        }
    }

    /// Evaluate an inventory and build its report in one step.
    ///
    /// # Errors
    ///
    /// See [`Scanner::select_rules`].
    pub fn scan(
        &self,
        user_id: &str,
        inventory: &AssetInventory,
        request: &ScanRequest,
    ) -> Result<ComplianceReport, ScanError> {
        let findings = self.evaluate(inventory, request)?;
        Ok(self.build_report(user_id, &inventory.project_id, &findings))
    }
}
