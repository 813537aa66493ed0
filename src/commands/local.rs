//! Offline scans of exported inventories and imported OPA results.

use std::path::Path;

use super::error::CommandError;
use crate::assets::AssetInventory;
use crate::compliance::{ComplianceReport, ScanRequest, ScoringModel};
use crate::scanner::{findings_from_opa, import_opa_output, PolicyPack, Scanner};

/// Owner recorded on reports produced from the command line.
pub const CLI_USER: &str = "cli";

/// Scan an asset export file.
///
/// # Errors
///
/// Returns an error if the export cannot be read or parsed, or the policy
/// selection is invalid.
pub fn scan_export(
    assets: &Path,
    request: &ScanRequest,
    scoring: ScoringModel,
) -> Result<ComplianceReport, CommandError> {
    let inventory = AssetInventory::load(&request.project_id, assets)?;
    tracing::info!(
        project_id = %request.project_id,
        assets = inventory.len(),
        path = %assets.display(),
        "Loaded asset export"
    );
    Ok(Scanner::new(scoring).scan(CLI_USER, &inventory, request)?)
}

/// Build a report from `opa eval` JSON output.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not OPA output.
pub fn import_opa(
    input: &Path,
    project_id: &str,
    pack: PolicyPack,
    scoring: ScoringModel,
) -> Result<ComplianceReport, CommandError> {
    let text = std::fs::read_to_string(input).map_err(|source| CommandError::Read {
        path: input.to_path_buf(),
        source,
    })?;
    let violations = import_opa_output(&text)?;
    tracing::info!(project_id = %project_id, pack = %pack, violations = violations.len(), "Imported OPA output");
    let findings = findings_from_opa(pack, violations);
    Ok(Scanner::new(scoring).build_report(CLI_USER, project_id, &findings))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::compliance::ScanStatus;

    #[test]
    fn test_scan_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        std::fs::write(
            &path,
            json!([{
                "name": "//storage.googleapis.com/phi-exports",
                "assetType": "storage.googleapis.com/Bucket",
                "resource": {"data": {"name": "phi-exports"}},
                "iamPolicy": {"bindings": [{"role": "roles/storage.objectViewer", "members": ["allUsers"]}]}
            }])
            .to_string(),
        )
        .unwrap();

        let report = scan_export(&path, &ScanRequest::full("acme"), ScoringModel::Realistic).unwrap();
        assert_eq!(report.status, ScanStatus::Completed);
        assert_eq!(report.user_id, CLI_USER);
        assert!(report.total_violations >= 1);
    }

    #[test]
    fn test_scan_export_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = scan_export(
            &dir.path().join("absent.json"),
            &ScanRequest::full("acme"),
            ScoringModel::Realistic,
        );
        assert!(matches!(result, Err(CommandError::Asset(_))));
    }

    #[test]
    fn test_import_opa() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opa.json");
        std::fs::write(
            &path,
            json!({"result": [{"expressions": [{"value": [
                "HIPAA Violation (High): Storage bucket 'phi' allows public access",
                "Warning: Firewall rule 'dev' lacks description"
            ]}]}]})
            .to_string(),
        )
        .unwrap();

        let report = import_opa(&path, "acme", PolicyPack::HipaaCompliance, ScoringModel::Weighted).unwrap();
        assert_eq!(report.total_violations, 2);
        assert_eq!(report.project_id, "acme");
    }

    #[test]
    fn test_import_opa_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = import_opa(
            &dir.path().join("absent.json"),
            "acme",
            PolicyPack::HipaaCompliance,
            ScoringModel::Realistic,
        );
        assert!(matches!(result, Err(CommandError::Read { .. })));
    }
}
