//! Import of externally evaluated policy results.
//!
//! Accepts the output of
//! `opa eval --format json data.hipaa.compliance.violations`, where the
//! violation sentences live at `result[0].expressions[0].value`.

use serde_json::Value;

use super::error::ScanError;
use super::policy::{Finding, PolicyPack};

/// Extract violation sentences from OPA JSON output.
///
/// An undefined query result (`{}`) yields no violations.
///
/// # Errors
///
/// Returns `ScanError::Json` for invalid JSON and `ScanError::OpaOutput`
/// when the value is not an array of strings.
pub fn import_opa_output(json: &str) -> Result<Vec<String>, ScanError> {
    let document: Value = serde_json::from_str(json)?;

    let Some(result) = document.get("result") else {
        return Ok(Vec::new());
    };
    let Some(value) = result.pointer("/0/expressions/0/value") else {
        return Err(ScanError::OpaOutput(
            "missing result[0].expressions[0].value".to_string(),
        ));
    };

    let items = value
        .as_array()
        .ok_or_else(|| ScanError::OpaOutput("expression value is not an array".to_string()))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| ScanError::OpaOutput(format!("violation is not a string: {item}")))
        })
        .collect()
}

/// Findings for OPA violation sentences attributed to `pack`.
#[must_use]
pub fn findings_from_opa(pack: PolicyPack, violations: Vec<String>) -> Vec<Finding> {
    violations
        .into_iter()
        .map(|text| Finding::from_text(pack, text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPA_OUTPUT: &str = r#"{
        "result": [{
            "expressions": [{
                "value": [
                    "Storage bucket 'run-sources' allows public access, violating access controls",
                    "IAM policies should be reviewed for minimum necessary access"
                ],
                "text": "data.hipaa.compliance.violations",
                "location": {"row": 1, "col": 1}
            }]
        }]
    }"#;

    #[test]
    fn test_import_violations() {
        let violations = import_opa_output(OPA_OUTPUT).unwrap();
        assert_eq!(violations.len(), 2);
        assert!(violations[0].contains("run-sources"));

        let findings = findings_from_opa(PolicyPack::HipaaCompliance, violations);
        assert_eq!(findings[0].resource_type, "storage.bucket");
        assert_eq!(findings[1].resource_type, "Unknown");
    }

    #[test]
    fn test_undefined_result_is_empty() {
        assert!(import_opa_output("{}").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_non_string_values() {
        let json = r#"{"result": [{"expressions": [{"value": [1, 2]}]}]}"#;
        assert!(matches!(import_opa_output(json), Err(ScanError::OpaOutput(_))));
    }

    #[test]
    fn test_rejects_invalid_json() {
        assert!(matches!(import_opa_output("not json"), Err(ScanError::Json(_))));
    }
}
