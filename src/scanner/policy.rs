//! Policy packs and findings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ScanError;
use crate::compliance::{extract_resource, ViolationType};

/// Named group of rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyPack {
    GcpExpandedHipaa,
    HipaaCompliance,
    ThemisguardFramework,
    EnvironmentSeparation,
}

impl PolicyPack {
    pub const ALL: [Self; 4] = [
        Self::GcpExpandedHipaa,
        Self::HipaaCompliance,
        Self::ThemisguardFramework,
        Self::EnvironmentSeparation,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GcpExpandedHipaa => "gcp_expanded_hipaa",
            Self::HipaaCompliance => "hipaa_compliance",
            Self::ThemisguardFramework => "themisguard_framework",
            Self::EnvironmentSeparation => "environment_separation",
        }
    }

    /// Violation category reported for findings of this pack.
    #[must_use]
    pub fn violation_type(&self) -> ViolationType {
        match self {
            Self::GcpExpandedHipaa | Self::HipaaCompliance => ViolationType::HipaaViolation,
            Self::ThemisguardFramework | Self::EnvironmentSeparation => ViolationType::ComplianceGap,
        }
    }
}

impl fmt::Display for PolicyPack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyPack {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|pack| pack.as_str() == s)
            .ok_or_else(|| ScanError::UnknownPolicy(s.to_string()))
    }
}

/// A rule match, before classification into a violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub policy: PolicyPack,
    pub violation_type: ViolationType,
    pub text: String,
    pub resource_type: String,
    pub resource_name: String,
}

impl Finding {
    /// Finding from free-form policy output, with the resource taken from
    /// the text itself.
    #[must_use]
    pub fn from_text(policy: PolicyPack, text: impl Into<String>) -> Self {
        let text = text.into();
        let (resource_type, resource_name) = extract_resource(&text);
        Self {
            policy,
            violation_type: policy.violation_type(),
            text,
            resource_type,
            resource_name,
        }
    }
}
