//! Configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::compliance::ScoringModel;

/// Placeholder JWT secret; refused in production.
pub const DEFAULT_JWT_SECRET: &str = "your-secret-key-change-in-production";

/// Environment variable holding the hex-encoded master key.
pub const DEFAULT_MASTER_KEY_ENV: &str = "COMPLIANTGUARD_MASTER_KEY";

/// Returns the default path for the service database.
///
/// This is `~/.local/share/compliantguard/compliantguard.db` on Unix systems.
#[must_use]
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("compliantguard")
        .join("compliantguard.db")
}

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Deployment environment (development, staging, production).
    pub environment: String,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub encryption: EncryptionConfig,
    pub scanner: ScannerConfig,
    pub audit: AuditConfig,
    pub retention: RetentionConfig,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            encryption: EncryptionConfig::default(),
            scanner: ScannerConfig::default(),
            audit: AuditConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

impl GuardConfig {
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS. Empty means permissive.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: vec![
                "https://compliantguard.datfunc.com".to_string(),
                "http://localhost:5173".to_string(),
            ],
        }
    }
}

impl ServerConfig {
    /// Get the configured address as a string.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Persistent storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Token authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub expiration_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            expiration_hours: 24,
        }
    }
}

/// Where the credential master key comes from.
///
/// `key_file` takes precedence over `key_env` when both are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    pub key_env: Option<String>,
    pub key_file: Option<PathBuf>,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            key_env: Some(DEFAULT_MASTER_KEY_ENV.to_string()),
            key_file: None,
        }
    }
}

/// Asset inventory backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetSourceKind {
    /// Exported inventories on disk, one `<project_id>.json` per project.
    #[default]
    File,
    /// Live Cloud Asset Inventory API.
    CloudAsset,
}

/// Scanner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub source: AssetSourceKind,
    pub assets_dir: PathBuf,
    pub cloud_asset_url: String,
    pub page_size: u32,
    pub scoring: ScoringModel,
    pub default_project: Option<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            source: AssetSourceKind::File,
            assets_dir: PathBuf::from("assets"),
            cloud_asset_url: "https://cloudasset.googleapis.com".to_string(),
            page_size: 1000,
            scoring: ScoringModel::default(),
            default_project: None,
        }
    }
}

/// Audit anomaly detection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Failed logins in the window that count as excessive.
    pub failed_logins_threshold: u32,
    /// Distinct source IPs in the window that count as unusual.
    pub distinct_ip_threshold: u32,
    /// Distinct source IPs in the window that count as suspicious.
    pub distinct_ip_suspicious: u32,
    /// Expected request count in the window.
    pub baseline_requests: u32,
    /// Capacity of the security alert broadcast channel.
    pub alert_channel_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            failed_logins_threshold: 5,
            distinct_ip_threshold: 3,
            distinct_ip_suspicious: 5,
            baseline_requests: 50,
            alert_channel_capacity: 256,
        }
    }
}

/// Data retention periods.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Scan reports may contain PHI resource names: six years.
    pub scan_report_days: i64,
    /// Audit records: ten years.
    pub audit_log_days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            scan_report_days: 2190,
            audit_log_days: 3650,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_config_defaults() {
        let config = GuardConfig::default();
        assert_eq!(config.environment, "development");
        assert!(!config.is_production());
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.address(), "127.0.0.1:8000");
        assert_eq!(config.server.cors_origins.len(), 2);
        assert_eq!(config.auth.expiration_hours, 24);
        assert_eq!(config.scanner.page_size, 1000);
        assert_eq!(config.scanner.source, AssetSourceKind::File);
        assert_eq!(config.retention.scan_report_days, 2190);
        assert_eq!(config.audit.failed_logins_threshold, 5);
        assert!(config
            .storage
            .database_path
            .ends_with("compliantguard/compliantguard.db"));
    }

    #[test]
    fn test_deserialize_partial_sections() {
        let toml = r#"
            environment = "production"

            [server]
            port = 9000

            [scanner]
            source = "cloud_asset"
            scoring = "weighted"
        "#;
        let config: GuardConfig = toml::from_str(toml).unwrap();
        assert!(config.is_production());
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.scanner.source, AssetSourceKind::CloudAsset);
        assert_eq!(config.scanner.scoring, ScoringModel::Weighted);
        assert_eq!(config.scanner.page_size, 1000);
    }

    #[test]
    fn test_encryption_config_default_env() {
        let config = EncryptionConfig::default();
        assert_eq!(config.key_env.as_deref(), Some(DEFAULT_MASTER_KEY_ENV));
        assert!(config.key_file.is_none());
    }
}
