//! Configuration file loader.

use std::path::PathBuf;

use super::types::{GuardConfig, DEFAULT_JWT_SECRET};

/// Configuration loader that searches multiple locations.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths in order of priority.
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths.
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        // 1. Current directory: .compliantguard.toml
        search_paths.push(PathBuf::from(".compliantguard.toml"));

        // 2. User config directory: ~/.config/compliantguard/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("compliantguard").join("config.toml"));
        }

        Self { search_paths }
    }

    /// Create a config loader with a specific config file path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            search_paths: vec![path],
        }
    }

    /// Load configuration from the first available file, or return defaults.
    ///
    /// Environment overrides are applied on top and the result is validated.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, an
    /// override has an invalid value, or validation fails.
    pub fn load(&self) -> Result<GuardConfig, ConfigError> {
        let mut config = self.load_file()?;
        apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
        validate(&config)?;
        Ok(config)
    }

    /// Load only the file layer, without overrides or validation.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load_file(&self) -> Result<GuardConfig, ConfigError> {
        for path in &self.search_paths {
            if path.exists() {
                tracing::debug!(path = %path.display(), "Loading config file");
                return Self::load_from_path(path);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(GuardConfig::default())
    }

    /// Load configuration from a specific path.
    fn load_from_path(path: &PathBuf) -> Result<GuardConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.clone(),
            source: e,
        })
    }

    /// Get the search paths for debugging.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Find the first config file that exists.
    #[must_use]
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths.iter().find(|p| p.exists()).cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply environment variable overrides using the given lookup.
///
/// # Errors
///
/// Returns `ConfigError::InvalidOverride` if a numeric override does not parse.
pub fn apply_env_overrides<F>(config: &mut GuardConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(environment) = lookup("ENVIRONMENT") {
        config.environment = environment;
    }
    if let Some(host) = lookup("COMPLIANTGUARD_HOST") {
        config.server.host = host;
    }
    if let Some(port) = lookup("COMPLIANTGUARD_PORT") {
        config.server.port = port.parse().map_err(|_| ConfigError::InvalidOverride {
            name: "COMPLIANTGUARD_PORT",
            value: port,
        })?;
    }
    if let Some(db) = lookup("COMPLIANTGUARD_DB") {
        config.storage.database_path = PathBuf::from(db);
    }
    if let Some(secret) = lookup("JWT_SECRET_KEY") {
        config.auth.jwt_secret = secret;
    }
    if let Some(key_file) = lookup("COMPLIANTGUARD_MASTER_KEY_FILE") {
        config.encryption.key_file = Some(PathBuf::from(key_file));
    }
    if let Some(project) = lookup("GCP_PROJECT_ID") {
        config.scanner.default_project = Some(project);
    }
    Ok(())
}

/// Reject configurations that are unsafe to run.
///
/// # Errors
///
/// Returns `ConfigError::InsecureJwtSecret` when production runs with the
/// placeholder secret, and `ConfigError::Invalid` for nonsensical values.
pub fn validate(config: &GuardConfig) -> Result<(), ConfigError> {
    if config.is_production() && config.auth.jwt_secret == DEFAULT_JWT_SECRET {
        return Err(ConfigError::InsecureJwtSecret);
    }
    if config.auth.expiration_hours <= 0 {
        return Err(ConfigError::Invalid(
            "auth.expiration_hours must be positive".to_string(),
        ));
    }
    if config.scanner.page_size == 0 {
        return Err(ConfigError::Invalid(
            "scanner.page_size must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {name}: {value}")]
    InvalidOverride { name: &'static str, value: String },

    #[error("JWT secret must be changed in production")]
    InsecureJwtSecret,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
