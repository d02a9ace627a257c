//! Provider configuration.
//!
//! Feature gates that used to be read from the process environment at
//! arbitrary points are collected here once and handed to every adapter at
//! configure time.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::timeouts::{parse_duration, serde_duration, DEFAULT_TIMEOUT};

/// Enables resources and data sources flagged as beta.
pub const ENV_ENABLE_BETA: &str = "PROVIX_ENABLE_BETA";

/// Toggles the organization permission conflict check (default on).
pub const ENV_PERMISSION_VALIDATE_CONFLICT: &str = "PROVIX_PERMISSION_VALIDATE_CONFLICT";

/// Overrides the hard timeout fallback, e.g. `30m`.
pub const ENV_DEFAULT_TIMEOUT: &str = "PROVIX_DEFAULT_TIMEOUT";

/// Configuration shared by every adapter of a provider instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Whether beta resources may be used.
    pub enable_beta: bool,
    /// Whether the permission upsert refuses to overwrite foreign permissions.
    pub permission_validate_conflict: bool,
    /// Fallback used when a resource sets neither the operation timeout nor
    /// `default`.
    #[serde(with = "serde_duration")]
    pub default_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enable_beta: false,
            permission_validate_conflict: true,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_beta(mut self, enabled: bool) -> Self {
        self.enable_beta = enabled;
        self
    }

    pub fn with_permission_validate_conflict(mut self, enabled: bool) -> Self {
        self.permission_validate_conflict = enabled;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Read the gates from the process environment.
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the gates through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CoreResult<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup(ENV_ENABLE_BETA) {
            config.enable_beta = parse_bool(&v).unwrap_or(config.enable_beta);
        }
        if let Some(v) = lookup(ENV_PERMISSION_VALIDATE_CONFLICT) {
            config.permission_validate_conflict =
                parse_bool(&v).unwrap_or(config.permission_validate_conflict);
        }
        if let Some(v) = lookup(ENV_DEFAULT_TIMEOUT) {
            config.default_timeout = parse_duration(&v)?;
        }

        debug!("Loaded provider configuration from environment: {:?}", config);
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> CoreResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a `.yaml`/`.yml` or `.toml` file.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content)?,
            Some("toml") => Self::from_toml_str(&content)?,
            _ => return Err(CoreError::UnsupportedFormat(path.display().to_string())),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.default_timeout.is_zero() {
            return Err(CoreError::Config("default_timeout must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Lenient boolean used for environment switches.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
