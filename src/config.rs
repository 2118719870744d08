//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::backup::BackupPeriod;
use crate::context::PlatformContext;

/// Process configuration merged from defaults, `stowage.toml`, and
/// `STOWAGE_*` environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "STOWAGE",
    discovery(
        app_name = "stowage",
        env_var = "STOWAGE_CONFIG_PATH",
        config_file_name = "stowage.toml",
        dotfile_name = ".stowage.toml",
        project_file_name = "stowage.toml"
    )
)]
pub struct StowageConfig {
    /// Build identifier allocations must report before suspend or serve.
    /// Defaults to this crate's version.
    #[ortho_config(default = env!("CARGO_PKG_VERSION").to_owned())]
    pub expected_build: String,
    /// Transport timeout for control calls, in seconds.
    #[ortho_config(default = 10)]
    pub control_timeout_secs: u64,
    /// Backup period in milliseconds, as resolved from the backup schedule.
    #[ortho_config(default = 3_600_000)]
    pub backup_period_ms: i64,
    /// Directory receiving backup snapshots.
    #[ortho_config(default = "backups".to_owned())]
    pub backup_dir: String,
    /// S3 access key used by `stowage verify`.
    pub s3_access_key: Option<String>,
    /// S3 secret key used by `stowage verify`.
    pub s3_secret_key: Option<String>,
    /// S3 region. Defaults to `us-east-1`.
    #[ortho_config(default = "us-east-1".to_owned())]
    pub s3_region: String,
    /// Custom S3-compatible endpoint.
    pub s3_endpoint: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn hint(&self) -> String {
        format!(
            "set {} or add {} to stowage.toml",
            self.env_var, self.toml_key
        )
    }
}

const EXPECTED_BUILD: FieldMetadata =
    FieldMetadata::new("expected build identifier", "STOWAGE_EXPECTED_BUILD", "expected_build");
const CONTROL_TIMEOUT: FieldMetadata = FieldMetadata::new(
    "control call timeout",
    "STOWAGE_CONTROL_TIMEOUT_SECS",
    "control_timeout_secs",
);
const BACKUP_PERIOD: FieldMetadata =
    FieldMetadata::new("backup period", "STOWAGE_BACKUP_PERIOD_MS", "backup_period_ms");
const BACKUP_DIR: FieldMetadata =
    FieldMetadata::new("backup directory", "STOWAGE_BACKUP_DIR", "backup_dir");
const S3_ACCESS_KEY: FieldMetadata =
    FieldMetadata::new("S3 access key", "STOWAGE_S3_ACCESS_KEY", "s3_access_key");
const S3_SECRET_KEY: FieldMetadata =
    FieldMetadata::new("S3 secret key", "STOWAGE_S3_SECRET_KEY", "s3_secret_key");
const S3_REGION: FieldMetadata = FieldMetadata::new("S3 region", "STOWAGE_S3_REGION", "s3_region");

impl StowageConfig {
    fn require_field<'a>(
        value: Option<&'a str>,
        metadata: &FieldMetadata,
    ) -> Result<&'a str, ConfigError> {
        value
            .map(str::trim)
            .filter(|trimmed| !trimmed.is_empty())
            .ok_or_else(|| {
                ConfigError::MissingField(format!(
                    "missing {}: {}",
                    metadata.description,
                    metadata.hint()
                ))
            })
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("stowage")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation of the coordinator settings. Error
    /// messages name the environment variable and TOML key to fix.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] for empty required values and
    /// [`ConfigError::Invalid`] for out-of-range numbers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(Some(self.expected_build.as_str()), &EXPECTED_BUILD)?;
        Self::require_field(Some(self.backup_dir.as_str()), &BACKUP_DIR)?;
        if self.control_timeout_secs == 0 {
            return Err(ConfigError::Invalid(format!(
                "{} must be at least one second: {}",
                CONTROL_TIMEOUT.description,
                CONTROL_TIMEOUT.hint()
            )));
        }
        self.backup_period()?;
        Ok(())
    }

    /// Timeout applied to every control call.
    #[must_use]
    pub const fn control_timeout(&self) -> Duration {
        Duration::from_secs(self.control_timeout_secs)
    }

    /// Backup period resolved from `backup_period_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the period is not positive.
    pub fn backup_period(&self) -> Result<BackupPeriod, ConfigError> {
        BackupPeriod::from_millis(self.backup_period_ms).map_err(|err| {
            ConfigError::Invalid(format!("{err}: {}", BACKUP_PERIOD.hint()))
        })
    }

    /// Directory receiving backup snapshots.
    #[must_use]
    pub fn backup_dir(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(self.backup_dir.trim())
    }

    /// Builds the S3 secret payload consumed by the credential converter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the access key, secret key,
    /// or region is empty.
    pub fn s3_credentials_payload(&self) -> Result<Value, ConfigError> {
        let access_key = Self::require_field(self.s3_access_key.as_deref(), &S3_ACCESS_KEY)?;
        let secret = Self::require_field(self.s3_secret_key.as_deref(), &S3_SECRET_KEY)?;
        let region = Self::require_field(Some(self.s3_region.as_str()), &S3_REGION)?;
        Ok(json!({
            "accessKey": access_key,
            "secret": secret,
            "region": region,
            "endpoint": self.s3_endpoint,
        }))
    }

    /// Builds the process-wide context for this configuration.
    #[must_use]
    pub fn platform_context(&self) -> PlatformContext {
        PlatformContext::new(self.expected_build.trim())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration value is out of range.
    #[error("invalid configuration value: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
