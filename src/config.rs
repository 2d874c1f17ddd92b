//! Configuration loading via `ortho-config`.
//!
//! Values merge defaults, configuration files, and `AUTOPRUNE_*` environment
//! variables. [`AutopruneConfig::validate`] reports problems with the
//! environment variable and TOML key that fix them.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::cost::{CostError, CostModel, RatePerGib, RateTable, load_rate_file};
use crate::inventory::{DEFAULT_MAX_PAGES, InventorySettings};
use crate::pruner::PruneSettings;
use crate::retry::RetryPolicy;

/// Default Scaleway Block Storage API base URL.
pub const DEFAULT_API_URL: &str = "https://api.scaleway.com/block/v1alpha1";

/// Largest page size accepted by the Block Storage API.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Scanner and pruner settings loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "AUTOPRUNE",
    discovery(
        app_name = "autoprune",
        env_var = "AUTOPRUNE_CONFIG_PATH",
        config_file_name = "autoprune.toml",
        dotfile_name = ".autoprune.toml",
        project_file_name = "autoprune.toml"
    )
)]
pub struct AutopruneConfig {
    /// Secret key used for authentication. This value is required.
    pub secret_key: String,
    /// Restricts listing to a single project when set.
    pub project_id: Option<String>,
    /// Zone scanned and pruned. Defaults to `fr-par-1`.
    #[ortho_config(default = "fr-par-1".to_owned())]
    pub region: String,
    /// Block Storage API base URL.
    #[ortho_config(default = DEFAULT_API_URL.to_owned())]
    pub api_url: String,
    /// Fallback monthly rate per GiB for volume types without a table entry.
    /// An empty value disables the fallback so unknown types are unpriced.
    #[ortho_config(default = "0.08".to_owned())]
    pub default_rate_per_gib: String,
    /// Inline rate overrides as `type[@region]=rate`, comma separated.
    pub rates: Option<String>,
    /// JSON rate table file. Supports tilde expansion.
    pub rate_table_file: Option<String>,
    /// Number of deletes in flight at once.
    #[ortho_config(default = 8)]
    pub max_delete_concurrency: u32,
    /// Bound on each delete call, in seconds.
    #[ortho_config(default = 30)]
    pub delete_timeout_seconds: u64,
    /// Bound on each listing page, in seconds.
    #[ortho_config(default = 30)]
    pub list_timeout_seconds: u64,
    /// Volumes requested per listing page.
    #[ortho_config(default = 50)]
    pub page_size: u32,
    /// Retries allowed for a transient delete failure.
    #[ortho_config(default = 2)]
    pub delete_retries: u32,
    /// Retries allowed for a retryable listing failure.
    #[ortho_config(default = 2)]
    pub list_retries: u32,
    /// First retry delay in milliseconds; doubled for each further retry.
    #[ortho_config(default = 250)]
    pub retry_backoff_millis: u64,
    /// Whether each volume is re-read before it is deleted.
    #[ortho_config(default = true)]
    pub verify_before_delete: bool,
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
            "set {} or add {} to autoprune.toml",
            self.env_var, self.toml_key
        )
    }
}

const SECRET_KEY: FieldMetadata =
    FieldMetadata::new("Scaleway API secret key", "AUTOPRUNE_SECRET_KEY", "secret_key");
const REGION: FieldMetadata = FieldMetadata::new("zone", "AUTOPRUNE_REGION", "region");
const API_URL: FieldMetadata = FieldMetadata::new("API base URL", "AUTOPRUNE_API_URL", "api_url");
const PROJECT_ID: FieldMetadata =
    FieldMetadata::new("project ID", "AUTOPRUNE_PROJECT_ID", "project_id");
const CONCURRENCY: FieldMetadata = FieldMetadata::new(
    "delete concurrency",
    "AUTOPRUNE_MAX_DELETE_CONCURRENCY",
    "max_delete_concurrency",
);
const DELETE_TIMEOUT: FieldMetadata = FieldMetadata::new(
    "delete timeout",
    "AUTOPRUNE_DELETE_TIMEOUT_SECONDS",
    "delete_timeout_seconds",
);
const LIST_TIMEOUT: FieldMetadata = FieldMetadata::new(
    "list timeout",
    "AUTOPRUNE_LIST_TIMEOUT_SECONDS",
    "list_timeout_seconds",
);
const PAGE_SIZE: FieldMetadata =
    FieldMetadata::new("page size", "AUTOPRUNE_PAGE_SIZE", "page_size");

impl AutopruneConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    fn require_optional_field(
        value: Option<&str>,
        metadata: &FieldMetadata,
    ) -> Result<(), ConfigError> {
        value.map_or(Ok(()), |inner| Self::require_field(inner, metadata))
    }

    fn require_positive(value: u64, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::Invalid(format!(
                "{} must be at least 1: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("autoprune")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages include guidance on how
    /// to provide the value via environment variables or configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::Invalid`] when a numeric bound is violated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(&self.secret_key, &SECRET_KEY)?;
        Self::require_field(&self.region, &REGION)?;
        Self::require_field(&self.api_url, &API_URL)?;
        Self::require_optional_field(self.project_id.as_deref(), &PROJECT_ID)?;
        Self::require_positive(u64::from(self.max_delete_concurrency), &CONCURRENCY)?;
        Self::require_positive(self.delete_timeout_seconds, &DELETE_TIMEOUT)?;
        Self::require_positive(self.list_timeout_seconds, &LIST_TIMEOUT)?;
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "{} must be between 1 and {MAX_PAGE_SIZE}: {}",
                PAGE_SIZE.description,
                PAGE_SIZE.hint()
            )));
        }
        Ok(())
    }

    /// Builds the rate table from the default rate, the optional rate file,
    /// and inline overrides, in increasing precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Cost`] when a rate or rate source is invalid.
    pub fn rate_table(&self) -> Result<RateTable, ConfigError> {
        let default_rate = self.default_rate_per_gib.trim();
        let mut table = if default_rate.is_empty() {
            RateTable::empty()
        } else {
            RateTable::with_default(default_rate.parse::<RatePerGib>()?)
        };
        if let Some(path) = self.rate_table_file.as_deref() {
            load_rate_file(path, &mut table)?;
        }
        if let Some(rates) = self.rates.as_deref() {
            table.apply_overrides(rates)?;
        }
        Ok(table)
    }

    /// Builds the cost model used to price candidates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Cost`] when the rate table cannot be built.
    pub fn cost_model(&self) -> Result<CostModel, ConfigError> {
        self.rate_table().map(CostModel::new)
    }

    /// Listing tunables derived from this configuration.
    #[must_use]
    pub const fn inventory_settings(&self) -> InventorySettings {
        InventorySettings {
            page_timeout: Duration::from_secs(self.list_timeout_seconds),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Retry policy applied to retryable listing failures.
    #[must_use]
    pub const fn list_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.list_retries,
            Duration::from_millis(self.retry_backoff_millis),
        )
    }

    /// Prune tunables derived from this configuration.
    #[must_use]
    pub fn prune_settings(&self) -> PruneSettings {
        PruneSettings {
            max_concurrency: usize::try_from(self.max_delete_concurrency).unwrap_or(usize::MAX),
            delete_timeout: Duration::from_secs(self.delete_timeout_seconds),
            retry: RetryPolicy::new(
                self.delete_retries,
                Duration::from_millis(self.retry_backoff_millis),
            ),
            verify_before_delete: self.verify_before_delete,
        }
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a value is present but out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// Surfaces rate table problems.
    #[error("rate configuration error: {0}")]
    Cost(#[from] CostError),
    /// Raised when the HTTP client cannot be built.
    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
