//! Configuration System
//!
//! Layered runtime configuration for query managers, the debugger, and
//! logging. Sources are merged lowest first:
//!
//! 1. built-in defaults
//! 2. `$XDG_CONFIG_HOME/eqs/config.toml` or `~/.config/eqs/config.toml`
//! 3. `<workspace>/config/config.toml`, then `<workspace>/config/{EQS_ENV}.toml`
//! 4. `EQS__SECTION__KEY` environment variables

use crate::error::ApiError;
use crate::instance::BatchSizes;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod merge;
mod sources;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EqsConfig {
    #[serde(default)]
    pub manager: ManagerConfig,

    #[serde(default)]
    pub debugger: DebuggerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Query manager scheduling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Budget for `tick_default`, in microseconds
    #[serde(default = "default_tick_budget_us")]
    pub tick_budget_us: u64,

    /// Items evaluated between budget checks for cheap tests
    #[serde(default = "default_batch_low")]
    pub batch_low: usize,

    #[serde(default = "default_batch_medium")]
    pub batch_medium: usize,

    /// Items evaluated between budget checks for expensive tests
    #[serde(default = "default_batch_high")]
    pub batch_high: usize,

    /// Finished queries slower than this are logged as warnings
    #[serde(default = "default_warn_query_ms")]
    pub warn_query_ms: f64,

    /// Finished results kept before the oldest is evicted
    #[serde(default = "default_max_retained_results")]
    pub max_retained_results: usize,
}

fn default_tick_budget_us() -> u64 {
    5000
}

fn default_batch_low() -> usize {
    32
}

fn default_batch_medium() -> usize {
    8
}

fn default_batch_high() -> usize {
    1
}

fn default_warn_query_ms() -> f64 {
    25.0
}

fn default_max_retained_results() -> usize {
    256
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            tick_budget_us: default_tick_budget_us(),
            batch_low: default_batch_low(),
            batch_medium: default_batch_medium(),
            batch_high: default_batch_high(),
            warn_query_ms: default_warn_query_ms(),
            max_retained_results: default_max_retained_results(),
        }
    }
}

impl ManagerConfig {
    pub fn batch_sizes(&self) -> BatchSizes {
        BatchSizes {
            low: self.batch_low,
            medium: self.batch_medium,
            high: self.batch_high,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tick_budget_us == 0 {
            return Err("tick_budget_us must be positive".to_string());
        }
        if self.batch_low == 0 || self.batch_medium == 0 || self.batch_high == 0 {
            return Err("batch sizes must be at least 1".to_string());
        }
        if !self.warn_query_ms.is_finite() || self.warn_query_ms < 0.0 {
            return Err(format!(
                "warn_query_ms must be a non-negative number, got {}",
                self.warn_query_ms
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebuggerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Items with per-test detail kept in each snapshot
    #[serde(default = "default_max_detailed_items")]
    pub max_detailed_items: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_detailed_items() -> usize {
    10
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_detailed_items: default_max_detailed_items(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Manager(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Manager(msg) => write!(f, "Manager: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl EqsConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.manager.validate() {
            errors.push(ValidationError::Manager(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validation errors folded into one `ApiError`.
    pub fn ensure_valid(&self) -> Result<(), ApiError> {
        self.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })
    }
}

/// Loads [`EqsConfig`] from the layered sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Path of the user-level config file, if a home directory is known.
    pub fn xdg_config_path() -> Option<PathBuf> {
        sources::global_file::global_config_path()
    }

    /// Merge every source for `workspace_root`.
    pub fn load(workspace_root: &Path) -> Result<EqsConfig, ApiError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = sources::environment::add_to_builder(builder);
        let config: EqsConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Load a single file on top of the defaults. Environment variables
    /// still apply.
    pub fn load_from_file(path: &Path) -> Result<EqsConfig, ApiError> {
        if !path.exists() {
            return Err(ApiError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = builder.add_source(config::File::from(path).required(true));
        let builder = sources::environment::add_to_builder(builder);
        let config: EqsConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }
}
