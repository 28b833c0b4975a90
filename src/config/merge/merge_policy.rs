//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("manager.tick_budget_us", 5000)?
        .set_default("manager.warn_query_ms", 25.0)?
        .set_default("debugger.enabled", true)?
        .set_default("logging.level", "info")
}
