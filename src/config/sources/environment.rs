//! Environment source: `EQS__MANAGER__TICK_BUDGET_US=2000` sets `manager.tick_budget_us`.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("EQS")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    )
}
