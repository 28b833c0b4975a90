//! Integration tests for the environment query system

mod cli_commands;
mod config_integration;
mod manager_lifecycle;
mod query_properties;
mod template_loading;
mod test_utils;
