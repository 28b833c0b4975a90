//! Integration tests for configuration loading and its effect on managers

use super::test_utils::{fixed_contexts, origin};
use eqs::config::{ConfigLoader, EqsConfig, ValidationError};
use eqs::context::ContextKey;
use eqs::generator::ContextPointsGenerator;
use eqs::manager::QueryManager;
use eqs::params::QueryParams;
use eqs::template::{QueryOption, QueryTemplate};
use eqs::test::DistanceTest;
use eqs::types::Vector;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn write_config(dir: &TempDir, text: &str) -> std::path::PathBuf {
    let path = dir.path().join("eqs.toml");
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_config_file_drives_manager_and_debugger() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[manager]
max_retained_results = 1

[debugger]
enabled = true
max_detailed_items = 2

[logging]
level = "debug"
format = "json"
"#,
    );
    let config = ConfigLoader::load_from_file(&path).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.logging.format, "json");

    let contexts = fixed_contexts(&[(
        "Row",
        (0..6).map(|i| Vector::new(i as f32, 0.0, 0.0)).collect(),
    )]);
    let mut manager = QueryManager::from_config(Default::default(), contexts, &config);
    let template = Arc::new(
        QueryTemplate::new(
            "Row",
            vec![QueryOption::new(ContextPointsGenerator {
                context: ContextKey::new("Row"),
            })
            .with_test(DistanceTest::default())],
        )
        .unwrap(),
    );

    let first = manager.submit(&template, origin(), &QueryParams::new()).unwrap();
    let second = manager.submit(&template, origin(), &QueryParams::new()).unwrap();
    while manager.active_count() > 0 {
        manager.tick_default();
    }

    assert!(manager.get_result(first).is_none(), "evicted by max_retained_results");
    assert_eq!(manager.get_result(second).unwrap().len(), 6);
    assert_eq!(manager.debugger().last().unwrap().items.len(), 2);
}

#[test]
fn test_invalid_values_are_reported() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[manager]
batch_low = 0

[logging]
output = "syslog"
"#,
    );
    let config = ConfigLoader::load_from_file(&path).unwrap();
    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|e| matches!(e, ValidationError::Manager(_))));
    assert!(errors.iter().any(|e| matches!(e, ValidationError::Logging(_))));
    assert!(config.ensure_valid().is_err());
}

#[test]
fn test_environment_overrides_file() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[manager]\ntick_budget_us = 1000\n");

    std::env::set_var("EQS__MANAGER__TICK_BUDGET_US", "750");
    let loaded = ConfigLoader::load_from_file(&path);
    std::env::remove_var("EQS__MANAGER__TICK_BUDGET_US");

    assert_eq!(loaded.unwrap().manager.tick_budget_us, 750);
}

#[test]
fn test_defaults_round_trip_through_toml() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let text = toml::to_string(&EqsConfig::default()).unwrap();
    let path = write_config(&dir, &text);
    let loaded = ConfigLoader::load_from_file(&path).unwrap();
    assert_eq!(loaded.manager, EqsConfig::default().manager);
    assert_eq!(loaded.debugger, EqsConfig::default().debugger);
}
