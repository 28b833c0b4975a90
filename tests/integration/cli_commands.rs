//! CLI route table against files in a scratch workspace.

use super::test_utils::ARENA;
use clap::Parser;
use eqs::cli::{Cli, Commands, RunContext};
use eqs::config::EqsConfig;
use tempfile::TempDir;

const CLOSEST_SQUAD_POINT: &str = r#"
name = "ClosestSquadPoint"
run_mode = "single_result"

[[options]]
generator = { type = "ContextPoints", context = "squad" }

[[options.tests]]
type = "Distance"
scoring = "inverse_linear"
filter = { up_to = { param = "MaxDistance", default = 1000.0 } }
"#;

fn workspace() -> (TempDir, RunContext) {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("scene.toml"), ARENA).unwrap();
    std::fs::write(dir.path().join("squad.toml"), CLOSEST_SQUAD_POINT).unwrap();
    let context = RunContext::from_config(dir.path().to_path_buf(), EqsConfig::default());
    (dir, context)
}

fn command(args: &[&str]) -> Commands {
    let mut argv = vec!["eqs"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap().command
}

#[test]
fn run_prints_json_result() {
    let (_dir, context) = workspace();
    let output = context
        .execute(&command(&[
            "run",
            "--template",
            "squad.toml",
            "--scene",
            "scene.toml",
            "--at",
            "0,250,0",
            "--format",
            "json",
        ]))
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(value["name"], "ClosestSquadPoint");
    assert_eq!(value["status"], "Finished");
    assert_eq!(value["items"].as_array().unwrap().len(), 1);
    assert_eq!(value["items"][0]["location"][1], 300.0);
    assert!(value["debug"]["items"].is_array());
}

#[test]
fn run_applies_param_overrides_and_querier_names() {
    let (_dir, context) = workspace();
    let output = context
        .execute(&command(&[
            "run",
            "--template",
            "squad.toml",
            "--scene",
            "scene.toml",
            "--querier",
            "player",
            "--param",
            "MaxDistance=100",
            "--format",
            "json",
        ]))
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(value["status"], "Finished");
    assert!(value["items"].as_array().unwrap().is_empty());
}

#[test]
fn run_rejects_unknown_names() {
    let (_dir, context) = workspace();
    let unknown_param = command(&[
        "run",
        "--template",
        "squad.toml",
        "--scene",
        "scene.toml",
        "--param",
        "Radius=5",
    ]);
    assert!(context.execute(&unknown_param).is_err());

    let unknown_querier = command(&[
        "run",
        "--template",
        "squad.toml",
        "--scene",
        "scene.toml",
        "--querier",
        "ghost",
    ]);
    assert!(context.execute(&unknown_querier).is_err());
}

#[test]
fn validate_and_params_describe_the_template() {
    let (_dir, context) = workspace();
    let summary = context
        .execute(&command(&["validate", "--template", "squad.toml"]))
        .unwrap();
    assert!(summary.contains("ClosestSquadPoint"));
    assert!(summary.contains("Points of squad"));

    let params = context
        .execute(&command(&["params", "--template", "squad.toml"]))
        .unwrap();
    assert!(params.contains("MaxDistance"));
    assert!(params.contains("1000"));
}

#[test]
fn run_text_output_lists_ranked_items() {
    let (_dir, context) = workspace();
    let output = context
        .execute(&command(&[
            "run",
            "--template",
            "squad.toml",
            "--scene",
            "scene.toml",
            "--budget-us",
            "10",
        ]))
        .unwrap();
    assert!(output.contains("Rank"));
    assert!(output.contains("Finished"));
}

#[test]
fn run_succeeds_when_no_results_are_retained() {
    let (dir, _) = workspace();
    let mut config = EqsConfig::default();
    config.manager.max_retained_results = 0;
    let context = RunContext::from_config(dir.path().to_path_buf(), config);

    let output = context
        .execute(&command(&[
            "run",
            "--template",
            "squad.toml",
            "--scene",
            "scene.toml",
            "--format",
            "json",
        ]))
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(value["status"], "Finished");
    assert_eq!(value["items"].as_array().unwrap().len(), 1);
}
