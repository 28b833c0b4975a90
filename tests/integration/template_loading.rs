//! Template files on disk: TOML and JSON, validation failures.

use super::test_utils::{arena, arena_world, at};
use eqs::context::ContextRegistry;
use eqs::error::{ApiError, QueryError};
use eqs::item::ItemTypeId;
use eqs::manager::QueryManager;
use eqs::params::{ParamValue, QueryParams};
use eqs::template::{load_template, RunMode, TemplateDescription};
use std::sync::Arc;
use tempfile::TempDir;

const FIND_COVER: &str = r#"
name = "FindCover"
run_mode = { top_n = 3 }

[[options]]
generator = { type = "OnCircle", circle_radius = { param = "Radius", default = 400.0 }, spacing = { points = 16 }, circle_center = "Querier" }

[[options.tests]]
type = "Trace"
context = "Querier"
filter = { equals = false }
purpose = "filter_only"

[[options.tests]]
type = "Distance"
distance_to = "Querier"
scoring = "inverse_linear"
weight = 2.0

[[options.tests]]
type = "Pathfinding"
mode = "path_length"
discard_unreachable = true
cost = "medium"
"#;

#[test]
fn loads_toml_template_from_disk_and_runs_it() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("find_cover.toml");
    std::fs::write(&path, FIND_COVER).unwrap();

    let template = load_template(&path).unwrap();
    assert_eq!(template.name(), "FindCover");
    assert_eq!(template.run_mode(), RunMode::TopN(3));
    assert_eq!(template.options()[0].tests.len(), 3);
    assert_eq!(
        template.named_params().get("Radius"),
        Some(ParamValue::Float(400.0))
    );

    let scene = arena();
    let mut manager = QueryManager::new(arena_world(&scene), ContextRegistry::new());
    let result = manager
        .run_blocking(&Arc::new(template), at(0.0, 0.0, 50.0), &QueryParams::new())
        .unwrap();

    // Only points hidden behind the wall survive the trace filter.
    assert!(!result.is_empty());
    assert!(result.len() <= 3);
    assert!(result.locations().iter().all(|l| l.x > 200.0));
}

#[test]
fn loads_json_template_by_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("squad.json");
    std::fs::write(
        &path,
        r#"{
            "name": "NearSquad",
            "run_mode": "single_result",
            "options": [{
                "generator": { "type": "ContextPoints", "context": "squad" },
                "tests": [{ "type": "Distance", "mode": "distance_2d", "scoring": "inverse_linear" }]
            }]
        }"#,
    )
    .unwrap();

    let template = load_template(&path).unwrap();
    assert_eq!(template.run_mode(), RunMode::SingleResult);
    assert_eq!(
        template.options()[0].generator.item_type(),
        ItemTypeId::Point
    );
}

#[test]
fn template_without_options_is_rejected() {
    let err = TemplateDescription::from_toml_str("name = \"Empty\"\noptions = []\n")
        .unwrap()
        .build()
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidTemplate(_)));
}

#[test]
fn numeric_filter_on_boolean_test_is_rejected() {
    let text = r#"
name = "Bad"

[[options]]
generator = { type = "SimpleGrid" }

[[options.tests]]
type = "Trace"
filter = { at_least = 1.0 }
"#;
    let err = TemplateDescription::from_toml_str(text)
        .unwrap()
        .build()
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidTemplate(_)));
}

#[test]
fn unknown_generator_type_is_a_parse_error() {
    let text = r#"
name = "Bad"

[[options]]
generator = { type = "Spiral" }
"#;
    assert!(matches!(
        TemplateDescription::from_toml_str(text),
        Err(ApiError::TemplateParse(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        load_template(&dir.path().join("absent.toml")),
        Err(ApiError::IoError(_))
    ));
}
