//! End-to-end scoring properties of finished queries.

use super::test_utils::{arena, arena_world, at, distance_template, fixed_contexts, origin, patrol_template};
use eqs::config::ManagerConfig;
use eqs::context::{ContextKey, ContextRegistry};
use eqs::generator::{ContextPointsGenerator, SimpleGridGenerator};
use eqs::instance::QueryStatus;
use eqs::manager::QueryManager;
use eqs::params::{Param, QueryParams};
use eqs::template::{QueryOption, QueryTemplate};
use eqs::test::{
    DistanceMode, DistanceTest, DotTest, FilterCondition, Normalization, PathMode,
    PathfindingTest, TestSettings, TraceTest,
};
use eqs::types::Vector;
use eqs::world::{NavigationProvider, WorldServices};
use std::sync::Arc;
use std::time::Duration;

fn raw_distance(mode: DistanceMode, target: Vector) -> Option<f32> {
    let option = QueryOption::new(ContextPointsGenerator {
        context: ContextKey::new("Origin"),
    })
    .with_test(DistanceTest {
        mode,
        distance_to: ContextKey::new("Target"),
        ..Default::default()
    });
    let template = Arc::new(QueryTemplate::new("Measure", vec![option]).unwrap());
    let contexts = fixed_contexts(&[("Origin", vec![Vector::ZERO]), ("Target", vec![target])]);
    let mut manager = QueryManager::new(WorldServices::default(), contexts);

    let result = manager.run_blocking(&template, origin(), &QueryParams::new()).unwrap();
    assert_eq!(result.len(), 1);
    let snapshot = manager.debugger().last().unwrap();
    snapshot.items[0].raw[0]
}

#[test]
fn distance_modes_measure_expected_values() {
    let planar = Vector::new(3.0, 4.0, 0.0);
    assert_eq!(raw_distance(DistanceMode::Distance3D, planar), Some(5.0));
    assert_eq!(raw_distance(DistanceMode::Distance2D, planar), Some(5.0));
    assert_eq!(raw_distance(DistanceMode::DistanceZ, planar), Some(0.0));

    let above = Vector::new(0.0, 0.0, 5.0);
    assert_eq!(raw_distance(DistanceMode::Distance3D, above), Some(5.0));
    assert_eq!(raw_distance(DistanceMode::Distance2D, above), Some(0.0));
    assert_eq!(raw_distance(DistanceMode::DistanceZ, above), Some(5.0));
}

#[test]
fn empty_context_finishes_with_no_items() {
    let contexts = fixed_contexts(&[("Nobody", Vec::new()), ("Target", vec![Vector::ZERO])]);
    let mut manager = QueryManager::new(WorldServices::default(), contexts);
    let result = manager
        .run_blocking(&distance_template("Nobody", "Target"), origin(), &QueryParams::new())
        .unwrap();
    assert_eq!(result.status, QueryStatus::Finished);
    assert!(result.is_empty());
    assert!(result.error.is_none());
}

#[test]
fn boolean_filter_drops_every_failing_item() {
    let scene = arena();
    let querier_location = Vector::new(0.0, 0.0, 50.0);
    let option = QueryOption::new(SimpleGridGenerator {
        grid_half_size: Param::Value(500.0),
        space_between: Param::Value(100.0),
        ..Default::default()
    })
    .with_test(TraceTest {
        settings: TestSettings::default().with_filter(FilterCondition::Equals(Param::Value(true))),
        ..Default::default()
    });
    let template = Arc::new(QueryTemplate::new("Visible", vec![option]).unwrap());
    let mut manager = QueryManager::new(arena_world(&scene), ContextRegistry::new());

    let result = manager
        .run_blocking(&template, at(0.0, 0.0, 50.0), &QueryParams::new())
        .unwrap();

    // 11 x 11 grid, some of it behind the wall
    assert!(!result.is_empty());
    assert!(result.len() < 121);
    for location in result.locations() {
        assert!(
            scene.trace_obstruction(querier_location, location).is_none(),
            "{} is hidden but was kept",
            location
        );
    }
    assert!(!result.locations().contains(&Vector::new(300.0, 0.0, 50.0)));
}

#[test]
fn results_are_ranked_and_finite() {
    let scene = arena();
    let mut manager = QueryManager::new(arena_world(&scene), ContextRegistry::new());
    let result = manager
        .run_blocking(&patrol_template(400.0), at(0.0, 0.0, 50.0), &QueryParams::new())
        .unwrap();

    assert!(result.is_success());
    assert!(!result.is_empty());
    assert!(result.items.iter().all(|i| i.score.is_finite()));
    assert!(result.items.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn normalized_contributions_stay_in_unit_range() {
    let scene = arena();
    let mut manager = QueryManager::new(arena_world(&scene), ContextRegistry::new());
    manager
        .run_blocking(&patrol_template(600.0), at(0.0, 0.0, 50.0), &QueryParams::new())
        .unwrap();

    // Weights are 1.0, 0.5 and 2.0.
    let weights = [1.0f32, 0.5, 2.0];
    let snapshot = manager.debugger().last().unwrap();
    for item in &snapshot.items {
        for (weighted, weight) in item.weighted.iter().zip(weights) {
            let normalized = weighted / weight;
            assert!((0.0..=1.0).contains(&normalized), "{} out of range", normalized);
        }
    }
}

#[test]
fn suspended_queries_match_synchronous_runs() {
    let scene = arena();
    let params = QueryParams::new().float("HalfSize", 500.0);

    let mut whole = QueryManager::new(arena_world(&scene), ContextRegistry::new());
    let expected = whole
        .run_blocking(&patrol_template(300.0), at(0.0, 0.0, 50.0), &params)
        .unwrap();

    let sliced_config = ManagerConfig {
        batch_low: 1,
        batch_medium: 1,
        batch_high: 1,
        ..Default::default()
    };
    let mut sliced =
        QueryManager::with_config(arena_world(&scene), ContextRegistry::new(), sliced_config);
    let id = sliced
        .submit(&patrol_template(300.0), at(0.0, 0.0, 50.0), &params)
        .unwrap();
    let mut ticks = 0;
    while sliced.is_active(id) {
        sliced.tick(Duration::ZERO);
        ticks += 1;
    }
    let actual = sliced.take_result(id).unwrap();

    assert!(ticks > 100, "expected many slices, got {}", ticks);
    assert_eq!(actual.items, expected.items);
    assert_eq!(actual.locations().len(), 121);
}

#[test]
fn named_override_changes_generation() {
    let scene = arena();
    let mut manager = QueryManager::new(arena_world(&scene), ContextRegistry::new());
    let small = manager
        .run_blocking(&patrol_template(500.0), origin(), &QueryParams::new().float("HalfSize", 100.0))
        .unwrap();
    assert_eq!(small.len(), 9);
}

#[test]
fn zero_length_dot_line_scores_zero_and_ranks_below_real_items() {
    let option = QueryOption::new(ContextPointsGenerator {
        context: ContextKey::new("Around"),
    })
    .with_test(DotTest::default());
    let template = Arc::new(QueryTemplate::new("Facing", vec![option]).unwrap());
    let contexts = fixed_contexts(&[(
        "Around",
        vec![
            Vector::new(100.0, 0.0, 0.0),
            Vector::new(-100.0, 0.0, 0.0),
            Vector::ZERO,
            Vector::new(0.0, 100.0, 0.0),
        ],
    )]);
    let mut manager = QueryManager::new(WorldServices::default(), contexts);

    // The querier faces +X and stands on the third point.
    let result = manager.run_blocking(&template, origin(), &QueryParams::new()).unwrap();
    assert_eq!(result.len(), 4);
    let rank_of = |index: usize| result.items.iter().position(|i| i.index == index).unwrap();

    assert_eq!(result.items[0].index, 0);
    assert_eq!(result.items[rank_of(2)].score, 0.0);
    assert!((result.items[rank_of(3)].score - 0.5).abs() < 1e-5);
    assert!(rank_of(3) < rank_of(2));

    let snapshot = manager.debugger().last().unwrap();
    let degenerate = snapshot.items.iter().find(|i| i.index == 2).unwrap();
    assert_eq!(degenerate.raw[0], None);
}

fn path_length_template(discard_unreachable: bool) -> Arc<QueryTemplate> {
    let option = QueryOption::new(ContextPointsGenerator {
        context: ContextKey::new("Stops"),
    })
    .with_test(PathfindingTest {
        mode: PathMode::PathLength,
        discard_unreachable,
        settings: TestSettings {
            normalization: Normalization {
                from_zero: true,
                ..Default::default()
            },
            ..Default::default()
        },
        ..Default::default()
    });
    Arc::new(QueryTemplate::new("Stops", vec![option]).unwrap())
}

#[test]
fn unreachable_items_are_dropped_only_when_discarded() {
    let scene = arena();
    let island = Vector::new(0.0, 3200.0, 0.0);
    let stops = vec![Vector::new(0.0, 300.0, 0.0), Vector::new(0.0, -200.0, 0.0), island];

    let mut discarding = QueryManager::new(arena_world(&scene), fixed_contexts(&[("Stops", stops.clone())]));
    let result = discarding
        .run_blocking(&path_length_template(true), at(0.0, 0.0, 50.0), &QueryParams::new())
        .unwrap();
    assert_eq!(result.status, QueryStatus::Finished);
    assert_eq!(result.len(), 2);
    assert!(!result.locations().contains(&island));

    let mut keeping = QueryManager::new(arena_world(&scene), fixed_contexts(&[("Stops", stops)]));
    let result = keeping
        .run_blocking(&path_length_template(false), at(0.0, 0.0, 50.0), &QueryParams::new())
        .unwrap();
    assert_eq!(result.len(), 3);
    assert_eq!(result.items[0].index, 0);
    let last = result.items.last().unwrap();
    assert_eq!(last.index, 2);
    assert_eq!(last.score, 0.0);
    assert_eq!(result.location(2), Some(island));
}
