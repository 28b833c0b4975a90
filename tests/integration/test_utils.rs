//! Shared scenes and templates for integration tests.

use eqs::context::{ContextKey, ContextRegistry, FixedPointsContext, Querier};
use eqs::generator::{ContextPointsGenerator, SimpleGridGenerator};
use eqs::params::Param;
use eqs::template::{QueryOption, QueryTemplate};
use eqs::test::{
    DistanceTest, FilterCondition, PathfindingTest, ScoringCurve, TestSettings, TraceTest,
};
use eqs::types::{Transform, Vector};
use eqs::world::scene::Scene;
use eqs::world::WorldServices;
use std::sync::Arc;

/// A 2000x2000 walkable floor, a wall east of the origin, a disconnected
/// platform far north, two pawns and a named point set.
pub const ARENA: &str = r#"
[[nav_areas]]
min = [-1000.0, -1000.0]
max = [1000.0, 1000.0]

[[nav_areas]]
min = [-200.0, 3000.0]
max = [200.0, 3400.0]
region = 1

[[obstacles]]
min = [150.0, -100.0, 0.0]
max = [200.0, 100.0, 300.0]

[[entities]]
name = "bot"
class = "Pawn"
location = [0.0, 0.0, 50.0]

[[entities]]
name = "player"
class = "Pawn"
location = [400.0, 0.0, 50.0]

[points]
squad = [[0.0, 300.0, 0.0], [0.0, -300.0, 0.0]]
"#;

pub fn arena() -> Arc<Scene> {
    Arc::new(Scene::from_toml_str(ARENA).unwrap())
}

pub fn arena_world(scene: &Arc<Scene>) -> WorldServices {
    WorldServices::from_shared(scene.clone())
}

pub fn origin() -> Querier {
    Querier::Static(Transform::default())
}

pub fn at(x: f32, y: f32, z: f32) -> Querier {
    Querier::Static(Transform::at(Vector::new(x, y, z)))
}

/// Registry with one fixed-location context per entry.
pub fn fixed_contexts(entries: &[(&str, Vec<Vector>)]) -> ContextRegistry {
    let mut registry = ContextRegistry::new();
    for (name, points) in entries {
        registry.register(*name, Arc::new(FixedPointsContext::new(points.clone())));
    }
    registry
}

/// Grid around the querier: reachable points only, scored by line of sight
/// and closeness.
pub fn patrol_template(half_size: f32) -> Arc<QueryTemplate> {
    let option = QueryOption::new(SimpleGridGenerator {
        grid_half_size: Param::named("HalfSize", half_size),
        space_between: Param::Value(100.0),
        project: true,
        ..Default::default()
    })
    .with_test(PathfindingTest {
        settings: TestSettings::default().with_filter(FilterCondition::Equals(Param::Value(true))),
        ..Default::default()
    })
    .with_test(TraceTest {
        settings: TestSettings::default().with_weight(0.5),
        ..Default::default()
    })
    .with_test(DistanceTest {
        settings: TestSettings::default()
            .with_scoring(ScoringCurve::InverseLinear)
            .with_weight(2.0),
        ..Default::default()
    });
    Arc::new(QueryTemplate::new("Patrol", vec![option]).unwrap())
}

/// One item per point of `points_context`, scored by distance to `target`.
pub fn distance_template(points_context: &str, target: &str) -> Arc<QueryTemplate> {
    let option = QueryOption::new(ContextPointsGenerator {
        context: ContextKey::new(points_context),
    })
    .with_test(DistanceTest {
        distance_to: ContextKey::new(target),
        ..Default::default()
    });
    Arc::new(QueryTemplate::new("Distance", vec![option]).unwrap())
}
