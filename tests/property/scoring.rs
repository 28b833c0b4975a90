//! Finished queries rank finite scores, respect filters, and do not depend
//! on how the work was sliced.

use eqs::config::ManagerConfig;
use eqs::context::{ContextKey, ContextRegistry, FixedPointsContext, Querier};
use eqs::generator::ContextPointsGenerator;
use eqs::manager::QueryManager;
use eqs::params::{Param, QueryParams};
use eqs::template::{QueryOption, QueryTemplate};
use eqs::test::{
    DistanceMode, DistanceTest, DotTest, FilterCondition, ScoringCurve, TestSettings,
};
use eqs::types::{Rotator, Transform, Vector};
use eqs::world::WorldServices;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn point() -> impl Strategy<Value = Vector> {
    (-1000.0f32..1000.0, -1000.0f32..1000.0, -100.0f32..100.0)
        .prop_map(|(x, y, z)| Vector::new(x, y, z))
}

fn curve() -> impl Strategy<Value = ScoringCurve> {
    prop_oneof![
        Just(ScoringCurve::Linear),
        Just(ScoringCurve::Square),
        Just(ScoringCurve::InverseLinear),
        Just(ScoringCurve::SquareRoot),
        Just(ScoringCurve::Constant),
    ]
}

fn mode() -> impl Strategy<Value = DistanceMode> {
    prop_oneof![
        Just(DistanceMode::Distance3D),
        Just(DistanceMode::Distance2D),
        Just(DistanceMode::DistanceZ),
    ]
}

#[derive(Debug)]
struct Scenario {
    points: Vec<Vector>,
    mode: DistanceMode,
    curve: ScoringCurve,
    weight: f32,
    max_distance: f32,
}

fn scenario() -> impl Strategy<Value = Scenario> {
    (
        prop::collection::vec(point(), 0..40),
        mode(),
        curve(),
        0.1f32..5.0,
        0.0f32..2000.0,
    )
        .prop_map(|(points, mode, curve, weight, max_distance)| Scenario {
            points,
            mode,
            curve,
            weight,
            max_distance,
        })
}

impl Scenario {
    fn template(&self) -> Arc<QueryTemplate> {
        let option = QueryOption::new(ContextPointsGenerator {
            context: ContextKey::new("Candidates"),
        })
        .with_test(DistanceTest {
            mode: self.mode,
            settings: TestSettings::default()
                .with_filter(FilterCondition::UpTo(Param::Value(self.max_distance)))
                .with_scoring(self.curve)
                .with_weight(self.weight),
            ..Default::default()
        })
        .with_test(DotTest::default());
        Arc::new(QueryTemplate::new("Property", vec![option]).unwrap())
    }

    fn manager(&self, config: ManagerConfig) -> QueryManager {
        let mut contexts = ContextRegistry::new();
        contexts.register(
            "Candidates",
            Arc::new(FixedPointsContext::new(self.points.clone())),
        );
        QueryManager::with_config(WorldServices::default(), contexts, config)
    }
}

fn querier() -> Querier {
    Querier::Static(Transform::new(Vector::ZERO, Rotator::from_yaw(30.0)))
}

proptest! {
    #[test]
    fn finished_scores_are_finite_and_ranked(s in scenario()) {
        let mut manager = s.manager(ManagerConfig::default());
        let result = manager.run_blocking(&s.template(), querier(), &QueryParams::new()).unwrap();

        prop_assert!(result.is_success());
        prop_assert!(result.items.iter().all(|i| i.score.is_finite()));
        prop_assert!(result.items.windows(2).all(|w| w[0].score >= w[1].score));

        let snapshot = manager.debugger().last().cloned();
        for item in snapshot.iter().flat_map(|s| s.items.iter()) {
            let normalized = item.weighted[0] / s.weight;
            prop_assert!((-1e-5..=1.0 + 1e-5).contains(&normalized), "{}", normalized);
        }
    }

    #[test]
    fn scalar_filter_holds_for_every_result(s in scenario()) {
        let mut manager = s.manager(ManagerConfig::default());
        let result = manager.run_blocking(&s.template(), querier(), &QueryParams::new()).unwrap();
        for location in result.locations() {
            prop_assert!(s.mode.measure(location, Vector::ZERO) <= s.max_distance);
        }
        let expected = s
            .points
            .iter()
            .filter(|p| s.mode.measure(**p, Vector::ZERO) <= s.max_distance)
            .count();
        prop_assert_eq!(result.len(), expected);
    }

    #[test]
    fn slicing_does_not_change_results(s in scenario(), batch in 1usize..6) {
        let mut whole = s.manager(ManagerConfig::default());
        let expected = whole.run_blocking(&s.template(), querier(), &QueryParams::new()).unwrap();

        let mut sliced = s.manager(ManagerConfig {
            batch_low: batch,
            batch_medium: batch,
            batch_high: batch,
            ..Default::default()
        });
        let id = sliced.submit(&s.template(), querier(), &QueryParams::new()).unwrap();
        while sliced.is_active(id) {
            sliced.tick(Duration::ZERO);
        }
        let actual = sliced.take_result(id).unwrap();
        prop_assert_eq!(actual.items, expected.items);
    }
}
