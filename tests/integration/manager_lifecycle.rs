//! Scheduling, cancellation, owner loss, and fallback through the manager.

use super::test_utils::{arena, arena_world, fixed_contexts, origin, patrol_template};
use eqs::config::ManagerConfig;
use eqs::context::{ContextKey, ContextRegistry, Querier};
use eqs::error::QueryError;
use eqs::generator::{ContextPointsGenerator, EntitiesOfClassGenerator, SimpleGridGenerator};
use eqs::instance::{QueryResult, QueryStatus};
use eqs::manager::{QueryManager, SharedQueryManager};
use eqs::params::{Param, QueryParams};
use eqs::template::{QueryOption, QueryTemplate, RunMode};
use eqs::test::DistanceTest;
use eqs::types::{QueryId, Vector};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn sliced() -> ManagerConfig {
    ManagerConfig {
        batch_low: 1,
        batch_medium: 1,
        batch_high: 1,
        ..Default::default()
    }
}

#[test]
fn cancel_under_concurrent_submits_never_calls_back() {
    let scene = arena();
    let shared = SharedQueryManager::new(QueryManager::with_config(
        arena_world(&scene),
        ContextRegistry::new(),
        sliced(),
    ));
    let template = patrol_template(300.0);
    let called: Arc<Mutex<HashMap<QueryId, usize>>> = Arc::new(Mutex::new(HashMap::new()));
    let cancelled_active: Arc<Mutex<HashSet<QueryId>>> = Arc::new(Mutex::new(HashSet::new()));
    let stop = Arc::new(AtomicBool::new(false));

    let ticker = {
        let shared = shared.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                shared.tick(Duration::from_micros(200));
            }
        })
    };

    let submitters: Vec<_> = (0..4)
        .map(|worker| {
            let shared = shared.clone();
            let template = template.clone();
            let called = called.clone();
            let cancelled_active = cancelled_active.clone();
            thread::spawn(move || {
                for n in 0..25 {
                    let sink = called.clone();
                    let id = shared
                        .submit_with_callback(&template, origin(), &QueryParams::new(), move |id, _| {
                            *sink.lock().entry(id).or_insert(0) += 1;
                        })
                        .unwrap();
                    if (n + worker) % 2 == 0 {
                        if n % 3 == 0 {
                            thread::yield_now();
                        }
                        let was_active = shared.with(|m| {
                            let active = m.is_active(id);
                            m.cancel(id);
                            active
                        });
                        if was_active {
                            cancelled_active.lock().insert(id);
                        }
                    }
                }
            })
        })
        .collect();
    for handle in submitters {
        handle.join().unwrap();
    }

    while shared.active_count() > 0 {
        thread::sleep(Duration::from_millis(1));
    }
    stop.store(true, Ordering::SeqCst);
    ticker.join().unwrap();
    shared.tick(Duration::from_millis(1));

    let called = called.lock();
    let cancelled = cancelled_active.lock();
    assert!(!cancelled.is_empty());
    for id in cancelled.iter() {
        assert!(!called.contains_key(id), "cancelled query {} called back", id);
    }
    assert!(called.values().all(|count| *count == 1));
    let stats = shared.stats();
    assert_eq!(stats.submitted, 100);
    assert_eq!(stats.cancelled as usize, cancelled.len());
    assert_eq!(stats.finished as usize, called.len());
}

#[test]
fn owner_loss_fails_query_with_empty_result() {
    let scene = arena();
    let bot = scene.entity_by_name("bot").unwrap();
    let shared = SharedQueryManager::new(QueryManager::with_config(
        arena_world(&scene),
        ContextRegistry::new(),
        sliced(),
    ));
    let outcome: Arc<Mutex<Option<QueryResult>>> = Arc::new(Mutex::new(None));
    let sink = outcome.clone();
    shared
        .submit_with_callback(
            &patrol_template(300.0),
            Querier::Entity(bot),
            &QueryParams::new(),
            move |_, result| *sink.lock() = Some(result.clone()),
        )
        .unwrap();

    shared.tick(Duration::ZERO);
    shared.tick(Duration::ZERO);
    assert!(outcome.lock().is_none());
    assert!(scene.despawn(bot));
    shared.tick(Duration::ZERO);

    let result = outcome.lock().clone().expect("callback ran");
    assert_eq!(result.status, QueryStatus::Failed);
    assert!(result.is_empty());
    assert_eq!(result.error, Some(QueryError::QueryCancelled("owner lost".into())));
}

#[test]
fn moving_querier_is_tracked() {
    let scene = arena();
    let bot = scene.entity_by_name("bot").unwrap();
    let mut manager = QueryManager::new(arena_world(&scene), ContextRegistry::new());
    let template = patrol_template(100.0);

    let first = manager
        .run_blocking(&template, Querier::Entity(bot), &QueryParams::new())
        .unwrap();
    scene.move_entity(bot, Vector::new(500.0, 500.0, 50.0));
    let second = manager
        .run_blocking(&template, Querier::Entity(bot), &QueryParams::new())
        .unwrap();

    assert_eq!(first.len(), 9);
    assert!(second.locations().iter().all(|l| l.x >= 400.0 && l.y >= 400.0));
    assert!(manager.debugger().for_querier(bot).is_some());
}

#[test]
fn falls_back_when_first_option_finds_nothing() {
    let scene = arena();
    let template = QueryTemplate::new(
        "FindTarget",
        vec![
            QueryOption::new(EntitiesOfClassGenerator {
                class: "Turret".into(),
                search_radius: Param::Value(2000.0),
                ..Default::default()
            })
            .with_test(DistanceTest::default()),
            QueryOption::new(EntitiesOfClassGenerator {
                class: "Pawn".into(),
                search_radius: Param::Value(2000.0),
                ..Default::default()
            })
            .with_test(DistanceTest::default()),
        ],
    )
    .unwrap()
    .with_run_mode(RunMode::SingleResult);
    let mut manager = QueryManager::new(arena_world(&scene), ContextRegistry::new());

    let result = manager
        .run_blocking(&Arc::new(template), origin(), &QueryParams::new())
        .unwrap();

    assert_eq!(result.option_index, 1);
    assert_eq!(result.len(), 1);
    // Linear distance scoring prefers the farthest pawn.
    assert_eq!(result.entities(), vec![scene.entity_by_name("player").unwrap()]);
}

#[test]
fn many_queries_share_the_tick_budget() {
    let contexts = fixed_contexts(&[(
        "Line",
        (0..50).map(|i| Vector::new(i as f32 * 10.0, 0.0, 0.0)).collect(),
    )]);
    let template = Arc::new(
        QueryTemplate::new(
            "Line",
            vec![QueryOption::new(ContextPointsGenerator {
                context: ContextKey::new("Line"),
            })
            .with_test(DistanceTest::default())],
        )
        .unwrap()
        .with_run_mode(RunMode::TopN(5)),
    );
    let mut manager = QueryManager::with_config(Default::default(), contexts, sliced());
    let ids: Vec<_> = (0..10)
        .map(|_| manager.submit(&template, origin(), &QueryParams::new()).unwrap())
        .collect();

    manager.tick(Duration::ZERO);
    assert_eq!(manager.active_count(), 10);
    while manager.active_count() > 0 {
        manager.tick(Duration::from_micros(50));
    }
    for id in ids {
        let result = manager.get_result(id).unwrap();
        assert_eq!(result.len(), 5);
        assert_eq!(result.best_location(), Some(Vector::new(490.0, 0.0, 0.0)));
    }
    assert_eq!(manager.stats().finished, 10);
}

#[test]
fn invalid_overrides_fail_submit() {
    let mut manager = QueryManager::new(Default::default(), ContextRegistry::new());
    let template = Arc::new(
        QueryTemplate::new(
            "Grid",
            vec![QueryOption::new(SimpleGridGenerator {
                grid_half_size: Param::named("HalfSize", 100.0),
                ..Default::default()
            })],
        )
        .unwrap(),
    );
    let err = manager
        .submit(&template, origin(), &QueryParams::new().bool("HalfSize", true))
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidParam(_)));
    assert_eq!(manager.stats().submitted, 0);
}

#[test]
fn oversized_generation_fails_without_retry() {
    let template = Arc::new(
        QueryTemplate::new(
            "Huge",
            vec![QueryOption::new(SimpleGridGenerator {
                grid_half_size: Param::Value(1.0e9),
                space_between: Param::Value(1.0),
                ..Default::default()
            })
            .with_test(DistanceTest::default())],
        )
        .unwrap(),
    );
    let mut manager = QueryManager::new(Default::default(), ContextRegistry::new());
    let id = manager.submit(&template, origin(), &QueryParams::new()).unwrap();
    manager.tick(Duration::from_millis(5));

    assert!(!manager.is_active(id));
    let result = manager.take_result(id).unwrap();
    assert_eq!(result.status, QueryStatus::Failed);
    assert!(result.is_empty());
    assert!(matches!(result.error, Some(QueryError::AllocationFailed(_))));
    assert_eq!(manager.stats().failed, 1);
    assert_eq!(manager.stats().finished, 0);
}
