//! Query Manager
//!
//! Owns every in-flight [`QueryInstance`] and advances them round-robin
//! under a per-tick time budget. Managers are plain values: a host creates as
//! many as it needs and passes them by reference; nothing is global.
//!
//! Completion callbacks run exactly once per instance, on the thread calling
//! [`QueryManager::tick`]. A query removed through [`QueryManager::cancel`]
//! never calls back. A query whose owner entity disappears fails with
//! `QueryCancelled` and calls back with an empty result.

mod shared;

pub use shared::SharedQueryManager;

use crate::config::{DebuggerConfig, EqsConfig, ManagerConfig};
use crate::context::{ContextRegistry, Querier};
use crate::debugger::QueryDebugger;
use crate::error::QueryError;
use crate::instance::{QueryInstance, QueryResult, QueryStatus, StepEnv};
use crate::params::QueryParams;
use crate::template::QueryTemplate;
use crate::types::QueryId;
use crate::world::WorldServices;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Called once when a query finishes or fails.
pub type CompletionCallback = Box<dyn FnOnce(QueryId, &QueryResult) + Send>;

/// Lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ManagerStats {
    pub submitted: u64,
    pub finished: u64,
    pub failed: u64,
    pub cancelled: u64,
}

struct ActiveQuery {
    instance: QueryInstance,
    on_complete: Option<CompletionCallback>,
}

/// A completion waiting for its callback to run.
pub(crate) struct Completion {
    id: QueryId,
    result: QueryResult,
    callback: Option<CompletionCallback>,
}

impl Completion {
    pub(crate) fn notify(self) {
        if let Some(callback) = self.callback {
            callback(self.id, &self.result);
        }
    }
}

pub struct QueryManager {
    world: WorldServices,
    contexts: ContextRegistry,
    config: ManagerConfig,
    next_id: u64,
    active: VecDeque<ActiveQuery>,
    finished: HashMap<QueryId, QueryResult>,
    finished_order: VecDeque<QueryId>,
    stats: ManagerStats,
    debugger: QueryDebugger,
}

impl QueryManager {
    pub fn new(world: WorldServices, contexts: ContextRegistry) -> Self {
        Self::with_config(world, contexts, ManagerConfig::default())
    }

    pub fn with_config(world: WorldServices, contexts: ContextRegistry, config: ManagerConfig) -> Self {
        Self {
            world,
            contexts,
            config,
            debugger: QueryDebugger::new(DebuggerConfig::default()),
            next_id: 1,
            active: VecDeque::new(),
            finished: HashMap::new(),
            finished_order: VecDeque::new(),
            stats: ManagerStats::default(),
        }
    }

    /// Manager and debugger settings from a loaded [`EqsConfig`].
    pub fn from_config(world: WorldServices, contexts: ContextRegistry, config: &EqsConfig) -> Self {
        let mut manager = Self::with_config(world, contexts, config.manager.clone());
        manager.debugger = QueryDebugger::new(config.debugger.clone());
        manager
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn contexts(&self) -> &ContextRegistry {
        &self.contexts
    }

    /// Registry to add custom contexts to. Affects queries submitted afterwards.
    pub fn contexts_mut(&mut self) -> &mut ContextRegistry {
        &mut self.contexts
    }

    pub fn world(&self) -> &WorldServices {
        &self.world
    }

    /// Queues a query. The returned id is unique within this manager.
    ///
    /// Fails synchronously when the template names unknown contexts or a
    /// parameter override has the wrong kind.
    pub fn submit(
        &mut self,
        template: &Arc<QueryTemplate>,
        querier: Querier,
        params: &QueryParams,
    ) -> Result<QueryId, QueryError> {
        self.enqueue(template, querier, params, None)
    }

    /// Like [`QueryManager::submit`], calling `on_complete` from `tick` when done.
    pub fn submit_with_callback<F>(
        &mut self,
        template: &Arc<QueryTemplate>,
        querier: Querier,
        params: &QueryParams,
        on_complete: F,
    ) -> Result<QueryId, QueryError>
    where
        F: FnOnce(QueryId, &QueryResult) + Send + 'static,
    {
        self.enqueue(template, querier, params, Some(Box::new(on_complete)))
    }

    fn enqueue(
        &mut self,
        template: &Arc<QueryTemplate>,
        querier: Querier,
        params: &QueryParams,
        on_complete: Option<CompletionCallback>,
    ) -> Result<QueryId, QueryError> {
        template.validate_contexts(&self.contexts)?;
        let id = QueryId(self.next_id);
        let instance = QueryInstance::new(id, Arc::clone(template), querier, params)?;
        self.next_id += 1;
        self.stats.submitted += 1;
        debug!(query = %id, name = template.name(), "Query submitted");
        self.active.push_back(ActiveQuery {
            instance,
            on_complete,
        });
        Ok(id)
    }

    /// Advances active queries until `budget` is spent or none remain, then
    /// runs completion callbacks. Returns how many queries completed.
    pub fn tick(&mut self, budget: Duration) -> usize {
        let completions = self.advance(budget);
        let count = completions.len();
        for completion in completions {
            completion.notify();
        }
        count
    }

    /// [`QueryManager::tick`] with the configured default budget.
    pub fn tick_default(&mut self) -> usize {
        self.tick(Duration::from_micros(self.config.tick_budget_us))
    }

    /// Steps instances without running callbacks; the caller notifies.
    pub(crate) fn advance(&mut self, budget: Duration) -> Vec<Completion> {
        let deadline = Instant::now() + budget;
        let env = StepEnv {
            world: &self.world,
            contexts: &self.contexts,
            batches: self.config.batch_sizes(),
        };
        let mut completions = Vec::new();
        let mut still_active = VecDeque::with_capacity(self.active.len());
        let mut stepped = 0usize;

        while let Some(mut query) = self.active.pop_front() {
            if stepped > 0 && Instant::now() >= deadline {
                self.active.push_front(query);
                break;
            }
            stepped += 1;

            if !query.instance.querier().is_alive(&self.world) {
                query
                    .instance
                    .fail(QueryError::QueryCancelled("owner lost".into()));
            } else {
                query.instance.step(&env, deadline);
            }

            if query.instance.status().is_terminal() {
                completions.push(query);
            } else {
                still_active.push_back(query);
            }
        }
        // Untouched queries go first next tick.
        self.active.extend(still_active);

        completions
            .into_iter()
            .filter_map(|query| self.complete(query))
            .collect()
    }

    fn complete(&mut self, mut query: ActiveQuery) -> Option<Completion> {
        let instance = &mut query.instance;
        let id = instance.id();
        let busy_ms = instance.busy_time().as_secs_f64() * 1000.0;
        if busy_ms > self.config.warn_query_ms {
            warn!(
                query = %id,
                name = instance.template().name(),
                busy_ms,
                "Slow query"
            );
        }
        match instance.status() {
            QueryStatus::Finished => self.stats.finished += 1,
            _ => self.stats.failed += 1,
        }
        self.debugger.record(instance);

        let result = instance.take_result()?;
        self.retain(id, result.clone());
        Some(Completion {
            id,
            result,
            callback: query.on_complete.take(),
        })
    }

    fn retain(&mut self, id: QueryId, result: QueryResult) {
        if self.config.max_retained_results == 0 {
            return;
        }
        while self.finished_order.len() >= self.config.max_retained_results {
            match self.finished_order.pop_front() {
                Some(oldest) => {
                    self.finished.remove(&oldest);
                }
                None => break,
            }
        }
        self.finished.insert(id, result);
        self.finished_order.push_back(id);
    }

    /// Drops a query. An active query is released without calling back.
    /// Returns whether anything was removed.
    pub fn cancel(&mut self, id: QueryId) -> bool {
        if let Some(position) = self.active.iter().position(|q| q.instance.id() == id) {
            self.active.remove(position);
            self.stats.cancelled += 1;
            debug!(query = %id, "Query cancelled");
            return true;
        }
        if self.finished.remove(&id).is_some() {
            self.finished_order.retain(|q| *q != id);
            return true;
        }
        false
    }

    /// Result of a completed query; `None` while it is still running.
    pub fn get_result(&self, id: QueryId) -> Option<&QueryResult> {
        self.finished.get(&id)
    }

    pub fn take_result(&mut self, id: QueryId) -> Option<QueryResult> {
        let result = self.finished.remove(&id)?;
        self.finished_order.retain(|q| *q != id);
        Some(result)
    }

    pub fn status(&self, id: QueryId) -> Option<QueryStatus> {
        self.active
            .iter()
            .find(|q| q.instance.id() == id)
            .map(|q| q.instance.status())
            .or_else(|| self.finished.get(&id).map(|r| r.status))
    }

    pub fn is_active(&self, id: QueryId) -> bool {
        self.active.iter().any(|q| q.instance.id() == id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn stats(&self) -> ManagerStats {
        self.stats
    }

    pub fn debugger(&self) -> &QueryDebugger {
        &self.debugger
    }

    pub fn debugger_mut(&mut self) -> &mut QueryDebugger {
        &mut self.debugger
    }

    /// Submits and ticks until that query completes. Other active queries
    /// progress alongside it.
    pub fn run_blocking(
        &mut self,
        template: &Arc<QueryTemplate>,
        querier: Querier,
        params: &QueryParams,
    ) -> Result<QueryResult, QueryError> {
        let slot: Arc<Mutex<Option<QueryResult>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&slot);
        let id = self.submit_with_callback(template, querier, params, move |_, result| {
            *sink.lock() = Some(result.clone());
        })?;
        let budget = Duration::from_micros(self.config.tick_budget_us);
        while self.is_active(id) {
            self.tick(budget);
        }
        // The callback result does not depend on retention; drop the retained copy.
        self.take_result(id);
        let result = slot.lock().take();
        result.ok_or(QueryError::UnknownQuery(id))
    }
}
