//! Query Instance
//!
//! The mutable runtime state of one query: the item arena, the per-item
//! per-test score matrix, the frozen parameter table, the context cache, and
//! a plain [`StepCursor`] recording where execution stopped. Calling
//! [`QueryInstance::step`] repeatedly drives the state machine
//!
//! `NotRun -> Generating -> Testing -> Finished`, or `Failed` from anywhere.
//!
//! Only the Testing state is sliced: after every item batch the instance
//! checks the deadline and returns. Generation and the final combine/sort
//! always run to completion inside one step. Resuming continues from the
//! cursor and never re-evaluates an (item, test) pair, so a query stepped
//! across many ticks ends with exactly the scores of an uninterrupted run.

use crate::context::{ContextData, ContextRegistry, ContextResolver, Querier};
use crate::error::QueryError;
use crate::generator::GenerationContext;
use crate::item::{ItemStore, ItemTypeId, ItemView};
use crate::params::{NamedValues, QueryParams};
use crate::template::QueryTemplate;
use crate::test::{reduce_samples, ItemOutcome, Normalizer, QueryTest, TestCost};
use crate::types::{EntityHandle, QueryId, Vector};
use crate::world::WorldServices;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryStatus {
    NotRun,
    Generating,
    Testing,
    Finished,
    Failed,
}

impl QueryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, QueryStatus::Finished | QueryStatus::Failed)
    }
}

/// Where a suspended instance resumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCursor {
    pub option_index: usize,
    pub test_index: usize,
    pub item_index: usize,
}

/// Items evaluated between deadline checks, per test cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSizes {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl Default for BatchSizes {
    fn default() -> Self {
        Self {
            low: 32,
            medium: 8,
            high: 1,
        }
    }
}

impl BatchSizes {
    pub fn for_cost(&self, cost: TestCost) -> usize {
        let size = match cost {
            TestCost::Low => self.low,
            TestCost::Medium => self.medium,
            TestCost::High => self.high,
        };
        size.max(1)
    }
}

/// Per (item, test) values of the current option, row-major by item.
#[derive(Debug, Clone, Default)]
pub struct ScoreMatrix {
    tests: usize,
    raw: Vec<Option<f32>>,
    normalized: Vec<f32>,
    weighted: Vec<f32>,
}

impl ScoreMatrix {
    fn allocate(items: usize, tests: usize) -> Result<Self, QueryError> {
        let cells = items.checked_mul(tests).ok_or_else(|| {
            QueryError::AllocationFailed(format!("{} items x {} tests overflows", items, tests))
        })?;
        let alloc_err = |e: std::collections::TryReserveError| QueryError::AllocationFailed(e.to_string());
        let mut matrix = Self {
            tests,
            ..Default::default()
        };
        matrix.raw.try_reserve_exact(cells).map_err(alloc_err)?;
        matrix.normalized.try_reserve_exact(cells).map_err(alloc_err)?;
        matrix.weighted.try_reserve_exact(cells).map_err(alloc_err)?;
        matrix.raw.resize(cells, None);
        matrix.normalized.resize(cells, 0.0);
        matrix.weighted.resize(cells, 0.0);
        Ok(matrix)
    }

    fn cell(&self, item: usize, test: usize) -> usize {
        item * self.tests + test
    }

    pub fn test_count(&self) -> usize {
        self.tests
    }

    /// Combined raw value of a test for an item; `None` when nothing was measured.
    pub fn raw(&self, item: usize, test: usize) -> Option<f32> {
        self.raw.get(self.cell(item, test)).copied().flatten()
    }

    /// Score in `[0, 1]` before weighting.
    pub fn normalized(&self, item: usize, test: usize) -> f32 {
        self.normalized
            .get(self.cell(item, test))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn weighted(&self, item: usize, test: usize) -> f32 {
        self.weighted.get(self.cell(item, test)).copied().unwrap_or(0.0)
    }

    fn set_raw(&mut self, item: usize, test: usize, value: Option<f32>) {
        let cell = self.cell(item, test);
        if let Some(slot) = self.raw.get_mut(cell) {
            *slot = value;
        }
    }

    fn set_score(&mut self, item: usize, test: usize, normalized: f32, weighted: f32) {
        let cell = self.cell(item, test);
        if let (Some(n), Some(w)) = (self.normalized.get_mut(cell), self.weighted.get_mut(cell)) {
            *n = normalized;
            *w = weighted;
        }
    }

    fn total(&self, item: usize) -> f32 {
        (0..self.tests).map(|t| self.weighted(item, t)).sum()
    }
}

/// One ranked item of a finished query, with a copy of its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultItem {
    pub index: usize,
    pub score: f32,
    pub raw: Vec<u8>,
}

/// Outcome of one query. Read-only once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub query_id: QueryId,
    pub query_name: String,
    pub status: QueryStatus,
    /// Option whose generator produced `items`.
    pub option_index: usize,
    pub item_type: ItemTypeId,
    /// Best first.
    pub items: Vec<ResultItem>,
    pub error: Option<QueryError>,
}

impl QueryResult {
    fn failed(query_id: QueryId, query_name: &str, item_type: ItemTypeId, error: QueryError) -> Self {
        Self {
            query_id,
            query_name: query_name.to_string(),
            status: QueryStatus::Failed,
            option_index: 0,
            item_type,
            items: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Finished
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn location(&self, rank: usize) -> Option<Vector> {
        let item = self.items.get(rank)?;
        Some(self.item_type.descriptor().location(&item.raw))
    }

    pub fn best_location(&self) -> Option<Vector> {
        self.location(0)
    }

    pub fn locations(&self) -> Vec<Vector> {
        let descriptor = self.item_type.descriptor();
        self.items.iter().map(|i| descriptor.location(&i.raw)).collect()
    }

    pub fn entities(&self) -> Vec<EntityHandle> {
        let descriptor = self.item_type.descriptor();
        self.items.iter().filter_map(|i| descriptor.entity(&i.raw)).collect()
    }

    pub fn describe(&self, rank: usize) -> Option<String> {
        let item = self.items.get(rank)?;
        Some(self.item_type.descriptor().describe(&item.raw))
    }
}

/// Collaborators an instance borrows for one step.
#[derive(Clone, Copy)]
pub struct StepEnv<'a> {
    pub world: &'a WorldServices,
    pub contexts: &'a ContextRegistry,
    pub batches: BatchSizes,
}

pub struct QueryInstance {
    id: QueryId,
    template: Arc<QueryTemplate>,
    querier: Querier,
    params: NamedValues,
    status: QueryStatus,
    cursor: StepCursor,
    store: ItemStore,
    scores: ScoreMatrix,
    context_cache: HashMap<String, ContextData>,
    test_prepared: bool,
    result: Option<QueryResult>,
    busy: Duration,
}

impl QueryInstance {
    /// Creates an instance with caller overrides applied to the template's parameters.
    pub fn new(
        id: QueryId,
        template: Arc<QueryTemplate>,
        querier: Querier,
        overrides: &QueryParams,
    ) -> Result<Self, QueryError> {
        let mut params = template.named_params().clone();
        params.apply(overrides)?;
        let item_type = template
            .option(0)
            .map(|o| o.generator.item_type())
            .ok_or_else(|| QueryError::InvalidTemplate("template has no options".into()))?;
        Ok(Self {
            id,
            template,
            querier,
            params,
            status: QueryStatus::NotRun,
            cursor: StepCursor::default(),
            store: ItemStore::new(item_type),
            scores: ScoreMatrix::default(),
            context_cache: HashMap::new(),
            test_prepared: false,
            result: None,
            busy: Duration::ZERO,
        })
    }

    pub fn id(&self) -> QueryId {
        self.id
    }

    pub fn status(&self) -> QueryStatus {
        self.status
    }

    pub fn cursor(&self) -> StepCursor {
        self.cursor
    }

    pub fn querier(&self) -> &Querier {
        &self.querier
    }

    pub fn template(&self) -> &Arc<QueryTemplate> {
        &self.template
    }

    pub fn params(&self) -> &NamedValues {
        &self.params
    }

    pub fn items(&self) -> &ItemStore {
        &self.store
    }

    pub fn scores(&self) -> &ScoreMatrix {
        &self.scores
    }

    pub fn result(&self) -> Option<&QueryResult> {
        self.result.as_ref()
    }

    pub fn take_result(&mut self) -> Option<QueryResult> {
        self.result.take()
    }

    /// Wall time spent inside `step` so far.
    pub fn busy_time(&self) -> Duration {
        self.busy
    }

    /// Advances until the query is done or `deadline` passes. At least one
    /// unit of work (a generation pass or one item batch) runs per call.
    pub fn step(&mut self, env: &StepEnv<'_>, deadline: Instant) -> QueryStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        let started = Instant::now();
        loop {
            if let Err(err) = self.advance(env) {
                self.fail(err);
                break;
            }
            if self.status.is_terminal() || Instant::now() >= deadline {
                break;
            }
        }
        self.busy += started.elapsed();
        self.status
    }

    /// Runs to completion without suspending.
    pub fn run(&mut self, env: &StepEnv<'_>) -> QueryStatus {
        let started = Instant::now();
        while !self.status.is_terminal() {
            if let Err(err) = self.advance(env) {
                self.fail(err);
            }
        }
        self.busy += started.elapsed();
        self.status
    }

    /// Aborts the query, releasing its buffers. The result carries `error`
    /// and no items.
    pub fn fail(&mut self, error: QueryError) {
        if self.status.is_terminal() {
            return;
        }
        warn!(query = %self.id, name = self.template.name(), error = %error, "Query failed");
        self.status = QueryStatus::Failed;
        self.result = Some(QueryResult::failed(
            self.id,
            self.template.name(),
            self.store.item_type(),
            error,
        ));
        self.store.clear();
        self.scores = ScoreMatrix::default();
        self.context_cache.clear();
    }

    fn advance(&mut self, env: &StepEnv<'_>) -> Result<(), QueryError> {
        match self.status {
            QueryStatus::NotRun => {
                self.status = QueryStatus::Generating;
                self.generate(env)
            }
            QueryStatus::Generating => self.generate(env),
            QueryStatus::Testing => self.run_batch(env),
            QueryStatus::Finished | QueryStatus::Failed => Ok(()),
        }
    }

    fn generate(&mut self, env: &StepEnv<'_>) -> Result<(), QueryError> {
        let template = Arc::clone(&self.template);
        let option = template.option(self.cursor.option_index).ok_or_else(|| {
            QueryError::InvalidTemplate(format!("no option {}", self.cursor.option_index))
        })?;
        let item_type = option.generator.item_type();
        self.store = ItemStore::new(item_type);

        let generated = {
            let mut cx = GenerationContext {
                resolver: ContextResolver {
                    registry: env.contexts,
                    world: env.world,
                    querier: &self.querier,
                    params: &self.params,
                    item_type,
                    cache: &mut self.context_cache,
                },
                store: &mut self.store,
            };
            option.generator.generate(&mut cx)
        };
        match generated {
            Ok(()) => {}
            Err(err) if err.is_recoverable() => {
                debug!(query = %self.id, error = %err, "Generator context unavailable, no items");
                self.store.clear();
            }
            Err(err) => return Err(err),
        }

        self.scores = ScoreMatrix::allocate(self.store.len(), option.tests.len())?;
        self.cursor.test_index = 0;
        self.cursor.item_index = 0;
        self.test_prepared = false;
        self.status = QueryStatus::Testing;
        debug!(
            query = %self.id,
            option = self.cursor.option_index,
            items = self.store.len(),
            generator = %option.generator.describe_title(),
            "Generated items"
        );
        Ok(())
    }

    fn run_batch(&mut self, env: &StepEnv<'_>) -> Result<(), QueryError> {
        let template = Arc::clone(&self.template);
        let option = template.option(self.cursor.option_index).ok_or_else(|| {
            QueryError::InvalidTemplate(format!("no option {}", self.cursor.option_index))
        })?;
        if self.store.is_empty() || self.cursor.test_index >= option.tests.len() {
            return self.finish_option();
        }
        let test_index = self.cursor.test_index;
        let test = option.tests[test_index].as_ref();

        let mut resolver = ContextResolver {
            registry: env.contexts,
            world: env.world,
            querier: &self.querier,
            params: &self.params,
            item_type: self.store.item_type(),
            cache: &mut self.context_cache,
        };
        if !self.test_prepared {
            match test.prepare(&mut resolver) {
                Ok(()) => self.test_prepared = true,
                Err(err) if err.is_recoverable() => {
                    warn!(
                        query = %self.id,
                        test = %test.describe_title(),
                        error = %err,
                        "Skipping test, context unavailable"
                    );
                    self.cursor.test_index += 1;
                    self.cursor.item_index = 0;
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }

        let start = self.cursor.item_index;
        let end = start
            .saturating_add(env.batches.for_cost(test.cost()))
            .min(self.store.len());
        let views: Vec<ItemView<'_>> = (start..end)
            .filter(|i| self.store.is_valid(*i))
            .filter_map(|i| self.store.get(i))
            .collect();
        let indices: Vec<usize> = views.iter().map(|v| v.index).collect();
        let outcomes = test.evaluate_batch(&resolver, &views);

        for (index, outcome) in indices.into_iter().zip(outcomes) {
            match outcome {
                Ok(samples) => match reduce_samples(test, &self.params, &samples) {
                    ItemOutcome::Filtered => self.store.invalidate(index),
                    ItemOutcome::Kept(raw) => self.scores.set_raw(index, test_index, raw),
                },
                Err(err) if err.is_recoverable() => {
                    debug!(query = %self.id, item = index, error = %err, "Item skipped by test");
                }
                Err(err) => return Err(err),
            }
        }

        self.cursor.item_index = end;
        if end >= self.store.len() {
            self.finish_test(test_index, test);
        }
        Ok(())
    }

    /// Normalizes the finished test over the items that survived it.
    fn finish_test(&mut self, test_index: usize, test: &dyn QueryTest) {
        let valid: Vec<usize> = (0..self.store.len())
            .filter(|i| self.store.is_valid(*i))
            .collect();
        let normalizer = Normalizer::new(
            test,
            &self.params,
            valid.iter().filter_map(|i| self.scores.raw(*i, test_index)),
        );
        for index in valid {
            let (normalized, weighted) = normalizer.score(self.scores.raw(index, test_index));
            self.scores.set_score(index, test_index, normalized, weighted);
        }
        debug!(
            query = %self.id,
            test = %test.describe_title(),
            remaining = self.store.valid_count(),
            "Test finished"
        );
        self.cursor.test_index += 1;
        self.cursor.item_index = 0;
        self.test_prepared = false;
    }

    fn finish_option(&mut self) -> Result<(), QueryError> {
        let option_count = self.template.options().len();
        if self.store.valid_count() == 0 && self.cursor.option_index + 1 < option_count {
            debug!(
                query = %self.id,
                option = self.cursor.option_index,
                "Option produced no items, falling back to next option"
            );
            self.cursor = StepCursor {
                option_index: self.cursor.option_index + 1,
                ..StepCursor::default()
            };
            self.test_prepared = false;
            self.status = QueryStatus::Generating;
            return Ok(());
        }

        for index in 0..self.store.len() {
            if self.store.is_valid(index) {
                let total = self.scores.total(index);
                self.store
                    .set_score(index, if total.is_finite() { total } else { 0.0 });
            }
        }

        let mut ranked: Vec<(usize, f32)> = self
            .store
            .items()
            .iter()
            .enumerate()
            .filter(|(_, item)| item.valid)
            .map(|(index, item)| (index, item.score))
            .collect();
        // Stable: equal scores keep generation order.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        if let Some(limit) = self.template.run_mode().limit() {
            ranked.truncate(limit);
        }
        let items = ranked
            .into_iter()
            .filter_map(|(index, score)| {
                self.store.get(index).map(|view| ResultItem {
                    index,
                    score,
                    raw: view.raw.to_vec(),
                })
            })
            .collect::<Vec<_>>();

        info!(
            query = %self.id,
            name = self.template.name(),
            option = self.cursor.option_index,
            generated = self.store.len(),
            returned = items.len(),
            "Query finished"
        );
        self.result = Some(QueryResult {
            query_id: self.id,
            query_name: self.template.name().to_string(),
            status: QueryStatus::Finished,
            option_index: self.cursor.option_index,
            item_type: self.store.item_type(),
            items,
            error: None,
        });
        self.status = QueryStatus::Finished;
        Ok(())
    }
}
