//! Query debugger: snapshots of the most recent query per querier.
//!
//! Snapshots are taken when an instance completes, before its buffers are
//! dropped, and can be persisted with bincode for offline inspection.

use crate::config::DebuggerConfig;
use crate::error::ApiError;
use crate::instance::{QueryInstance, QueryStatus};
use crate::types::{EntityHandle, QueryId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDescription {
    pub title: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub index: usize,
    pub description: String,
    pub score: f32,
    /// Per test, in option order.
    pub raw: Vec<Option<f32>>,
    pub weighted: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySnapshot {
    pub query_id: QueryId,
    pub name: String,
    pub option_index: usize,
    pub status: QueryStatus,
    pub num_items: usize,
    pub num_valid_items: usize,
    pub generator: String,
    pub tests: Vec<TestDescription>,
    /// Best valid items first.
    pub items: Vec<ItemSnapshot>,
    pub busy_ms: f64,
    pub recorded_at: DateTime<Utc>,
}

impl QuerySnapshot {
    pub fn capture(instance: &QueryInstance, max_items: usize) -> Self {
        let option_index = instance.cursor().option_index;
        let option = instance.template().option(option_index);
        let tests = option
            .map(|o| {
                o.tests
                    .iter()
                    .map(|t| TestDescription {
                        title: t.describe_title(),
                        details: t.describe_details(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let generator = option
            .map(|o| o.generator.describe_title())
            .unwrap_or_default();

        let store = instance.items();
        let scores = instance.scores();
        let mut ranked: Vec<usize> = (0..store.len()).filter(|i| store.is_valid(*i)).collect();
        ranked.sort_by(|a, b| {
            let score = |i: &usize| store.item(*i).map(|item| item.score).unwrap_or(0.0);
            score(b).total_cmp(&score(a))
        });
        let items = ranked
            .into_iter()
            .take(max_items)
            .filter_map(|index| {
                let view = store.get(index)?;
                let item = store.item(index)?;
                Some(ItemSnapshot {
                    index,
                    description: view.describe(),
                    score: item.score,
                    raw: (0..scores.test_count()).map(|t| scores.raw(index, t)).collect(),
                    weighted: (0..scores.test_count())
                        .map(|t| scores.weighted(index, t))
                        .collect(),
                })
            })
            .collect();

        Self {
            query_id: instance.id(),
            name: instance.template().name().to_string(),
            option_index,
            status: instance.status(),
            num_items: store.len(),
            num_valid_items: store.valid_count(),
            generator,
            tests,
            items,
            busy_ms: instance.busy_time().as_secs_f64() * 1000.0,
            recorded_at: Utc::now(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ApiError> {
        bincode::serialize(self).map_err(|e| ApiError::ConfigError(format!("encode snapshot: {}", e)))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ApiError> {
        bincode::deserialize(bytes).map_err(|e| ApiError::ConfigError(format!("decode snapshot: {}", e)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryDebugger {
    config: DebuggerConfig,
    by_querier: HashMap<EntityHandle, QuerySnapshot>,
    last_static: Option<QuerySnapshot>,
    last: Option<QueryId>,
}

impl QueryDebugger {
    pub fn new(config: DebuggerConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    /// Stores a snapshot of `instance`, replacing the previous one for its querier.
    pub fn record(&mut self, instance: &QueryInstance) {
        if !self.config.enabled {
            return;
        }
        let snapshot = QuerySnapshot::capture(instance, self.config.max_detailed_items);
        self.last = Some(snapshot.query_id);
        match instance.querier().entity() {
            Some(entity) => {
                self.by_querier.insert(entity, snapshot);
            }
            None => self.last_static = Some(snapshot),
        }
    }

    pub fn for_querier(&self, entity: EntityHandle) -> Option<&QuerySnapshot> {
        self.by_querier.get(&entity)
    }

    /// Latest snapshot of a query run for a static transform.
    pub fn last_static(&self) -> Option<&QuerySnapshot> {
        self.last_static.as_ref()
    }

    /// Most recently recorded snapshot.
    pub fn last(&self) -> Option<&QuerySnapshot> {
        let id = self.last?;
        self.last_static
            .iter()
            .chain(self.by_querier.values())
            .find(|s| s.query_id == id)
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &QuerySnapshot> {
        self.by_querier.values().chain(self.last_static.iter())
    }

    pub fn clear(&mut self) {
        self.by_querier.clear();
        self.last_static = None;
        self.last = None;
    }
}
