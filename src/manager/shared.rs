//! Thread-safe handle around a [`QueryManager`].
//!
//! Game threads submit and cancel while a worker ticks. Completion callbacks
//! run after the lock is released, so a callback may submit follow-up queries
//! through a clone of the same handle.

use super::{ManagerStats, QueryManager};
use crate::context::Querier;
use crate::error::QueryError;
use crate::instance::{QueryResult, QueryStatus};
use crate::params::QueryParams;
use crate::template::QueryTemplate;
use crate::types::QueryId;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct SharedQueryManager {
    inner: Arc<Mutex<QueryManager>>,
}

impl SharedQueryManager {
    pub fn new(manager: QueryManager) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    pub fn submit(
        &self,
        template: &Arc<QueryTemplate>,
        querier: Querier,
        params: &QueryParams,
    ) -> Result<QueryId, QueryError> {
        self.inner.lock().submit(template, querier, params)
    }

    pub fn submit_with_callback<F>(
        &self,
        template: &Arc<QueryTemplate>,
        querier: Querier,
        params: &QueryParams,
        on_complete: F,
    ) -> Result<QueryId, QueryError>
    where
        F: FnOnce(QueryId, &QueryResult) + Send + 'static,
    {
        self.inner
            .lock()
            .submit_with_callback(template, querier, params, on_complete)
    }

    pub fn cancel(&self, id: QueryId) -> bool {
        self.inner.lock().cancel(id)
    }

    /// Steps queries under the lock, then runs callbacks without it.
    pub fn tick(&self, budget: Duration) -> usize {
        let completions = self.inner.lock().advance(budget);
        let count = completions.len();
        for completion in completions {
            completion.notify();
        }
        count
    }

    pub fn get_result(&self, id: QueryId) -> Option<QueryResult> {
        self.inner.lock().get_result(id).cloned()
    }

    pub fn take_result(&self, id: QueryId) -> Option<QueryResult> {
        self.inner.lock().take_result(id)
    }

    pub fn status(&self, id: QueryId) -> Option<QueryStatus> {
        self.inner.lock().status(id)
    }

    pub fn active_count(&self) -> usize {
        self.inner.lock().active_count()
    }

    pub fn stats(&self) -> ManagerStats {
        self.inner.lock().stats()
    }

    /// Runs `f` with exclusive access to the manager.
    pub fn with<R>(&self, f: impl FnOnce(&mut QueryManager) -> R) -> R {
        f(&mut self.inner.lock())
    }
}
