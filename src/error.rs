//! Error types for the environment query system.

use crate::item::ItemTypeId;
use crate::types::QueryId;
use thiserror::Error;

/// Errors raised by query construction and execution
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Test '{test}' accepts {expected:?} items but the option generates {actual:?}")]
    ItemTypeMismatch {
        test: String,
        expected: ItemTypeId,
        actual: ItemTypeId,
    },

    #[error("Context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("Unknown context: {0}")]
    UnknownContext(String),

    #[error("Query cancelled: {0}")]
    QueryCancelled(String),

    #[error("Unknown query: {0}")]
    UnknownQuery(QueryId),

    #[error("Failed to allocate query buffers: {0}")]
    AllocationFailed(String),

    #[error("Invalid parameter: {0}")]
    InvalidParam(String),
}

impl QueryError {
    /// Recoverable errors degrade a generator or test instead of failing the query.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, QueryError::ContextUnavailable(_))
    }
}

/// Errors surfaced to hosts loading templates, scenes, and configuration
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Template parse error: {0}")]
    TemplateParse(String),

    #[error("Scene parse error: {0}")]
    SceneParse(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
