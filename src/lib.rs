//! eqs: Environment Query System
//!
//! Spatial queries for game agents. A query template generates candidate
//! items (points, directions, entities) around a querier, runs an ordered
//! list of tests that filter and score each item, and returns the survivors
//! ranked best first. Query instances are time-sliced: a [`manager::QueryManager`]
//! advances many of them under a per-tick budget.

pub mod cli;
pub mod config;
pub mod context;
pub mod debugger;
pub mod error;
pub mod generator;
pub mod instance;
pub mod item;
pub mod logging;
pub mod manager;
pub mod params;
pub mod template;
pub mod types;
pub mod world;

pub use context::{ContextKey, ContextRegistry, Querier};
pub use error::{ApiError, QueryError};
pub use instance::{QueryResult, QueryStatus};
pub use manager::{QueryManager, SharedQueryManager};
pub use params::QueryParams;
pub use template::{QueryOption, QueryTemplate, RunMode};
pub use world::WorldServices;
