//! Generators
//!
//! A generator runs exactly once per query option, before any test, and
//! appends items straight into the instance's item arena. Generators are not
//! time sliced; an expensive generator must chunk its own work.
//!
//! If a context the generator needs cannot be resolved, the generator yields
//! no items. That is an ordinary outcome: the query finishes with an empty
//! result rather than failing.

mod entities;
mod grid;
mod points;
mod ring;

pub use entities::EntitiesOfClassGenerator;
pub use grid::SimpleGridGenerator;
pub use points::ContextPointsGenerator;
pub use ring::{CircleSpacing, DirectionFanGenerator, OnCircleGenerator};

use crate::context::{ContextData, ContextKey, ContextResolver};
use crate::error::QueryError;
use crate::item::{ItemStore, ItemTypeId, ItemValue};
use crate::params::{NamedValue, NamedValues, Param, ParamType};
use crate::world::WorldServices;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Populates the initial item set.
pub trait Generator: Send + Sync {
    /// The concrete item type every generated item has.
    fn item_type(&self) -> ItemTypeId;

    fn generate(&self, cx: &mut GenerationContext<'_>) -> Result<(), QueryError>;

    /// Contexts this generator resolves, for template validation.
    fn contexts(&self) -> Vec<&ContextKey>;

    /// Registers named parameter fields.
    fn collect_params(&self, _out: &mut Vec<NamedValue>) {}

    fn describe_title(&self) -> String;

    fn describe_details(&self) -> String {
        String::new()
    }
}

/// Everything a generator may touch while running.
pub struct GenerationContext<'a> {
    pub(crate) resolver: ContextResolver<'a>,
    pub(crate) store: &'a mut ItemStore,
}

impl<'a> GenerationContext<'a> {
    pub fn resolve(&mut self, key: &ContextKey) -> Result<ContextData, QueryError> {
        self.resolver.resolve(key)
    }

    pub fn param<T: ParamType>(&self, param: &Param<T>) -> T {
        self.resolver.params().resolve(param)
    }

    pub fn params(&self) -> &NamedValues {
        self.resolver.params()
    }

    pub fn world(&self) -> &WorldServices {
        self.resolver.world()
    }

    /// Reserves arena space up front; failure surfaces as `AllocationFailed`.
    pub fn reserve(&mut self, additional: usize) -> Result<(), QueryError> {
        self.store.reserve(additional)
    }

    pub fn add(&mut self, value: ItemValue) -> Result<(), QueryError> {
        self.store.push(value).map(|_| ())
    }

    pub fn item_count(&self) -> usize {
        self.store.len()
    }
}

/// Generator configuration as written in template files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeneratorConfig {
    SimpleGrid(SimpleGridGenerator),
    OnCircle(OnCircleGenerator),
    DirectionFan(DirectionFanGenerator),
    EntitiesOfClass(EntitiesOfClassGenerator),
    ContextPoints(ContextPointsGenerator),
}

impl GeneratorConfig {
    pub fn build(self) -> Arc<dyn Generator> {
        match self {
            GeneratorConfig::SimpleGrid(g) => Arc::new(g),
            GeneratorConfig::OnCircle(g) => Arc::new(g),
            GeneratorConfig::DirectionFan(g) => Arc::new(g),
            GeneratorConfig::EntitiesOfClass(g) => Arc::new(g),
            GeneratorConfig::ContextPoints(g) => Arc::new(g),
        }
    }
}
