//! Context Resolver
//!
//! A context maps a named spatial reference ("Querier", "Item", a squad, the
//! enemies nearby) to concrete locations, rotations, or entities. Contexts are
//! stateless and shared; what they resolve to is cached inside the query
//! instance, keyed by context name, for the lifetime of that instance.
//! Per-item contexts depend on the item under test and are never cached.

mod builtin;

pub use builtin::{EntitiesOfClassContext, FixedPointsContext, ItemContext, QuerierContext};

use crate::error::QueryError;
use crate::item::{ItemTypeId, ItemView};
use crate::params::NamedValues;
use crate::types::{EntityHandle, Rotator, SpatialDatum, Transform, Vector};
use crate::world::WorldServices;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Name of a context as written in templates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextKey(pub String);

impl ContextKey {
    pub const QUERIER: &'static str = "Querier";
    pub const ITEM: &'static str = "Item";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn querier() -> Self {
        Self::new(Self::QUERIER)
    }

    pub fn item() -> Self {
        Self::new(Self::ITEM)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ContextKey {
    fn default() -> Self {
        Self::querier()
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContextKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Who a query runs on behalf of.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Querier {
    /// A live entity; the query is abandoned once it disappears.
    Entity(EntityHandle),
    /// A fixed transform with no owning entity.
    Static(Transform),
}

impl Querier {
    pub fn entity(&self) -> Option<EntityHandle> {
        match self {
            Querier::Entity(handle) => Some(*handle),
            Querier::Static(_) => None,
        }
    }

    pub fn transform(&self, world: &WorldServices) -> Option<Transform> {
        match self {
            Querier::Entity(handle) => world.entities.transform(*handle),
            Querier::Static(transform) => Some(*transform),
        }
    }

    pub fn is_alive(&self, world: &WorldServices) -> bool {
        match self {
            Querier::Entity(handle) => world.entities.exists(*handle),
            Querier::Static(_) => true,
        }
    }
}

/// Resolved values of one context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextData {
    values: Vec<SpatialDatum>,
    locations: Vec<Vector>,
    rotations: Vec<Rotator>,
}

impl ContextData {
    pub fn new(values: Vec<SpatialDatum>) -> Self {
        let locations = values.iter().filter_map(SpatialDatum::location).collect();
        let rotations = values.iter().filter_map(SpatialDatum::rotation).collect();
        Self {
            values,
            locations,
            rotations,
        }
    }

    pub fn from_locations(locations: impl IntoIterator<Item = Vector>) -> Self {
        Self::new(locations.into_iter().map(SpatialDatum::Location).collect())
    }

    pub fn values(&self) -> &[SpatialDatum] {
        &self.values
    }

    pub fn locations(&self) -> &[Vector] {
        &self.locations
    }

    pub fn rotations(&self) -> &[Rotator] {
        &self.rotations
    }

    pub fn entities(&self) -> Vec<EntityHandle> {
        self.values.iter().filter_map(SpatialDatum::entity).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// What a context may look at while resolving.
pub struct ContextView<'a> {
    pub world: &'a WorldServices,
    pub querier: &'a Querier,
    pub params: &'a NamedValues,
    /// The item under test, for per-item contexts.
    pub item: Option<ItemView<'a>>,
}

/// A named spatial reference.
pub trait QueryContext: Send + Sync {
    fn provide(&self, view: &ContextView<'_>) -> Result<ContextData, QueryError>;

    /// Whether the value depends on the item under test for queries over `item_type`.
    fn is_per_item(&self, _item_type: ItemTypeId) -> bool {
        false
    }
}

/// Context lookup by name. Every registry carries `Querier` and `Item`.
#[derive(Clone)]
pub struct ContextRegistry {
    contexts: HashMap<String, Arc<dyn QueryContext>>,
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            contexts: HashMap::new(),
        };
        registry.register(ContextKey::QUERIER, Arc::new(QuerierContext));
        registry.register(ContextKey::ITEM, Arc::new(ItemContext));
        registry
    }

    /// Registers or replaces the context under `name`.
    pub fn register(&mut self, name: impl Into<String>, context: Arc<dyn QueryContext>) {
        self.contexts.insert(name.into(), context);
    }

    pub fn get(&self, key: &ContextKey) -> Option<&Arc<dyn QueryContext>> {
        self.contexts.get(key.as_str())
    }

    pub fn contains(&self, key: &ContextKey) -> bool {
        self.contexts.contains_key(key.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.contexts.keys().map(String::as_str)
    }
}

/// Resolves contexts for one query instance, memoizing per-query contexts in
/// the instance-owned cache.
pub struct ContextResolver<'a> {
    pub(crate) registry: &'a ContextRegistry,
    pub(crate) world: &'a WorldServices,
    pub(crate) querier: &'a Querier,
    pub(crate) params: &'a NamedValues,
    pub(crate) item_type: ItemTypeId,
    pub(crate) cache: &'a mut HashMap<String, ContextData>,
}

impl<'a> ContextResolver<'a> {
    fn lookup(&self, key: &ContextKey) -> Result<&'a Arc<dyn QueryContext>, QueryError> {
        let registry: &'a ContextRegistry = self.registry;
        registry
            .get(key)
            .ok_or_else(|| QueryError::UnknownContext(key.to_string()))
    }

    pub fn is_per_item(&self, key: &ContextKey) -> Result<bool, QueryError> {
        Ok(self.lookup(key)?.is_per_item(self.item_type))
    }

    /// Resolves a per-query context into the cache. Per-item contexts are
    /// left for [`ContextResolver::get`]. Failures are not cached.
    pub fn prepare(&mut self, key: &ContextKey) -> Result<(), QueryError> {
        let context = self.lookup(key)?;
        if context.is_per_item(self.item_type) || self.cache.contains_key(key.as_str()) {
            return Ok(());
        }
        let view = ContextView {
            world: self.world,
            querier: self.querier,
            params: self.params,
            item: None,
        };
        let data = context.provide(&view)?;
        debug!(context = %key, values = data.values().len(), "Resolved context");
        self.cache.insert(key.0.clone(), data);
        Ok(())
    }

    /// Resolves `key` outside of any item; used by generators.
    pub fn resolve(&mut self, key: &ContextKey) -> Result<ContextData, QueryError> {
        if self.is_per_item(key)? {
            return Err(QueryError::ContextUnavailable(format!(
                "{} depends on the item under test",
                key
            )));
        }
        self.prepare(key)?;
        self.cache
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| QueryError::ContextUnavailable(key.to_string()))
    }

    /// Cached value of a prepared context, or a fresh per-item resolution.
    pub fn get(
        &self,
        key: &ContextKey,
        item: Option<ItemView<'_>>,
    ) -> Result<Cow<'_, ContextData>, QueryError> {
        let context = self.lookup(key)?;
        if context.is_per_item(self.item_type) {
            let view = ContextView {
                world: self.world,
                querier: self.querier,
                params: self.params,
                item,
            };
            return context.provide(&view).map(Cow::Owned);
        }
        self.cache
            .get(key.as_str())
            .map(Cow::Borrowed)
            .ok_or_else(|| QueryError::ContextUnavailable(format!("{} was not prepared", key)))
    }

    pub fn world(&self) -> &WorldServices {
        self.world
    }

    pub fn params(&self) -> &NamedValues {
        self.params
    }
}
