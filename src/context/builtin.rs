//! Built-in contexts.

use super::{ContextData, ContextView, QueryContext};
use crate::error::QueryError;
use crate::item::ItemTypeId;
use crate::types::{SpatialDatum, Vector};

/// The entity or transform the query runs for.
pub struct QuerierContext;

impl QueryContext for QuerierContext {
    fn provide(&self, view: &ContextView<'_>) -> Result<ContextData, QueryError> {
        let transform = view
            .querier
            .transform(view.world)
            .ok_or_else(|| QueryError::ContextUnavailable("querier no longer exists".into()))?;
        let values = match view.querier.entity() {
            Some(handle) => vec![SpatialDatum::Entity { handle, transform }],
            None => vec![
                SpatialDatum::Location(transform.location),
                SpatialDatum::Rotation(transform.rotation),
            ],
        };
        Ok(ContextData::new(values))
    }
}

/// The item currently under test.
pub struct ItemContext;

impl QueryContext for ItemContext {
    fn provide(&self, view: &ContextView<'_>) -> Result<ContextData, QueryError> {
        let item = view
            .item
            .ok_or_else(|| QueryError::ContextUnavailable("no item under test".into()))?;
        let values = match item.entity() {
            Some(handle) => vec![SpatialDatum::Entity {
                handle,
                transform: crate::types::Transform::new(item.location(), item.rotation()),
            }],
            None => vec![
                SpatialDatum::Location(item.location()),
                SpatialDatum::Rotation(item.rotation()),
            ],
        };
        Ok(ContextData::new(values))
    }

    fn is_per_item(&self, _item_type: ItemTypeId) -> bool {
        true
    }
}

/// A fixed set of locations, e.g. squad positions supplied by the host.
pub struct FixedPointsContext {
    points: Vec<Vector>,
}

impl FixedPointsContext {
    pub fn new(points: Vec<Vector>) -> Self {
        Self { points }
    }
}

impl QueryContext for FixedPointsContext {
    fn provide(&self, _view: &ContextView<'_>) -> Result<ContextData, QueryError> {
        Ok(ContextData::from_locations(self.points.iter().copied()))
    }
}

/// Every entity of a class within a radius of the querier.
pub struct EntitiesOfClassContext {
    class: String,
    radius: f32,
}

impl EntitiesOfClassContext {
    pub fn new(class: impl Into<String>, radius: f32) -> Self {
        Self {
            class: class.into(),
            radius,
        }
    }
}

impl QueryContext for EntitiesOfClassContext {
    fn provide(&self, view: &ContextView<'_>) -> Result<ContextData, QueryError> {
        let origin = view
            .querier
            .transform(view.world)
            .ok_or_else(|| QueryError::ContextUnavailable("querier no longer exists".into()))?;
        let entities = view.world.entities.as_ref();
        let values = entities
            .find_entities(&self.class, origin.location, self.radius)
            .into_iter()
            .filter_map(|handle| {
                entities
                    .transform(handle)
                    .map(|transform| SpatialDatum::Entity { handle, transform })
            })
            .collect();
        Ok(ContextData::new(values))
    }
}
