//! World collaborators
//!
//! The query engine never implements physics or navigation itself. Generators
//! and tests call out through these traits; hosts plug in their own engine.
//! [`scene::Scene`] is a small in-memory implementation used by the CLI and
//! the test suite.

pub mod scene;

use crate::types::{EntityHandle, Transform, Vector};
use std::sync::Arc;

/// Navigation and collision queries.
///
/// Implementations must be callable from worker threads; tests fan batched
/// lookups out to a thread pool and must tolerate results being discarded
/// when a query is cancelled mid-flight.
pub trait NavigationProvider: Send + Sync {
    /// Nearest navigable point to `point`, if any.
    fn project_to_surface(&self, point: Vector) -> Option<Vector>;

    /// First blocking hit along the segment `from -> to`, if any.
    fn trace_obstruction(&self, from: Vector, to: Vector) -> Option<Vector>;

    fn path_exists(&self, from: Vector, to: Vector) -> bool;

    fn path_cost(&self, from: Vector, to: Vector) -> Option<f32>;

    fn path_length(&self, from: Vector, to: Vector) -> Option<f32>;
}

/// Lookup of world entities.
pub trait EntityDirectory: Send + Sync {
    /// Entities whose class matches `class_filter` within `radius` of `center`.
    fn find_entities(&self, class_filter: &str, center: Vector, radius: f32) -> Vec<EntityHandle>;

    /// Current transform of `handle`; `None` once the entity is gone.
    fn transform(&self, handle: EntityHandle) -> Option<Transform>;

    fn exists(&self, handle: EntityHandle) -> bool {
        self.transform(handle).is_some()
    }
}

/// Collaborator bundle handed to a query manager.
#[derive(Clone)]
pub struct WorldServices {
    pub navigation: Arc<dyn NavigationProvider>,
    pub entities: Arc<dyn EntityDirectory>,
}

impl WorldServices {
    pub fn new(
        navigation: Arc<dyn NavigationProvider>,
        entities: Arc<dyn EntityDirectory>,
    ) -> Self {
        Self {
            navigation,
            entities,
        }
    }

    /// Both roles served by one object, e.g. a [`scene::Scene`].
    pub fn from_shared<W>(world: Arc<W>) -> Self
    where
        W: NavigationProvider + EntityDirectory + 'static,
    {
        Self {
            navigation: world.clone(),
            entities: world,
        }
    }
}

/// Navigation that treats all space as open and flat.
pub struct OpenWorld;

impl NavigationProvider for OpenWorld {
    fn project_to_surface(&self, point: Vector) -> Option<Vector> {
        Some(point)
    }

    fn trace_obstruction(&self, _from: Vector, _to: Vector) -> Option<Vector> {
        None
    }

    fn path_exists(&self, _from: Vector, _to: Vector) -> bool {
        true
    }

    fn path_cost(&self, from: Vector, to: Vector) -> Option<f32> {
        Some(from.distance(to))
    }

    fn path_length(&self, from: Vector, to: Vector) -> Option<f32> {
        Some(from.distance(to))
    }
}

impl EntityDirectory for OpenWorld {
    fn find_entities(&self, _class_filter: &str, _center: Vector, _radius: f32) -> Vec<EntityHandle> {
        Vec::new()
    }

    fn transform(&self, _handle: EntityHandle) -> Option<Transform> {
        None
    }
}

impl Default for WorldServices {
    fn default() -> Self {
        Self::from_shared(Arc::new(OpenWorld))
    }
}
