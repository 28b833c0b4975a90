//! In-memory scene: flat navigation areas, box obstacles, and named entities.
//!
//! Loaded from TOML:
//!
//! ```toml
//! [[nav_areas]]
//! min = [-1000.0, -1000.0]
//! max = [1000.0, 1000.0]
//! height = 0.0
//!
//! [[obstacles]]
//! min = [100.0, -50.0, 0.0]
//! max = [150.0, 50.0, 200.0]
//!
//! [[entities]]
//! name = "player"
//! class = "Pawn"
//! location = [0.0, 0.0, 0.0]
//!
//! [points]
//! squad = [[0.0, 100.0, 0.0], [0.0, -100.0, 0.0]]
//! ```

use super::{EntityDirectory, NavigationProvider};
use crate::error::ApiError;
use crate::types::{EntityHandle, Rotator, Transform, Vector};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Axis-aligned walkable rectangle at a fixed height.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavArea {
    pub min: [f32; 2],
    pub max: [f32; 2],
    #[serde(default)]
    pub height: f32,
    /// Areas sharing a region id are mutually reachable.
    #[serde(default)]
    pub region: u32,
    #[serde(default = "default_cost_multiplier")]
    pub cost_multiplier: f32,
}

fn default_cost_multiplier() -> f32 {
    1.0
}

impl NavArea {
    fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.min[0] && x <= self.max[0] && y >= self.min[1] && y <= self.max[1]
    }
}

/// Axis-aligned blocking box.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obstacle {
    pub min: Vector,
    pub max: Vector,
}

impl Obstacle {
    /// Entry parameter along `from -> to` in `[0, 1]`, slab method.
    fn intersect(&self, from: Vector, to: Vector) -> Option<f32> {
        let dir = to - from;
        let axes = [
            (from.x, dir.x, self.min.x, self.max.x),
            (from.y, dir.y, self.min.y, self.max.y),
            (from.z, dir.z, self.min.z, self.max.z),
        ];
        let mut t_min = 0.0f32;
        let mut t_max = 1.0f32;
        for (origin, delta, lo, hi) in axes {
            if delta.abs() < 1e-8 {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / delta;
            let mut t1 = (lo - origin) * inv;
            let mut t2 = (hi - origin) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneEntity {
    pub name: String,
    pub class: String,
    pub location: Vector,
    #[serde(default)]
    pub rotation: Rotator,
}

/// Serialized scene file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneDescription {
    #[serde(default)]
    pub nav_areas: Vec<NavArea>,
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
    #[serde(default)]
    pub entities: Vec<SceneEntity>,
    /// Named point sets exposed as fixed-location contexts.
    #[serde(default)]
    pub points: HashMap<String, Vec<Vector>>,
}

/// Live scene. Entities can be spawned, moved, and despawned while queries run.
pub struct Scene {
    nav_areas: Vec<NavArea>,
    obstacles: Vec<Obstacle>,
    entities: RwLock<BTreeMap<EntityHandle, SceneEntity>>,
    points: HashMap<String, Vec<Vector>>,
    next_handle: AtomicU64,
}

impl Scene {
    pub fn from_description(desc: SceneDescription) -> Self {
        let scene = Self {
            nav_areas: desc.nav_areas,
            obstacles: desc.obstacles,
            entities: RwLock::new(BTreeMap::new()),
            points: desc.points,
            next_handle: AtomicU64::new(1),
        };
        for entity in desc.entities {
            scene.spawn(entity);
        }
        scene
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ApiError> {
        let desc: SceneDescription =
            toml::from_str(text).map_err(|e| ApiError::SceneParse(e.to_string()))?;
        Ok(Self::from_description(desc))
    }

    pub fn load(path: &Path) -> Result<Self, ApiError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn spawn(&self, entity: SceneEntity) -> EntityHandle {
        let handle = EntityHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.entities.write().insert(handle, entity);
        handle
    }

    pub fn despawn(&self, handle: EntityHandle) -> bool {
        self.entities.write().remove(&handle).is_some()
    }

    pub fn move_entity(&self, handle: EntityHandle, location: Vector) -> bool {
        match self.entities.write().get_mut(&handle) {
            Some(entity) => {
                entity.location = location;
                true
            }
            None => false,
        }
    }

    /// First entity with `name`, in spawn order.
    pub fn entity_by_name(&self, name: &str) -> Option<EntityHandle> {
        self.entities
            .read()
            .iter()
            .find(|(_, e)| e.name == name)
            .map(|(h, _)| *h)
    }

    pub fn points(&self, name: &str) -> Option<&[Vector]> {
        self.points.get(name).map(Vec::as_slice)
    }

    pub fn point_sets(&self) -> impl Iterator<Item = (&String, &Vec<Vector>)> {
        self.points.iter()
    }

    fn area_at(&self, point: Vector) -> Option<&NavArea> {
        self.nav_areas.iter().find(|a| a.contains(point.x, point.y))
    }
}

impl NavigationProvider for Scene {
    fn project_to_surface(&self, point: Vector) -> Option<Vector> {
        if self.nav_areas.is_empty() {
            return Some(point);
        }
        self.area_at(point).map(|area| point.with_z(area.height))
    }

    fn trace_obstruction(&self, from: Vector, to: Vector) -> Option<Vector> {
        self.obstacles
            .iter()
            .filter_map(|o| o.intersect(from, to))
            .min_by(|a, b| a.total_cmp(b))
            .map(|t| from + (to - from) * t)
    }

    fn path_exists(&self, from: Vector, to: Vector) -> bool {
        if self.nav_areas.is_empty() {
            return true;
        }
        match (self.area_at(from), self.area_at(to)) {
            (Some(a), Some(b)) => a.region == b.region,
            _ => false,
        }
    }

    fn path_cost(&self, from: Vector, to: Vector) -> Option<f32> {
        let length = self.path_length(from, to)?;
        let multiplier = self.area_at(from).map(|a| a.cost_multiplier).unwrap_or(1.0);
        Some(length * multiplier)
    }

    fn path_length(&self, from: Vector, to: Vector) -> Option<f32> {
        if !self.path_exists(from, to) {
            return None;
        }
        let start = self.project_to_surface(from)?;
        let end = self.project_to_surface(to)?;
        Some(start.distance(end))
    }
}

impl EntityDirectory for Scene {
    fn find_entities(&self, class_filter: &str, center: Vector, radius: f32) -> Vec<EntityHandle> {
        let radius_sq = radius * radius;
        self.entities
            .read()
            .iter()
            .filter(|(_, e)| class_filter.is_empty() || e.class == class_filter)
            .filter(|(_, e)| (e.location - center).size_squared() <= radius_sq)
            .map(|(h, _)| *h)
            .collect()
    }

    fn transform(&self, handle: EntityHandle) -> Option<Transform> {
        self.entities
            .read()
            .get(&handle)
            .map(|e| Transform::new(e.location, e.rotation))
    }
}
