//! Points on a circle and fans of directions.

use super::{GenerationContext, Generator};
use crate::context::ContextKey;
use crate::error::QueryError;
use crate::item::{ItemTypeId, ItemValue};
use crate::params::{FloatParam, IntParam, NamedValue, Param};
use crate::types::Rotator;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use tracing::warn;

/// How many points a circle gets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircleSpacing {
    Points(IntParam),
    SpaceBetween(FloatParam),
}

impl Default for CircleSpacing {
    fn default() -> Self {
        CircleSpacing::Points(Param::Value(8))
    }
}

/// Yaw angles for `count` samples over `arc` degrees centred on `facing_yaw`.
///
/// A full circle steps `360 / count` starting at the facing yaw; a partial
/// arc spans `[facing - arc/2, facing + arc/2]` inclusive.
pub(crate) fn arc_angles(count: usize, arc: f32, facing_yaw: f32) -> Vec<f32> {
    if count == 0 {
        return Vec::new();
    }
    if arc >= 360.0 {
        let step = 360.0 / count as f32;
        return (0..count).map(|i| facing_yaw + step * i as f32).collect();
    }
    if count == 1 {
        return vec![facing_yaw];
    }
    let start = facing_yaw - arc / 2.0;
    let step = arc / (count - 1) as f32;
    (0..count).map(|i| start + step * i as f32).collect()
}

fn default_circle_radius() -> FloatParam {
    Param::Value(1000.0)
}

fn default_arc_angle() -> FloatParam {
    Param::Value(360.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnCircleGenerator {
    #[serde(default = "default_circle_radius")]
    pub circle_radius: FloatParam,
    #[serde(default)]
    pub spacing: CircleSpacing,
    #[serde(default = "default_arc_angle")]
    pub arc_angle: FloatParam,
    /// Context whose rotation the arc is centred on.
    #[serde(default)]
    pub arc_direction: Option<ContextKey>,
    #[serde(default)]
    pub circle_center: ContextKey,
    /// Pull each point in to the first obstruction between center and point.
    #[serde(default)]
    pub trace_obstructions: bool,
    #[serde(default)]
    pub project: bool,
}

impl Default for OnCircleGenerator {
    fn default() -> Self {
        Self {
            circle_radius: default_circle_radius(),
            spacing: CircleSpacing::default(),
            arc_angle: default_arc_angle(),
            arc_direction: None,
            circle_center: ContextKey::default(),
            trace_obstructions: false,
            project: false,
        }
    }
}

impl OnCircleGenerator {
    fn point_count(&self, cx: &GenerationContext<'_>, radius: f32, arc: f32) -> usize {
        match &self.spacing {
            CircleSpacing::Points(points) => cx.param(points).max(0) as usize,
            CircleSpacing::SpaceBetween(space) => {
                let space = cx.param(space);
                if !(space > 0.0) {
                    return 0;
                }
                let arc_length = 2.0 * PI * radius * arc.min(360.0) / 360.0;
                ((arc_length / space) as usize).max(1)
            }
        }
    }
}

impl Generator for OnCircleGenerator {
    fn item_type(&self) -> ItemTypeId {
        ItemTypeId::Point
    }

    fn generate(&self, cx: &mut GenerationContext<'_>) -> Result<(), QueryError> {
        let radius = cx.param(&self.circle_radius);
        let arc = cx.param(&self.arc_angle);
        if !(radius >= 0.0) || !(arc > 0.0) {
            warn!(radius, arc, "Circle generator has degenerate extents, no items");
            return Ok(());
        }
        let count = self.point_count(cx, radius, arc);

        let facing_yaw = match &self.arc_direction {
            Some(key) => cx
                .resolve(key)?
                .rotations()
                .first()
                .map(|r| r.yaw)
                .unwrap_or(0.0),
            None => 0.0,
        };
        let angles = arc_angles(count, arc, facing_yaw);
        let centers = cx.resolve(&self.circle_center)?;
        cx.reserve(angles.len().saturating_mul(centers.locations().len()))?;

        let navigation = cx.world().navigation.clone();
        for center in centers.locations() {
            for yaw in &angles {
                let mut point = *center + Rotator::from_yaw(*yaw).direction() * radius;
                if self.trace_obstructions {
                    if let Some(hit) = navigation.trace_obstruction(*center, point) {
                        point = hit;
                    }
                }
                if self.project {
                    match navigation.project_to_surface(point) {
                        Some(projected) => point = projected,
                        None => continue,
                    }
                }
                cx.add(ItemValue::Point(point))?;
            }
        }
        Ok(())
    }

    fn contexts(&self) -> Vec<&ContextKey> {
        let mut keys = vec![&self.circle_center];
        keys.extend(self.arc_direction.as_ref());
        keys
    }

    fn collect_params(&self, out: &mut Vec<NamedValue>) {
        self.circle_radius.collect(out);
        self.arc_angle.collect(out);
        match &self.spacing {
            CircleSpacing::Points(p) => p.collect(out),
            CircleSpacing::SpaceBetween(s) => s.collect(out),
        }
    }

    fn describe_title(&self) -> String {
        format!("OnCircle around {}", self.circle_center)
    }

    fn describe_details(&self) -> String {
        format!("radius {}, arc {}", self.circle_radius, self.arc_angle)
    }
}

fn default_direction_count() -> IntParam {
    Param::Value(8)
}

/// Evenly spread horizontal directions, optionally centred on a context's facing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionFanGenerator {
    #[serde(default = "default_direction_count")]
    pub directions: IntParam,
    #[serde(default = "default_arc_angle")]
    pub arc_angle: FloatParam,
    #[serde(default)]
    pub facing: Option<ContextKey>,
}

impl Default for DirectionFanGenerator {
    fn default() -> Self {
        Self {
            directions: default_direction_count(),
            arc_angle: default_arc_angle(),
            facing: None,
        }
    }
}

impl Generator for DirectionFanGenerator {
    fn item_type(&self) -> ItemTypeId {
        ItemTypeId::Direction
    }

    fn generate(&self, cx: &mut GenerationContext<'_>) -> Result<(), QueryError> {
        let count = cx.param(&self.directions).max(0) as usize;
        let arc = cx.param(&self.arc_angle);
        if !(arc > 0.0) {
            return Ok(());
        }
        let facing_yaw = match &self.facing {
            Some(key) => cx
                .resolve(key)?
                .rotations()
                .first()
                .map(|r| r.yaw)
                .unwrap_or(0.0),
            None => 0.0,
        };
        let angles = arc_angles(count, arc, facing_yaw);
        cx.reserve(angles.len())?;
        for yaw in angles {
            cx.add(ItemValue::Direction(Rotator::from_yaw(yaw).direction()))?;
        }
        Ok(())
    }

    fn contexts(&self) -> Vec<&ContextKey> {
        self.facing.iter().collect()
    }

    fn collect_params(&self, out: &mut Vec<NamedValue>) {
        self.directions.collect(out);
        self.arc_angle.collect(out);
    }

    fn describe_title(&self) -> String {
        "DirectionFan".to_string()
    }

    fn describe_details(&self) -> String {
        format!("{} directions over {}", self.directions, self.arc_angle)
    }
}
