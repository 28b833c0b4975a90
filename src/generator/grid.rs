//! Square lattice of points around a context.

use super::{GenerationContext, Generator};
use crate::context::ContextKey;
use crate::error::QueryError;
use crate::item::{ItemTypeId, ItemValue};
use crate::params::{FloatParam, NamedValue, Param};
use crate::types::Vector;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleGridGenerator {
    /// Half the side length of the square.
    #[serde(default = "default_grid_half_size")]
    pub grid_half_size: FloatParam,
    #[serde(default = "default_space_between")]
    pub space_between: FloatParam,
    #[serde(default)]
    pub generate_around: ContextKey,
    /// Project each point onto the navigable surface and drop the ones that miss.
    #[serde(default)]
    pub project: bool,
}

fn default_grid_half_size() -> FloatParam {
    Param::Value(500.0)
}

fn default_space_between() -> FloatParam {
    Param::Value(100.0)
}

impl Default for SimpleGridGenerator {
    fn default() -> Self {
        Self {
            grid_half_size: default_grid_half_size(),
            space_between: default_space_between(),
            generate_around: ContextKey::default(),
            project: false,
        }
    }
}

impl SimpleGridGenerator {
    /// Points per axis for the given extents.
    pub fn points_per_axis(half_size: f32, space_between: f32) -> usize {
        ((half_size * 2.0 / space_between) + 1.0) as usize
    }
}

impl Generator for SimpleGridGenerator {
    fn item_type(&self) -> ItemTypeId {
        ItemTypeId::Point
    }

    fn generate(&self, cx: &mut GenerationContext<'_>) -> Result<(), QueryError> {
        let half_size = cx.param(&self.grid_half_size);
        let space = cx.param(&self.space_between);
        if !(space > 0.0) || !(half_size >= 0.0) {
            warn!(half_size, space, "Grid generator has degenerate extents, no items");
            return Ok(());
        }

        let centers = cx.resolve(&self.generate_around)?;
        let per_axis = Self::points_per_axis(half_size, space);
        let half_count = (per_axis / 2) as f32;
        cx.reserve(
            per_axis
                .saturating_mul(per_axis)
                .saturating_mul(centers.locations().len()),
        )?;

        let navigation = cx.world().navigation.clone();
        for center in centers.locations() {
            for ix in 0..per_axis {
                for iy in 0..per_axis {
                    let offset = Vector::new(
                        space * (ix as f32 - half_count),
                        space * (iy as f32 - half_count),
                        0.0,
                    );
                    let point = *center + offset;
                    let point = if self.project {
                        match navigation.project_to_surface(point) {
                            Some(projected) => projected,
                            None => continue,
                        }
                    } else {
                        point
                    };
                    cx.add(ItemValue::Point(point))?;
                }
            }
        }
        Ok(())
    }

    fn contexts(&self) -> Vec<&ContextKey> {
        vec![&self.generate_around]
    }

    fn collect_params(&self, out: &mut Vec<NamedValue>) {
        self.grid_half_size.collect(out);
        self.space_between.collect(out);
    }

    fn describe_title(&self) -> String {
        format!("SimpleGrid around {}", self.generate_around)
    }

    fn describe_details(&self) -> String {
        format!(
            "half size {}, spacing {}{}",
            self.grid_half_size,
            self.space_between,
            if self.project { ", projected" } else { "" }
        )
    }
}
