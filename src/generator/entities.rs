use super::{GenerationContext, Generator};
use crate::context::ContextKey;
use crate::error::QueryError;
use crate::item::{ItemTypeId, ItemValue};
use crate::params::{FloatParam, NamedValue, Param};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

fn default_search_radius() -> FloatParam {
    Param::Value(500.0)
}

/// Entities of one class near each location of a context.
///
/// An empty `class` matches every entity. An entity found from several
/// search centers is generated once, at the position it was first found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitiesOfClassGenerator {
    #[serde(default)]
    pub class: String,
    #[serde(default = "default_search_radius")]
    pub search_radius: FloatParam,
    #[serde(default)]
    pub search_center: ContextKey,
}

impl Default for EntitiesOfClassGenerator {
    fn default() -> Self {
        Self {
            class: String::new(),
            search_radius: default_search_radius(),
            search_center: ContextKey::default(),
        }
    }
}

impl Generator for EntitiesOfClassGenerator {
    fn item_type(&self) -> ItemTypeId {
        ItemTypeId::Entity
    }

    fn generate(&self, cx: &mut GenerationContext<'_>) -> Result<(), QueryError> {
        let radius = cx.param(&self.search_radius);
        let centers = cx.resolve(&self.search_center)?;
        let directory = cx.world().entities.clone();

        let mut seen = HashSet::new();
        for center in centers.locations() {
            for handle in directory.find_entities(&self.class, *center, radius) {
                if !seen.insert(handle) {
                    continue;
                }
                // Entities can vanish between lookup and snapshot.
                if let Some(transform) = directory.transform(handle) {
                    cx.add(ItemValue::Entity { handle, transform })?;
                }
            }
        }
        Ok(())
    }

    fn contexts(&self) -> Vec<&ContextKey> {
        vec![&self.search_center]
    }

    fn collect_params(&self, out: &mut Vec<NamedValue>) {
        self.search_radius.collect(out);
    }

    fn describe_title(&self) -> String {
        if self.class.is_empty() {
            format!("All entities around {}", self.search_center)
        } else {
            format!("{} around {}", self.class, self.search_center)
        }
    }

    fn describe_details(&self) -> String {
        format!("radius {}", self.search_radius)
    }
}
