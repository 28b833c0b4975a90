use super::{GenerationContext, Generator};
use crate::context::ContextKey;
use crate::error::QueryError;
use crate::item::{ItemTypeId, ItemValue};
use serde::{Deserialize, Serialize};

/// One point per location a context resolves to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextPointsGenerator {
    pub context: ContextKey,
}

impl Generator for ContextPointsGenerator {
    fn item_type(&self) -> ItemTypeId {
        ItemTypeId::Point
    }

    fn generate(&self, cx: &mut GenerationContext<'_>) -> Result<(), QueryError> {
        let data = cx.resolve(&self.context)?;
        cx.reserve(data.locations().len())?;
        for location in data.locations() {
            cx.add(ItemValue::Point(*location))?;
        }
        Ok(())
    }

    fn contexts(&self) -> Vec<&ContextKey> {
        vec![&self.context]
    }

    fn describe_title(&self) -> String {
        format!("Points of {}", self.context)
    }
}
