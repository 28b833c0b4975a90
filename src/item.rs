//! Item Type Registry
//!
//! Items are stored as raw little-endian payloads in one contiguous arena per
//! query instance. An [`ItemType`] descriptor knows how to read a location,
//! rotation, or entity handle out of a payload. Descriptors are static and
//! looked up once per option through [`ItemTypeId::descriptor`], so the hot
//! loop never dispatches on the id itself.

mod kinds;

pub use kinds::{DirectionItemType, EntityItemType, PointItemType, VectorBaseItemType};

use crate::error::QueryError;
use crate::types::{EntityHandle, Rotator, Transform, Vector};
use serde::{Deserialize, Serialize};

/// Tag of a registered item type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemTypeId {
    /// Abstract parent of every spatial item; tests declare it to accept all of them.
    VectorBase,
    Point,
    Direction,
    Entity,
}

impl ItemTypeId {
    pub fn parent(self) -> Option<ItemTypeId> {
        match self {
            ItemTypeId::VectorBase => None,
            ItemTypeId::Point | ItemTypeId::Direction | ItemTypeId::Entity => {
                Some(ItemTypeId::VectorBase)
            }
        }
    }

    /// True when `self` is `other` or derives from it.
    pub fn is_a(self, other: ItemTypeId) -> bool {
        let mut current = Some(self);
        while let Some(id) = current {
            if id == other {
                return true;
            }
            current = id.parent();
        }
        false
    }

    pub fn is_abstract(self) -> bool {
        self == ItemTypeId::VectorBase
    }

    pub fn descriptor(self) -> &'static dyn ItemType {
        static VECTOR_BASE: VectorBaseItemType = VectorBaseItemType;
        static POINT: PointItemType = PointItemType;
        static DIRECTION: DirectionItemType = DirectionItemType;
        static ENTITY: EntityItemType = EntityItemType;
        match self {
            ItemTypeId::VectorBase => &VECTOR_BASE,
            ItemTypeId::Point => &POINT,
            ItemTypeId::Direction => &DIRECTION,
            ItemTypeId::Entity => &ENTITY,
        }
    }
}

/// Accessors over a raw item payload.
pub trait ItemType: Send + Sync {
    fn id(&self) -> ItemTypeId;

    /// Payload size in bytes; every stored item of this type has exactly this size.
    fn value_size(&self) -> usize;

    fn location(&self, raw: &[u8]) -> Vector;

    fn rotation(&self, raw: &[u8]) -> Rotator;

    fn entity(&self, _raw: &[u8]) -> Option<EntityHandle> {
        None
    }

    /// Writes the payload for `value`, which must be of this exact type.
    fn encode(&self, value: &ItemValue, out: &mut Vec<u8>) -> Result<(), QueryError>;

    fn describe(&self, raw: &[u8]) -> String;
}

/// Typed value handed to the arena by generators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemValue {
    Point(Vector),
    Direction(Vector),
    Entity {
        handle: EntityHandle,
        transform: Transform,
    },
}

impl ItemValue {
    pub fn type_id(&self) -> ItemTypeId {
        match self {
            ItemValue::Point(_) => ItemTypeId::Point,
            ItemValue::Direction(_) => ItemTypeId::Direction,
            ItemValue::Entity { .. } => ItemTypeId::Entity,
        }
    }
}

/// Per-item bookkeeping; the payload lives in the arena at `data_offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryItem {
    pub data_offset: usize,
    pub score: f32,
    pub valid: bool,
}

/// Read-only view of one stored item.
#[derive(Clone, Copy)]
pub struct ItemView<'a> {
    pub index: usize,
    pub raw: &'a [u8],
    item_type: &'static dyn ItemType,
}

impl<'a> ItemView<'a> {
    pub fn location(&self) -> Vector {
        self.item_type.location(self.raw)
    }

    pub fn rotation(&self) -> Rotator {
        self.item_type.rotation(self.raw)
    }

    pub fn entity(&self) -> Option<EntityHandle> {
        self.item_type.entity(self.raw)
    }

    pub fn type_id(&self) -> ItemTypeId {
        self.item_type.id()
    }

    pub fn describe(&self) -> String {
        self.item_type.describe(self.raw)
    }
}

impl std::fmt::Debug for ItemView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemView")
            .field("index", &self.index)
            .field("type", &self.item_type.id())
            .field("raw", &self.raw)
            .finish()
    }
}

/// Contiguous item arena for one option of one query instance.
pub struct ItemStore {
    item_type: &'static dyn ItemType,
    raw: Vec<u8>,
    items: Vec<QueryItem>,
}

impl std::fmt::Debug for ItemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemStore")
            .field("type", &self.item_type.id())
            .field("raw", &self.raw)
            .field("items", &self.items)
            .finish()
    }
}

impl ItemStore {
    pub fn new(item_type: ItemTypeId) -> Self {
        Self {
            item_type: item_type.descriptor(),
            raw: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn item_type(&self) -> ItemTypeId {
        self.item_type.id()
    }

    pub fn descriptor(&self) -> &'static dyn ItemType {
        self.item_type
    }

    /// Reserves room for `additional` items, reporting allocation failure.
    pub fn reserve(&mut self, additional: usize) -> Result<(), QueryError> {
        let bytes = additional.saturating_mul(self.item_type.value_size());
        self.raw
            .try_reserve(bytes)
            .map_err(|e| QueryError::AllocationFailed(e.to_string()))?;
        self.items
            .try_reserve(additional)
            .map_err(|e| QueryError::AllocationFailed(e.to_string()))
    }

    /// Appends an item. Values of any other type than the store's are rejected.
    pub fn push(&mut self, value: ItemValue) -> Result<usize, QueryError> {
        if value.type_id() != self.item_type.id() {
            return Err(QueryError::ItemTypeMismatch {
                test: "generator output".to_string(),
                expected: self.item_type.id(),
                actual: value.type_id(),
            });
        }
        self.reserve(1)?;
        let data_offset = self.raw.len();
        self.item_type.encode(&value, &mut self.raw)?;
        debug_assert_eq!(self.raw.len() - data_offset, self.item_type.value_size());
        self.items.push(QueryItem {
            data_offset,
            score: 0.0,
            valid: true,
        });
        Ok(self.items.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<ItemView<'_>> {
        let item = self.items.get(index)?;
        let size = self.item_type.value_size();
        let raw = self.raw.get(item.data_offset..item.data_offset + size)?;
        Some(ItemView {
            index,
            raw,
            item_type: self.item_type,
        })
    }

    pub fn item(&self, index: usize) -> Option<&QueryItem> {
        self.items.get(index)
    }

    pub fn is_valid(&self, index: usize) -> bool {
        self.items.get(index).map(|i| i.valid).unwrap_or(false)
    }

    pub fn invalidate(&mut self, index: usize) {
        if let Some(item) = self.items.get_mut(index) {
            item.valid = false;
            item.score = 0.0;
        }
    }

    pub fn set_score(&mut self, index: usize, score: f32) {
        if let Some(item) = self.items.get_mut(index) {
            item.score = score;
        }
    }

    pub fn items(&self) -> &[QueryItem] {
        &self.items
    }

    pub fn valid_count(&self) -> usize {
        self.items.iter().filter(|i| i.valid).count()
    }

    pub fn clear(&mut self) {
        self.raw = Vec::new();
        self.items = Vec::new();
    }
}
