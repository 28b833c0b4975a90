//! Concrete item type descriptors.

use super::{ItemType, ItemTypeId, ItemValue};
use crate::error::QueryError;
use crate::types::{EntityHandle, Rotator, Vector};

fn mismatch(expected: ItemTypeId, value: &ItemValue) -> QueryError {
    QueryError::ItemTypeMismatch {
        test: "item encoding".to_string(),
        expected,
        actual: value.type_id(),
    }
}

/// Abstract parent type. Never stored.
pub struct VectorBaseItemType;

impl ItemType for VectorBaseItemType {
    fn id(&self) -> ItemTypeId {
        ItemTypeId::VectorBase
    }

    fn value_size(&self) -> usize {
        0
    }

    fn location(&self, _raw: &[u8]) -> Vector {
        Vector::ZERO
    }

    fn rotation(&self, _raw: &[u8]) -> Rotator {
        Rotator::ZERO
    }

    fn encode(&self, value: &ItemValue, _out: &mut Vec<u8>) -> Result<(), QueryError> {
        Err(mismatch(ItemTypeId::VectorBase, value))
    }

    fn describe(&self, _raw: &[u8]) -> String {
        "<abstract>".to_string()
    }
}

/// A location; 12 bytes.
pub struct PointItemType;

impl ItemType for PointItemType {
    fn id(&self) -> ItemTypeId {
        ItemTypeId::Point
    }

    fn value_size(&self) -> usize {
        12
    }

    fn location(&self, raw: &[u8]) -> Vector {
        Vector::from_le_bytes(raw)
    }

    fn rotation(&self, _raw: &[u8]) -> Rotator {
        Rotator::ZERO
    }

    fn encode(&self, value: &ItemValue, out: &mut Vec<u8>) -> Result<(), QueryError> {
        match value {
            ItemValue::Point(location) => {
                out.extend_from_slice(&location.to_le_bytes());
                Ok(())
            }
            other => Err(mismatch(ItemTypeId::Point, other)),
        }
    }

    fn describe(&self, raw: &[u8]) -> String {
        self.location(raw).to_string()
    }
}

/// A direction vector; 12 bytes. Its location is the vector itself.
pub struct DirectionItemType;

impl ItemType for DirectionItemType {
    fn id(&self) -> ItemTypeId {
        ItemTypeId::Direction
    }

    fn value_size(&self) -> usize {
        12
    }

    fn location(&self, raw: &[u8]) -> Vector {
        Vector::from_le_bytes(raw)
    }

    fn rotation(&self, raw: &[u8]) -> Rotator {
        Vector::from_le_bytes(raw).rotation()
    }

    fn encode(&self, value: &ItemValue, out: &mut Vec<u8>) -> Result<(), QueryError> {
        match value {
            ItemValue::Direction(dir) => {
                let unit = dir.safe_normal().unwrap_or(Vector::ZERO);
                out.extend_from_slice(&unit.to_le_bytes());
                Ok(())
            }
            other => Err(mismatch(ItemTypeId::Direction, other)),
        }
    }

    fn describe(&self, raw: &[u8]) -> String {
        let rot = self.rotation(raw);
        format!("dir yaw {:.1} pitch {:.1}", rot.yaw, rot.pitch)
    }
}

/// An entity handle with the transform it had when generated; 32 bytes.
pub struct EntityItemType;

impl EntityItemType {
    const HANDLE: std::ops::Range<usize> = 0..8;
    const LOCATION: std::ops::Range<usize> = 8..20;
    const ROTATION: std::ops::Range<usize> = 20..32;
}

impl ItemType for EntityItemType {
    fn id(&self) -> ItemTypeId {
        ItemTypeId::Entity
    }

    fn value_size(&self) -> usize {
        32
    }

    fn location(&self, raw: &[u8]) -> Vector {
        raw.get(Self::LOCATION)
            .map(Vector::from_le_bytes)
            .unwrap_or(Vector::ZERO)
    }

    fn rotation(&self, raw: &[u8]) -> Rotator {
        raw.get(Self::ROTATION)
            .map(Rotator::from_le_bytes)
            .unwrap_or(Rotator::ZERO)
    }

    fn entity(&self, raw: &[u8]) -> Option<EntityHandle> {
        let bytes: [u8; 8] = raw.get(Self::HANDLE)?.try_into().ok()?;
        Some(EntityHandle(u64::from_le_bytes(bytes)))
    }

    fn encode(&self, value: &ItemValue, out: &mut Vec<u8>) -> Result<(), QueryError> {
        match value {
            ItemValue::Entity { handle, transform } => {
                out.extend_from_slice(&handle.0.to_le_bytes());
                out.extend_from_slice(&transform.location.to_le_bytes());
                out.extend_from_slice(&transform.rotation.to_le_bytes());
                Ok(())
            }
            other => Err(mismatch(ItemTypeId::Entity, other)),
        }
    }

    fn describe(&self, raw: &[u8]) -> String {
        match self.entity(raw) {
            Some(handle) => format!("{} at {}", handle, self.location(raw)),
            None => "<invalid entity>".to_string(),
        }
    }
}
