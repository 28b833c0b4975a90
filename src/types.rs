//! Core value types shared across the query engine.
//!
//! Spatial math is single precision and kept deliberately small: the engine
//! only needs distances, dot products, and yaw/pitch conversions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// 3D vector in world space (x forward, y right, z up).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Vector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector {
    pub const ZERO: Vector = Vector::new(0.0, 0.0, 0.0);
    pub const UP: Vector = Vector::new(0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn size(self) -> f32 {
        self.size_squared().sqrt()
    }

    pub fn size_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Length of the projection onto the horizontal plane.
    pub fn size_2d(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn dot(self, other: Vector) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn with_z(self, z: f32) -> Self {
        Self { z, ..self }
    }

    pub fn flatten(self) -> Self {
        self.with_z(0.0)
    }

    /// Unit vector in the same direction. Degenerate input yields NaN
    /// components; callers that care use [`Vector::safe_normal`].
    pub fn normal(self) -> Self {
        let len = self.size();
        Self::new(self.x / len, self.y / len, self.z / len)
    }

    pub fn safe_normal(self) -> Option<Self> {
        let len_sq = self.size_squared();
        if len_sq <= f32::EPSILON * f32::EPSILON || !len_sq.is_finite() {
            return None;
        }
        Some(self.normal())
    }

    pub fn distance(self, other: Vector) -> f32 {
        (other - self).size()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Rotation whose forward vector points along this vector.
    pub fn rotation(self) -> Rotator {
        let yaw = self.y.atan2(self.x).to_degrees();
        let pitch = self.z.atan2(self.size_2d()).to_degrees();
        Rotator::new(pitch, yaw, 0.0)
    }

    pub(crate) fn to_le_bytes(self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[0..4].copy_from_slice(&self.x.to_le_bytes());
        out[4..8].copy_from_slice(&self.y.to_le_bytes());
        out[8..12].copy_from_slice(&self.z.to_le_bytes());
        out
    }

    /// Reads three little-endian floats; short input reads as zero.
    pub(crate) fn from_le_bytes(bytes: &[u8]) -> Self {
        let read = |at: usize| {
            bytes
                .get(at..at + 4)
                .and_then(|b| <[u8; 4]>::try_from(b).ok())
                .map(f32::from_le_bytes)
                .unwrap_or(0.0)
        };
        Self::new(read(0), read(4), read(8))
    }
}

impl From<[f32; 3]> for Vector {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Vector> for [f32; 3] {
    fn from(v: Vector) -> Self {
        [v.x, v.y, v.z]
    }
}

impl Add for Vector {
    type Output = Vector;
    fn add(self, rhs: Vector) -> Vector {
        Vector::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector {
    type Output = Vector;
    fn sub(self, rhs: Vector) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vector {
    type Output = Vector;
    fn mul(self, rhs: f32) -> Vector {
        Vector::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vector {
    type Output = Vector;
    fn neg(self) -> Vector {
        Vector::new(-self.x, -self.y, -self.z)
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

/// Euler rotation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Rotator {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl Rotator {
    pub const ZERO: Rotator = Rotator::new(0.0, 0.0, 0.0);

    pub const fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    pub fn from_yaw(yaw: f32) -> Self {
        Self::new(0.0, yaw, 0.0)
    }

    /// Unit forward vector. Roll does not affect the forward axis.
    pub fn direction(self) -> Vector {
        let (sp, cp) = self.pitch.to_radians().sin_cos();
        let (sy, cy) = self.yaw.to_radians().sin_cos();
        Vector::new(cp * cy, cp * sy, sp)
    }

    pub(crate) fn to_le_bytes(self) -> [u8; 12] {
        Vector::new(self.pitch, self.yaw, self.roll).to_le_bytes()
    }

    pub(crate) fn from_le_bytes(bytes: &[u8]) -> Self {
        let v = Vector::from_le_bytes(bytes);
        Self::new(v.x, v.y, v.z)
    }
}

impl From<[f32; 3]> for Rotator {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Rotator> for [f32; 3] {
    fn from(r: Rotator) -> Self {
        [r.pitch, r.yaw, r.roll]
    }
}

/// Location plus rotation of something in the world.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub location: Vector,
    #[serde(default)]
    pub rotation: Rotator,
}

impl Transform {
    pub fn new(location: Vector, rotation: Rotator) -> Self {
        Self { location, rotation }
    }

    pub fn at(location: Vector) -> Self {
        Self::new(location, Rotator::ZERO)
    }
}

/// Opaque handle to a world entity, issued by the entity directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityHandle(pub u64);

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Identifier of one submitted query. Unique per manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryId(pub u64);

impl QueryId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "query#{}", self.0)
    }
}

/// One value a context can yield.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SpatialDatum {
    Location(Vector),
    Rotation(Rotator),
    Entity {
        handle: EntityHandle,
        transform: Transform,
    },
}

impl SpatialDatum {
    pub fn location(&self) -> Option<Vector> {
        match self {
            SpatialDatum::Location(v) => Some(*v),
            SpatialDatum::Entity { transform, .. } => Some(transform.location),
            SpatialDatum::Rotation(_) => None,
        }
    }

    pub fn rotation(&self) -> Option<Rotator> {
        match self {
            SpatialDatum::Rotation(r) => Some(*r),
            SpatialDatum::Entity { transform, .. } => Some(transform.rotation),
            SpatialDatum::Location(_) => None,
        }
    }

    pub fn entity(&self) -> Option<EntityHandle> {
        match self {
            SpatialDatum::Entity { handle, .. } => Some(*handle),
            _ => None,
        }
    }
}
