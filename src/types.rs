//! Shared geometric primitives.
//!
//! Axis convention: `x` runs along the container length, `y` along its width
//! and `z` is the vertical axis. A position is always the minimum corner of a
//! box (back-left-bottom).

use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Tolerance for floating-point comparisons of lengths.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// A point or an extent in container space.
///
/// # Examples
/// ```
/// use cargo_fitter::types::Vec3;
///
/// let corner = Vec3::new(10.0, 0.0, 0.0);
/// let pallet = Vec3::new(120.0, 80.0, 100.0);
/// assert_eq!(corner + pallet, Vec3::new(130.0, 80.0, 100.0));
/// assert_eq!(pallet.volume(), 960_000.0);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The container origin.
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// `(x, y, z)` as used by the JSON responses.
    pub const fn as_tuple(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }

    pub fn volume(&self) -> f64 {
        self.x * self.y * self.z
    }

    /// Multiplies every component by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl From<(f64, f64, f64)> for Vec3 {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self::new(x, y, z)
    }
}

/// Anything with a length, width and height.
pub trait Dimensional {
    fn dimensions(&self) -> Vec3;

    fn volume(&self) -> f64 {
        self.dimensions().volume()
    }

    /// Whether the extents fit inside `space` on every axis, without rotation.
    ///
    /// Compared without tolerance.
    fn fits_in(&self, space: &Vec3) -> bool {
        let dims = self.dimensions();
        dims.x <= space.x && dims.y <= space.y && dims.z <= space.z
    }
}

/// Anything that may carry a weight (kg).
pub trait Weighted {
    /// Weight in kg; unweighted objects report 0.
    fn weight(&self) -> f64;
}

/// Axis-aligned box spanned by its minimum and maximum corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

/// Length of the shared part of the intervals `[a0, a1]` and `[b0, b1]`.
fn shared_length(a0: f64, a1: f64, b0: f64, b1: f64) -> f64 {
    (a1.min(b1) - a0.max(b0)).max(0.0)
}

impl BoundingBox {
    pub fn from_position_and_dims(position: Vec3, dims: Vec3) -> Self {
        Self {
            min: position,
            max: position + dims,
        }
    }

    /// Whether the interiors overlap. Boxes touching on a face do not.
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
            && self.min.z < other.max.z
            && other.min.z < self.max.z
    }

    /// Area shared by the two footprints (projection onto the floor).
    pub fn overlap_area_xy(&self, other: &Self) -> f64 {
        shared_length(self.min.x, self.max.x, other.min.x, other.max.x)
            * shared_length(self.min.y, self.max.y, other.min.y, other.max.y)
    }

    /// Whether `inner` lies within this box, allowing `tolerance` on each face.
    pub fn contains_box(&self, inner: &Self, tolerance: f64) -> bool {
        let lower_ok = inner.min.x >= self.min.x - tolerance
            && inner.min.y >= self.min.y - tolerance
            && inner.min.z >= self.min.z - tolerance;
        let upper_ok = inner.max.x <= self.max.x + tolerance
            && inner.max.y <= self.max.y + tolerance
            && inner.max.z <= self.max.z + tolerance;
        lower_ok && upper_ok
    }

    pub fn top_z(&self) -> f64 {
        self.max.z
    }

    pub fn dimensions(&self) -> Vec3 {
        self.max - self.min
    }
}
