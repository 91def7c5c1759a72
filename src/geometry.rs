//! Geometric helpers for 3D collision detection and layout checks.
//!
//! Checks whether placed items overlap each other, stay inside the container
//! and which items lie underneath a candidate position.

use crate::model::{Container, PlacedItem};
use crate::types::BoundingBox;

/// Checks whether two placed items overlap in space.
///
/// Uses Axis-Aligned Bounding Box (AABB) collision detection.
/// Two items do NOT overlap if they are separated on at least one axis.
pub fn intersects(a: &PlacedItem, b: &PlacedItem) -> bool {
    a.bounding_box().intersects(&b.bounding_box())
}

/// Checks whether a placed item lies completely inside the container.
pub fn is_within_container(placed: &PlacedItem, container: &Container, tolerance: f64) -> bool {
    container
        .bounds()
        .contains_box(&placed.bounding_box(), tolerance)
}

/// Checks whether `lower` lies underneath the box `upper`.
///
/// "Underneath" means the footprints overlap with a positive area and the top
/// of `lower` is not above the bottom of `upper`. Contact is not required.
pub fn lies_beneath(lower: &BoundingBox, upper: &BoundingBox, tolerance: f64) -> bool {
    lower.top_z() <= upper.min.z + tolerance && lower.overlap_area_xy(upper) > tolerance
}

/// A broken layout invariant, reported by [`find_violation`].
#[derive(Clone, Debug, PartialEq)]
pub enum LayoutViolation {
    /// The item with this id sticks out of the container.
    OutOfBounds(String),
    /// The two items with these ids overlap.
    Overlap(String, String),
}

/// Searches a layout for the first containment or overlap violation.
///
/// Returns `None` if every item lies inside the container and no two items
/// overlap.
pub fn find_violation(
    container: &Container,
    placed: &[PlacedItem],
    tolerance: f64,
) -> Option<LayoutViolation> {
    if let Some(outside) = placed
        .iter()
        .find(|p| !is_within_container(p, container, tolerance))
    {
        return Some(LayoutViolation::OutOfBounds(outside.item.id.clone()));
    }

    for (idx, a) in placed.iter().enumerate() {
        for b in &placed[idx + 1..] {
            if intersects(a, b) {
                return Some(LayoutViolation::Overlap(
                    a.item.id.clone(),
                    b.item.id.clone(),
                ));
            }
        }
    }
    None
}
