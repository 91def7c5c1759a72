//! Data models for container loading.
//!
//! This module defines the fundamental data structures:
//! - `Container`: The cargo space, immutable once validated
//! - `Item`: A cuboid to be loaded, including its output fields (`fitted`, `position`)
//! - `PlacedItem`: An item paired with its resolved position in the container
//!
//! All dimensions are in centimeters, all weights in kilograms.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{ValidationError, validate_dimension, validate_weight};
use crate::types::{BoundingBox, Dimensional, Vec3, Weighted};

/// Represents the cargo space (truck, van, ULD, ...).
///
/// # Fields
/// * `length` - Extent along the x axis
/// * `width` - Extent along the y axis
/// * `height` - Extent along the z axis (vertical)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Container {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl Container {
    /// Creates a new container with validation.
    ///
    /// # Examples
    /// ```
    /// use cargo_fitter::model::Container;
    ///
    /// assert!(Container::new(1200.0, 240.0, 200.0).is_ok());
    /// assert!(Container::new(0.0, 10.0, 10.0).is_err());
    /// ```
    pub fn new(length: f64, width: f64, height: f64) -> Result<Self, ValidationError> {
        let container = Self {
            length,
            width,
            height,
        };
        container.validate()?;
        Ok(container)
    }

    /// Checks that all three dimensions are positive and finite.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_dimension(self.length, "Container length")?;
        validate_dimension(self.width, "Container width")?;
        validate_dimension(self.height, "Container height")?;
        Ok(())
    }

    /// Calculates the total volume of the container.
    pub fn volume(&self) -> f64 {
        self.length * self.width * self.height
    }

    /// Returns the interior as bounding box anchored at the origin.
    #[inline]
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_position_and_dims(Vec3::zero(), self.dimensions())
    }
}

impl Dimensional for Container {
    fn dimensions(&self) -> Vec3 {
        Vec3::new(self.length, self.width, self.height)
    }
}

/// A cuboid to be loaded.
///
/// `fitted` and `position` are output fields; the planner resets them before
/// packing and only ever writes them on its own copies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub fitted: bool,
    #[serde(default)]
    pub position: Vec3,
}

impl Item {
    /// Creates an unweighted, not yet fitted item.
    ///
    /// No validation happens here; the planner validates at intake so that a
    /// single bad item does not fail a whole batch.
    pub fn new(id: impl Into<String>, name: impl Into<String>, dims: Vec3) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            length: dims.x,
            width: dims.y,
            height: dims.z,
            weight: None,
            fitted: false,
            position: Vec3::zero(),
        }
    }

    /// Sets the weight in kg (builder style).
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Checks dimensions (positive, finite) and weight (non-negative, finite).
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_dimension(self.length, "Length")?;
        validate_dimension(self.width, "Width")?;
        validate_dimension(self.height, "Height")?;
        validate_weight(self.weight)?;
        Ok(())
    }

    /// Clears the output fields.
    pub fn reset(&mut self) {
        self.fitted = false;
        self.position = Vec3::zero();
    }
}

impl Dimensional for Item {
    fn dimensions(&self) -> Vec3 {
        Vec3::new(self.length, self.width, self.height)
    }
}

impl Weighted for Item {
    fn weight(&self) -> f64 {
        self.weight.unwrap_or(0.0)
    }
}

/// An item together with its position in the container.
///
/// # Fields
/// * `item` - The loaded item (with `fitted` set)
/// * `position` - Minimum corner (x, y, z) inside the container
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedItem {
    pub item: Item,
    pub position: Vec3,
}

impl PlacedItem {
    /// Creates a new placed item and marks it as fitted.
    pub fn new(mut item: Item, position: Vec3) -> Self {
        item.fitted = true;
        item.position = position;
        Self { item, position }
    }

    /// Calculates the bounding box of the placed item.
    #[inline]
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_position_and_dims(self.position, self.item.dimensions())
    }
}

impl Dimensional for PlacedItem {
    fn dimensions(&self) -> Vec3 {
        self.item.dimensions()
    }
}

impl Weighted for PlacedItem {
    fn weight(&self) -> f64 {
        self.item.weight()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_rejects_non_positive_dimensions() {
        assert!(Container::new(100.0, 100.0, 100.0).is_ok());
        assert!(Container::new(0.0, 10.0, 10.0).is_err());
        assert!(Container::new(10.0, -1.0, 10.0).is_err());
        assert!(Container::new(10.0, 10.0, f64::NAN).is_err());
    }

    #[test]
    fn container_volume_and_bounds() {
        let container = Container::new(200.0, 100.0, 50.0).unwrap();
        assert_eq!(container.volume(), 1_000_000.0);
        assert_eq!(container.bounds().max, Vec3::new(200.0, 100.0, 50.0));
    }

    #[test]
    fn item_validation() {
        let ok = Item::new("a", "A", Vec3::new(1.0, 2.0, 3.0)).with_weight(0.0);
        assert!(ok.validate().is_ok());

        let flat = Item::new("b", "B", Vec3::new(1.0, 0.0, 3.0));
        assert!(matches!(
            flat.validate(),
            Err(ValidationError::InvalidDimension { name: "Width", .. })
        ));

        let negative = Item::new("c", "C", Vec3::new(1.0, 1.0, 1.0)).with_weight(-5.0);
        assert!(matches!(
            negative.validate(),
            Err(ValidationError::InvalidWeight(_))
        ));
    }

    #[test]
    fn placed_item_marks_fitted() {
        let item = Item::new("a", "A", Vec3::new(10.0, 20.0, 30.0));
        let placed = PlacedItem::new(item, Vec3::new(5.0, 0.0, 0.0));

        assert!(placed.item.fitted);
        assert_eq!(placed.item.position, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(placed.bounding_box().max, Vec3::new(15.0, 20.0, 30.0));
    }

    #[test]
    fn item_deserializes_without_output_fields() {
        let json = r#"{"id": "p1", "name": "Pallet", "length": 120.0, "width": 100.0, "height": 140.0}"#;
        let item: Item = serde_json::from_str(json).expect("valid item JSON");
        assert_eq!(item.weight, None);
        assert!(!item.fitted);
        assert_eq!(item.position, Vec3::zero());
    }

    #[test]
    fn unweighted_items_weigh_nothing() {
        let item = Item::new("a", "A", Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(item.weight(), 0.0);
        assert_eq!(item.clone().with_weight(3.5).weight(), 3.5);
    }
}
