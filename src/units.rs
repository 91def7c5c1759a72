//! Unit conversion at the service boundary.
//!
//! Everything inside the crate works in centimeters and kilograms; requests
//! and responses may use other units.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::Vec3;

/// Supported length units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    #[default]
    Cm,
    M,
    In,
    Ft,
}

impl LengthUnit {
    /// Centimeters per unit.
    pub const fn factor_to_cm(self) -> f64 {
        match self {
            LengthUnit::Cm => 1.0,
            LengthUnit::M => 100.0,
            LengthUnit::In => 2.54,
            LengthUnit::Ft => 30.48,
        }
    }

    pub fn to_cm(self, value: f64) -> f64 {
        value * self.factor_to_cm()
    }

    pub fn from_cm(self, value_cm: f64) -> f64 {
        value_cm / self.factor_to_cm()
    }

    pub fn vec_to_cm(self, value: Vec3) -> Vec3 {
        value.scaled(self.factor_to_cm())
    }

    pub fn vec_from_cm(self, value_cm: Vec3) -> Vec3 {
        Vec3::new(
            self.from_cm(value_cm.x),
            self.from_cm(value_cm.y),
            self.from_cm(value_cm.z),
        )
    }

    /// Converts a volume given in cm³ into this unit cubed.
    pub fn volume_from_cm3(self, volume_cm3: f64) -> f64 {
        volume_cm3 / self.factor_to_cm().powi(3)
    }
}

/// Supported weight units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    #[default]
    Kg,
    G,
    Lb,
    Oz,
}

impl WeightUnit {
    /// Kilograms per unit.
    pub const fn factor_to_kg(self) -> f64 {
        match self {
            WeightUnit::Kg => 1.0,
            WeightUnit::G => 0.001,
            WeightUnit::Lb => 0.45359237,
            WeightUnit::Oz => 0.0283495231,
        }
    }

    pub fn to_kg(self, value: f64) -> f64 {
        value * self.factor_to_kg()
    }

    pub fn from_kg(self, value_kg: f64) -> f64 {
        value_kg / self.factor_to_kg()
    }
}
