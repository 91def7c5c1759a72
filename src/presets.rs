//! Common cargo spaces, in centimeters.

use crate::error::ValidationError;
use crate::model::Container;

/// A named container preset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContainerPreset {
    pub key: &'static str,
    pub name: &'static str,
    pub container: Container,
}

pub const PRESETS: [ContainerPreset; 3] = [
    ContainerPreset {
        key: "53-truck",
        name: "53' Truck",
        container: Container {
            length: 1600.0,
            width: 256.0,
            height: 279.0,
        },
    },
    ContainerPreset {
        key: "48-truck",
        name: "48' Truck",
        container: Container {
            length: 1455.0,
            width: 256.0,
            height: 279.0,
        },
    },
    ContainerPreset {
        key: "sprinter",
        name: "Sprinter Van",
        container: Container {
            length: 360.0,
            width: 170.0,
            height: 180.0,
        },
    },
];

/// Looks up a preset by key (case-insensitive).
pub fn find_preset(key: &str) -> Result<&'static ContainerPreset, ValidationError> {
    let wanted = key.trim();
    PRESETS
        .iter()
        .find(|preset| preset.key.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| ValidationError::UnknownPreset(wanted.to_string()))
}
