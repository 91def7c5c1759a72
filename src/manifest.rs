//! Item intake and item-list import/export.
//!
//! `ItemDraft` is what a client submits (with a quantity); `Manifest` is the
//! JSON document used to save and restore an item list together with the
//! last fitting outcome.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::model::Item;
use crate::planner::PackingResult;
use crate::types::Vec3;

/// Item as submitted by a client, possibly standing for several copies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ItemDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

impl ItemDraft {
    pub fn new(length: f64, width: f64, height: f64) -> Self {
        Self {
            id: None,
            name: None,
            length,
            width,
            height,
            weight: None,
            quantity: 1,
        }
    }
}

/// Expands drafts into individual items.
///
/// A quantity below 1 counts as 1. With more than one copy the names get a
/// ` #n` suffix. Ids are `{base}-{n}` with `base` = the draft id or `item-{k}`.
/// Drafts sharing a base continue its numbering, so every id is unique.
pub fn expand_drafts(drafts: &[ItemDraft]) -> Vec<Item> {
    let mut items = Vec::new();
    let mut issued: HashMap<String, u32> = HashMap::new();

    for (idx, draft) in drafts.iter().enumerate() {
        let k = idx + 1;
        let quantity = draft.quantity.max(1);
        let base_id = draft.id.clone().unwrap_or_else(|| format!("item-{k}"));
        let counter = issued.entry(base_id.clone()).or_insert(0);
        let base_name = draft
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("Item {k}"));

        for n in 1..=quantity {
            *counter += 1;
            let name = if quantity > 1 {
                format!("{base_name} #{n}")
            } else {
                base_name.clone()
            };
            let mut item = Item::new(
                format!("{base_id}-{counter}"),
                name,
                Vec3::new(draft.length, draft.width, draft.height),
            );
            item.weight = draft.weight;
            items.push(item);
        }
    }
    items
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Could not access manifest file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid manifest JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Saved item list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub items: Vec<Item>,
    #[serde(default)]
    pub fitted_items: Vec<Item>,
    /// Unix timestamp (seconds) of the export
    #[serde(default)]
    pub exported_at: u64,
}

impl Manifest {
    /// Creates a manifest for the given items, stamped with the current time.
    pub fn new(items: Vec<Item>) -> Self {
        let exported_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        Self {
            items,
            fitted_items: Vec::new(),
            exported_at,
        }
    }

    /// Creates a manifest whose items carry the outcome of `result`.
    pub fn from_result(mut items: Vec<Item>, result: &PackingResult) -> Self {
        result.apply_to(&mut items);
        let mut manifest = Self::new(items);
        manifest.fitted_items = result.fitted.clone();
        manifest
    }

    pub fn export_json(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn import_json(raw: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Writes the manifest as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ManifestError> {
        fs::write(path, self.export_json()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let raw = fs::read_to_string(path)?;
        Self::import_json(&raw)
    }
}
