//! Packing planner: orders items, drives the placement engine and aggregates
//! the outcome.
//!
//! Two strategies are available:
//! - [`PackingStrategy::Volume`]: single pass, largest volume first
//! - [`PackingStrategy::WeightAware`]: a second, stacking-aware pass that keeps
//!   heavy items low and never puts an item on top of a lighter one
//!
//! Every entry point is a pure function of its inputs. Input items are never
//! modified; callers that want to keep their own collection in sync can use
//! [`PackingResult::apply_to`].

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::engine::{HeavyBelowLight, PlacementRule, SearchOutcome, Unconstrained, search};
use crate::error::{PackingError, ValidationError};
use crate::geometry::find_violation;
use crate::model::{Container, Item, PlacedItem};
use crate::types::{Dimensional, Vec3, Weighted};

/// Planning strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PackingStrategy {
    /// Descending volume, one pass.
    #[default]
    Volume,
    /// Descending volume first, then a heavy-first stacking pass.
    WeightAware,
}

impl PackingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackingStrategy::Volume => "volume",
            PackingStrategy::WeightAware => "weight_aware",
        }
    }
}

impl fmt::Display for PackingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackingStrategy {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "volume" => Ok(PackingStrategy::Volume),
            "weight_aware" | "weight-aware" | "two_pass" => Ok(PackingStrategy::WeightAware),
            other => Err(ValidationError::InvalidConfiguration(format!(
                "unknown packing strategy '{other}'"
            ))),
        }
    }
}

/// Configuration of the packing algorithm.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PackingConfig {
    /// Grid step for candidate positions (smaller = denser, but slower)
    pub grid_step: f64,
    /// General numerical tolerance
    pub general_epsilon: f64,
    /// Maximum number of candidates evaluated per item (`None` = unlimited)
    pub search_budget: Option<u64>,
    /// Strategy used by [`pack_with_strategy`] and [`pack_with_progress`]
    pub strategy: PackingStrategy,
    /// Weight from which an item counts as heavy; `None` = median item weight
    pub heavy_weight_threshold: Option<f64>,
}

impl PackingConfig {
    pub const DEFAULT_GRID_STEP: f64 = 1.0;
    pub const DEFAULT_GENERAL_EPSILON: f64 = 1e-6;

    /// Creates a builder for custom configuration.
    pub fn builder() -> PackingConfigBuilder {
        PackingConfigBuilder::default()
    }

    /// Checks the numeric parameters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.grid_step > 0.0 && self.grid_step.is_finite()) {
            return Err(ValidationError::InvalidConfiguration(format!(
                "grid step must be positive, got: {}",
                self.grid_step
            )));
        }
        if !(self.general_epsilon > 0.0 && self.general_epsilon.is_finite()) {
            return Err(ValidationError::InvalidConfiguration(format!(
                "tolerance must be positive, got: {}",
                self.general_epsilon
            )));
        }
        if self.search_budget == Some(0) {
            return Err(ValidationError::InvalidConfiguration(
                "search budget must not be 0".to_string(),
            ));
        }
        if let Some(threshold) = self.heavy_weight_threshold {
            if threshold < 0.0 || !threshold.is_finite() {
                return Err(ValidationError::InvalidConfiguration(format!(
                    "heavy weight threshold must be non-negative, got: {threshold}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            grid_step: Self::DEFAULT_GRID_STEP,
            general_epsilon: Self::DEFAULT_GENERAL_EPSILON,
            search_budget: None,
            strategy: PackingStrategy::Volume,
            heavy_weight_threshold: None,
        }
    }
}

/// Builder for [`PackingConfig`].
#[derive(Clone, Debug, Default)]
pub struct PackingConfigBuilder {
    config: PackingConfig,
}

impl PackingConfigBuilder {
    /// Sets the grid step.
    pub fn grid_step(mut self, step: f64) -> Self {
        self.config.grid_step = step;
        self
    }

    /// Sets the general tolerance.
    pub fn general_epsilon(mut self, epsilon: f64) -> Self {
        self.config.general_epsilon = epsilon;
        self
    }

    /// Sets the per-item search budget.
    pub fn search_budget(mut self, budget: Option<u64>) -> Self {
        self.config.search_budget = budget;
        self
    }

    /// Sets the strategy.
    pub fn strategy(mut self, strategy: PackingStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Sets the heavy weight threshold.
    pub fn heavy_weight_threshold(mut self, threshold: Option<f64>) -> Self {
        self.config.heavy_weight_threshold = threshold;
        self
    }

    /// Builds the final configuration.
    pub fn build(self) -> PackingConfig {
        self.config
    }
}

/// Reasons why an accepted item could not be placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnfittedReason {
    DimensionsExceedContainer,
    NoFeasiblePosition,
    SearchBudgetExhausted,
}

impl UnfittedReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnfittedReason::DimensionsExceedContainer => "dimensions_exceed_container",
            UnfittedReason::NoFeasiblePosition => "no_feasible_position",
            UnfittedReason::SearchBudgetExhausted => "search_budget_exhausted",
        }
    }
}

impl fmt::Display for UnfittedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnfittedReason::DimensionsExceedContainer => {
                write!(f, "Item exceeds the container in at least one dimension")
            }
            UnfittedReason::NoFeasiblePosition => {
                write!(f, "No free position left in the container")
            }
            UnfittedReason::SearchBudgetExhausted => {
                write!(f, "Search budget exhausted before a position was found")
            }
        }
    }
}

/// Accepted item that could not be placed.
#[derive(Clone, Debug, PartialEq)]
pub struct UnfittedItem {
    pub item: Item,
    pub reason: UnfittedReason,
}

/// Item refused at intake because its data is invalid.
#[derive(Clone, Debug, PartialEq)]
pub struct RejectedItem {
    pub item: Item,
    pub error: ValidationError,
}

/// Result of a packing call.
#[derive(Clone, Debug, PartialEq)]
pub struct PackingResult {
    pub container: Container,
    /// Strategy whose layout was returned
    pub strategy: PackingStrategy,
    /// Number of accepted items (fitted + unfitted); rejected items are not counted
    pub total_items: usize,
    pub fitted_count: usize,
    pub unfitted_count: usize,
    /// Used volume / container volume × 100
    pub efficiency: f64,
    pub used_volume: f64,
    /// Weight of all accepted items in kg
    pub total_weight: f64,
    pub fitted_weight: f64,
    /// Fitted items in placement order, with `fitted` and `position` set
    pub fitted: Vec<Item>,
    pub unfitted: Vec<UnfittedItem>,
    pub rejected: Vec<RejectedItem>,
}

impl PackingResult {
    /// Indicates whether every accepted item was placed.
    pub fn is_complete(&self) -> bool {
        self.unfitted.is_empty()
    }

    /// Copies `fitted` and `position` back onto a caller-owned collection.
    ///
    /// Items are matched by id; items not fitted in this result are reset.
    /// A repeated id only matches its first occurrence, mirroring intake.
    pub fn apply_to(&self, items: &mut [Item]) {
        let mut positions: HashMap<&str, Vec3> = self
            .fitted
            .iter()
            .map(|fitted| (fitted.id.as_str(), fitted.position))
            .collect();

        for item in items.iter_mut() {
            match positions.remove(item.id.as_str()) {
                Some(position) => {
                    item.fitted = true;
                    item.position = position;
                }
                None => item.reset(),
            }
        }
    }

    fn assemble(
        container: &Container,
        strategy: PackingStrategy,
        layout: Layout,
        rejected: Vec<RejectedItem>,
    ) -> Self {
        let Layout { placed, unfitted } = layout;

        let used_volume: f64 = placed.iter().map(|p| p.item.volume()).sum();
        let fitted_weight: f64 = placed.iter().map(|p| p.weight()).sum();
        let unfitted_weight: f64 = unfitted.iter().map(|u| u.item.weight()).sum();

        let fitted: Vec<Item> = placed.into_iter().map(|p| p.item).collect();

        Self {
            container: *container,
            strategy,
            total_items: fitted.len() + unfitted.len(),
            fitted_count: fitted.len(),
            unfitted_count: unfitted.len(),
            efficiency: efficiency_percent(used_volume, container.volume()),
            used_volume,
            total_weight: fitted_weight + unfitted_weight,
            fitted_weight,
            fitted,
            unfitted,
            rejected,
        }
    }
}

/// Volumetric efficiency in percent; 0 for degenerate container volumes.
pub fn efficiency_percent(used_volume: f64, container_volume: f64) -> f64 {
    if container_volume <= 0.0 || !container_volume.is_finite() {
        return 0.0;
    }
    (used_volume / container_volume * 100.0).clamp(0.0, 100.0)
}

/// Events emitted while packing, for live visualization.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum PackEvent {
    /// An item was placed.
    ItemPlaced {
        id: String,
        name: String,
        pos: Vec3,
        dims: Vec3,
        weight: Option<f64>,
        fitted_count: usize,
    },
    /// An accepted item could not be placed.
    ItemUnfitted {
        id: String,
        name: String,
        dims: Vec3,
        reason_code: String,
        reason_text: String,
    },
    /// An item was refused at intake.
    ItemRejected {
        id: String,
        name: String,
        reason_text: String,
    },
    /// Packing finished.
    Finished {
        strategy: PackingStrategy,
        fitted: usize,
        unfitted: usize,
        rejected: usize,
        efficiency: f64,
    },
}

impl PackEvent {
    fn placed(placed: &PlacedItem, fitted_count: usize) -> Self {
        PackEvent::ItemPlaced {
            id: placed.item.id.clone(),
            name: placed.item.name.clone(),
            pos: placed.position,
            dims: placed.item.dimensions(),
            weight: placed.item.weight,
            fitted_count,
        }
    }

    fn unfitted(entry: &UnfittedItem) -> Self {
        PackEvent::ItemUnfitted {
            id: entry.item.id.clone(),
            name: entry.item.name.clone(),
            dims: entry.item.dimensions(),
            reason_code: entry.reason.code().to_string(),
            reason_text: entry.reason.to_string(),
        }
    }

    fn rejected(entry: &RejectedItem) -> Self {
        PackEvent::ItemRejected {
            id: entry.item.id.clone(),
            name: entry.item.name.clone(),
            reason_text: entry.error.to_string(),
        }
    }

    fn finished(result: &PackingResult) -> Self {
        PackEvent::Finished {
            strategy: result.strategy,
            fitted: result.fitted_count,
            unfitted: result.unfitted_count,
            rejected: result.rejected.len(),
            efficiency: result.efficiency,
        }
    }
}

/// Placements and failures of one pass, in processing order.
#[derive(Clone, Debug, Default)]
struct Layout {
    placed: Vec<PlacedItem>,
    unfitted: Vec<UnfittedItem>,
}

impl Layout {
    fn used_volume(&self) -> f64 {
        self.placed.iter().map(|p| p.item.volume()).sum()
    }
}

/// Single-pass packing, largest volume first.
///
/// # Errors
/// `PackingError::InvalidContainer` if any container dimension is not positive,
/// `PackingError::InvalidConfiguration` if the grid step or tolerance is not.
///
/// # Examples
/// ```
/// use cargo_fitter::model::{Container, Item};
/// use cargo_fitter::planner::{PackingConfig, pack};
/// use cargo_fitter::types::Vec3;
///
/// let container = Container { length: 100.0, width: 100.0, height: 100.0 };
/// let items = vec![Item::new("a", "Crate", Vec3::new(50.0, 50.0, 50.0))];
/// let result = pack(&container, &items, &PackingConfig::default()).unwrap();
/// assert_eq!(result.fitted_count, 1);
/// assert_eq!(result.efficiency, 12.5);
/// ```
pub fn pack(
    container: &Container,
    items: &[Item],
    config: &PackingConfig,
) -> Result<PackingResult, PackingError> {
    let config = PackingConfig {
        strategy: PackingStrategy::Volume,
        ..*config
    };
    pack_with_progress(container, items, &config, |_| {})
}

/// Two-pass, weight-aware packing.
///
/// Pass 1 is the single-pass volume plan. Pass 2 places heavy items first
/// (weight ≥ threshold, heaviest first) and refuses any position above a
/// lighter item. The pass-2 layout is returned only if it fits at least as
/// many items and at least as much volume as pass 1.
pub fn pack_weight_aware(
    container: &Container,
    items: &[Item],
    config: &PackingConfig,
) -> Result<PackingResult, PackingError> {
    let config = PackingConfig {
        strategy: PackingStrategy::WeightAware,
        ..*config
    };
    pack_with_progress(container, items, &config, |_| {})
}

/// Packs with the strategy selected in `config.strategy`.
pub fn pack_with_strategy(
    container: &Container,
    items: &[Item],
    config: &PackingConfig,
) -> Result<PackingResult, PackingError> {
    pack_with_progress(container, items, config, |_| {})
}

/// Packs with `config.strategy` and reports every step through `on_event`.
///
/// With the volume strategy events are emitted live; the weight-aware
/// strategy emits the events of the winning layout once it is chosen.
pub fn pack_with_progress(
    container: &Container,
    items: &[Item],
    config: &PackingConfig,
    mut on_event: impl FnMut(&PackEvent),
) -> Result<PackingResult, PackingError> {
    container.validate().map_err(PackingError::InvalidContainer)?;
    config.validate().map_err(PackingError::InvalidConfiguration)?;

    let (accepted, rejected) = intake(items);
    for entry in &rejected {
        on_event(&PackEvent::rejected(entry));
    }

    let (layout, strategy) = match config.strategy {
        PackingStrategy::Volume => {
            let layout = place_sequentially(
                container,
                order_by_volume(accepted),
                config,
                &Unconstrained,
                &mut on_event,
            );
            (layout, PackingStrategy::Volume)
        }
        PackingStrategy::WeightAware => {
            let (layout, strategy) = plan_weight_aware(container, accepted, config);
            replay(&layout, &mut on_event);
            (layout, strategy)
        }
    };

    debug_assert!(
        find_violation(container, &layout.placed, config.general_epsilon).is_none(),
        "engine produced an invalid layout"
    );

    let result = PackingResult::assemble(container, strategy, layout, rejected);
    debug!(
        strategy = %result.strategy,
        fitted = result.fitted_count,
        unfitted = result.unfitted_count,
        rejected = result.rejected.len(),
        efficiency = result.efficiency,
        "packing finished"
    );
    on_event(&PackEvent::finished(&result));
    Ok(result)
}

/// Splits the input into valid items (with cleared output fields) and rejects.
///
/// Ids must be unique: the first item with a given id is accepted, later ones
/// are rejected with [`ValidationError::DuplicateId`].
fn intake(items: &[Item]) -> (Vec<Item>, Vec<RejectedItem>) {
    let mut accepted = Vec::with_capacity(items.len());
    let mut rejected = Vec::new();
    let mut seen: HashSet<&str> = HashSet::with_capacity(items.len());

    for original in items {
        let mut item = original.clone();
        item.reset();
        let checked = if seen.insert(original.id.as_str()) {
            item.validate()
        } else {
            Err(ValidationError::DuplicateId(original.id.clone()))
        };
        match checked {
            Ok(()) => accepted.push(item),
            Err(error) => rejected.push(RejectedItem { item, error }),
        }
    }
    (accepted, rejected)
}

fn compare_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Stable sort by descending volume; ties keep input order.
fn order_by_volume(mut items: Vec<Item>) -> Vec<Item> {
    items.sort_by(|a, b| compare_desc(a.volume(), b.volume()));
    items
}

/// Heavy items first (heaviest, then largest), then the rest by volume.
fn order_for_stacking(items: Vec<Item>, threshold: f64) -> Vec<Item> {
    let (mut heavy, light): (Vec<Item>, Vec<Item>) =
        items.into_iter().partition(|item| item.weight() >= threshold);

    heavy.sort_by(|a, b| {
        compare_desc(a.weight(), b.weight()).then_with(|| compare_desc(a.volume(), b.volume()))
    });
    heavy.extend(order_by_volume(light));
    heavy
}

/// Median of the positive item weights, `None` if no item carries weight.
fn median_weight(items: &[Item]) -> Option<f64> {
    let mut weights: Vec<f64> = items
        .iter()
        .map(Weighted::weight)
        .filter(|w| *w > 0.0)
        .collect();
    if weights.is_empty() {
        return None;
    }
    weights.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mid = weights.len() / 2;
    if weights.len() % 2 == 0 {
        Some((weights[mid - 1] + weights[mid]) / 2.0)
    } else {
        Some(weights[mid])
    }
}

fn place_sequentially<R: PlacementRule + ?Sized>(
    container: &Container,
    ordered: Vec<Item>,
    config: &PackingConfig,
    rule: &R,
    on_event: &mut impl FnMut(&PackEvent),
) -> Layout {
    let mut layout = Layout::default();
    let container_dims = container.dimensions();

    for item in ordered {
        if !item.fits_in(&container_dims) {
            let entry = UnfittedItem {
                item,
                reason: UnfittedReason::DimensionsExceedContainer,
            };
            on_event(&PackEvent::unfitted(&entry));
            layout.unfitted.push(entry);
            continue;
        }

        match search(&item, container, &layout.placed, config, rule) {
            SearchOutcome::Found(position) => {
                layout.placed.push(PlacedItem::new(item, position));
                if let Some(placed) = layout.placed.last() {
                    on_event(&PackEvent::placed(placed, layout.placed.len()));
                }
            }
            outcome => {
                let reason = if outcome == SearchOutcome::BudgetExhausted {
                    warn!(
                        item = %item.id,
                        budget = ?config.search_budget,
                        "search budget exhausted, item left unfitted"
                    );
                    UnfittedReason::SearchBudgetExhausted
                } else {
                    UnfittedReason::NoFeasiblePosition
                };
                let entry = UnfittedItem { item, reason };
                on_event(&PackEvent::unfitted(&entry));
                layout.unfitted.push(entry);
            }
        }
    }
    layout
}

fn plan_weight_aware(
    container: &Container,
    accepted: Vec<Item>,
    config: &PackingConfig,
) -> (Layout, PackingStrategy) {
    let baseline = place_sequentially(
        container,
        order_by_volume(accepted.clone()),
        config,
        &Unconstrained,
        &mut |_| {},
    );

    let threshold = match config
        .heavy_weight_threshold
        .or_else(|| median_weight(&accepted))
    {
        Some(threshold) => threshold,
        None => {
            debug!("no item carries weight, keeping the volume layout");
            return (baseline, PackingStrategy::Volume);
        }
    };

    let stacked = place_sequentially(
        container,
        order_for_stacking(accepted, threshold),
        config,
        &HeavyBelowLight::new(config.general_epsilon),
        &mut |_| {},
    );

    let covers_count = stacked.placed.len() >= baseline.placed.len();
    let covers_volume =
        stacked.used_volume() + config.general_epsilon >= baseline.used_volume();
    debug!(
        threshold,
        baseline_fitted = baseline.placed.len(),
        stacked_fitted = stacked.placed.len(),
        "weight-aware passes compared"
    );

    if covers_count && covers_volume {
        (stacked, PackingStrategy::WeightAware)
    } else {
        (baseline, PackingStrategy::Volume)
    }
}

fn replay(layout: &Layout, on_event: &mut impl FnMut(&PackEvent)) {
    for (idx, placed) in layout.placed.iter().enumerate() {
        on_event(&PackEvent::placed(placed, idx + 1));
    }
    for entry in &layout.unfitted {
        on_event(&PackEvent::unfitted(entry));
    }
}
