//! Placement engine: first-fit position search for a single item.
//!
//! Candidate positions are scanned bottom-left-back: the vertical axis `z`
//! in the outer loop, then the width axis `y`, then the length axis `x`.
//! The first candidate that lies inside the container, overlaps no placed
//! item and satisfies the active [`PlacementRule`] wins. This is a first-fit
//! heuristic, not an optimal packer.
//!
//! The candidate grid is controlled by [`PackingConfig::grid_step`]. A step
//! of 1 is exhaustive for integer dimensions but slow on large containers;
//! coarser steps are faster and may miss feasible placements.

use crate::geometry::lies_beneath;
use crate::model::{Container, Item, PlacedItem};
use crate::planner::PackingConfig;
use crate::types::{BoundingBox, Dimensional, Vec3, Weighted};

/// Additional acceptance test for otherwise feasible candidates.
///
/// Bounds and overlap are always checked by the engine itself; a rule can only
/// refuse more candidates, never admit infeasible ones.
pub trait PlacementRule {
    /// Returns `true` if `item` may be placed at `position` next to `placed`.
    fn permits(&self, item: &Item, position: Vec3, placed: &[PlacedItem]) -> bool;
}

/// Accepts every feasible candidate.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unconstrained;

impl PlacementRule for Unconstrained {
    fn permits(&self, _item: &Item, _position: Vec3, _placed: &[PlacedItem]) -> bool {
        true
    }
}

/// Refuses candidates that would put an item above a lighter one.
///
/// Every placed item underneath the candidate (footprint overlap, top at or
/// below the candidate's bottom) must weigh at least as much as the item, and
/// every placed item above it at most as much. Gaps may be filled later, so
/// both directions are checked.
#[derive(Clone, Copy, Debug)]
pub struct HeavyBelowLight {
    pub tolerance: f64,
}

impl HeavyBelowLight {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }
}

impl PlacementRule for HeavyBelowLight {
    fn permits(&self, item: &Item, position: Vec3, placed: &[PlacedItem]) -> bool {
        let weight = item.weight();
        let candidate = BoundingBox::from_position_and_dims(position, item.dimensions());

        placed.iter().all(|p| {
            let other = p.bounding_box();
            if lies_beneath(&other, &candidate, self.tolerance) {
                p.weight() + self.tolerance >= weight
            } else if lies_beneath(&candidate, &other, self.tolerance) {
                weight + self.tolerance >= p.weight()
            } else {
                true
            }
        })
    }
}

/// Outcome of a budgeted search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SearchOutcome {
    /// First feasible position in scan order.
    Found(Vec3),
    /// The whole candidate grid was scanned without success.
    NotFound,
    /// `search_budget` candidates were evaluated without success.
    BudgetExhausted,
}

/// Finds the first feasible position for `item`, or `None` if it does not fit.
///
/// Pure function of its inputs; the search budget is ignored here.
///
/// # Examples
/// ```
/// use cargo_fitter::engine::find_position;
/// use cargo_fitter::model::{Container, Item};
/// use cargo_fitter::planner::PackingConfig;
/// use cargo_fitter::types::Vec3;
///
/// let container = Container::new(100.0, 100.0, 100.0).unwrap();
/// let item = Item::new("a", "Crate", Vec3::new(50.0, 50.0, 50.0));
/// let position = find_position(&item, &container, &[], &PackingConfig::default());
/// assert_eq!(position, Some(Vec3::zero()));
/// ```
pub fn find_position(
    item: &Item,
    container: &Container,
    placed: &[PlacedItem],
    config: &PackingConfig,
) -> Option<Vec3> {
    find_position_constrained(item, container, placed, config, &Unconstrained)
}

/// Like [`find_position`], but every candidate must also satisfy `rule`.
pub fn find_position_constrained<R: PlacementRule + ?Sized>(
    item: &Item,
    container: &Container,
    placed: &[PlacedItem],
    config: &PackingConfig,
    rule: &R,
) -> Option<Vec3> {
    match scan(item, container, placed, config, rule, None) {
        SearchOutcome::Found(position) => Some(position),
        SearchOutcome::NotFound | SearchOutcome::BudgetExhausted => None,
    }
}

/// Budgeted search honouring `config.search_budget`.
pub fn search<R: PlacementRule + ?Sized>(
    item: &Item,
    container: &Container,
    placed: &[PlacedItem],
    config: &PackingConfig,
    rule: &R,
) -> SearchOutcome {
    scan(item, container, placed, config, rule, config.search_budget)
}

fn scan<R: PlacementRule + ?Sized>(
    item: &Item,
    container: &Container,
    placed: &[PlacedItem],
    config: &PackingConfig,
    rule: &R,
    budget: Option<u64>,
) -> SearchOutcome {
    let eps = config.general_epsilon;
    let dims = item.dimensions();
    if !item.fits_in(&container.dimensions()) {
        return SearchOutcome::NotFound;
    }

    let xs = axis_positions(container.length, dims.x, config.grid_step, eps);
    let ys = axis_positions(container.width, dims.y, config.grid_step, eps);
    let zs = axis_positions(container.height, dims.z, config.grid_step, eps);

    let boxes: Vec<BoundingBox> = placed.iter().map(PlacedItem::bounding_box).collect();
    let mut evaluated: u64 = 0;

    for &z in &zs {
        for &y in &ys {
            // Only items overlapping this row in y and z can block an x position.
            let row: Vec<&BoundingBox> = boxes
                .iter()
                .filter(|b| {
                    b.min.y < y + dims.y && y < b.max.y && b.min.z < z + dims.z && z < b.max.z
                })
                .collect();

            let mut i = 0;
            while i < xs.len() {
                if budget.is_some_and(|limit| evaluated >= limit) {
                    return SearchOutcome::BudgetExhausted;
                }
                evaluated += 1;

                let position = Vec3::new(xs[i], y, z);
                let candidate = BoundingBox::from_position_and_dims(position, dims);
                match row.iter().find(|b| b.intersects(&candidate)) {
                    Some(blocker) => {
                        // Every grid position left of the blocker's far face collides with it too.
                        let far = blocker.max.x;
                        i += 1;
                        while i < xs.len() && xs[i] < far {
                            i += 1;
                        }
                    }
                    None => {
                        if rule.permits(item, position, placed) {
                            return SearchOutcome::Found(position);
                        }
                        i += 1;
                    }
                }
            }
        }
    }

    SearchOutcome::NotFound
}

/// Generates candidate positions along one axis.
///
/// Positions lie on the grid `0, step, 2·step, …` up to `container_len -
/// object_len`; the flush position against the far wall is appended when the
/// grid does not land on it.
///
/// # Parameters
/// * `container_len` - Container extent along this axis
/// * `object_len` - Item extent along this axis
/// * `step` - Grid step
/// * `epsilon` - Numerical tolerance
fn axis_positions(container_len: f64, object_len: f64, step: f64, epsilon: f64) -> Vec<f64> {
    let max_pos = (container_len - object_len).max(0.0);
    if max_pos <= epsilon {
        return vec![0.0];
    }

    let mut positions = Vec::new();
    let mut k: u64 = 0;
    loop {
        // Grid points are exactly k·step.
        let pos = k as f64 * step;
        if pos > max_pos + epsilon {
            break;
        }
        positions.push(pos.min(max_pos));
        k += 1;
    }

    if let Some(&last) = positions.last() {
        if (last - max_pos).abs() > epsilon {
            positions.push(max_pos);
        }
    }

    positions.dedup_by(|a, b| (*a - *b).abs() < epsilon);
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EPSILON_GENERAL;

    fn cube(id: &str, side: f64) -> Item {
        Item::new(id, id, Vec3::new(side, side, side))
    }

    fn unit_grid() -> PackingConfig {
        PackingConfig::builder().grid_step(1.0).build()
    }

    #[test]
    fn axis_positions_include_flush_position() {
        let positions = axis_positions(250.0, 100.0, 20.0, EPSILON_GENERAL);
        assert_eq!(positions.first(), Some(&0.0));
        assert_eq!(positions.last(), Some(&150.0));
        assert_eq!(positions[positions.len() - 2], 140.0);
    }

    #[test]
    fn axis_positions_for_exact_fit() {
        assert_eq!(axis_positions(10.0, 10.0, 1.0, EPSILON_GENERAL), vec![0.0]);
        assert_eq!(
            axis_positions(3.0, 1.0, 1.0, EPSILON_GENERAL),
            vec![0.0, 1.0, 2.0]
        );
    }

    #[test]
    fn empty_container_yields_origin() {
        let container = Container::new(100.0, 100.0, 100.0).unwrap();
        assert_eq!(
            find_position(&cube("a", 50.0), &container, &[], &unit_grid()),
            Some(Vec3::zero())
        );
    }

    #[test]
    fn oversized_item_has_no_position() {
        let container = Container::new(10.0, 10.0, 10.0).unwrap();
        let item = Item::new("long", "Long", Vec3::new(20.0, 5.0, 5.0));
        assert_eq!(find_position(&item, &container, &[], &unit_grid()), None);
    }

    #[test]
    fn item_exceeding_container_by_less_than_tolerance_has_no_position() {
        let container = Container::new(10.0, 10.0, 10.0).unwrap();
        let item = Item::new("edge", "Edge", Vec3::new(10.0 + 5e-7, 10.0, 10.0));
        assert_eq!(find_position(&item, &container, &[], &unit_grid()), None);
    }

    #[test]
    fn scan_prefers_length_axis_then_width_then_height() {
        let container = Container::new(20.0, 20.0, 20.0).unwrap();
        let config = unit_grid();
        let mut placed = Vec::new();

        let expected = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::new(10.0, 10.0, 0.0),
            Vec3::new(0.0, 0.0, 10.0),
        ];
        for (idx, want) in expected.iter().enumerate() {
            let item = cube(&format!("c{idx}"), 10.0);
            let pos = find_position(&item, &container, &placed, &config)
                .expect("cube should fit");
            assert_eq!(pos, *want);
            placed.push(PlacedItem::new(item, pos));
        }
    }

    #[test]
    fn blocker_skip_matches_first_fit() {
        // A 3-wide gap after a 7-long block; a 3-long item must land exactly at x = 7.
        let container = Container::new(10.0, 10.0, 10.0).unwrap();
        let block = PlacedItem::new(
            Item::new("block", "Block", Vec3::new(7.0, 10.0, 10.0)),
            Vec3::zero(),
        );
        let item = Item::new("slim", "Slim", Vec3::new(3.0, 10.0, 10.0));
        assert_eq!(
            find_position(&item, &container, &[block], &unit_grid()),
            Some(Vec3::new(7.0, 0.0, 0.0))
        );
    }

    #[test]
    fn coarse_grid_still_reaches_far_wall() {
        let container = Container::new(250.0, 100.0, 100.0).unwrap();
        let config = PackingConfig::builder().grid_step(20.0).build();
        let first = PlacedItem::new(
            Item::new("a", "A", Vec3::new(150.0, 100.0, 100.0)),
            Vec3::zero(),
        );
        let item = Item::new("b", "B", Vec3::new(100.0, 100.0, 100.0));
        assert_eq!(
            find_position(&item, &container, &[first], &config),
            Some(Vec3::new(150.0, 0.0, 0.0))
        );
    }

    #[test]
    fn find_position_is_pure() {
        let container = Container::new(30.0, 30.0, 30.0).unwrap();
        let placed = vec![PlacedItem::new(cube("a", 10.0), Vec3::zero())];
        let item = cube("b", 10.0);
        let config = unit_grid();

        let first = find_position(&item, &container, &placed, &config);
        let second = find_position(&item, &container, &placed, &config);
        assert_eq!(first, second);
        assert_eq!(placed.len(), 1);
        assert!(!item.fitted);
    }

    #[test]
    fn heavy_below_light_refuses_heavy_on_light() {
        let container = Container::new(10.0, 10.0, 30.0).unwrap();
        let light = PlacedItem::new(cube("light", 10.0).with_weight(5.0), Vec3::zero());
        let heavy = cube("heavy", 10.0).with_weight(9.0);
        let rule = HeavyBelowLight::new(EPSILON_GENERAL);

        assert_eq!(
            find_position_constrained(&heavy, &container, &[light.clone()], &unit_grid(), &rule),
            None
        );
        // Without the rule the heavy item simply goes on top.
        assert_eq!(
            find_position(&heavy, &container, &[light], &unit_grid()),
            Some(Vec3::new(0.0, 0.0, 10.0))
        );
    }

    #[test]
    fn heavy_below_light_allows_light_on_heavy() {
        let container = Container::new(10.0, 10.0, 30.0).unwrap();
        let heavy = PlacedItem::new(cube("heavy", 10.0).with_weight(9.0), Vec3::zero());
        let light = cube("light", 10.0).with_weight(5.0);
        let rule = HeavyBelowLight::new(EPSILON_GENERAL);

        assert_eq!(
            find_position_constrained(&light, &container, &[heavy], &unit_grid(), &rule),
            Some(Vec3::new(0.0, 0.0, 10.0))
        );
    }

    #[test]
    fn heavy_below_light_guards_gaps_under_placed_items() {
        let container = Container::new(10.0, 10.0, 30.0).unwrap();
        let floating = PlacedItem::new(
            cube("floating", 10.0).with_weight(5.0),
            Vec3::new(0.0, 0.0, 20.0),
        );
        let rule = HeavyBelowLight::new(EPSILON_GENERAL);

        let lighter = cube("lighter", 10.0).with_weight(1.0);
        assert_eq!(
            find_position_constrained(&lighter, &container, &[floating.clone()], &unit_grid(), &rule),
            None
        );

        let heavier = cube("heavier", 10.0).with_weight(7.0);
        assert_eq!(
            find_position_constrained(&heavier, &container, &[floating], &unit_grid(), &rule),
            Some(Vec3::zero())
        );
    }

    #[test]
    fn budget_exhaustion_is_reported() {
        let container = Container::new(100.0, 100.0, 100.0).unwrap();
        let wall = PlacedItem::new(
            Item::new("wall", "Wall", Vec3::new(100.0, 100.0, 60.0)),
            Vec3::zero(),
        );
        let item = cube("late", 50.0);

        let tight = PackingConfig::builder()
            .grid_step(1.0)
            .search_budget(Some(3))
            .build();
        assert_eq!(
            search(&item, &container, std::slice::from_ref(&wall), &tight, &Unconstrained),
            SearchOutcome::BudgetExhausted
        );

        let generous = PackingConfig::builder().grid_step(1.0).build();
        assert_eq!(
            search(&item, &container, &[wall], &generous, &Unconstrained),
            SearchOutcome::NotFound
        );
    }
}
