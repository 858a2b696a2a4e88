//! The importance-driven refinement loop.

use std::collections::BTreeMap;

use poseidon_event::{CancelFlag, Point3, SearchRegion, Station};
use poseidon_misfit::{Evaluation, Evaluator};
use poseidon_scatter::ScatterCell;
use tracing::{debug, trace};

use crate::arena::{CellArena, CellId, OctCell};
use crate::config::{OctreeConfig, TerminationPolicy};
use crate::error::OctreeError;
use crate::results::ResultIndex;

/// Outcome of an octree search.
#[derive(Debug)]
pub struct OctreeResult {
    /// Center of the best-scoring evaluated cell.
    pub best_point: Point3,
    /// Evaluation at the best cell center.
    pub best_eval: Evaluation,
    /// Cell evaluations performed.
    pub n_evaluated: usize,
    /// Leaf cells at the end of the search.
    pub n_leaves: usize,
    /// Smallest full cell width reached (km).
    pub smallest_node_size: f64,
    /// Log of the likelihood-volume integral over the leaves; the
    /// normalisation constant of the sampled posterior.
    pub log_integral: f64,
    /// True when the search was cancelled before its stop condition.
    pub cancelled: bool,
    arena: CellArena,
}

impl OctreeResult {
    /// The final cell tree.
    pub fn arena(&self) -> &CellArena {
        &self.arena
    }

    /// Usable leaf cells weighted by likelihood × volume, ready for the
    /// scatter sampler.
    pub fn scatter_cells(&self) -> Vec<ScatterCell> {
        self.arena
            .leaves()
            .filter(|(_, cell)| usable_log_value(cell.log_value))
            .map(|(_, cell)| ScatterCell {
                center: cell.center,
                half_widths: cell.half_widths,
                log_value: cell.log_value + cell.log_volume(),
            })
            .collect()
    }
}

fn usable_log_value(log_value: f64) -> bool {
    log_value.is_finite() && log_value > poseidon_misfit::UNUSABLE_LOG_QUALITY / 2.0
}

/// True when all eight octants would keep every axis at or above the
/// minimum node size; a child's full width equals the parent's half width.
fn can_split(cell: &OctCell, min_node_size: f64) -> bool {
    cell.half_widths.iter().all(|&h| h >= min_node_size)
}

/// Stations inside the horizontal footprint of a cell, as a log bonus.
fn station_density_bonus(
    center: Point3,
    half_widths: &[f64; 3],
    stations: &BTreeMap<String, Station>,
) -> f64 {
    let n = stations
        .values()
        .filter(|s| {
            (s.x - center.x).abs() < half_widths[0] && (s.y - center.y).abs() < half_widths[1]
        })
        .count();
    ((n + 1) as f64).ln()
}

struct Progress {
    n_evaluated: usize,
    smallest: f64,
    best: Option<(CellId, Point3, Evaluation)>,
}

/// Evaluates one cell center and, when usable, queues it for refinement.
fn evaluate_cell(
    id: CellId,
    arena: &mut CellArena,
    frontier: &mut ResultIndex,
    evaluator: &mut dyn Evaluator,
    stations: &BTreeMap<String, Station>,
    cfg: &OctreeConfig,
    progress: &mut Progress,
) {
    let (center, half_widths, spread, log_volume, width) = {
        let cell = arena.get(id);
        (
            cell.center,
            cell.half_widths,
            cell.diagonal() / (2.0 * cfg.mean_cell_velocity()),
            cell.log_volume(),
            cell.max_width(),
        )
    };
    let eval = evaluator.evaluate(center, spread);
    progress.n_evaluated += 1;
    progress.smallest = progress.smallest.min(width);
    arena.get_mut(id).log_value = eval.log_quality;

    if !eval.is_usable() {
        return;
    }
    if progress
        .best
        .map_or(true, |(_, _, b)| eval.log_quality > b.log_quality)
    {
        progress.best = Some((id, center, eval));
    }

    let mut log_priority = eval.log_quality + log_volume;
    if cfg.use_station_density() {
        log_priority += station_density_bonus(center, &half_widths, stations);
    }
    frontier.insert(log_priority, id);
}

/// Runs an octree search over `region`.
///
/// Root cells tile the region per `init_cells`; each iteration extracts
/// the highest-priority frontier cell and splits it into eight octants,
/// evaluating every child center with a time spread of cell diagonal over
/// twice the mean cell velocity. A cell whose octants would drop any axis
/// below the minimum node size is never split. The importance loop stops
/// per the termination policy, on its share of the evaluation budget, or
/// on cancellation; a final pass then refines the best branch down to the
/// minimum node size using budget held back for it, so the reported best
/// cell is fully resolved even when broad refinement exhausts the loop.
///
/// Fails with [`OctreeError::NoUsableCandidate`] when no cell center
/// could be evaluated.
pub fn octree_search(
    region: &SearchRegion,
    cfg: &OctreeConfig,
    evaluator: &mut dyn Evaluator,
    stations: &BTreeMap<String, Station>,
    cancel: &CancelFlag,
) -> Result<OctreeResult, OctreeError> {
    cfg.validate()?;

    let [nx, ny, nz] = cfg.init_cells();
    let origin = region.origin();
    let extent = region.extent();
    let half = [
        extent[0] / (2.0 * nx as f64),
        extent[1] / (2.0 * ny as f64),
        extent[2] / (2.0 * nz as f64),
    ];

    let mut arena = CellArena::with_capacity(nx * ny * nz);
    let mut frontier = ResultIndex::new(cfg.frontier_capacity());
    let mut progress = Progress {
        n_evaluated: 0,
        smallest: f64::INFINITY,
        best: None,
    };

    for i in 0..nx {
        for j in 0..ny {
            for k in 0..nz {
                let center = Point3::new(
                    origin.x + (2 * i + 1) as f64 * half[0],
                    origin.y + (2 * j + 1) as f64 * half[1],
                    origin.z + (2 * k + 1) as f64 * half[2],
                );
                let id = arena.alloc(center, half, None);
                evaluate_cell(
                    id,
                    &mut arena,
                    &mut frontier,
                    evaluator,
                    stations,
                    cfg,
                    &mut progress,
                );
            }
        }
    }
    debug!(
        roots = arena.len(),
        n_usable = frontier.len(),
        "root lattice evaluated"
    );

    // Part of the budget is held back so the closing descent can always
    // drive the best branch down to the minimum node size.
    let max_root_width = 2.0 * half.iter().cloned().fold(0.0, f64::max);
    let descent_levels = if max_root_width > cfg.min_node_size() {
        (max_root_width / cfg.min_node_size()).log2().ceil() as usize + 1
    } else {
        0
    };
    let refine_budget = cfg
        .max_evaluations()
        .saturating_sub((8 * descent_levels).min(cfg.max_evaluations() / 4));

    let mut cancelled = false;
    while let Some((log_priority, id)) = frontier.pop_max() {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        if !can_split(arena.get(id), cfg.min_node_size()) {
            match cfg.termination() {
                TerminationPolicy::StopOnMinSize => {
                    debug!(log_priority, "minimum node size reached");
                    break;
                }
                TerminationPolicy::RefineUntilBudget => continue,
            }
        }
        if progress.n_evaluated + 8 > refine_budget {
            debug!(n_evaluated = progress.n_evaluated, "evaluation budget reached");
            break;
        }
        trace!(log_priority, cell = id.index(), "refining");
        let children = arena.subdivide(id);
        for child in children {
            evaluate_cell(
                child,
                &mut arena,
                &mut frontier,
                evaluator,
                stations,
                cfg,
                &mut progress,
            );
        }
    }

    if let Some((best_id, _, _)) = progress.best {
        if !cancelled {
            descend_best(
                best_id,
                &mut arena,
                &mut frontier,
                evaluator,
                stations,
                cfg,
                &mut progress,
            );
        }
    }

    let (_, best_point, best_eval) = progress.best.ok_or(OctreeError::NoUsableCandidate {
        n_evaluated: progress.n_evaluated,
    })?;

    let log_integral = leaf_log_integral(&arena);
    let n_leaves = arena.leaves().count();
    debug!(
        n_evaluated = progress.n_evaluated,
        n_leaves,
        smallest = progress.smallest,
        log_integral,
        cancelled,
        "octree search finished"
    );

    Ok(OctreeResult {
        best_point,
        best_eval,
        n_evaluated: progress.n_evaluated,
        n_leaves,
        smallest_node_size: progress.smallest,
        log_integral,
        cancelled,
        arena,
    })
}

/// Refines the best branch down to the minimum node size.
///
/// The importance loop spreads its budget over every competitive branch
/// and can exhaust it before any cell reaches the node-size floor; this
/// pass subdivides from the best cell toward its strongest octant until
/// the floor or the overall budget halts it.
fn descend_best(
    start: CellId,
    arena: &mut CellArena,
    frontier: &mut ResultIndex,
    evaluator: &mut dyn Evaluator,
    stations: &BTreeMap<String, Station>,
    cfg: &OctreeConfig,
    progress: &mut Progress,
) {
    let mut cursor = start;
    while let Some(children) = arena.get(cursor).children {
        cursor = strongest_child(arena, &children);
    }
    while can_split(arena.get(cursor), cfg.min_node_size())
        && progress.n_evaluated + 8 <= cfg.max_evaluations()
    {
        let children = arena.subdivide(cursor);
        for child in children {
            evaluate_cell(child, arena, frontier, evaluator, stations, cfg, progress);
        }
        if !children
            .iter()
            .any(|&c| usable_log_value(arena.get(c).log_value))
        {
            break;
        }
        cursor = strongest_child(arena, &children);
    }
}

fn strongest_child(arena: &CellArena, children: &[CellId; 8]) -> CellId {
    children
        .iter()
        .copied()
        .max_by(|a, b| arena.get(*a).log_value.total_cmp(&arena.get(*b).log_value))
        .unwrap_or(children[0])
}

/// Log-sum-exp of likelihood × volume over the usable leaves.
fn leaf_log_integral(arena: &CellArena) -> f64 {
    let terms = || {
        arena
            .leaves()
            .filter(|(_, cell)| usable_log_value(cell.log_value))
            .map(|(_, cell)| cell.log_value + cell.log_volume())
    };
    let max = terms().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return f64::NEG_INFINITY;
    }
    let sum: f64 = terms().map(|t| (t - max).exp()).sum();
    max + sum.ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    struct Bump {
        peak: Point3,
        scale: f64,
    }

    impl Evaluator for Bump {
        fn evaluate(&mut self, point: Point3, _spread: f64) -> Evaluation {
            let d = point.distance(&self.peak);
            Evaluation {
                log_quality: -d * d / (self.scale * self.scale),
                misfit: d * d,
                origin_time: 0.0,
                origin_time_var: 0.0,
                n_used: 4,
            }
        }
    }

    fn region() -> SearchRegion {
        SearchRegion::new(Point3::new(-50.0, -50.0, 0.0), [100.0, 100.0, 100.0]).unwrap()
    }

    fn bump() -> Bump {
        Bump {
            peak: Point3::new(12.3, -7.1, 9.4),
            scale: 4.0,
        }
    }

    fn no_stations() -> BTreeMap<String, Station> {
        BTreeMap::new()
    }

    #[test]
    fn converges_to_the_peak_within_min_node_size() {
        // 12.5 km roots halve to 0.0977 km before the node-size floor; the
        // closing descent must reach that level even though broad
        // refinement of this wide bump soaks up the loop's budget.
        let cfg = OctreeConfig::new()
            .with_init_cells([8, 8, 8])
            .with_min_node_size(0.09)
            .with_max_evaluations(30_000);
        let mut ev = bump();
        let result =
            octree_search(&region(), &cfg, &mut ev, &no_stations(), &CancelFlag::new()).unwrap();
        assert!(
            result.best_point.distance(&ev.peak) < 0.1,
            "best {:?} vs peak {:?}",
            result.best_point,
            ev.peak
        );
        assert!(result.smallest_node_size <= 0.1);
        assert!(result.n_evaluated <= 30_000);
        assert!(!result.cancelled);
    }

    #[test]
    fn never_splits_below_the_minimum_node_size() {
        // A 0.15 km root would subdivide into 0.075 km octants, so the
        // guard keeps it a leaf.
        let tiny = SearchRegion::new(Point3::new(0.0, 0.0, 0.0), [0.15, 0.15, 0.15]).unwrap();
        let cfg = OctreeConfig::new()
            .with_init_cells([1, 1, 1])
            .with_min_node_size(0.1)
            .with_max_evaluations(100);
        let result =
            octree_search(&tiny, &cfg, &mut bump(), &no_stations(), &CancelFlag::new()).unwrap();
        assert_eq!(result.n_evaluated, 1);
        assert!(result
            .arena()
            .iter()
            .all(|(_, c)| c.half_widths.iter().all(|&h| 2.0 * h >= 0.1)));
    }

    #[test]
    fn leaf_volumes_tile_the_region() {
        let cfg = OctreeConfig::new()
            .with_init_cells([4, 4, 2])
            .with_min_node_size(0.5)
            .with_max_evaluations(5_000);
        let result = octree_search(
            &region(),
            &cfg,
            &mut bump(),
            &no_stations(),
            &CancelFlag::new(),
        )
        .unwrap();
        let leaf_volume: f64 = result.arena().leaves().map(|(_, c)| c.volume()).sum();
        assert_abs_diff_eq!(leaf_volume, region().volume(), epsilon = 1e-4);
    }

    #[test]
    fn stays_within_the_evaluation_budget() {
        let cfg = OctreeConfig::new()
            .with_init_cells([4, 4, 4])
            .with_min_node_size(1e-6)
            .with_termination(TerminationPolicy::RefineUntilBudget)
            .with_max_evaluations(500);
        let result = octree_search(
            &region(),
            &cfg,
            &mut bump(),
            &no_stations(),
            &CancelFlag::new(),
        )
        .unwrap();
        assert!(result.n_evaluated <= 500);
        // With no reachable minimum size the budget is the binding limit.
        assert!(result.n_evaluated > 500 - 8);
    }

    #[test]
    fn scatter_cells_cover_the_leaves() {
        let cfg = OctreeConfig::new()
            .with_init_cells([4, 4, 2])
            .with_min_node_size(0.5)
            .with_max_evaluations(3_000);
        let result = octree_search(
            &region(),
            &cfg,
            &mut bump(),
            &no_stations(),
            &CancelFlag::new(),
        )
        .unwrap();
        let cells = result.scatter_cells();
        assert_eq!(cells.len(), result.n_leaves);
        let volume: f64 = cells.iter().map(|c| 8.0 * c.half_widths.iter().product::<f64>()).sum();
        assert_abs_diff_eq!(volume, region().volume(), epsilon = 1e-4);
        assert!(cells.iter().all(|c| c.log_value.is_finite()));
    }

    #[test]
    fn cancellation_returns_the_root_lattice_best() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let cfg = OctreeConfig::new().with_init_cells([3, 3, 3]);
        let result =
            octree_search(&region(), &cfg, &mut bump(), &no_stations(), &cancel).unwrap();
        assert!(result.cancelled);
        assert_eq!(result.n_evaluated, 27);
    }

    #[test]
    fn unusable_surface_is_an_error() {
        struct Dead;
        impl Evaluator for Dead {
            fn evaluate(&mut self, _point: Point3, _spread: f64) -> Evaluation {
                Evaluation::unusable()
            }
        }
        let err = octree_search(
            &region(),
            &OctreeConfig::new().with_init_cells([2, 2, 2]),
            &mut Dead,
            &no_stations(),
            &CancelFlag::new(),
        )
        .unwrap_err();
        assert!(matches!(err, OctreeError::NoUsableCandidate { .. }));
    }

    #[test]
    fn station_density_bonus_counts_the_footprint() {
        let mut stations = BTreeMap::new();
        for (i, (x, y)) in [(0.0, 0.0), (1.0, 1.0), (30.0, 30.0)].iter().enumerate() {
            stations.insert(
                format!("S{i}"),
                Station::new(format!("S{i}"), *x, *y, 0.0),
            );
        }
        let bonus = station_density_bonus(
            Point3::new(0.0, 0.0, 10.0),
            &[5.0, 5.0, 5.0],
            &stations,
        );
        // Two stations inside the footprint: ln(3).
        assert_abs_diff_eq!(bonus, 3.0_f64.ln(), epsilon = 1e-12);
    }
}
