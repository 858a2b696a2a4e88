//! The exhaustive search driver.

use poseidon_event::{CancelFlag, Point3};
use poseidon_misfit::{Evaluation, Evaluator, UNUSABLE_LOG_QUALITY};
use poseidon_scatter::ScatterCell;
use tracing::{debug, info};

use crate::error::GridError;
use crate::lattice::Lattice;

/// The explored likelihood surface of one lattice, for scatter sampling.
#[derive(Debug, Clone)]
pub struct GridField {
    lattice: Lattice,
    log_values: Vec<f64>,
}

impl GridField {
    /// The lattice the values belong to.
    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// Per-node log-quality values in flat-index order. Unevaluable nodes
    /// carry the unusable sentinel.
    pub fn log_values(&self) -> &[f64] {
        &self.log_values
    }

    /// Usable nodes as equal-volume cells weighted by likelihood × volume,
    /// ready for the scatter sampler.
    pub fn scatter_cells(&self) -> Vec<ScatterCell> {
        let spacing = self.lattice.spacing();
        let half_widths = [spacing[0] / 2.0, spacing[1] / 2.0, spacing[2] / 2.0];
        let log_volume = self.lattice.node_volume().ln();
        self.log_values
            .iter()
            .enumerate()
            .filter(|(_, &v)| v.is_finite() && v > UNUSABLE_LOG_QUALITY / 2.0)
            .map(|(flat, &v)| ScatterCell {
                center: self.lattice.node_at(flat),
                half_widths,
                log_value: v + log_volume,
            })
            .collect()
    }
}

/// Outcome of an exhaustive grid search.
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    /// Best node found.
    pub best_point: Point3,
    /// Evaluation at the best node.
    pub best_eval: Evaluation,
    /// Full value fields, present when recording was requested.
    pub fields: Option<Vec<GridField>>,
    /// Total nodes evaluated.
    pub n_evaluated: usize,
    /// Nodes with a usable evaluation.
    pub n_usable: usize,
    /// True when the search was cancelled before completing.
    pub cancelled: bool,
}

impl GridSearchResult {
    /// Scatter cells over every recorded field; empty when recording was
    /// off.
    pub fn scatter_cells(&self) -> Vec<ScatterCell> {
        self.fields
            .as_deref()
            .map(|fields| fields.iter().flat_map(GridField::scatter_cells).collect())
            .unwrap_or_default()
    }
}

/// Enumerates every node of the given lattices and keeps the best.
///
/// Ties keep the first node seen, so results are fully deterministic.
/// Cancellation is checked once per node; a cancelled search returns its
/// best-so-far (and is marked `cancelled`) rather than failing.
///
/// # Errors
///
/// Returns [`GridError::EmptyLattices`] for an empty lattice list and
/// [`GridError::NoUsableCandidate`] when every node was unevaluable.
pub fn grid_search(
    lattices: &[Lattice],
    evaluator: &mut dyn Evaluator,
    record_fields: bool,
    cancel: &CancelFlag,
) -> Result<GridSearchResult, GridError> {
    if lattices.is_empty() {
        return Err(GridError::EmptyLattices);
    }
    let total: usize = lattices.iter().map(Lattice::len).sum();
    info!(n_lattices = lattices.len(), n_nodes = total, "starting grid search");

    let mut best_point = None;
    let mut best_eval = Evaluation::unusable();
    let mut fields = record_fields.then(Vec::new);
    let mut n_evaluated = 0usize;
    let mut n_usable = 0usize;
    let mut cancelled = false;

    'outer: for lattice in lattices {
        let mut log_values = record_fields.then(|| Vec::with_capacity(lattice.len()));
        for (_, point) in lattice.iter_nodes() {
            if cancel.is_cancelled() {
                cancelled = true;
                debug!(n_evaluated, "grid search cancelled");
                break 'outer;
            }
            let eval = evaluator.evaluate(point, 0.0);
            n_evaluated += 1;
            if eval.is_usable() {
                n_usable += 1;
                if eval.log_quality > best_eval.log_quality {
                    best_eval = eval;
                    best_point = Some(point);
                }
            }
            if let Some(values) = log_values.as_mut() {
                values.push(eval.log_quality);
            }
        }
        if let (Some(fields), Some(log_values)) = (fields.as_mut(), log_values) {
            fields.push(GridField {
                lattice: lattice.clone(),
                log_values,
            });
        }
    }

    let Some(best_point) = best_point else {
        return Err(GridError::NoUsableCandidate { n_evaluated });
    };
    info!(
        n_evaluated,
        n_usable,
        best_log_quality = best_eval.log_quality,
        "grid search complete"
    );
    Ok(GridSearchResult {
        best_point,
        best_eval,
        fields,
        n_evaluated,
        n_usable,
        cancelled,
    })
}
