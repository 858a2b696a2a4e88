//! Weighted cell sampling with in-cell jitter.

use poseidon_event::Point3;
use rand::Rng;
use tracing::debug;

use crate::error::ScatterError;

/// An axis-aligned cell with a log posterior weight.
///
/// `log_value` must already include the cell volume (log likelihood plus
/// log volume), so cells of different sizes compete fairly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScatterCell {
    /// Cell center.
    pub center: Point3,
    /// Half widths per axis (km).
    pub half_widths: [f64; 3],
    /// Log of the posterior mass attributed to this cell.
    pub log_value: f64,
}

/// Draws `n` scatter points distributed over `cells` by posterior weight.
///
/// Weights are normalised in log space against the maximum, so absolute
/// offsets in `log_value` cancel. Each draw picks a cell through a CDF
/// binary search, then jitters the point uniformly within the cell.
///
/// # Errors
///
/// Returns [`ScatterError::NoCells`] for an empty slice and
/// [`ScatterError::DegenerateWeights`] when every weight underflows.
pub fn draw_scatter<R: Rng + ?Sized>(
    cells: &[ScatterCell],
    n: usize,
    rng: &mut R,
) -> Result<Vec<Point3>, ScatterError> {
    if cells.is_empty() {
        return Err(ScatterError::NoCells);
    }

    let log_max = cells
        .iter()
        .map(|c| c.log_value)
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if !log_max.is_finite() {
        return Err(ScatterError::DegenerateWeights {
            n_cells: cells.len(),
        });
    }

    // CDF over exp(log_value - log_max); the last entry is forced to the
    // total to close any floating-point gap at u near 1.
    let mut cdf = Vec::with_capacity(cells.len());
    let mut acc = 0.0;
    for cell in cells {
        if cell.log_value.is_finite() {
            acc += (cell.log_value - log_max).exp();
        }
        cdf.push(acc);
    }
    if acc <= 0.0 {
        return Err(ScatterError::DegenerateWeights {
            n_cells: cells.len(),
        });
    }

    let mut points = Vec::with_capacity(n);
    for _ in 0..n {
        let u: f64 = rng.random::<f64>() * acc;
        let idx = cdf.partition_point(|&c| c <= u).min(cells.len() - 1);
        let cell = &cells[idx];
        points.push(Point3::new(
            jitter(cell.center.x, cell.half_widths[0], rng),
            jitter(cell.center.y, cell.half_widths[1], rng),
            jitter(cell.center.z, cell.half_widths[2], rng),
        ));
    }
    debug!(n_cells = cells.len(), n_points = points.len(), "scatter drawn");
    Ok(points)
}

fn jitter<R: Rng + ?Sized>(center: f64, half: f64, rng: &mut R) -> f64 {
    if half > 0.0 {
        center + rng.random_range(-half..half)
    } else {
        center
    }
}
