//! Weight-matrix construction over usable arrivals.
//!
//! Follows the classical Gaussian formulation: a covariance matrix combines
//! a model term decaying with station separation and a per-arrival
//! measurement term; its inverse is the weight matrix. Geometry alone
//! determines the matrix, so it is built once per location run and reused
//! for every candidate.

use std::collections::BTreeMap;

use poseidon_event::{Arrival, Station};

use crate::error::MisfitError;
use crate::linalg::invert_in_place;
use crate::params::GaussianParams;

const WEIGHT_SUM_TINY: f64 = 1e-30;

/// Symmetric weight structure over the usable arrivals of one run.
#[derive(Debug, Clone)]
pub struct WeightContext {
    /// Indices into the run's arrival slice, one per matrix row.
    indices: Vec<usize>,
    /// Inverse-covariance weight matrix.
    matrix: Vec<Vec<f64>>,
    /// Row sums of the weight matrix (per-arrival weights).
    row_weights: Vec<f64>,
    /// Sum of all matrix elements.
    weight_sum: f64,
    /// Maximum single-arrival (row) weight.
    max_weight: f64,
}

impl WeightContext {
    /// Builds the weight context for the usable arrivals.
    ///
    /// The covariance entry for arrivals i, j at stations separated by
    /// distance d is `sigma_time^2 * exp(-d^2 / (2 corr_len^2))`, with the
    /// measurement variance `(sigma_i / sqrt(prior_weight_i))^2` added on
    /// the diagonal. A non-positive `corr_len` drops the off-diagonal model
    /// covariance entirely.
    ///
    /// # Errors
    ///
    /// Returns [`MisfitError::DegenerateWeights`] when fewer than
    /// `min_arrivals` arrivals are usable, the covariance is singular, or
    /// the weight sum vanishes. Callers must treat the run as unevaluable,
    /// not divide by zero.
    pub fn build(
        arrivals: &[Arrival],
        stations: &BTreeMap<String, Station>,
        params: &GaussianParams,
    ) -> Result<Self, MisfitError> {
        params.validate()?;

        let indices: Vec<usize> = arrivals
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_usable() && stations.contains_key(&a.station))
            .map(|(i, _)| i)
            .collect();
        let n = indices.len();
        if n < params.min_arrivals() {
            return Err(MisfitError::DegenerateWeights {
                reason: "too few usable arrivals",
                n_usable: n,
                min_arrivals: params.min_arrivals(),
            });
        }

        let positions: Vec<_> = indices
            .iter()
            .map(|&i| stations[&arrivals[i].station].position())
            .collect();

        let sigma_model_sq = params.sigma_time() * params.sigma_time();
        let corr_len = params.corr_len();
        let correlated = corr_len.is_finite() && corr_len > 0.0;

        let mut matrix: Vec<Vec<f64>> = vec![vec![0.0; n]; n];
        for row in 0..n {
            let a = &arrivals[indices[row]];
            let sigma_eff_sq = a.sigma * a.sigma / a.prior_weight;
            matrix[row][row] = sigma_model_sq + sigma_eff_sq;
            for col in (row + 1)..n {
                let cov = if correlated {
                    let d = positions[row].distance(&positions[col]);
                    sigma_model_sq * (-d * d / (2.0 * corr_len * corr_len)).exp()
                } else {
                    0.0
                };
                matrix[row][col] = cov;
                matrix[col][row] = cov;
            }
        }

        if !invert_in_place(&mut matrix) {
            return Err(MisfitError::DegenerateWeights {
                reason: "singular covariance matrix",
                n_usable: n,
                min_arrivals: params.min_arrivals(),
            });
        }

        let row_weights: Vec<f64> = matrix.iter().map(|row| row.iter().sum()).collect();
        let weight_sum: f64 = row_weights.iter().sum();
        if !(weight_sum > WEIGHT_SUM_TINY) {
            return Err(MisfitError::DegenerateWeights {
                reason: "weight sum is zero",
                n_usable: n,
                min_arrivals: params.min_arrivals(),
            });
        }
        let max_weight = row_weights.iter().cloned().fold(f64::MIN, f64::max);

        Ok(Self {
            indices,
            matrix,
            row_weights,
            weight_sum,
            max_weight,
        })
    }

    /// Arrival indices covered by the matrix rows.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Number of matrix rows.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// True if the context covers no arrivals (never constructed in
    /// practice; `build` rejects that).
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Weight-matrix element.
    pub fn weight(&self, row: usize, col: usize) -> f64 {
        self.matrix[row][col]
    }

    /// Per-arrival (row-sum) weights.
    pub fn row_weights(&self) -> &[f64] {
        &self.row_weights
    }

    /// Sum of all matrix elements.
    pub fn weight_sum(&self) -> f64 {
        self.weight_sum
    }

    /// Maximum single-arrival weight.
    pub fn max_weight(&self) -> f64 {
        self.max_weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn stations_square(side: f64) -> BTreeMap<String, Station> {
        [
            Station::new("N", 0.0, side, 0.0),
            Station::new("E", side, 0.0, 0.0),
            Station::new("S", 0.0, -side, 0.0),
            Station::new("W", -side, 0.0, 0.0),
        ]
        .into_iter()
        .map(|s| (s.label.clone(), s))
        .collect()
    }

    fn arrivals_for(stations: &BTreeMap<String, Station>, sigma: f64) -> Vec<Arrival> {
        stations
            .keys()
            .map(|label| Arrival::new(label.clone(), "P", 100.0, sigma).unwrap())
            .collect()
    }

    #[test]
    fn diagonal_when_uncorrelated() {
        let stations = stations_square(10.0);
        let arrivals = arrivals_for(&stations, 0.1);
        let params = GaussianParams::new(0.2);
        let ctx = WeightContext::build(&arrivals, &stations, &params).unwrap();

        assert_eq!(ctx.len(), 4);
        let expect = 1.0 / (0.2 * 0.2 + 0.1 * 0.1);
        for row in 0..4 {
            assert_abs_diff_eq!(ctx.weight(row, row), expect, epsilon = 1e-9);
            for col in 0..4 {
                if col != row {
                    assert_abs_diff_eq!(ctx.weight(row, col), 0.0, epsilon = 1e-12);
                }
            }
        }
        assert_abs_diff_eq!(ctx.weight_sum(), 4.0 * expect, epsilon = 1e-8);
        assert_abs_diff_eq!(ctx.max_weight(), expect, epsilon = 1e-9);
    }

    #[test]
    fn symmetric_with_correlation() {
        let stations = stations_square(5.0);
        let arrivals = arrivals_for(&stations, 0.1);
        let params = GaussianParams::new(0.3).with_corr_len(8.0);
        let ctx = WeightContext::build(&arrivals, &stations, &params).unwrap();
        for row in 0..4 {
            for col in 0..4 {
                assert_abs_diff_eq!(ctx.weight(row, col), ctx.weight(col, row), epsilon = 1e-9);
            }
        }
        assert!(ctx.weight_sum() > 0.0);
    }

    #[test]
    fn prior_weight_raises_variance() {
        let stations = stations_square(10.0);
        let mut arrivals = arrivals_for(&stations, 0.1);
        // Downweight one arrival; its diagonal weight must drop.
        arrivals[0].prior_weight = 0.25;
        let params = GaussianParams::new(0.0);
        let ctx = WeightContext::build(&arrivals, &stations, &params).unwrap();
        assert!(ctx.weight(0, 0) < ctx.weight(1, 1));
        assert_abs_diff_eq!(ctx.weight(0, 0), 0.25 / (0.1 * 0.1), epsilon = 1e-6);
    }

    #[test]
    fn too_few_arrivals_is_degenerate() {
        let stations = stations_square(10.0);
        let arrivals = arrivals_for(&stations, 0.1);
        let params = GaussianParams::new(0.2).with_min_arrivals(5);
        let err = WeightContext::build(&arrivals, &stations, &params).unwrap_err();
        assert!(matches!(
            err,
            MisfitError::DegenerateWeights {
                n_usable: 4,
                min_arrivals: 5,
                ..
            }
        ));
    }

    #[test]
    fn unknown_station_excluded() {
        let stations = stations_square(10.0);
        let mut arrivals = arrivals_for(&stations, 0.1);
        arrivals.push(Arrival::new("GHOST", "P", 100.0, 0.1).unwrap());
        let params = GaussianParams::new(0.2);
        let ctx = WeightContext::build(&arrivals, &stations, &params).unwrap();
        assert_eq!(ctx.len(), 4);
        assert!(!ctx.indices().contains(&4));
    }

    #[test]
    fn unusable_arrival_excluded() {
        let stations = stations_square(10.0);
        let mut arrivals = arrivals_for(&stations, 0.1);
        arrivals[2].usable = false;
        let params = GaussianParams::new(0.2).with_min_arrivals(3);
        let ctx = WeightContext::build(&arrivals, &stations, &params).unwrap();
        assert_eq!(ctx.len(), 3);
    }
}
