//! Analytic and stacked origin-time estimation.
//!
//! All functions here expect *centered* times: the caller subtracts a common
//! reference epoch (the earliest usable observed time) before accumulation,
//! so the weighted sums never mix epoch-sized magnitudes with
//! sub-millisecond residuals. The weighted sums additionally use Neumaier
//! compensated summation.

/// An origin-time estimate relative to the caller's reference epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OriginEstimate {
    /// Estimated origin time (centered, s).
    pub time: f64,
    /// Variance of the estimate (s²).
    pub variance: f64,
    /// Natural log of the normalised stack height at the estimate, 0 for
    /// the analytic estimator.
    pub log_stack: f64,
}

/// Neumaier (improved Kahan) compensated sum.
fn neumaier_sum(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut comp = 0.0;
    for v in values {
        let t = sum + v;
        if sum.abs() >= v.abs() {
            comp += (sum - t) + v;
        } else {
            comp += (v - t) + sum;
        }
        sum = t;
    }
    sum + comp
}

/// Likelihood-weighted mean of centered values with compensated summation.
///
/// Returns `None` when the weight sum is not positive.
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> Option<f64> {
    debug_assert_eq!(values.len(), weights.len());
    let wsum = neumaier_sum(weights.iter().copied());
    if !(wsum > 0.0) {
        return None;
    }
    let num = neumaier_sum(values.iter().zip(weights).map(|(&v, &w)| v * w));
    Some(num / wsum)
}

/// Maximum-likelihood origin time: the weighted mean of the arrival-implied
/// origin times (observed minus predicted), with the weighted spread as its
/// variance.
///
/// Returns `None` when `implied` is empty or the weight sum vanishes.
pub fn ml_origin(implied: &[f64], weights: &[f64]) -> Option<OriginEstimate> {
    let mean = weighted_mean(implied, weights)?;
    let wsum = neumaier_sum(weights.iter().copied());
    let var_num = neumaier_sum(
        implied
            .iter()
            .zip(weights)
            .map(|(&t, &w)| w * (t - mean) * (t - mean)),
    );
    Some(OriginEstimate {
        time: mean,
        variance: var_num / wsum,
        log_stack: 0.0,
    })
}

/// Origin time maximising a Gaussian stack of per-arrival likelihood
/// curves.
///
/// The stack `S(t) = sum_i w_i exp(-(t-t_i)^2 / (2 sigma_i^2))` is evaluated
/// at each arrival-implied time; the global maximum of a sum of unimodal
/// curves always lies near one of the component centers, so this scan finds
/// it without an explicit 1D search. The variance is the stack-weighted
/// spread around the maximum.
pub fn gaussian_stack_origin(
    implied: &[f64],
    sigmas: &[f64],
    weights: &[f64],
) -> Option<OriginEstimate> {
    debug_assert_eq!(implied.len(), sigmas.len());
    debug_assert_eq!(implied.len(), weights.len());
    if implied.is_empty() {
        return None;
    }
    let wsum = neumaier_sum(weights.iter().copied());
    if !(wsum > 0.0) {
        return None;
    }

    let stack_at = |t: f64| -> f64 {
        implied
            .iter()
            .zip(sigmas)
            .zip(weights)
            .map(|((&ti, &si), &wi)| {
                let z = (t - ti) / si;
                wi * (-0.5 * z * z).exp()
            })
            .sum()
    };

    let mut best_t = implied[0];
    let mut best_s = f64::NEG_INFINITY;
    for &t in implied {
        let s = stack_at(t);
        if s > best_s {
            best_s = s;
            best_t = t;
        }
    }

    // Stack-weighted variance around the maximum.
    let mut phi_sum = 0.0;
    let mut var_num = 0.0;
    for ((&ti, &si), &wi) in implied.iter().zip(sigmas).zip(weights) {
        let z = (best_t - ti) / si;
        let phi = wi * (-0.5 * z * z).exp();
        phi_sum += phi;
        var_num += phi * ((best_t - ti) * (best_t - ti) + si * si);
    }
    let variance = if phi_sum > 0.0 { var_num / phi_sum } else { 0.0 };

    Some(OriginEstimate {
        time: best_t,
        variance,
        log_stack: (best_s / wsum).max(f64::MIN_POSITIVE).ln(),
    })
}

/// Origin time maximising an interval stack.
///
/// Each arrival contributes a box `t_i ± (sigma_i + half_extra)` of weight
/// `w_i`; a sorted-endpoint sweep finds the interval of maximum overlapped
/// weight, and the estimate is its midpoint. `half_extra` is the
/// cell-induced time-uncertainty half width that widens every box during an
/// octree search.
pub fn interval_stack_origin(
    implied: &[f64],
    sigmas: &[f64],
    weights: &[f64],
    half_extra: f64,
) -> Option<OriginEstimate> {
    debug_assert_eq!(implied.len(), sigmas.len());
    debug_assert_eq!(implied.len(), weights.len());
    if implied.is_empty() {
        return None;
    }
    let wsum = neumaier_sum(weights.iter().copied());
    if !(wsum > 0.0) {
        return None;
    }

    // Endpoint events: +w at interval open, -w at close. Closes sort before
    // opens at the same position so touching intervals do not stack.
    let mut events: Vec<(f64, f64)> = Vec::with_capacity(2 * implied.len());
    for ((&ti, &si), &wi) in implied.iter().zip(sigmas).zip(weights) {
        let half = si + half_extra;
        events.push((ti - half, wi));
        events.push((ti + half, -wi));
    }
    events.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut depth = 0.0;
    let mut best_depth = f64::NEG_INFINITY;
    let mut best_start = events[0].0;
    let mut best_end = events[0].0;
    let mut prev_pos = events[0].0;
    for &(pos, delta) in &events {
        if depth > best_depth && pos > prev_pos {
            best_depth = depth;
            best_start = prev_pos;
            best_end = pos;
        }
        depth += delta;
        prev_pos = pos;
    }
    if best_depth == f64::NEG_INFINITY {
        // All endpoints coincide; fall back to the shared position.
        best_depth = wsum;
        best_start = events[0].0;
        best_end = events[0].0;
    }

    let width = best_end - best_start;
    Some(OriginEstimate {
        time: (best_start + best_end) / 2.0,
        // Variance of a uniform distribution over the winning interval.
        variance: width * width / 12.0,
        log_stack: (best_depth / wsum).max(f64::MIN_POSITIVE).ln(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn weighted_mean_basic() {
        let m = weighted_mean(&[1.0, 3.0], &[1.0, 1.0]).unwrap();
        assert_abs_diff_eq!(m, 2.0, epsilon = 1e-12);
        let m = weighted_mean(&[1.0, 3.0], &[3.0, 1.0]).unwrap();
        assert_abs_diff_eq!(m, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn weighted_mean_zero_weights_is_none() {
        assert!(weighted_mean(&[1.0], &[0.0]).is_none());
        assert!(weighted_mean(&[], &[]).is_none());
    }

    #[test]
    fn ml_origin_mean_and_variance() {
        let est = ml_origin(&[-1.0, 0.0, 1.0], &[1.0, 1.0, 1.0]).unwrap();
        assert_abs_diff_eq!(est.time, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(est.variance, 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn ml_origin_shift_invariance() {
        // Shifting every implied time by a constant shifts the estimate by
        // exactly that constant and leaves the variance unchanged.
        let implied = [0.01, 0.03, -0.02, 0.005];
        let weights = [1.0, 2.0, 0.5, 1.5];
        let base = ml_origin(&implied, &weights).unwrap();
        let shifted: Vec<f64> = implied.iter().map(|t| t + 123.456).collect();
        let moved = ml_origin(&shifted, &weights).unwrap();
        assert_abs_diff_eq!(moved.time - base.time, 123.456, epsilon = 1e-9);
        assert_abs_diff_eq!(moved.variance, base.variance, epsilon = 1e-12);
    }

    #[test]
    fn compensated_sum_survives_large_offsets() {
        // A naive sum of (1e9 + tiny) - 1e9 loses the tiny part; the
        // compensated weighted mean keeps millisecond structure.
        let implied = [1e9 + 0.001, 1e9 + 0.002, 1e9 + 0.003];
        let weights = [1.0, 1.0, 1.0];
        let est = ml_origin(&implied, &weights).unwrap();
        assert_abs_diff_eq!(est.time, 1e9 + 0.002, epsilon = 1e-7);
    }

    #[test]
    fn gaussian_stack_picks_cluster() {
        // Three tight times near 0 and one outlier at 5: the stack peaks in
        // the cluster.
        let implied = [-0.05, 0.0, 0.05, 5.0];
        let sigmas = [0.1, 0.1, 0.1, 0.1];
        let weights = [1.0, 1.0, 1.0, 1.0];
        let est = gaussian_stack_origin(&implied, &sigmas, &weights).unwrap();
        assert!(est.time.abs() < 0.1, "expected cluster peak, got {}", est.time);
        assert!(est.log_stack <= 0.0);
    }

    #[test]
    fn gaussian_stack_single_arrival() {
        let est = gaussian_stack_origin(&[1.5], &[0.2], &[2.0]).unwrap();
        assert_abs_diff_eq!(est.time, 1.5, epsilon = 1e-12);
        // At its own center the normalised stack is exactly 1.
        assert_abs_diff_eq!(est.log_stack, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn interval_stack_overlap_midpoint() {
        // Intervals [0,2], [1,3] overlap on [1,2]; midpoint 1.5.
        let implied = [1.0, 2.0];
        let sigmas = [1.0, 1.0];
        let weights = [1.0, 1.0];
        let est = interval_stack_origin(&implied, &sigmas, &weights, 0.0).unwrap();
        assert_abs_diff_eq!(est.time, 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(est.log_stack, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn interval_stack_prefers_heavier_overlap() {
        // Two disjoint pairs; the right-hand pair carries more weight.
        let implied = [0.0, 0.1, 10.0, 10.1];
        let sigmas = [0.2, 0.2, 0.2, 0.2];
        let weights = [1.0, 1.0, 3.0, 3.0];
        let est = interval_stack_origin(&implied, &sigmas, &weights, 0.0).unwrap();
        assert!(
            (est.time - 10.05).abs() < 0.3,
            "expected right cluster, got {}",
            est.time
        );
    }

    #[test]
    fn interval_stack_widening_merges_clusters() {
        // Without widening the two tight pairs are separate; a large
        // half_extra merges everything into one broad interval.
        let implied = [0.0, 0.2, 1.0, 1.2];
        let sigmas = [0.05, 0.05, 0.05, 0.05];
        let weights = [1.0, 1.0, 1.0, 1.0];
        let narrow = interval_stack_origin(&implied, &sigmas, &weights, 0.0).unwrap();
        let wide = interval_stack_origin(&implied, &sigmas, &weights, 2.0).unwrap();
        assert!(wide.variance > narrow.variance);
        assert_abs_diff_eq!(wide.log_stack, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_inputs_are_none() {
        assert!(ml_origin(&[], &[]).is_none());
        assert!(gaussian_stack_origin(&[], &[], &[]).is_none());
        assert!(interval_stack_origin(&[], &[], &[], 0.0).is_none());
    }
}
