//! Location quality metrics: residual RMS, azimuthal coverage, distances.

use std::collections::BTreeMap;

use poseidon_event::{Arrival, Point3, Station};
use serde::Serialize;

/// Summary quality metrics for one located event.
#[derive(Debug, Clone, Serialize)]
pub struct QualityMetrics {
    /// Weighted RMS of the final residuals (s).
    pub rms: f64,
    /// Largest azimuthal gap between used stations (degrees).
    pub azimuth_gap: f64,
    /// Largest azimuthal gap left when any single used station is removed
    /// (degrees); less sensitive to one lucky station than the primary gap.
    pub secondary_azimuth_gap: f64,
    /// Closest used station epicentral distance (km).
    pub min_distance: f64,
    /// Farthest used station epicentral distance (km).
    pub max_distance: f64,
    /// Median used station epicentral distance (km).
    pub median_distance: f64,
    /// Arrivals offered to the run.
    pub n_arrivals: usize,
    /// Arrivals carrying a final residual.
    pub n_used: usize,
}

/// Computes the quality metrics of a confirmed location.
///
/// Only arrivals that received a predicted travel time in the final
/// evaluation count as used; gap and distance metrics collapse to their
/// worst values (360°, zero distances) when fewer than two stations were
/// used.
pub fn quality_metrics(
    hypocenter: Point3,
    arrivals: &[Arrival],
    stations: &BTreeMap<String, Station>,
) -> QualityMetrics {
    let mut w_sum = 0.0;
    let mut wr_sq = 0.0;
    let mut azimuths = Vec::new();
    let mut distances = Vec::new();
    let mut seen = std::collections::BTreeSet::new();
    let mut n_used = 0usize;

    for a in arrivals {
        if a.pred_travel_time.is_none() {
            continue;
        }
        n_used += 1;
        let w = a.weight.max(0.0);
        w_sum += w;
        wr_sq += w * a.residual * a.residual;

        let Some(sta) = stations.get(&a.station) else {
            continue;
        };
        // One vote per station, whatever the phase count.
        if seen.insert(a.station.as_str()) {
            azimuths.push(hypocenter.azimuth_to(&sta.position()));
            distances.push(hypocenter.epicentral_distance(&sta.position()));
        }
    }

    let rms = if w_sum > 0.0 {
        (wr_sq / w_sum).sqrt()
    } else {
        0.0
    };
    let (azimuth_gap, secondary_azimuth_gap) = azimuth_gaps(&mut azimuths);
    distances.sort_by(f64::total_cmp);
    let (min_distance, max_distance, median_distance) = if distances.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        let n = distances.len();
        let median = if n % 2 == 1 {
            distances[n / 2]
        } else {
            (distances[n / 2 - 1] + distances[n / 2]) / 2.0
        };
        (distances[0], distances[n - 1], median)
    };

    QualityMetrics {
        rms,
        azimuth_gap,
        secondary_azimuth_gap,
        min_distance,
        max_distance,
        median_distance,
        n_arrivals: arrivals.len(),
        n_used,
    }
}

/// Primary and secondary azimuthal gaps from station azimuths (degrees).
fn azimuth_gaps(azimuths: &mut [f64]) -> (f64, f64) {
    let n = azimuths.len();
    if n < 2 {
        return (360.0, 360.0);
    }
    azimuths.sort_by(f64::total_cmp);

    // gap[i] spans from azimuth i to the next one, wrapping at north.
    let gap = |i: usize| -> f64 {
        if i + 1 < n {
            azimuths[i + 1] - azimuths[i]
        } else {
            azimuths[0] + 360.0 - azimuths[n - 1]
        }
    };
    let primary = (0..n).map(gap).fold(0.0, f64::max);

    if n < 3 {
        return (primary, 360.0);
    }
    // Removing station i merges the gaps on either side of it.
    let secondary = (0..n)
        .map(|i| gap(i) + gap((i + n - 1) % n))
        .fold(0.0, f64::max);
    (primary, secondary)
}
