//! Per-run station residual statistics.
//!
//! One [`StationStats`] context belongs to one run (or one batch), is
//! updated only from confirmed final evaluations, and is returned with the
//! result; there is no process-wide state.

use std::collections::BTreeMap;

use poseidon_event::Arrival;
use serde::Serialize;

/// Accumulated residual statistics for one station/phase pair.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResidualStats {
    /// Residuals recorded.
    pub count: usize,
    /// Sum of recording weights.
    pub weight_sum: f64,
    /// Smallest residual seen (s).
    pub min: f64,
    /// Largest residual seen (s).
    pub max: f64,
    /// Weighted residual sum (s).
    pub sum: f64,
    /// Weighted sum of squared residuals (s²).
    pub sq_sum: f64,
}

impl ResidualStats {
    fn new() -> Self {
        Self {
            count: 0,
            weight_sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            sq_sum: 0.0,
        }
    }

    fn record(&mut self, residual: f64, weight: f64) {
        self.count += 1;
        self.weight_sum += weight;
        self.min = self.min.min(residual);
        self.max = self.max.max(residual);
        self.sum += weight * residual;
        self.sq_sum += weight * residual * residual;
    }

    /// Weighted mean residual (s).
    pub fn mean(&self) -> f64 {
        if self.weight_sum > 0.0 {
            self.sum / self.weight_sum
        } else {
            0.0
        }
    }

    /// Weighted residual standard deviation (s).
    pub fn std_dev(&self) -> f64 {
        if self.weight_sum > 0.0 {
            let mean = self.mean();
            (self.sq_sum / self.weight_sum - mean * mean).max(0.0).sqrt()
        } else {
            0.0
        }
    }
}

/// Residual statistics keyed by station, then phase.
///
/// Feeding several events into one context accumulates across them, which
/// is how batch runs derive per-station time corrections for a relocation
/// pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StationStats {
    stations: BTreeMap<String, BTreeMap<String, ResidualStats>>,
}

impl StationStats {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one confirmed residual.
    pub fn record(&mut self, station: &str, phase: &str, residual: f64, weight: f64) {
        self.stations
            .entry(station.to_string())
            .or_default()
            .entry(phase.to_string())
            .or_insert_with(ResidualStats::new)
            .record(residual, weight);
    }

    /// Records every arrival that carries a final residual (a predicted
    /// travel time from the confirmed evaluation).
    pub fn record_final(&mut self, arrivals: &[Arrival]) {
        for a in arrivals {
            if a.pred_travel_time.is_some() {
                self.record(&a.station, &a.phase, a.residual, a.weight.max(0.0));
            }
        }
    }

    /// Statistics for one station/phase pair, if recorded.
    pub fn get(&self, station: &str, phase: &str) -> Option<&ResidualStats> {
        self.stations.get(station)?.get(phase)
    }

    /// Number of station/phase pairs recorded.
    pub fn len(&self) -> usize {
        self.stations.values().map(BTreeMap::len).sum()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Iterates (station, phase, stats) in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &ResidualStats)> {
        self.stations.iter().flat_map(|(station, phases)| {
            phases
                .iter()
                .map(move |(phase, stats)| (station.as_str(), phase.as_str(), stats))
        })
    }

    /// Merges another context into this one.
    pub fn merge(&mut self, other: &StationStats) {
        for (station, phase, stats) in other.iter() {
            let entry = self
                .stations
                .entry(station.to_string())
                .or_default()
                .entry(phase.to_string())
                .or_insert_with(ResidualStats::new);
            entry.count += stats.count;
            entry.weight_sum += stats.weight_sum;
            entry.min = entry.min.min(stats.min);
            entry.max = entry.max.max(stats.max);
            entry.sum += stats.sum;
            entry.sq_sum += stats.sq_sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn accumulates_weighted_moments() {
        let mut stats = StationStats::new();
        stats.record("ALPS", "P", 0.2, 1.0);
        stats.record("ALPS", "P", -0.2, 1.0);
        stats.record("ALPS", "S", 0.5, 2.0);

        let p = stats.get("ALPS", "P").unwrap();
        assert_eq!(p.count, 2);
        assert_abs_diff_eq!(p.mean(), 0.0);
        assert_abs_diff_eq!(p.std_dev(), 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(p.min, -0.2);
        assert_abs_diff_eq!(p.max, 0.2);

        let s = stats.get("ALPS", "S").unwrap();
        assert_abs_diff_eq!(s.mean(), 0.5);
        assert_abs_diff_eq!(s.std_dev(), 0.0);

        assert_eq!(stats.len(), 2);
        assert!(stats.get("NOPE", "P").is_none());
    }

    #[test]
    fn record_final_skips_unevaluated_arrivals() {
        let mut a = poseidon_event::Arrival::new("ALPS", "P", 10.0, 0.1).unwrap();
        a.pred_travel_time = Some(3.0);
        a.residual = 0.1;
        a.weight = 2.0;
        let skipped = poseidon_event::Arrival::new("JURA", "P", 11.0, 0.1).unwrap();

        let mut stats = StationStats::new();
        stats.record_final(&[a, skipped]);
        assert_eq!(stats.len(), 1);
        assert!(stats.get("JURA", "P").is_none());
        assert_abs_diff_eq!(stats.get("ALPS", "P").unwrap().mean(), 0.1);
    }

    #[test]
    fn merge_combines_counts() {
        let mut a = StationStats::new();
        a.record("ALPS", "P", 0.1, 1.0);
        let mut b = StationStats::new();
        b.record("ALPS", "P", 0.3, 1.0);
        b.record("JURA", "P", -0.2, 1.0);

        a.merge(&b);
        let p = a.get("ALPS", "P").unwrap();
        assert_eq!(p.count, 2);
        assert_abs_diff_eq!(p.mean(), 0.2, epsilon = 1e-12);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn iterates_in_sorted_order() {
        let mut stats = StationStats::new();
        stats.record("JURA", "P", 0.0, 1.0);
        stats.record("ALPS", "S", 0.0, 1.0);
        stats.record("ALPS", "P", 0.0, 1.0);
        let keys: Vec<(String, String)> = stats
            .iter()
            .map(|(s, p, _)| (s.to_string(), p.to_string()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("ALPS".to_string(), "P".to_string()),
                ("ALPS".to_string(), "S".to_string()),
                ("JURA".to_string(), "P".to_string()),
            ]
        );
    }
}
