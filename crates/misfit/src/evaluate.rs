//! The pluggable misfit evaluator.

use std::collections::BTreeMap;
use std::str::FromStr;

use poseidon_event::{Arrival, Point3, Station, TravelTimeModel};
use tracing::trace;

use crate::error::MisfitError;
use crate::otime;
use crate::params::GaussianParams;
use crate::weights::WeightContext;

/// Sentinel log-quality for candidates that could not be evaluated.
///
/// Search drivers compare against this through [`Evaluation::is_usable`];
/// degenerate candidates are skipped or penalised, never propagated as
/// errors through the search loop.
pub const UNUSABLE_LOG_QUALITY: f64 = -1.0e30;

/// Upper clip on a single pair's exponent in the EDT_BOX method (≈4 sigma);
/// bounds any one outlier pair's contribution to the misfit.
const EDT_BOX_EXPONENT_MAX: f64 = 8.0;

/// Statistical formulation used to score a candidate location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Classical Gaussian weighted least squares on absolute residuals;
    /// analytic origin time.
    GauAnalytic,
    /// Same quadratic form with per-arrival normalisation; diagnostic
    /// variant.
    GauTest,
    /// Pairwise equal-differential-time misfit; origin-time independent,
    /// O(n²) in arrival count.
    Edt,
    /// EDT with each pair's exponent clipped; robust against outlier pairs.
    EdtBox,
    /// Robust absolute-residual misfit.
    L1Norm,
    /// Maximum-likelihood origin time from a Gaussian per-arrival stack.
    MlOt,
    /// Interval origin-time stack widened by the cell time spread.
    OtStack,
}

impl Method {
    /// Canonical lower-case name, accepted by `FromStr`.
    pub fn name(&self) -> &'static str {
        match self {
            Method::GauAnalytic => "gau_analytic",
            Method::GauTest => "gau_test",
            Method::Edt => "edt",
            Method::EdtBox => "edt_box",
            Method::L1Norm => "l1_norm",
            Method::MlOt => "ml_ot",
            Method::OtStack => "ot_stack",
        }
    }
}

impl FromStr for Method {
    type Err = MisfitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gau_analytic" => Ok(Method::GauAnalytic),
            "gau_test" => Ok(Method::GauTest),
            "edt" => Ok(Method::Edt),
            "edt_box" => Ok(Method::EdtBox),
            "l1_norm" => Ok(Method::L1Norm),
            "ml_ot" => Ok(Method::MlOt),
            "ot_stack" => Ok(Method::OtStack),
            _ => Err(MisfitError::UnknownMethod {
                name: s.to_string(),
            }),
        }
    }
}

/// Result of scoring one candidate location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Log-likelihood-like quality, to maximise.
    pub log_quality: f64,
    /// Scalar misfit, to minimise. For `GauAnalytic` this is the weighted
    /// mean squared residual (RMS²).
    pub misfit: f64,
    /// Estimated origin time (epoch seconds).
    pub origin_time: f64,
    /// Variance of the origin-time estimate (s²).
    pub origin_time_var: f64,
    /// Number of arrivals that entered this evaluation.
    pub n_used: usize,
}

impl Evaluation {
    /// The sentinel returned for unevaluable candidates.
    pub fn unusable() -> Self {
        Self {
            log_quality: UNUSABLE_LOG_QUALITY,
            misfit: f64::MAX,
            origin_time: 0.0,
            origin_time_var: 0.0,
            n_used: 0,
        }
    }

    /// True unless this is the unusable sentinel.
    pub fn is_usable(&self) -> bool {
        self.log_quality > UNUSABLE_LOG_QUALITY / 2.0
    }
}

/// Scalar quality function over candidate locations.
///
/// `cell_time_spread` is the half width (s) of the time uncertainty induced
/// by the spatial extent of the cell being evaluated; searches over point
/// candidates pass 0.
pub trait Evaluator {
    /// Scores a candidate location.
    fn evaluate(&mut self, point: Point3, cell_time_spread: f64) -> Evaluation;
}

/// The production evaluator: travel-time refresh, weight matrix, and the
/// per-method quality computations.
///
/// Holds the run's arrivals mutably; search-pass evaluations leave them
/// untouched apart from internal scratch, while [`evaluate_final`] writes
/// the confirmed residuals back for downstream statistics.
///
/// [`evaluate_final`]: MisfitEvaluator::evaluate_final
pub struct MisfitEvaluator<'a> {
    method: Method,
    params: GaussianParams,
    model: &'a dyn TravelTimeModel,
    stations: &'a BTreeMap<String, Station>,
    arrivals: &'a mut [Arrival],
    weights: WeightContext,
    ref_epoch: f64,
    /// Centered observed times, one per weight-context row.
    obs_c: Vec<f64>,
    /// Per-row activity for the current evaluation.
    active: Vec<bool>,
    /// Per-row predicted travel times for the current evaluation.
    pred: Vec<f64>,
    n_evaluations: u64,
}

impl<'a> MisfitEvaluator<'a> {
    /// Builds an evaluator for one location run.
    ///
    /// The weight matrix depends only on station geometry and sigmas, so it
    /// is constructed here once. Row weights are written back into the
    /// arrivals; arrivals excluded from the context get weight 0.
    ///
    /// # Errors
    ///
    /// Returns [`MisfitError::DegenerateWeights`] when the run as a whole
    /// cannot be evaluated (too few usable arrivals, singular weights).
    pub fn new(
        method: Method,
        params: GaussianParams,
        model: &'a dyn TravelTimeModel,
        stations: &'a BTreeMap<String, Station>,
        arrivals: &'a mut [Arrival],
    ) -> Result<Self, MisfitError> {
        let weights = WeightContext::build(arrivals, stations, &params)?;

        for a in arrivals.iter_mut() {
            a.weight = 0.0;
            a.reset_evaluation();
        }
        for (row, &idx) in weights.indices().iter().enumerate() {
            arrivals[idx].weight = weights.row_weights()[row];
        }

        let ref_epoch = weights
            .indices()
            .iter()
            .map(|&i| arrivals[i].time_obs)
            .fold(f64::INFINITY, f64::min);
        let obs_c: Vec<f64> = weights
            .indices()
            .iter()
            .map(|&i| arrivals[i].time_obs - ref_epoch)
            .collect();

        let n = weights.len();
        Ok(Self {
            method,
            params,
            model,
            stations,
            arrivals,
            weights,
            ref_epoch,
            obs_c,
            active: vec![false; n],
            pred: vec![0.0; n],
            n_evaluations: 0,
        })
    }

    /// The reference epoch subtracted from all times (earliest usable
    /// observed time).
    pub fn ref_epoch(&self) -> f64 {
        self.ref_epoch
    }

    /// The per-run weight context.
    pub fn weights(&self) -> &WeightContext {
        &self.weights
    }

    /// The selected method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Number of evaluations performed so far.
    pub fn n_evaluations(&self) -> u64 {
        self.n_evaluations
    }

    /// Scores the confirmed best candidate and writes predicted times and
    /// residuals back into the arrivals for statistics updates.
    ///
    /// This is the only evaluation that mutates arrival state visible to
    /// callers; search-pass evaluations deliberately do not.
    pub fn evaluate_final(&mut self, point: Point3) -> Evaluation {
        let ev = self.evaluate(point, 0.0);
        let ot_c = ev.origin_time - self.ref_epoch;
        for a in self.arrivals.iter_mut() {
            a.reset_evaluation();
        }
        for (row, &idx) in self.weights.indices().iter().enumerate() {
            if self.active[row] {
                let a = &mut self.arrivals[idx];
                a.pred_travel_time = Some(self.pred[row]);
                a.residual = self.obs_c[row] - self.pred[row] - ot_c;
            }
        }
        ev
    }

    /// Effective per-arrival sigma, with the travel-time-proportional term
    /// folded in where configured.
    fn effective_sigma(&self, row: usize) -> f64 {
        let a = &self.arrivals[self.weights.indices()[row]];
        match self.params.travel_time_error() {
            Some(tte) => {
                let s_tt = tte.sigma(self.pred[row]);
                (a.sigma * a.sigma + s_tt * s_tt).sqrt()
            }
            None => a.sigma,
        }
    }
}

impl Evaluator for MisfitEvaluator<'_> {
    fn evaluate(&mut self, point: Point3, cell_time_spread: f64) -> Evaluation {
        self.n_evaluations += 1;

        // Refresh predicted travel times; a missing lookup drops the
        // arrival from this evaluation only.
        let mut n_active = 0usize;
        for row in 0..self.weights.len() {
            let a = &self.arrivals[self.weights.indices()[row]];
            let sta = &self.stations[&a.station];
            match self.model.travel_time(sta, &a.phase, point) {
                Some(tt) if tt.is_finite() => {
                    self.pred[row] = tt;
                    self.active[row] = true;
                    n_active += 1;
                }
                _ => {
                    self.pred[row] = 0.0;
                    self.active[row] = false;
                }
            }
        }
        if n_active < self.params.min_arrivals() {
            trace!(n_active, "candidate unevaluable: too few travel times");
            return Evaluation::unusable();
        }

        // Gather active rows.
        let rows: Vec<usize> = (0..self.weights.len()).filter(|&r| self.active[r]).collect();
        let implied: Vec<f64> = rows.iter().map(|&r| self.obs_c[r] - self.pred[r]).collect();
        let w: Vec<f64> = rows
            .iter()
            .map(|&r| self.weights.row_weights()[r].max(0.0))
            .collect();

        let Some(est) = otime::ml_origin(&implied, &w) else {
            return Evaluation::unusable();
        };
        let wsum: f64 = w.iter().sum();

        let ev = match self.method {
            Method::GauAnalytic | Method::GauTest => {
                let res: Vec<f64> = implied.iter().map(|t| t - est.time).collect();
                let mut quad = 0.0;
                for (a, &ra) in rows.iter().enumerate() {
                    for (b, &rb) in rows.iter().enumerate() {
                        quad += self.weights.weight(ra, rb) * res[a] * res[b];
                    }
                }
                let quad = quad.max(0.0);
                let (misfit, log_quality) = match self.method {
                    Method::GauAnalytic => (quad / wsum, -0.5 * quad),
                    _ => (quad / n_active as f64, -0.5 * quad * n_active as f64 / wsum),
                };
                Evaluation {
                    log_quality,
                    misfit,
                    origin_time: self.ref_epoch + est.time,
                    origin_time_var: est.variance,
                    n_used: n_active,
                }
            }
            Method::L1Norm => {
                let sum_abs: f64 = implied
                    .iter()
                    .zip(&w)
                    .map(|(t, wi)| wi * (t - est.time).abs())
                    .sum();
                Evaluation {
                    log_quality: -sum_abs,
                    misfit: sum_abs / wsum,
                    origin_time: self.ref_epoch + est.time,
                    origin_time_var: est.variance,
                    n_used: n_active,
                }
            }
            Method::Edt | Method::EdtBox => {
                let sig: Vec<f64> = rows.iter().map(|&r| self.effective_sigma(r)).collect();
                let spread_sq = cell_time_spread * cell_time_spread;
                let mut acc = 0.0;
                let mut wacc = 0.0;
                for a in 0..rows.len() {
                    for b in (a + 1)..rows.len() {
                        let dt = implied[a] - implied[b];
                        let var = sig[a] * sig[a] + sig[b] * sig[b] + spread_sq;
                        let w_pair = w[a] * w[b];
                        let mut exponent = 0.5 * dt * dt / var;
                        if self.method == Method::EdtBox {
                            exponent = exponent.min(EDT_BOX_EXPONENT_MAX);
                        }
                        acc += w_pair * (-exponent).exp();
                        wacc += w_pair;
                    }
                }
                if !(wacc > 0.0) {
                    return Evaluation::unusable();
                }
                let stack = (acc / wacc).max(f64::MIN_POSITIVE);
                Evaluation {
                    log_quality: n_active as f64 * stack.ln(),
                    misfit: -stack.ln(),
                    origin_time: self.ref_epoch + est.time,
                    origin_time_var: est.variance,
                    n_used: n_active,
                }
            }
            Method::MlOt => {
                let spread_sq = cell_time_spread * cell_time_spread;
                let sig: Vec<f64> = rows
                    .iter()
                    .map(|&r| {
                        let s = self.effective_sigma(r);
                        (s * s + spread_sq).sqrt()
                    })
                    .collect();
                let Some(stack_est) = otime::gaussian_stack_origin(&implied, &sig, &w) else {
                    return Evaluation::unusable();
                };
                Evaluation {
                    log_quality: n_active as f64 * stack_est.log_stack,
                    misfit: -stack_est.log_stack,
                    origin_time: self.ref_epoch + stack_est.time,
                    origin_time_var: stack_est.variance,
                    n_used: n_active,
                }
            }
            Method::OtStack => {
                let sig: Vec<f64> = rows.iter().map(|&r| self.effective_sigma(r)).collect();
                let Some(stack_est) =
                    otime::interval_stack_origin(&implied, &sig, &w, cell_time_spread)
                else {
                    return Evaluation::unusable();
                };
                Evaluation {
                    log_quality: n_active as f64 * stack_est.log_stack,
                    misfit: -stack_est.log_stack,
                    origin_time: self.ref_epoch + stack_est.time,
                    origin_time_var: stack_est.variance,
                    n_used: n_active,
                }
            }
        };

        if ev.log_quality.is_finite() {
            ev
        } else {
            Evaluation::unusable()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use poseidon_event::HomogeneousModel;

    const TRUE_POINT: Point3 = Point3 {
        x: 2.0,
        y: -3.0,
        z: 8.0,
    };
    const TRUE_OTIME: f64 = 1000.0;

    fn stations() -> BTreeMap<String, Station> {
        [
            Station::new("N", 0.0, 20.0, 0.0),
            Station::new("E", 25.0, 0.0, 0.0),
            Station::new("S", 0.0, -22.0, 0.0),
            Station::new("W", -18.0, 0.0, 0.0),
        ]
        .into_iter()
        .map(|s| (s.label.clone(), s))
        .collect()
    }

    fn model() -> HomogeneousModel {
        HomogeneousModel::new(5.0, 5.0 / 1.73)
    }

    /// Noise-free arrivals for the known hypocenter, with optional
    /// per-arrival time offsets.
    fn synthetic_arrivals(offsets: &[f64]) -> Vec<Arrival> {
        let stations = stations();
        let model = model();
        stations
            .values()
            .zip(offsets)
            .map(|(sta, &off)| {
                let tt = model.travel_time(sta, "P", TRUE_POINT).unwrap();
                Arrival::new(sta.label.clone(), "P", TRUE_OTIME + tt + off, 0.1).unwrap()
            })
            .collect()
    }

    #[test]
    fn gau_perfect_fit_is_zero_misfit() {
        let stations = stations();
        let model = model();
        let mut arrivals = synthetic_arrivals(&[0.0; 4]);
        let mut ev = MisfitEvaluator::new(
            Method::GauAnalytic,
            GaussianParams::new(0.0),
            &model,
            &stations,
            &mut arrivals,
        )
        .unwrap();
        let e = ev.evaluate(TRUE_POINT, 0.0);
        assert!(e.is_usable());
        assert_abs_diff_eq!(e.misfit, 0.0, epsilon = 1e-16);
        assert_abs_diff_eq!(e.origin_time, TRUE_OTIME, epsilon = 1e-9);
        assert_eq!(e.n_used, 4);
    }

    #[test]
    fn gau_diagonal_equal_weights_reduces_to_rms() {
        // sigma_time = 0 and equal sigmas give a diagonal equal-weight
        // matrix; the GAU_ANALYTIC misfit must equal the classical mean
        // squared residual.
        let stations = stations();
        let model = model();
        let offsets = [0.04, -0.02, 0.01, -0.03];
        let mut arrivals = synthetic_arrivals(&offsets);
        let mut ev = MisfitEvaluator::new(
            Method::GauAnalytic,
            GaussianParams::new(0.0),
            &model,
            &stations,
            &mut arrivals,
        )
        .unwrap();
        let e = ev.evaluate(TRUE_POINT, 0.0);

        let mean: f64 = offsets.iter().sum::<f64>() / 4.0;
        let rms_sq: f64 = offsets.iter().map(|o| (o - mean) * (o - mean)).sum::<f64>() / 4.0;
        assert_abs_diff_eq!(e.misfit, rms_sq, epsilon = 1e-10);
    }

    #[test]
    fn origin_time_invariant_under_epoch_shift() {
        let stations = stations();
        let model = model();
        for method in [
            Method::GauAnalytic,
            Method::L1Norm,
            Method::MlOt,
            Method::OtStack,
        ] {
            let mut base = synthetic_arrivals(&[0.03, -0.01, 0.02, 0.0]);
            let mut shifted = base.clone();
            let delta = 86_400.0 * 365.0;
            for a in shifted.iter_mut() {
                a.time_obs += delta;
            }

            let mut ev_a = MisfitEvaluator::new(
                method,
                GaussianParams::new(0.1),
                &model,
                &stations,
                &mut base,
            )
            .unwrap();
            let mut ev_b = MisfitEvaluator::new(
                method,
                GaussianParams::new(0.1),
                &model,
                &stations,
                &mut shifted,
            )
            .unwrap();
            let a = ev_a.evaluate(TRUE_POINT, 0.0);
            let b = ev_b.evaluate(TRUE_POINT, 0.0);
            assert_abs_diff_eq!(b.origin_time - a.origin_time, delta, epsilon = 1e-6);
            assert_abs_diff_eq!(a.log_quality, b.log_quality, epsilon = 1e-9);
        }
    }

    #[test]
    fn all_methods_prefer_the_true_point() {
        let stations = stations();
        let model = model();
        let far = Point3::new(12.0, 9.0, 2.0);
        for method in [
            Method::GauAnalytic,
            Method::GauTest,
            Method::Edt,
            Method::EdtBox,
            Method::L1Norm,
            Method::MlOt,
            Method::OtStack,
        ] {
            let mut arrivals = synthetic_arrivals(&[0.0; 4]);
            let mut ev = MisfitEvaluator::new(
                method,
                GaussianParams::new(0.05),
                &model,
                &stations,
                &mut arrivals,
            )
            .unwrap();
            let at_true = ev.evaluate(TRUE_POINT, 0.0);
            let at_far = ev.evaluate(far, 0.0);
            assert!(at_true.is_usable(), "{method:?} unusable at true point");
            assert!(
                at_true.log_quality > at_far.log_quality,
                "{method:?}: true point not preferred ({} <= {})",
                at_true.log_quality,
                at_far.log_quality
            );
        }
    }

    #[test]
    fn missing_travel_times_yield_sentinel() {
        struct NoModel;
        impl TravelTimeModel for NoModel {
            fn travel_time(&self, _: &Station, _: &str, _: Point3) -> Option<f64> {
                None
            }
        }
        let stations = stations();
        let mut arrivals = synthetic_arrivals(&[0.0; 4]);
        let model = NoModel;
        let mut ev = MisfitEvaluator::new(
            Method::GauAnalytic,
            GaussianParams::new(0.1),
            &model,
            &stations,
            &mut arrivals,
        )
        .unwrap();
        let e = ev.evaluate(TRUE_POINT, 0.0);
        assert!(!e.is_usable());
        assert_eq!(ev.n_evaluations(), 1);
    }

    #[test]
    fn search_pass_does_not_mutate_arrivals() {
        let stations = stations();
        let model = model();
        let mut arrivals = synthetic_arrivals(&[0.0; 4]);
        let mut ev = MisfitEvaluator::new(
            Method::GauAnalytic,
            GaussianParams::new(0.1),
            &model,
            &stations,
            &mut arrivals,
        )
        .unwrap();
        ev.evaluate(TRUE_POINT, 0.0);
        ev.evaluate(Point3::new(5.0, 5.0, 5.0), 0.0);
        // Residual write-back only happens on evaluate_final.
        assert!(ev.arrivals.iter().all(|a| a.pred_travel_time.is_none()));

        let e = ev.evaluate_final(TRUE_POINT);
        assert!(e.is_usable());
        assert!(ev.arrivals.iter().all(|a| a.pred_travel_time.is_some()));
        for a in ev.arrivals.iter() {
            assert_abs_diff_eq!(a.residual, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn too_few_arrivals_fails_construction() {
        let stations = stations();
        let model = model();
        let mut arrivals = synthetic_arrivals(&[0.0; 4]);
        arrivals.truncate(2);
        let err = MisfitEvaluator::new(
            Method::GauAnalytic,
            GaussianParams::new(0.1),
            &model,
            &stations,
            &mut arrivals,
        )
        .err()
        .unwrap();
        assert!(matches!(err, MisfitError::DegenerateWeights { .. }));
    }

    #[test]
    fn edt_box_bounds_outlier_influence() {
        // With one wildly wrong arrival, the clipped variant keeps a higher
        // (less penalised) quality than plain EDT.
        let stations = stations();
        let model = model();
        let offsets = [0.0, 0.0, 0.0, 30.0];
        let mut a1 = synthetic_arrivals(&offsets);
        let mut a2 = a1.clone();
        let mut edt = MisfitEvaluator::new(
            Method::Edt,
            GaussianParams::new(0.05),
            &model,
            &stations,
            &mut a1,
        )
        .unwrap();
        let mut edt_box = MisfitEvaluator::new(
            Method::EdtBox,
            GaussianParams::new(0.05),
            &model,
            &stations,
            &mut a2,
        )
        .unwrap();
        let plain = edt.evaluate(TRUE_POINT, 0.0);
        let boxed = edt_box.evaluate(TRUE_POINT, 0.0);
        assert!(boxed.log_quality > plain.log_quality);
    }

    #[test]
    fn cell_time_spread_softens_edt() {
        let stations = stations();
        let model = model();
        let mut arrivals = synthetic_arrivals(&[0.1, -0.1, 0.05, -0.05]);
        let mut ev = MisfitEvaluator::new(
            Method::Edt,
            GaussianParams::new(0.05),
            &model,
            &stations,
            &mut arrivals,
        )
        .unwrap();
        let tight = ev.evaluate(TRUE_POINT, 0.0);
        let loose = ev.evaluate(TRUE_POINT, 1.0);
        assert!(loose.misfit < tight.misfit);
    }

    #[test]
    fn method_parsing_round_trips() {
        for m in [
            Method::GauAnalytic,
            Method::GauTest,
            Method::Edt,
            Method::EdtBox,
            Method::L1Norm,
            Method::MlOt,
            Method::OtStack,
        ] {
            assert_eq!(m.name().parse::<Method>().unwrap(), m);
        }
        assert!("EDT".parse::<Method>().is_ok());
        assert!(matches!(
            "nope".parse::<Method>().unwrap_err(),
            MisfitError::UnknownMethod { .. }
        ));
    }

    #[test]
    fn unusable_sentinel_properties() {
        let e = Evaluation::unusable();
        assert!(!e.is_usable());
        assert_eq!(e.log_quality, UNUSABLE_LOG_QUALITY);
        assert_eq!(e.n_used, 0);
    }
}
