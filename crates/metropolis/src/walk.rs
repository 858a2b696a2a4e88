//! The Metropolis-Gibbs random walk itself.

use poseidon_event::{CancelFlag, Point3, SearchRegion};
use poseidon_misfit::{Evaluation, Evaluator};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::{debug, trace};

use crate::config::MetropolisConfig;
use crate::error::MetropolisError;

/// Proposals between step-size adaptations during learning.
const ADAPT_WINDOW: usize = 50;

/// Phase of the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Step size adapts toward the target acceptance rate.
    Learning,
    /// Burn-in; fixed step, nothing saved.
    Equilibrating,
    /// Posterior samples are recorded.
    Sampling,
    /// The sample budget is exhausted.
    Done,
}

/// Snapshot of the walker at one iteration.
#[derive(Debug, Clone, Copy)]
pub struct WalkState {
    /// Current location of the walker.
    pub point: Point3,
    /// Log quality at the current location.
    pub log_quality: f64,
    /// Current Gaussian step size (km).
    pub step: f64,
    /// Current acceptance temperature.
    pub temperature: f64,
    /// Proposals made so far.
    pub proposed: usize,
    /// Proposals accepted so far.
    pub accepted: usize,
    /// Samples saved so far.
    pub n_saved: usize,
}

/// One saved posterior sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Location of the walker when saved.
    pub point: Point3,
    /// Log quality at that location.
    pub log_quality: f64,
}

/// Outcome of a Metropolis search.
#[derive(Debug, Clone)]
pub struct MetropolisResult {
    /// Best location visited by the walk.
    pub best_point: Point3,
    /// Evaluation at the best location.
    pub best_eval: Evaluation,
    /// Posterior samples saved during the sampling phase.
    pub samples: Vec<Sample>,
    /// Step size at the end of the walk (km).
    pub final_step: f64,
    /// Fraction of proposals accepted over the whole walk.
    pub acceptance_rate: f64,
    /// True when the best likelihood stayed below the configured floor,
    /// suggesting the walk never found the probable region.
    pub low_confidence: bool,
    /// Candidate evaluations performed.
    pub n_evaluated: usize,
    /// True when the walk was cancelled before exhausting its budget.
    pub cancelled: bool,
}

/// Returns the phase of iteration `i`.
fn phase_of(i: usize, cfg: &MetropolisConfig) -> Phase {
    if i < cfg.n_learn() {
        Phase::Learning
    } else if i < cfg.n_learn() + cfg.n_equilibrate() {
        Phase::Equilibrating
    } else if i < cfg.n_samples() {
        Phase::Sampling
    } else {
        Phase::Done
    }
}

/// Temperature at iteration `i`: decays linearly from the configured
/// initial value to 1 over the learning phase, then stays at 1.
fn temperature_of(i: usize, cfg: &MetropolisConfig) -> f64 {
    if cfg.n_learn() == 0 || i >= cfg.n_learn() {
        return 1.0;
    }
    let t0 = cfg.initial_temperature();
    let frac = i as f64 / cfg.n_learn() as f64;
    t0 + (1.0 - t0) * frac
}

/// Runs a Metropolis-Gibbs walk over `region`.
///
/// The walker starts at the region centre and proposes isotropic Gaussian
/// steps; proposals outside the region are rejected without evaluation.
/// A proposal with quality `q` over current quality `c` is accepted when
/// `q >= c` or with probability `exp((q - c) / T)`. The step size adapts
/// toward the target acceptance rate during the learning phase and is
/// frozen afterwards.
///
/// Fails with [`MetropolisError::NoUsableCandidate`] when no evaluated
/// point was usable, which usually means too few arrivals survived
/// weighting.
pub fn metropolis_search<R: Rng + ?Sized>(
    region: &SearchRegion,
    cfg: &MetropolisConfig,
    evaluator: &mut dyn Evaluator,
    rng: &mut R,
    cancel: &CancelFlag,
) -> Result<MetropolisResult, MetropolisError> {
    cfg.validate()?;

    let step_init = if cfg.step_init() > 0.0 {
        cfg.step_init()
    } else {
        region.diagonal() / 10.0
    };
    let unit = Normal::new(0.0, 1.0).map_err(|_| MetropolisError::InvalidParameter {
        name: "step_init",
        value: step_init,
    })?;

    let mut state = WalkState {
        point: region.center(),
        log_quality: f64::NEG_INFINITY,
        step: step_init.clamp(cfg.step_min(), cfg.step_max()),
        temperature: cfg.initial_temperature(),
        proposed: 0,
        accepted: 0,
        n_saved: 0,
    };

    let mut n_evaluated = 0usize;
    let current = evaluator.evaluate(state.point, 0.0);
    n_evaluated += 1;
    let mut current_usable = current.is_usable();
    if current_usable {
        state.log_quality = current.log_quality;
    }

    let mut best_eval = current;
    let mut best_point = state.point;
    let mut have_best = current_usable;

    let mut samples = Vec::new();
    let mut window_proposed = 0usize;
    let mut window_accepted = 0usize;
    let mut cancelled = false;
    let mut phase = phase_of(0, cfg);

    for i in 0..cfg.n_samples() {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }

        let next_phase = phase_of(i, cfg);
        if next_phase != phase {
            debug!(
                iteration = i,
                ?next_phase,
                step = state.step,
                acceptance = acceptance(&state),
                "phase transition"
            );
            phase = next_phase;
        }
        state.temperature = temperature_of(i, cfg);

        let proposal = Point3::new(
            state.point.x + state.step * unit.sample(rng),
            state.point.y + state.step * unit.sample(rng),
            state.point.z + state.step * unit.sample(rng),
        );
        state.proposed += 1;
        window_proposed += 1;

        if region.contains(&proposal) {
            let eval = evaluator.evaluate(proposal, 0.0);
            n_evaluated += 1;

            if eval.is_usable() {
                let accept = if !current_usable {
                    true
                } else if eval.log_quality >= state.log_quality {
                    true
                } else {
                    let ratio = (eval.log_quality - state.log_quality) / state.temperature;
                    ratio.exp() > rng.random::<f64>()
                };
                if accept {
                    state.point = proposal;
                    state.log_quality = eval.log_quality;
                    current_usable = true;
                    state.accepted += 1;
                    window_accepted += 1;
                }
                if !have_best || eval.log_quality > best_eval.log_quality {
                    best_eval = eval;
                    best_point = proposal;
                    have_best = true;
                }
            }
        }

        if phase == Phase::Learning && window_proposed >= ADAPT_WINDOW {
            let rate = window_accepted as f64 / window_proposed as f64;
            if rate > cfg.target_acceptance() {
                state.step *= cfg.step_factor();
            } else {
                state.step /= cfg.step_factor();
            }
            state.step = state.step.clamp(cfg.step_min(), cfg.step_max());
            trace!(iteration = i, rate, step = state.step, "step adapted");
            window_proposed = 0;
            window_accepted = 0;
        }

        if phase == Phase::Sampling
            && current_usable
            && i >= cfg.save_start()
            && (i - cfg.save_start()) % cfg.save_skip() == 0
        {
            samples.push(Sample {
                point: state.point,
                log_quality: state.log_quality,
            });
            state.n_saved += 1;
        }
    }

    if !have_best {
        return Err(MetropolisError::NoUsableCandidate { n_evaluated });
    }

    let low_confidence = best_eval.log_quality < cfg.prob_min().ln();
    let acceptance_rate = acceptance(&state);
    debug!(
        n_evaluated,
        n_saved = state.n_saved,
        acceptance_rate,
        final_step = state.step,
        low_confidence,
        cancelled,
        "walk finished"
    );

    Ok(MetropolisResult {
        best_point,
        best_eval,
        samples,
        final_step: state.step,
        acceptance_rate,
        low_confidence,
        n_evaluated,
        cancelled,
    })
}

fn acceptance(state: &WalkState) -> f64 {
    if state.proposed == 0 {
        0.0
    } else {
        state.accepted as f64 / state.proposed as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use poseidon_misfit::UNUSABLE_LOG_QUALITY;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Bump {
        peak: Point3,
        scale: f64,
        n_evals: usize,
    }

    impl Evaluator for Bump {
        fn evaluate(&mut self, point: Point3, _spread: f64) -> Evaluation {
            self.n_evals += 1;
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
        SearchRegion::new(Point3::new(-50.0, -50.0, 0.0), [100.0, 100.0, 40.0]).unwrap()
    }

    fn bump() -> Bump {
        Bump {
            peak: Point3::new(12.0, -7.0, 9.0),
            scale: 3.0,
            n_evals: 0,
        }
    }

    #[test]
    fn converges_near_the_peak() {
        let mut ev = bump();
        let mut rng = StdRng::seed_from_u64(7);
        let result = metropolis_search(
            &region(),
            &MetropolisConfig::new(20_000),
            &mut ev,
            &mut rng,
            &CancelFlag::new(),
        )
        .unwrap();
        assert!(result.best_point.distance(&ev.peak) < 1.0);
        assert!(!result.samples.is_empty());
        assert!(!result.cancelled);
        // Saved samples cluster around the peak.
        let mean_d: f64 = result
            .samples
            .iter()
            .map(|s| s.point.distance(&ev.peak))
            .sum::<f64>()
            / result.samples.len() as f64;
        assert!(mean_d < 10.0, "mean sample distance {mean_d}");
    }

    #[test]
    fn step_adapts_toward_target_acceptance() {
        let mut ev = bump();
        let mut rng = StdRng::seed_from_u64(11);
        let cfg = MetropolisConfig::new(30_000)
            .with_learn(10_000)
            .with_step_init(40.0);
        let result =
            metropolis_search(&region(), &cfg, &mut ev, &mut rng, &CancelFlag::new()).unwrap();
        // A 40 km step on a 3 km wide peak rejects nearly everything; the
        // learning phase must shrink it.
        assert!(result.final_step < 40.0);
        assert!(result.acceptance_rate > 0.1, "rate {}", result.acceptance_rate);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let cfg = MetropolisConfig::new(5_000);
        let run = |seed: u64| {
            let mut ev = bump();
            let mut rng = StdRng::seed_from_u64(seed);
            metropolis_search(&region(), &cfg, &mut ev, &mut rng, &CancelFlag::new()).unwrap()
        };
        let a = run(42);
        let b = run(42);
        assert_abs_diff_eq!(a.best_point.distance(&b.best_point), 0.0);
        assert_eq!(a.samples.len(), b.samples.len());
        assert_eq!(a.n_evaluated, b.n_evaluated);
        let c = run(43);
        assert!(a.best_point.distance(&c.best_point) > 0.0 || a.n_evaluated != c.n_evaluated);
    }

    #[test]
    fn out_of_region_proposals_are_not_evaluated() {
        struct InRegionOnly {
            region: SearchRegion,
            inner: Bump,
        }
        impl Evaluator for InRegionOnly {
            fn evaluate(&mut self, point: Point3, spread: f64) -> Evaluation {
                assert!(self.region.contains(&point));
                self.inner.evaluate(point, spread)
            }
        }
        let mut ev = InRegionOnly {
            region: region(),
            inner: bump(),
        };
        let mut rng = StdRng::seed_from_u64(3);
        let cfg = MetropolisConfig::new(2_000).with_step_init(45.0);
        metropolis_search(&region(), &cfg, &mut ev, &mut rng, &CancelFlag::new()).unwrap();
    }

    #[test]
    fn cancellation_stops_the_walk() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut ev = bump();
        let mut rng = StdRng::seed_from_u64(1);
        let result = metropolis_search(
            &region(),
            &MetropolisConfig::new(100_000),
            &mut ev,
            &mut rng,
            &cancel,
        )
        .unwrap();
        assert!(result.cancelled);
        // Only the starting point was evaluated.
        assert_eq!(result.n_evaluated, 1);
    }

    #[test]
    fn unusable_surface_is_an_error() {
        struct Dead;
        impl Evaluator for Dead {
            fn evaluate(&mut self, _point: Point3, _spread: f64) -> Evaluation {
                Evaluation::unusable()
            }
        }
        let mut rng = StdRng::seed_from_u64(5);
        let err = metropolis_search(
            &region(),
            &MetropolisConfig::new(500),
            &mut Dead,
            &mut rng,
            &CancelFlag::new(),
        )
        .unwrap_err();
        assert!(matches!(err, MetropolisError::NoUsableCandidate { .. }));
    }

    #[test]
    fn low_confidence_is_flagged() {
        struct Faint;
        impl Evaluator for Faint {
            fn evaluate(&mut self, _point: Point3, _spread: f64) -> Evaluation {
                Evaluation {
                    log_quality: UNUSABLE_LOG_QUALITY / 4.0,
                    misfit: 1.0e6,
                    origin_time: 0.0,
                    origin_time_var: 0.0,
                    n_used: 4,
                }
            }
        }
        let mut rng = StdRng::seed_from_u64(9);
        let result = metropolis_search(
            &region(),
            &MetropolisConfig::new(500),
            &mut Faint,
            &mut rng,
            &CancelFlag::new(),
        )
        .unwrap();
        assert!(result.low_confidence);
    }
}
