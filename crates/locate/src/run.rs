//! Driving one location run end to end.

use std::collections::BTreeMap;

use poseidon_event::{Arrival, CancelFlag, Point3, SearchRegion, Station, TravelTimeModel};
use poseidon_grid::{grid_search, GridError, Lattice};
use poseidon_metropolis::{metropolis_search, MetropolisError};
use poseidon_misfit::MisfitEvaluator;
use poseidon_octree::{octree_search, OctreeError};
use poseidon_scatter::draw_scatter;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::info;

use crate::config::{LocateConfig, SearchStrategy};
use crate::ellipsoid::ConfidenceEllipsoid;
use crate::error::LocateError;
use crate::hypocenter::{Hypocenter, SearchDiagnostics};
use crate::quality::quality_metrics;
use crate::stats::StationStats;

/// A completed location run.
#[derive(Debug, Clone)]
pub struct Located {
    /// The located hypocenter with uncertainty and quality.
    pub hypocenter: Hypocenter,
    /// Posterior scatter cloud.
    pub scatter: Vec<Point3>,
    /// Per-station residual statistics from the final evaluation.
    pub station_stats: StationStats,
    /// The arrivals with confirmed predicted times and residuals.
    pub arrivals: Vec<Arrival>,
}

struct SearchOutcome {
    best_point: Point3,
    n_evaluated: usize,
    low_confidence: bool,
    cancelled: bool,
    scatter: Vec<Point3>,
}

/// Locates one event.
///
/// Builds the evaluator, drives the configured search strategy over
/// `region`, confirms the winning candidate with a final evaluation that
/// writes residuals back into the arrivals, then derives station
/// statistics, the scatter cloud, the confidence ellipsoid, and quality
/// metrics.
///
/// # Errors
///
/// [`LocateError::NoSolution`] when no valid candidate exists over the
/// entire run; otherwise only configuration and input problems fail.
pub fn locate(
    region: &SearchRegion,
    config: &LocateConfig,
    model: &dyn TravelTimeModel,
    stations: &BTreeMap<String, Station>,
    mut arrivals: Vec<Arrival>,
    cancel: &CancelFlag,
) -> Result<Located, LocateError> {
    config.validate()?;

    let (outcome, final_eval) = {
        let mut evaluator = MisfitEvaluator::new(
            config.method(),
            config.gaussian().clone(),
            model,
            stations,
            &mut arrivals,
        )?;
        let mut rng = StdRng::seed_from_u64(config.seed());

        let outcome = match config.strategy() {
            SearchStrategy::Grid { spacing } => {
                let lattice = Lattice::covering(region, *spacing)?;
                let result = match grid_search(&[lattice], &mut evaluator, true, cancel) {
                    Ok(r) => r,
                    Err(GridError::NoUsableCandidate { n_evaluated }) => {
                        return Err(LocateError::NoSolution { n_evaluated })
                    }
                    Err(e) => return Err(e.into()),
                };
                let cells = result.scatter_cells();
                let scatter = draw_scatter(&cells, config.n_scatter(), &mut rng)?;
                SearchOutcome {
                    best_point: result.best_point,
                    n_evaluated: result.n_evaluated,
                    low_confidence: false,
                    cancelled: result.cancelled,
                    scatter,
                }
            }
            SearchStrategy::Metropolis(cfg) => {
                let result =
                    match metropolis_search(region, cfg, &mut evaluator, &mut rng, cancel) {
                        Ok(r) => r,
                        Err(MetropolisError::NoUsableCandidate { n_evaluated }) => {
                            return Err(LocateError::NoSolution { n_evaluated })
                        }
                        Err(e) => return Err(e.into()),
                    };
                let scatter = subsample(&result.samples, config.n_scatter());
                SearchOutcome {
                    best_point: result.best_point,
                    n_evaluated: result.n_evaluated,
                    low_confidence: result.low_confidence,
                    cancelled: result.cancelled,
                    scatter,
                }
            }
            SearchStrategy::Octree(cfg) => {
                let result = match octree_search(region, cfg, &mut evaluator, stations, cancel)
                {
                    Ok(r) => r,
                    Err(OctreeError::NoUsableCandidate { n_evaluated }) => {
                        return Err(LocateError::NoSolution { n_evaluated })
                    }
                    Err(e) => return Err(e.into()),
                };
                let cells = result.scatter_cells();
                let scatter = draw_scatter(&cells, config.n_scatter(), &mut rng)?;
                SearchOutcome {
                    best_point: result.best_point,
                    n_evaluated: result.n_evaluated,
                    low_confidence: false,
                    cancelled: result.cancelled,
                    scatter,
                }
            }
        };

        let final_eval = evaluator.evaluate_final(outcome.best_point);
        (outcome, final_eval)
    };
    if !final_eval.is_usable() {
        return Err(LocateError::NoSolution {
            n_evaluated: outcome.n_evaluated,
        });
    }

    let mut station_stats = StationStats::new();
    station_stats.record_final(&arrivals);
    let quality = quality_metrics(outcome.best_point, &arrivals, stations);
    let ellipsoid = ConfidenceEllipsoid::from_scatter(&outcome.scatter);

    info!(
        strategy = config.strategy().name(),
        x = outcome.best_point.x,
        y = outcome.best_point.y,
        z = outcome.best_point.z,
        origin_time = final_eval.origin_time,
        rms = quality.rms,
        n_evaluated = outcome.n_evaluated,
        "event located"
    );

    Ok(Located {
        hypocenter: Hypocenter {
            point: outcome.best_point,
            origin_time: final_eval.origin_time,
            origin_time_var: final_eval.origin_time_var,
            misfit: final_eval.misfit,
            log_quality: final_eval.log_quality,
            method: config.method().name(),
            quality,
            ellipsoid,
            diagnostics: SearchDiagnostics {
                strategy: config.strategy().name(),
                n_evaluated: outcome.n_evaluated,
                low_confidence: outcome.low_confidence,
                cancelled: outcome.cancelled,
            },
        },
        scatter: outcome.scatter,
        station_stats,
        arrivals,
    })
}

/// Locates independent events in parallel.
///
/// Each event gets a seed derived from the base seed and its index, so the
/// batch result does not depend on worker scheduling. The shared model and
/// station set are read-only.
pub fn locate_batch(
    region: &SearchRegion,
    config: &LocateConfig,
    model: &(dyn TravelTimeModel + Sync),
    stations: &BTreeMap<String, Station>,
    events: Vec<Vec<Arrival>>,
    cancel: &CancelFlag,
) -> Vec<Result<Located, LocateError>> {
    events
        .into_par_iter()
        .enumerate()
        .map(|(i, arrivals)| {
            let seed = config
                .seed()
                .wrapping_add((i as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
            let event_config = config.clone().with_seed(seed);
            locate(region, &event_config, model, stations, arrivals, cancel)
        })
        .collect()
}

/// Evenly thins saved walk samples down to at most `n` scatter points.
fn subsample(samples: &[poseidon_metropolis::Sample], n: usize) -> Vec<Point3> {
    if samples.is_empty() || n == 0 {
        return Vec::new();
    }
    if samples.len() <= n {
        return samples.iter().map(|s| s.point).collect();
    }
    let stride = samples.len() as f64 / n as f64;
    (0..n)
        .map(|i| samples[(i as f64 * stride) as usize].point)
        .collect()
}
