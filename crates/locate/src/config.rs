//! Run configuration: method, statistics parameters, search strategy.

use poseidon_metropolis::MetropolisConfig;
use poseidon_misfit::{GaussianParams, Method, MisfitError};
use poseidon_octree::OctreeConfig;

use crate::error::LocateError;

/// Which search driver explores the volume.
#[derive(Debug, Clone)]
pub enum SearchStrategy {
    /// Exhaustive lattice enumeration with the given node spacing (km).
    Grid {
        /// Node spacing (km).
        spacing: f64,
    },
    /// Metropolis-Gibbs random walk.
    Metropolis(MetropolisConfig),
    /// Importance-driven octree refinement.
    Octree(OctreeConfig),
}

impl SearchStrategy {
    /// Short name used in logs and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            SearchStrategy::Grid { .. } => "grid",
            SearchStrategy::Metropolis(_) => "metropolis",
            SearchStrategy::Octree(_) => "octree",
        }
    }
}

/// Full configuration of one location run.
#[derive(Debug, Clone)]
pub struct LocateConfig {
    method: Method,
    gaussian: GaussianParams,
    strategy: SearchStrategy,
    n_scatter: usize,
    seed: u64,
}

impl LocateConfig {
    /// Creates a run configuration. Defaults: 1 000 scatter points, seed 0.
    pub fn new(method: Method, gaussian: GaussianParams, strategy: SearchStrategy) -> Self {
        Self {
            method,
            gaussian,
            strategy,
            n_scatter: 1_000,
            seed: 0,
        }
    }

    /// Sets the number of posterior scatter points to draw.
    pub fn with_n_scatter(mut self, n_scatter: usize) -> Self {
        self.n_scatter = n_scatter;
        self
    }

    /// Sets the random seed; batch runs derive per-event seeds from it.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Returns the statistical method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the Gaussian weighting parameters.
    pub fn gaussian(&self) -> &GaussianParams {
        &self.gaussian
    }

    /// Returns the search strategy.
    pub fn strategy(&self) -> &SearchStrategy {
        &self.strategy
    }

    /// Returns the scatter sample count.
    pub fn n_scatter(&self) -> usize {
        self.n_scatter
    }

    /// Returns the base random seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Validates the configuration, including the nested strategy.
    pub fn validate(&self) -> Result<(), LocateError> {
        self.gaussian.validate()?;
        match &self.strategy {
            SearchStrategy::Grid { spacing } => {
                if !spacing.is_finite() || *spacing <= 0.0 {
                    return Err(LocateError::Misfit(MisfitError::InvalidParameter {
                        name: "spacing",
                        value: *spacing,
                    }));
                }
            }
            SearchStrategy::Metropolis(cfg) => cfg.validate()?,
            SearchStrategy::Octree(cfg) => cfg.validate()?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = LocateConfig::new(
            Method::GauAnalytic,
            GaussianParams::new(0.2),
            SearchStrategy::Grid { spacing: 1.0 },
        );
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.n_scatter(), 1_000);
        assert_eq!(cfg.strategy().name(), "grid");
    }

    #[test]
    fn nested_strategy_is_validated() {
        let bad_grid = LocateConfig::new(
            Method::Edt,
            GaussianParams::new(0.2),
            SearchStrategy::Grid { spacing: 0.0 },
        );
        assert!(bad_grid.validate().is_err());

        let bad_octree = LocateConfig::new(
            Method::Edt,
            GaussianParams::new(0.2),
            SearchStrategy::Octree(OctreeConfig::new().with_min_node_size(-1.0)),
        );
        assert!(bad_octree.validate().is_err());
    }
}
