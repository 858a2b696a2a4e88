//! Configuration for the Metropolis walk.

use crate::error::MetropolisError;

/// Configuration for a Metropolis-Gibbs search.
///
/// Use the builder methods to customise parameters.
///
/// # Example
///
/// ```
/// use poseidon_metropolis::MetropolisConfig;
///
/// let config = MetropolisConfig::new(20_000)
///     .with_learn(2_000)
///     .with_equilibrate(1_000)
///     .with_step_bounds(0.01, 10.0);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct MetropolisConfig {
    n_samples: usize,
    n_learn: usize,
    n_equilibrate: usize,
    save_start: usize,
    save_skip: usize,
    step_init: f64,
    step_min: f64,
    step_max: f64,
    step_factor: f64,
    target_acceptance: f64,
    prob_min: f64,
    initial_temperature: f64,
}

impl MetropolisConfig {
    /// Creates a configuration with the given total sample budget.
    ///
    /// Defaults: learn 10% of the budget, equilibrate 10%, saving starts
    /// after equilibration with skip 10, step auto-initialised from the
    /// region (negative `step_init`), step bounds [1e-3, 50] km, step
    /// factor 1.1, target acceptance 0.44, `prob_min` 1e-6, temperature 1.
    pub fn new(n_samples: usize) -> Self {
        Self {
            n_samples,
            n_learn: n_samples / 10,
            n_equilibrate: n_samples / 10,
            save_start: n_samples / 5,
            save_skip: 10,
            step_init: -1.0,
            step_min: 1e-3,
            step_max: 50.0,
            step_factor: 1.1,
            target_acceptance: 0.44,
            prob_min: 1e-6,
            initial_temperature: 1.0,
        }
    }

    /// Sets the learning-phase length.
    pub fn with_learn(mut self, n_learn: usize) -> Self {
        self.n_learn = n_learn;
        self
    }

    /// Sets the equilibration (burn-in) length.
    pub fn with_equilibrate(mut self, n_equilibrate: usize) -> Self {
        self.n_equilibrate = n_equilibrate;
        self
    }

    /// Sets the iteration at which saving begins and the save stride.
    pub fn with_save(mut self, save_start: usize, save_skip: usize) -> Self {
        self.save_start = save_start;
        self.save_skip = save_skip.max(1);
        self
    }

    /// Sets the initial step size (km); negative means auto from region.
    pub fn with_step_init(mut self, step_init: f64) -> Self {
        self.step_init = step_init;
        self
    }

    /// Sets the step-size clamp bounds (km).
    pub fn with_step_bounds(mut self, step_min: f64, step_max: f64) -> Self {
        self.step_min = step_min;
        self.step_max = step_max;
        self
    }

    /// Sets the multiplicative step adaptation factor.
    pub fn with_step_factor(mut self, step_factor: f64) -> Self {
        self.step_factor = step_factor;
        self
    }

    /// Sets the target acceptance rate for step adaptation.
    pub fn with_target_acceptance(mut self, target: f64) -> Self {
        self.target_acceptance = target;
        self
    }

    /// Sets the minimum likelihood required after learning; a walk whose
    /// best likelihood stays below it is flagged low-confidence.
    pub fn with_prob_min(mut self, prob_min: f64) -> Self {
        self.prob_min = prob_min;
        self
    }

    /// Sets the initial annealing temperature (>= 1).
    pub fn with_initial_temperature(mut self, temperature: f64) -> Self {
        self.initial_temperature = temperature;
        self
    }

    /// Returns the total sample budget.
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Returns the learning-phase length.
    pub fn n_learn(&self) -> usize {
        self.n_learn
    }

    /// Returns the equilibration length.
    pub fn n_equilibrate(&self) -> usize {
        self.n_equilibrate
    }

    /// Returns the iteration at which saving begins.
    pub fn save_start(&self) -> usize {
        self.save_start
    }

    /// Returns the save stride.
    pub fn save_skip(&self) -> usize {
        self.save_skip
    }

    /// Returns the initial step size (km, negative for auto).
    pub fn step_init(&self) -> f64 {
        self.step_init
    }

    /// Returns the minimum step size (km).
    pub fn step_min(&self) -> f64 {
        self.step_min
    }

    /// Returns the maximum step size (km).
    pub fn step_max(&self) -> f64 {
        self.step_max
    }

    /// Returns the step adaptation factor.
    pub fn step_factor(&self) -> f64 {
        self.step_factor
    }

    /// Returns the target acceptance rate.
    pub fn target_acceptance(&self) -> f64 {
        self.target_acceptance
    }

    /// Returns the minimum likelihood threshold.
    pub fn prob_min(&self) -> f64 {
        self.prob_min
    }

    /// Returns the initial temperature.
    pub fn initial_temperature(&self) -> f64 {
        self.initial_temperature
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), MetropolisError> {
        if self.n_samples == 0 {
            return Err(MetropolisError::InvalidParameter {
                name: "n_samples",
                value: 0.0,
            });
        }
        if !self.step_min.is_finite() || self.step_min <= 0.0 {
            return Err(MetropolisError::InvalidParameter {
                name: "step_min",
                value: self.step_min,
            });
        }
        if !self.step_max.is_finite() || self.step_max < self.step_min {
            return Err(MetropolisError::InvalidParameter {
                name: "step_max",
                value: self.step_max,
            });
        }
        if !self.step_factor.is_finite() || self.step_factor <= 1.0 {
            return Err(MetropolisError::InvalidParameter {
                name: "step_factor",
                value: self.step_factor,
            });
        }
        if !(self.target_acceptance > 0.0 && self.target_acceptance < 1.0) {
            return Err(MetropolisError::InvalidParameter {
                name: "target_acceptance",
                value: self.target_acceptance,
            });
        }
        if !self.initial_temperature.is_finite() || self.initial_temperature < 1.0 {
            return Err(MetropolisError::InvalidParameter {
                name: "initial_temperature",
                value: self.initial_temperature,
            });
        }
        Ok(())
    }
}
