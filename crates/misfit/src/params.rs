//! Gaussian error-model parameters.

use crate::error::MisfitError;

/// Travel-time-proportional error model.
///
/// The effective sigma for an arrival gains a term
/// `clamp(fraction * travel_time, min, max)` combined in quadrature with the
/// measurement sigma. Used by the EDT and origin-time-stack methods, where
/// per-arrival variances enter the likelihood directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelTimeError {
    /// Fraction of the predicted travel time treated as its error.
    pub fraction: f64,
    /// Lower clamp on the travel-time error (s).
    pub min: f64,
    /// Upper clamp on the travel-time error (s).
    pub max: f64,
}

impl TravelTimeError {
    /// Effective travel-time sigma for a predicted travel time.
    pub fn sigma(&self, travel_time: f64) -> f64 {
        (self.fraction * travel_time).clamp(self.min, self.max)
    }
}

/// Parameters of the Gaussian error model driving weight construction.
///
/// `sigma_time` is the theoretical travel-time error coefficient; `corr_len`
/// the model correlation length governing how station-pair covariance decays
/// with separation. A non-positive or non-finite `corr_len` means the model
/// covariance is diagonal.
#[derive(Debug, Clone)]
pub struct GaussianParams {
    sigma_time: f64,
    corr_len: f64,
    min_arrivals: usize,
    travel_time_error: Option<TravelTimeError>,
}

impl GaussianParams {
    /// Creates parameters with the given theoretical time error (s).
    ///
    /// Defaults: `corr_len = 0` (diagonal covariance), `min_arrivals = 4`,
    /// no travel-time-proportional error.
    pub fn new(sigma_time: f64) -> Self {
        Self {
            sigma_time,
            corr_len: 0.0,
            min_arrivals: 4,
            travel_time_error: None,
        }
    }

    /// Sets the model correlation length (km).
    pub fn with_corr_len(mut self, corr_len: f64) -> Self {
        self.corr_len = corr_len;
        self
    }

    /// Sets the minimum number of usable arrivals.
    pub fn with_min_arrivals(mut self, min_arrivals: usize) -> Self {
        self.min_arrivals = min_arrivals;
        self
    }

    /// Sets the travel-time-proportional error model.
    pub fn with_travel_time_error(mut self, tte: TravelTimeError) -> Self {
        self.travel_time_error = Some(tte);
        self
    }

    /// Returns the theoretical time-error coefficient (s).
    pub fn sigma_time(&self) -> f64 {
        self.sigma_time
    }

    /// Returns the model correlation length (km).
    pub fn corr_len(&self) -> f64 {
        self.corr_len
    }

    /// Returns the minimum number of usable arrivals.
    pub fn min_arrivals(&self) -> usize {
        self.min_arrivals
    }

    /// Returns the travel-time error model, if any.
    pub fn travel_time_error(&self) -> Option<&TravelTimeError> {
        self.travel_time_error.as_ref()
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), MisfitError> {
        if !self.sigma_time.is_finite() || self.sigma_time < 0.0 {
            return Err(MisfitError::InvalidParameter {
                name: "sigma_time",
                value: self.sigma_time,
            });
        }
        if self.min_arrivals < 1 {
            return Err(MisfitError::InvalidParameter {
                name: "min_arrivals",
                value: self.min_arrivals as f64,
            });
        }
        if let Some(tte) = &self.travel_time_error {
            if !tte.fraction.is_finite() || tte.fraction < 0.0 {
                return Err(MisfitError::InvalidParameter {
                    name: "travel_time_error.fraction",
                    value: tte.fraction,
                });
            }
            if tte.min > tte.max {
                return Err(MisfitError::InvalidParameter {
                    name: "travel_time_error.min",
                    value: tte.min,
                });
            }
        }
        Ok(())
    }
}

impl Default for GaussianParams {
    fn default() -> Self {
        Self::new(0.2)
    }
}
