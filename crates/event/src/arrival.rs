//! Stations and phase arrivals.

use serde::Serialize;

use crate::error::EventError;
use crate::geometry::Point3;

/// A recording station at known coordinates (km, z positive down; negative
/// z is elevation above the datum).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    /// Station label.
    pub label: String,
    /// East coordinate (km).
    pub x: f64,
    /// North coordinate (km).
    pub y: f64,
    /// Depth of the sensor (km, positive down).
    pub z: f64,
}

impl Station {
    /// Creates a new station.
    pub fn new(label: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            label: label.into(),
            x,
            y,
            z,
        }
    }

    /// Validates that all coordinates are finite.
    pub fn validate(&self) -> Result<(), EventError> {
        if !(self.x.is_finite() && self.y.is_finite() && self.z.is_finite()) {
            return Err(EventError::NonFiniteStation {
                label: self.label.clone(),
            });
        }
        Ok(())
    }

    /// Returns the station position as a point.
    pub fn position(&self) -> Point3 {
        Point3::new(self.x, self.y, self.z)
    }
}

/// One phase reading at one station.
///
/// The identity and observation fields are immutable for the lifetime of a
/// location run. The evaluation fields (`pred_travel_time`, `residual`,
/// `weight`) are scratch state refreshed by the misfit evaluator on every
/// candidate location; nothing outside the evaluator should rely on them
/// between evaluations.
#[derive(Debug, Clone, PartialEq)]
pub struct Arrival {
    /// Station label.
    pub station: String,
    /// Phase label ("P", "S", ...).
    pub phase: String,
    /// Observed arrival time (epoch seconds).
    pub time_obs: f64,
    /// Measurement error standard deviation (s).
    pub sigma: f64,
    /// Prior (reader-assigned) weight, multiplied into the matrix weight.
    pub prior_weight: f64,

    /// Predicted travel time for the current candidate, `None` when the
    /// model had no value at this candidate.
    pub pred_travel_time: Option<f64>,
    /// Residual (observed - predicted - origin time) from the most recent
    /// final evaluation.
    pub residual: f64,
    /// Row weight from the weight matrix, set once per run.
    pub weight: f64,
    /// False when the arrival is excluded from the run (unknown station,
    /// reader rejection).
    pub usable: bool,
}

impl Arrival {
    /// Creates a new usable arrival with unit prior weight.
    ///
    /// # Errors
    ///
    /// Returns an error if the observed time is non-finite or sigma is
    /// non-finite or non-positive.
    pub fn new(
        station: impl Into<String>,
        phase: impl Into<String>,
        time_obs: f64,
        sigma: f64,
    ) -> Result<Self, EventError> {
        let station = station.into();
        let phase = phase.into();
        if !time_obs.is_finite() {
            return Err(EventError::NonFiniteArrival {
                station,
                phase,
                field: "time_obs",
            });
        }
        if !sigma.is_finite() {
            return Err(EventError::NonFiniteArrival {
                station,
                phase,
                field: "sigma",
            });
        }
        if sigma <= 0.0 {
            return Err(EventError::NonPositiveSigma {
                station,
                phase,
                sigma,
            });
        }
        Ok(Self {
            station,
            phase,
            time_obs,
            sigma,
            prior_weight: 1.0,
            pred_travel_time: None,
            residual: 0.0,
            weight: 0.0,
            usable: true,
        })
    }

    /// Sets the prior weight (builder style).
    ///
    /// # Errors
    ///
    /// Returns an error if the weight is non-finite or negative.
    pub fn with_prior_weight(mut self, weight: f64) -> Result<Self, EventError> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(EventError::NonFiniteArrival {
                station: self.station,
                phase: self.phase,
                field: "prior_weight",
            });
        }
        self.prior_weight = weight;
        Ok(self)
    }

    /// True if the arrival participates in the run.
    pub fn is_usable(&self) -> bool {
        self.usable && self.prior_weight > 0.0
    }

    /// Clears the per-evaluation scratch fields.
    pub fn reset_evaluation(&mut self) {
        self.pred_travel_time = None;
        self.residual = 0.0;
    }
}
