//! The travel-time seam and a provided constant-velocity model.

use crate::arrival::Station;
use crate::error::EventError;
use crate::geometry::Point3;

/// Lookup of predicted travel time from an external travel-time model.
///
/// Implementations are read-only and shared across a batch: independent
/// location runs may query the same model concurrently, so implementors
/// should avoid interior mutability.
///
/// Returning `None` means the model has no value for that station/phase at
/// that candidate (outside the grid, unknown phase); the caller excludes
/// the arrival from the *current evaluation only*.
pub trait TravelTimeModel {
    /// Predicted travel time (s) from `point` to `station` for `phase`.
    fn travel_time(&self, station: &Station, phase: &str, point: Point3) -> Option<f64>;
}

/// Straight-ray travel times in a homogeneous halfspace.
///
/// Useful for synthetic tests and quick demo runs; real deployments plug in
/// gridded travel-time volumes through [`TravelTimeModel`].
#[derive(Debug, Clone, Copy)]
pub struct HomogeneousModel {
    vp: f64,
    vs: f64,
}

impl HomogeneousModel {
    /// Creates a model from P and S velocities (km/s).
    pub fn new(vp: f64, vs: f64) -> Self {
        Self { vp, vs }
    }

    /// Creates a model from a P velocity and a Vp/Vs ratio.
    ///
    /// # Errors
    ///
    /// Returns an error if either resulting velocity is non-positive or
    /// non-finite.
    pub fn from_vp_vs_ratio(vp: f64, ratio: f64) -> Result<Self, EventError> {
        if !vp.is_finite() || vp <= 0.0 {
            return Err(EventError::InvalidVelocity { velocity: vp });
        }
        let vs = vp / ratio;
        if !vs.is_finite() || vs <= 0.0 {
            return Err(EventError::InvalidVelocity { velocity: vs });
        }
        Ok(Self { vp, vs })
    }

    /// Returns the P velocity (km/s).
    pub fn vp(&self) -> f64 {
        self.vp
    }

    /// Returns the S velocity (km/s).
    pub fn vs(&self) -> f64 {
        self.vs
    }
}

impl TravelTimeModel for HomogeneousModel {
    fn travel_time(&self, station: &Station, phase: &str, point: Point3) -> Option<f64> {
        let v = match phase.chars().next() {
            Some('P') | Some('p') => self.vp,
            Some('S') | Some('s') => self.vs,
            _ => return None,
        };
        Some(station.position().distance(&point) / v)
    }
}
