//! Error types for the poseidon-event crate.

/// Error type for all fallible operations in the poseidon-event crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EventError {
    /// Returned when an arrival time, sigma, or weight is NaN or infinite.
    #[error("non-finite value in {field} for arrival {station}/{phase}")]
    NonFiniteArrival {
        /// Station label of the offending arrival.
        station: String,
        /// Phase label of the offending arrival.
        phase: String,
        /// Name of the non-finite field.
        field: &'static str,
    },

    /// Returned when an arrival's measurement sigma is not positive.
    #[error("sigma must be positive, got {sigma} for arrival {station}/{phase}")]
    NonPositiveSigma {
        /// Station label of the offending arrival.
        station: String,
        /// Phase label of the offending arrival.
        phase: String,
        /// The invalid sigma value.
        sigma: f64,
    },

    /// Returned when a station coordinate is NaN or infinite.
    #[error("non-finite coordinate for station {label}")]
    NonFiniteStation {
        /// Station label.
        label: String,
    },

    /// Returned when a search-region extent is non-positive or non-finite.
    #[error("invalid search-region extent on axis {axis}: {extent}")]
    InvalidExtent {
        /// Axis index (0 = x, 1 = y, 2 = z).
        axis: usize,
        /// The invalid extent value.
        extent: f64,
    },

    /// Returned when a model velocity is non-positive or non-finite.
    #[error("velocity must be finite and positive, got {velocity}")]
    InvalidVelocity {
        /// The invalid velocity value.
        velocity: f64,
    },
}
