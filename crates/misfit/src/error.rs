//! Error types for the poseidon-misfit crate.

/// Error type for all fallible operations in the poseidon-misfit crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MisfitError {
    /// Returned when fewer usable arrivals remain than the configured
    /// minimum, or the weight matrix is singular or sums to zero.
    #[error("degenerate weights: {reason} ({n_usable} usable arrivals, need {min_arrivals})")]
    DegenerateWeights {
        /// Human-readable cause.
        reason: &'static str,
        /// Number of usable arrivals found.
        n_usable: usize,
        /// Configured minimum.
        min_arrivals: usize,
    },

    /// Returned when a configuration parameter is non-finite or out of range.
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value.
        value: f64,
    },

    /// Returned when a method name does not match any known method.
    #[error("unknown misfit method '{name}'")]
    UnknownMethod {
        /// The unrecognised name.
        name: String,
    },
}
