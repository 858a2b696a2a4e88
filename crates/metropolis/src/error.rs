//! Error types for the poseidon-metropolis crate.

/// Error type for all fallible operations in the poseidon-metropolis crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MetropolisError {
    /// Returned when a configuration parameter is out of range.
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value.
        value: f64,
    },

    /// Returned when the walk never found a usable starting candidate.
    #[error("no usable candidate in {n_evaluated} sampler evaluations")]
    NoUsableCandidate {
        /// Number of evaluations attempted.
        n_evaluated: usize,
    },
}
