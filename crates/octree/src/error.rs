//! Error types for the poseidon-octree crate.

/// Error type for all fallible operations in the poseidon-octree crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OctreeError {
    /// Returned when a configuration parameter is out of range.
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value.
        value: f64,
    },

    /// Returned when no evaluated cell center was usable.
    #[error("no usable candidate in {n_evaluated} cell evaluations")]
    NoUsableCandidate {
        /// Number of evaluations attempted.
        n_evaluated: usize,
    },
}
