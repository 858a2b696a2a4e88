//! Error types for the poseidon-grid crate.

/// Error type for all fallible operations in the poseidon-grid crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GridError {
    /// Returned when no lattices are configured.
    #[error("no lattices configured")]
    EmptyLattices,

    /// Returned when a lattice has a zero node count on some axis.
    #[error("lattice axis {axis} has zero nodes")]
    ZeroNodes {
        /// Axis index (0 = x, 1 = y, 2 = z).
        axis: usize,
    },

    /// Returned when a lattice spacing is non-positive or non-finite.
    #[error("lattice axis {axis} has invalid spacing {spacing}")]
    InvalidSpacing {
        /// Axis index (0 = x, 1 = y, 2 = z).
        axis: usize,
        /// The invalid spacing value.
        spacing: f64,
    },

    /// Returned when every node of every lattice was unevaluable.
    #[error("no usable candidate in {n_evaluated} grid evaluations")]
    NoUsableCandidate {
        /// Number of nodes evaluated.
        n_evaluated: usize,
    },
}
