//! Error types for the poseidon-scatter crate.

/// Error type for all fallible operations in the poseidon-scatter crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScatterError {
    /// Returned when no cells were provided to sample from.
    #[error("no cells to sample from")]
    NoCells,

    /// Returned when every cell weight underflowed to zero.
    #[error("all {n_cells} cell weights are zero or non-finite")]
    DegenerateWeights {
        /// Number of cells offered.
        n_cells: usize,
    },
}
