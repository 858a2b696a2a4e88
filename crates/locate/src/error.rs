//! Error types for the poseidon-locate crate.

/// Error type for all fallible operations in the poseidon-locate crate.
#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    /// Returned when no valid candidate location exists over the entire
    /// run; the only search outcome that is fatal to the event.
    #[error("no solution: no usable candidate in {n_evaluated} evaluations")]
    NoSolution {
        /// Candidate evaluations attempted before giving up.
        n_evaluated: usize,
    },

    /// The evaluator could not be built for this event.
    #[error(transparent)]
    Misfit(#[from] poseidon_misfit::MisfitError),

    /// Grid-search setup failed.
    #[error(transparent)]
    Grid(#[from] poseidon_grid::GridError),

    /// Metropolis configuration was invalid.
    #[error(transparent)]
    Metropolis(#[from] poseidon_metropolis::MetropolisError),

    /// Octree configuration was invalid.
    #[error(transparent)]
    Octree(#[from] poseidon_octree::OctreeError),

    /// Scatter sampling failed.
    #[error(transparent)]
    Scatter(#[from] poseidon_scatter::ScatterError),
}
