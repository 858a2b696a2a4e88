//! Exhaustive grid search over fixed 3D lattices.
//!
//! The simplest of the three search strategies: enumerate every node of one
//! or more configured lattices, score each with the misfit evaluator, keep
//! the single best. Deterministic, no randomness, O(grid size) evaluations.
//!
//! The optional per-node value field ([`GridField`]) preserves the full
//! explored likelihood surface for posterior scatter sampling.

pub mod error;
pub mod lattice;
pub mod search;

pub use error::GridError;
pub use lattice::Lattice;
pub use search::{grid_search, GridField, GridSearchResult};
