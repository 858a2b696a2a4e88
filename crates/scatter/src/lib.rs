//! Posterior scatter sampling.
//!
//! Search drivers hand over the cells they evaluated, each tagged with a
//! log weight that already folds in cell volume. [`draw_scatter`] turns
//! those cells into a cloud of points distributed according to the
//! posterior: cells are drawn by weight through a CDF and a binary search,
//! then the point is jittered uniformly inside the chosen cell. A fixed
//! generator seed reproduces the cloud exactly.

pub mod error;
pub mod sample;

pub use error::ScatterError;
pub use sample::{draw_scatter, ScatterCell};
