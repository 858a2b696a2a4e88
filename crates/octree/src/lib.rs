//! Importance-driven octree search.
//!
//! The search volume is tiled by a coarse lattice of root cells; the cell
//! whose center scores the highest posterior mass (likelihood × volume) is
//! repeatedly split into eight exactly-tiling octants until a size or
//! budget limit is reached. Refinement therefore concentrates evaluations
//! where the posterior is large while coarse cells keep covering the rest
//! of the volume.
//!
//! ```text
//!  root lattice          after refinement
//!  +----+----+           +----+----+
//!  |    |    |           |    |::::|      ":" high posterior,
//!  +----+----+    ->     +----+-+--+      recursively split
//!  |    |    |           |    |:|::|
//!  +----+----+           +----+-+--+
//! ```
//!
//! Cells live in a [`CellArena`] and are addressed by integer handles; the
//! refinement frontier is a [`ResultIndex`] ordered by cell priority. The
//! final leaf cells, tagged with their posterior mass, feed the scatter
//! sampler.

pub mod arena;
pub mod config;
pub mod error;
pub mod results;
pub mod search;

pub use arena::{CellArena, CellId, OctCell};
pub use config::{OctreeConfig, TerminationPolicy};
pub use error::OctreeError;
pub use results::ResultIndex;
pub use search::{octree_search, OctreeResult};
