//! End-to-end hypocenter location.
//!
//! This crate ties the pieces together: it builds a misfit evaluator for
//! one event, drives the configured search strategy, confirms the winning
//! candidate with a final evaluation that writes residuals back into the
//! arrivals, and derives the downstream products — station residual
//! statistics, quality metrics, the posterior scatter cloud, and the
//! confidence ellipsoid.
//!
//! # Architecture
//!
//! ```text
//! locate()
//!   ├─ MisfitEvaluator            (poseidon_misfit)
//!   ├─ grid | metropolis | octree (per SearchStrategy)
//!   ├─ evaluate_final             (residual write-back)
//!   ├─ StationStats               (stats.rs)
//!   ├─ draw_scatter               (poseidon_scatter)
//!   ├─ ConfidenceEllipsoid        (ellipsoid.rs)
//!   └─ QualityMetrics             (quality.rs)
//! ```
//!
//! Degenerate candidates inside a search never abort the run; the only
//! run-fatal outcome is [`LocateError::NoSolution`], raised when no valid
//! candidate exists anywhere in the volume. Batches of independent events
//! run in parallel through [`locate_batch`], with per-event seeds derived
//! from the base seed so results do not depend on scheduling.

pub mod config;
pub mod ellipsoid;
pub mod error;
pub mod hypocenter;
pub mod quality;
pub mod run;
pub mod stats;

pub use config::{LocateConfig, SearchStrategy};
pub use ellipsoid::ConfidenceEllipsoid;
pub use error::LocateError;
pub use hypocenter::{Hypocenter, SearchDiagnostics};
pub use quality::QualityMetrics;
pub use run::{locate, locate_batch, Located};
pub use stats::{ResidualStats, StationStats};
