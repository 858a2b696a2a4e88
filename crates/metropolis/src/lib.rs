//! Metropolis-Gibbs random-walk exploration of the misfit surface.
//!
//! The walk moves through four phases:
//!
//! ```text
//! Learning -> Equilibrating -> Sampling -> Done
//! ```
//!
//! During `Learning` the Gaussian step size adapts toward a target
//! acceptance rate; `Equilibrating` discards burn-in samples; `Sampling`
//! records every Nth accepted state into the posterior sample set that
//! feeds the scatter sampler. An optional initial temperature biases early
//! acceptance and decays to 1 by the end of the learning phase.
//!
//! The walk is driven by an explicit seeded generator, so runs are
//! reproducible and independent runs never share generator state.

pub mod config;
pub mod error;
pub mod walk;

pub use config::MetropolisConfig;
pub use error::MetropolisError;
pub use walk::{metropolis_search, MetropolisResult, Phase, Sample, WalkState};
