//! Likelihood and misfit evaluation for candidate hypocenters.
//!
//! This crate is the inner loop of every search strategy. Given a candidate
//! location it produces a scalar quality (a log-likelihood to maximise), the
//! maximum-likelihood origin time, and its variance, under one of seven
//! statistical formulations:
//!
//! | Method | Formulation |
//! |--------|-------------|
//! | `GauAnalytic` | Gaussian weighted least squares, analytic origin time |
//! | `GauTest` | same quadratic form, per-arrival normalisation |
//! | `Edt` | pairwise equal-differential-time misfit (origin-time free) |
//! | `EdtBox` | EDT with outlier-pair exponents clipped to a bound |
//! | `L1Norm` | robust absolute-residual misfit |
//! | `MlOt` | Gaussian origin-time stack maximised over arrival times |
//! | `OtStack` | interval origin-time stack widened by the cell time spread |
//!
//! # Architecture
//!
//! ```text
//! MisfitEvaluator::evaluate()
//!   ├─ refresh predicted travel times   (TravelTimeModel seam)
//!   ├─ WeightContext                    (weights.rs, built once per run)
//!   ├─ centered weighted means          (otime.rs)
//!   └─ per-method quality               (evaluate.rs)
//! ```
//!
//! All time accumulation happens after subtracting a common reference epoch
//! (the earliest usable observed time); the weighted sums use compensated
//! summation so sub-millisecond origin-time resolution survives epoch-sized
//! absolute times.
//!
//! Degenerate candidates (too few usable arrivals, singular weights) yield
//! [`Evaluation::unusable`], never an error, so search loops stay simple.

pub mod error;
pub mod evaluate;
pub mod linalg;
pub mod otime;
pub mod params;
pub mod weights;

pub use error::MisfitError;
pub use evaluate::{Evaluation, Evaluator, Method, MisfitEvaluator, UNUSABLE_LOG_QUALITY};
pub use otime::OriginEstimate;
pub use params::{GaussianParams, TravelTimeError};
pub use weights::WeightContext;
