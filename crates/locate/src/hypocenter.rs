//! The serializable location result.

use poseidon_event::Point3;
use serde::Serialize;

use crate::ellipsoid::ConfidenceEllipsoid;
use crate::quality::QualityMetrics;

/// How the search behaved, for run reports.
#[derive(Debug, Clone, Serialize)]
pub struct SearchDiagnostics {
    /// Search strategy name ("grid", "metropolis", "octree").
    pub strategy: &'static str,
    /// Candidate evaluations performed.
    pub n_evaluated: usize,
    /// True when the search suspects it never reached the probable region.
    pub low_confidence: bool,
    /// True when the search was cancelled and returned its best-so-far.
    pub cancelled: bool,
}

/// A located hypocenter with its uncertainty and quality summary.
#[derive(Debug, Clone, Serialize)]
pub struct Hypocenter {
    /// Maximum-likelihood location (km, z positive down).
    pub point: Point3,
    /// Estimated origin time (epoch seconds).
    pub origin_time: f64,
    /// Variance of the origin-time estimate (s²).
    pub origin_time_var: f64,
    /// Scalar misfit at the location.
    pub misfit: f64,
    /// Log quality at the location.
    pub log_quality: f64,
    /// Statistical method name.
    pub method: &'static str,
    /// Residual and coverage quality metrics.
    pub quality: QualityMetrics,
    /// 68.3% confidence ellipsoid, when the scatter cloud supported one.
    pub ellipsoid: Option<ConfidenceEllipsoid>,
    /// Search diagnostics.
    pub diagnostics: SearchDiagnostics,
}
