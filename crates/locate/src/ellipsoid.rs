//! Confidence ellipsoid from the posterior scatter cloud.

use poseidon_event::Point3;
use poseidon_misfit::linalg::jacobi_eigen3;
use serde::Serialize;

/// Chi-squared quantile for 68.3% confidence with 3 degrees of freedom;
/// scales scatter covariance eigenvalues into semi-axis lengths.
const CHI_SQ_68_3DOF: f64 = 3.53;

/// The 68.3% confidence ellipsoid of the location estimate.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ConfidenceEllipsoid {
    /// Scatter-cloud mean (the expectation hypocenter).
    pub center: Point3,
    /// Semi-axis lengths (km), longest first.
    pub semi_axes: [f64; 3],
    /// Unit axis directions, matching `semi_axes` order.
    pub axes: [[f64; 3]; 3],
}

impl ConfidenceEllipsoid {
    /// Fits the ellipsoid to a posterior scatter cloud.
    ///
    /// Returns `None` when fewer than four points are available or the
    /// cloud is numerically degenerate; location quality reporting treats
    /// a missing ellipsoid as "uncertainty not resolved", not an error.
    pub fn from_scatter(points: &[Point3]) -> Option<Self> {
        if points.len() < 4 {
            return None;
        }
        let n = points.len() as f64;
        let mut mean = [0.0; 3];
        for p in points {
            mean[0] += p.x;
            mean[1] += p.y;
            mean[2] += p.z;
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut cov = [[0.0; 3]; 3];
        for p in points {
            let d = [p.x - mean[0], p.y - mean[1], p.z - mean[2]];
            for i in 0..3 {
                for j in 0..3 {
                    cov[i][j] += d[i] * d[j];
                }
            }
        }
        for row in &mut cov {
            for v in row.iter_mut() {
                *v /= n;
                if !v.is_finite() {
                    return None;
                }
            }
        }

        // Eigenvalues come back sorted descending; clamp tiny negatives
        // from roundoff before the square root.
        let (eigvals, eigvecs) = jacobi_eigen3(cov);
        let mut semi_axes = [0.0; 3];
        for (axis, &ev) in semi_axes.iter_mut().zip(&eigvals) {
            if !ev.is_finite() {
                return None;
            }
            *axis = (ev.max(0.0) * CHI_SQ_68_3DOF).sqrt();
        }

        Some(Self {
            center: Point3::new(mean[0], mean[1], mean[2]),
            semi_axes,
            axes: eigvecs,
        })
    }

    /// Length of the longest semi-axis (km).
    pub fn max_semi_axis(&self) -> f64 {
        self.semi_axes[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn too_few_points_yield_none() {
        let points = vec![Point3::new(0.0, 0.0, 0.0); 3];
        assert!(ConfidenceEllipsoid::from_scatter(&points).is_none());
    }

    #[test]
    fn elongated_cloud_aligns_the_major_axis() {
        // Points spread along x with a 10:2:1 aspect ratio.
        let mut points = Vec::new();
        for i in -10i32..=10 {
            let t = i as f64 / 10.0;
            points.push(Point3::new(10.0 * t + 1.0, 2.0 * t - 3.0, t + 5.0));
            points.push(Point3::new(10.0 * t + 1.0, -2.0 * t - 3.0, -t + 5.0));
        }
        let ell = ConfidenceEllipsoid::from_scatter(&points).unwrap();
        assert_abs_diff_eq!(ell.center.x, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(ell.center.y, -3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(ell.center.z, 5.0, epsilon = 1e-9);
        // Longest first, and the major axis points along x.
        assert!(ell.semi_axes[0] >= ell.semi_axes[1]);
        assert!(ell.semi_axes[1] >= ell.semi_axes[2]);
        assert_abs_diff_eq!(ell.axes[0][0].abs(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn isotropic_cloud_scales_with_chi_squared() {
        // Eight corners of a cube: covariance is isotropic with variance 1.
        let mut points = Vec::new();
        for &x in &[-1.0, 1.0] {
            for &y in &[-1.0, 1.0] {
                for &z in &[-1.0, 1.0] {
                    points.push(Point3::new(x, y, z));
                }
            }
        }
        let ell = ConfidenceEllipsoid::from_scatter(&points).unwrap();
        for &axis in &ell.semi_axes {
            assert_abs_diff_eq!(axis, CHI_SQ_68_3DOF.sqrt(), epsilon = 1e-9);
        }
    }

    #[test]
    fn degenerate_cloud_yields_zero_axis() {
        // All points in the z = 4 plane: the smallest axis collapses.
        let points: Vec<Point3> = (0..20)
            .map(|i| Point3::new((i % 5) as f64, (i / 5) as f64, 4.0))
            .collect();
        let ell = ConfidenceEllipsoid::from_scatter(&points).unwrap();
        assert_abs_diff_eq!(ell.semi_axes[2], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn serializes_to_json() {
        let points: Vec<Point3> = (0..8)
            .map(|i| Point3::new(i as f64, (i * 2) as f64, (i % 3) as f64))
            .collect();
        let ell = ConfidenceEllipsoid::from_scatter(&points).unwrap();
        let json = serde_json::to_string(&ell).unwrap();
        assert!(json.contains("semi_axes"));
    }
}
