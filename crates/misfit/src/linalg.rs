//! Small dense linear algebra for weight matrices and ellipsoids.
//!
//! Arrival counts are tens at most, so a plain Gauss-Jordan inverse and a
//! cyclic Jacobi sweep beat pulling in a matrix crate.

/// Inverts a square matrix in place by Gauss-Jordan elimination with
/// partial pivoting.
///
/// Returns `false` (leaving the matrix in an unspecified state) when a
/// pivot falls below `1e-30`, i.e. the matrix is singular to working
/// precision.
pub fn invert_in_place(m: &mut [Vec<f64>]) -> bool {
    let n = m.len();
    // Augment with the identity, tracked as a separate matrix.
    let mut inv: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for col in 0..n {
        // Partial pivot: largest magnitude in this column at or below the
        // diagonal.
        let mut pivot_row = col;
        let mut pivot_mag = m[col][col].abs();
        for row in (col + 1)..n {
            if m[row][col].abs() > pivot_mag {
                pivot_mag = m[row][col].abs();
                pivot_row = row;
            }
        }
        if !(pivot_mag > 1e-30) {
            return false;
        }
        m.swap(col, pivot_row);
        inv.swap(col, pivot_row);

        let pivot = m[col][col];
        for j in 0..n {
            m[col][j] /= pivot;
            inv[col][j] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = m[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                m[row][j] -= factor * m[col][j];
                inv[row][j] -= factor * inv[col][j];
            }
        }
    }

    for (row, inv_row) in m.iter_mut().zip(inv) {
        *row = inv_row;
    }
    true
}

/// Eigendecomposition of a symmetric 3x3 matrix by cyclic Jacobi rotations.
///
/// Returns `(eigenvalues, eigenvectors)` where `eigenvectors[i]` is the
/// unit eigenvector for `eigenvalues[i]`, sorted descending by eigenvalue.
pub fn jacobi_eigen3(mat: [[f64; 3]; 3]) -> ([f64; 3], [[f64; 3]; 3]) {
    let mut a = mat;
    // Accumulated rotations, v[r][c]: column c is the c-th eigenvector.
    let mut v = [[0.0; 3]; 3];
    for (i, row) in v.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    for _sweep in 0..50 {
        let off = a[0][1] * a[0][1] + a[0][2] * a[0][2] + a[1][2] * a[1][2];
        if off < 1e-30 {
            break;
        }
        for (p, q) in [(0usize, 1usize), (0, 2), (1, 2)] {
            if a[p][q].abs() < 1e-300 {
                continue;
            }
            let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
            let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
            let c = 1.0 / (t * t + 1.0).sqrt();
            let s = t * c;

            // Rotate a in the (p, q) plane.
            let app = a[p][p];
            let aqq = a[q][q];
            let apq = a[p][q];
            a[p][p] = c * c * app - 2.0 * s * c * apq + s * s * aqq;
            a[q][q] = s * s * app + 2.0 * s * c * apq + c * c * aqq;
            a[p][q] = 0.0;
            a[q][p] = 0.0;
            for r in 0..3 {
                if r != p && r != q {
                    let arp = a[r][p];
                    let arq = a[r][q];
                    a[r][p] = c * arp - s * arq;
                    a[p][r] = a[r][p];
                    a[r][q] = s * arp + c * arq;
                    a[q][r] = a[r][q];
                }
            }
            for row in v.iter_mut() {
                let vp = row[p];
                let vq = row[q];
                row[p] = c * vp - s * vq;
                row[q] = s * vp + c * vq;
            }
        }
    }

    let mut order = [0usize, 1, 2];
    order.sort_by(|&i, &j| a[j][j].partial_cmp(&a[i][i]).unwrap_or(std::cmp::Ordering::Equal));
    let mut eigvals = [0.0; 3];
    let mut eigvecs = [[0.0; 3]; 3];
    for (out, &idx) in order.iter().enumerate() {
        eigvals[out] = a[idx][idx];
        for r in 0..3 {
            eigvecs[out][r] = v[r][idx];
        }
    }
    (eigvals, eigvecs)
}
