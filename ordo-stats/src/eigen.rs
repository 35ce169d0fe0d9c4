//! Eigen-decompositions used by ordination and ellipse fitting.
//!
//! - [`symmetric_eigen`] — cyclic Jacobi rotations for symmetric N×N matrices
//! - [`eigen_3x3`] — real eigenpairs of a general 3×3 matrix

use log::{debug, warn};
use ordo_core::{OrdoError, ProgressListener, Result};

/// Eigenvalues and eigenvectors of a symmetric matrix.
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    /// Eigenvalues, in the order the rotations left them on the diagonal.
    pub values: Vec<f64>,
    /// Eigenvectors as columns: `vectors[i][k]` is component `i` of vector `k`.
    pub vectors: Vec<Vec<f64>>,
    /// Number of Jacobi sweeps performed.
    pub sweeps: usize,
}

/// Jacobi eigen-decomposition of a symmetric matrix.
///
/// Each sweep rotates away every off-diagonal pair once. The progress
/// listener is polled before every sweep; a cancel request aborts with
/// [`OrdoError::Canceled`].
///
/// # Errors
///
/// Returns an error if the matrix is not square or contains non-finite
/// values, [`OrdoError::Degenerate`] if the off-diagonal mass is still above
/// tolerance after `max_sweeps` sweeps, and [`OrdoError::Canceled`] if the
/// listener cancels.
pub fn symmetric_eigen(
    matrix: &[Vec<f64>],
    max_sweeps: usize,
    progress: &dyn ProgressListener,
) -> Result<SymmetricEigen> {
    let n = matrix.len();
    for row in matrix {
        if row.len() != n {
            return Err(OrdoError::InvalidInput(
                "symmetric_eigen: matrix must be square".into(),
            ));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(OrdoError::InvalidInput(
                "symmetric_eigen: matrix contains non-finite values".into(),
            ));
        }
    }

    let mut a: Vec<Vec<f64>> = matrix.to_vec();
    let mut v = crate::linalg::identity(n);

    let norm: f64 = a
        .iter()
        .flat_map(|r| r.iter())
        .map(|x| x * x)
        .sum::<f64>()
        .sqrt();
    // roundoff of ~eps·norm per entry, summed over the off-diagonal Frobenius norm
    let tol = f64::EPSILON * norm * n.max(1) as f64;

    let mut sweeps = 0;
    let mut converged = false;
    loop {
        let off: f64 = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .map(|(i, j)| a[i][j] * a[i][j])
            .sum::<f64>()
            .sqrt();
        if off <= tol {
            converged = true;
            break;
        }
        if sweeps >= max_sweeps {
            break;
        }
        progress.step(sweeps, max_sweeps)?;

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p][q];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
                let t = if theta.abs() > 1e150 {
                    0.5 / theta
                } else {
                    let sign = if theta >= 0.0 { 1.0 } else { -1.0 };
                    sign / (theta.abs() + (theta * theta + 1.0).sqrt())
                };
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for row in a.iter_mut() {
                    let (akp, akq) = (row[p], row[q]);
                    row[p] = c * akp - s * akq;
                    row[q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[p][k], a[q][k]);
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                a[p][q] = 0.0;
                a[q][p] = 0.0;

                for row in v.iter_mut() {
                    let (vkp, vkq) = (row[p], row[q]);
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
        sweeps += 1;
    }

    if !converged {
        warn!(
            "jacobi: n={} did not converge within {} sweeps",
            n, max_sweeps
        );
        return Err(OrdoError::Degenerate(format!(
            "jacobi did not converge within {} sweeps",
            max_sweeps
        )));
    }
    debug!("jacobi: n={} converged after {} sweeps", n, sweeps);

    let values = (0..n).map(|i| a[i][i]).collect();
    Ok(SymmetricEigen {
        values,
        vectors: v,
        sweeps,
    })
}

/// Real eigenpairs of a general 3×3 matrix, sorted by increasing eigenvalue.
///
/// Eigenvalues are the real roots of the characteristic cubic; each
/// eigenvector is the unit null vector of `m − λI`, taken as the largest cross
/// product of two of its rows. Complex pairs are omitted, as are eigenvalues
/// whose null space cannot be resolved (repeated roots).
pub fn eigen_3x3(m: &[[f64; 3]; 3]) -> Vec<(f64, [f64; 3])> {
    let scale = m
        .iter()
        .flat_map(|r| r.iter())
        .fold(0.0f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return Vec::new();
    }
    let mut s = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            s[i][j] = m[i][j] / scale;
        }
    }

    // det(λI − S) = λ³ + c2 λ² + c1 λ + c0
    let trace = s[0][0] + s[1][1] + s[2][2];
    let minors = s[0][0] * s[1][1] - s[0][1] * s[1][0] + s[0][0] * s[2][2]
        - s[0][2] * s[2][0]
        + s[1][1] * s[2][2]
        - s[1][2] * s[2][1];
    let det = crate::linalg::determinant_3x3(&s);
    let (c2, c1, c0) = (-trace, minors, -det);

    let mut roots = real_cubic_roots(c2, c1, c0);
    for r in roots.iter_mut() {
        *r = polish_root(*r, c2, c1, c0);
    }
    roots.sort_by(|a, b| a.total_cmp(b));

    let mut pairs = Vec::with_capacity(3);
    for lambda in roots {
        if let Some(vec) = null_vector(&s, lambda) {
            pairs.push((lambda * scale, vec));
        }
    }
    pairs
}

fn real_cubic_roots(a: f64, b: f64, c: f64) -> Vec<f64> {
    let shift = a / 3.0;
    let p = b - a * a / 3.0;
    let q = 2.0 * a * a * a / 27.0 - a * b / 3.0 + c;
    let disc = (q / 2.0).powi(2) + (p / 3.0).powi(3);

    if p.abs() < 1e-14 && q.abs() < 1e-14 {
        return vec![-shift];
    }
    if disc < 0.0 {
        let r = (-p / 3.0).sqrt();
        let phi = (-q / (2.0 * r * r * r)).clamp(-1.0, 1.0).acos();
        (0..3)
            .map(|k| {
                2.0 * r * ((phi - 2.0 * std::f64::consts::PI * k as f64) / 3.0).cos() - shift
            })
            .collect()
    } else {
        let sq = disc.sqrt();
        let u = (-q / 2.0 + sq).cbrt();
        let v = (-q / 2.0 - sq).cbrt();
        let t = u + v;
        if disc <= 1e-14 * (q * q).max(1e-300) {
            // double root at -t/2
            vec![t - shift, -t / 2.0 - shift]
        } else {
            vec![t - shift]
        }
    }
}

fn polish_root(mut x: f64, a: f64, b: f64, c: f64) -> f64 {
    for _ in 0..3 {
        let f = ((x + a) * x + b) * x + c;
        let df = (3.0 * x + 2.0 * a) * x + b;
        if df == 0.0 || !df.is_finite() {
            break;
        }
        let next = x - f / df;
        if !next.is_finite() {
            break;
        }
        x = next;
    }
    x
}

fn null_vector(s: &[[f64; 3]; 3], lambda: f64) -> Option<[f64; 3]> {
    let mut a = *s;
    for (i, row) in a.iter_mut().enumerate() {
        row[i] -= lambda;
    }
    let cross = |u: &[f64; 3], w: &[f64; 3]| -> [f64; 3] {
        [
            u[1] * w[2] - u[2] * w[1],
            u[2] * w[0] - u[0] * w[2],
            u[0] * w[1] - u[1] * w[0],
        ]
    };
    let candidates = [
        cross(&a[0], &a[1]),
        cross(&a[0], &a[2]),
        cross(&a[1], &a[2]),
    ];
    let mut best = candidates[0];
    let mut best_norm = 0.0;
    for c in candidates {
        let n = crate::linalg::l2_norm(&c);
        if n > best_norm {
            best_norm = n;
            best = c;
        }
    }
    if best_norm < 1e-12 {
        return None;
    }
    Some([best[0] / best_norm, best[1] / best_norm, best[2] / best_norm])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordo_core::{CancelFlag, Silent};

    fn residual(m: &[Vec<f64>], eig: &SymmetricEigen, k: usize) -> f64 {
        let n = m.len();
        (0..n)
            .map(|i| {
                let av: f64 = (0..n).map(|j| m[i][j] * eig.vectors[j][k]).sum();
                (av - eig.values[k] * eig.vectors[i][k]).abs()
            })
            .fold(0.0, f64::max)
    }

    #[test]
    fn jacobi_2x2() {
        let m = vec![vec![3.0, 1.0], vec![1.0, 3.0]];
        let eig = symmetric_eigen(&m, 100, &Silent).unwrap();
        let mut values = eig.values.clone();
        values.sort_by(|a, b| a.total_cmp(b));
        assert!((values[0] - 2.0).abs() < 1e-12);
        assert!((values[1] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn jacobi_residuals_small() {
        let m = vec![
            vec![5.0, 2.0, 1.0, 0.5],
            vec![2.0, 3.0, 0.5, -1.0],
            vec![1.0, 0.5, 1.0, 0.2],
            vec![0.5, -1.0, 0.2, -2.0],
        ];
        let eig = symmetric_eigen(&m, 100, &Silent).unwrap();
        for k in 0..4 {
            assert!(residual(&m, &eig, k) < 1e-10, "residual for {}", k);
        }
        let trace: f64 = eig.values.iter().sum();
        assert!((trace - 7.0).abs() < 1e-10);
    }

    #[test]
    fn jacobi_eigenvectors_orthonormal() {
        let m = vec![
            vec![2.0, -1.0, 0.0],
            vec![-1.0, 2.0, -1.0],
            vec![0.0, -1.0, 2.0],
        ];
        let eig = symmetric_eigen(&m, 100, &Silent).unwrap();
        for a in 0..3 {
            for b in 0..3 {
                let d: f64 = (0..3).map(|i| eig.vectors[i][a] * eig.vectors[i][b]).sum();
                let expected = if a == b { 1.0 } else { 0.0 };
                assert!((d - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn jacobi_canceled() {
        let flag = CancelFlag::new();
        flag.cancel();
        let m = vec![vec![1.0, 0.5], vec![0.5, 1.0]];
        assert_eq!(
            symmetric_eigen(&m, 100, &flag).unwrap_err(),
            OrdoError::Canceled
        );
    }

    #[test]
    fn jacobi_sweep_limit_is_an_error() {
        let m = vec![vec![2.0, 1.0], vec![1.0, 2.0]];
        assert!(matches!(
            symmetric_eigen(&m, 0, &Silent),
            Err(OrdoError::Degenerate(_))
        ));
        // already diagonal: converged before any sweep
        let d = vec![vec![2.0, 0.0], vec![0.0, 5.0]];
        let eig = symmetric_eigen(&d, 0, &Silent).unwrap();
        assert_eq!(eig.sweeps, 0);
        assert_eq!(eig.values, vec![2.0, 5.0]);
    }

    #[test]
    fn jacobi_non_square_error() {
        let m = vec![vec![1.0, 0.5], vec![0.5]];
        assert!(symmetric_eigen(&m, 100, &Silent).is_err());
    }

    #[test]
    fn eigen_3x3_diagonal() {
        let m = [[3.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 2.0]];
        let pairs = eigen_3x3(&m);
        let values: Vec<f64> = pairs.iter().map(|p| p.0).collect();
        assert_eq!(values.len(), 3);
        assert!((values[0] + 1.0).abs() < 1e-12);
        assert!((values[1] - 2.0).abs() < 1e-12);
        assert!((values[2] - 3.0).abs() < 1e-12);
        assert!((pairs[0].1[1].abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn eigen_3x3_non_symmetric() {
        // upper triangular: eigenvalues on the diagonal
        let m = [[1.0, 2.0, 3.0], [0.0, 4.0, 5.0], [0.0, 0.0, 6.0]];
        let pairs = eigen_3x3(&m);
        assert_eq!(pairs.len(), 3);
        for (lambda, v) in &pairs {
            for i in 0..3 {
                let mv: f64 = (0..3).map(|j| m[i][j] * v[j]).sum();
                assert!((mv - lambda * v[i]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn eigen_3x3_rotation_has_one_real_root() {
        // rotation about z by 90°: eigenvalues 1, ±i
        let m = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let pairs = eigen_3x3(&m);
        assert_eq!(pairs.len(), 1);
        assert!((pairs[0].0 - 1.0).abs() < 1e-12);
        assert!((pairs[0].1[2].abs() - 1.0).abs() < 1e-12);
    }
}
