//! Dense matrix helpers shared by PCoA, loading vectors and ellipse fitting.
//!
//! Matrices are `Vec<Vec<f64>>` in row-major order. Every function returns a
//! new matrix and leaves its inputs untouched, so each stage of a pipeline
//! can be inspected on its own.

use ordo_core::{OrdoError, ProgressListener, Result};

/// `n × n` identity matrix.
pub fn identity(n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| {
            let mut row = vec![0.0; n];
            row[i] = 1.0;
            row
        })
        .collect()
}

/// Transpose of a rectangular matrix.
pub fn transpose(a: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let rows = a.len();
    let cols = a.first().map_or(0, |r| r.len());
    (0..cols)
        .map(|j| (0..rows).map(|i| a[i][j]).collect())
        .collect()
}

/// Matrix product `a · b`.
///
/// # Errors
///
/// Returns an error if the inner dimensions differ or a matrix is ragged.
pub fn multiply(a: &[Vec<f64>], b: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    let inner = b.len();
    let cols = b.first().map_or(0, |r| r.len());
    check_rectangular(a, "multiply: left")?;
    check_rectangular(b, "multiply: right")?;
    if let Some(row) = a.first() {
        if row.len() != inner {
            return Err(OrdoError::InvalidInput(format!(
                "multiply: {}x{} times {}x{}",
                a.len(),
                row.len(),
                inner,
                cols
            )));
        }
    }

    let row_product = |row: &Vec<f64>| -> Vec<f64> {
        let mut out = vec![0.0; cols];
        for (k, &aik) in row.iter().enumerate() {
            if aik == 0.0 {
                continue;
            }
            for (o, &bkj) in out.iter_mut().zip(&b[k]) {
                *o += aik * bkj;
            }
        }
        out
    };

    #[cfg(feature = "parallel")]
    let product = {
        use rayon::prelude::*;
        a.par_iter().map(row_product).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let product = a.iter().map(row_product).collect();

    Ok(product)
}

/// Gower's double centering of squared distances.
///
/// `B[i][j] = -½ (D[i][j]² − rowAvg[j] − colAvg[i] + overallAvg)` where the
/// averages are taken over squared distances.
pub fn double_center_squared(d: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let (sq, row_avg, col_avg, overall) = squared_averages(d);
    (0..d.len())
        .map(|i| gower_row(&sq[i], &row_avg, col_avg[i], overall))
        .collect()
}

/// [`double_center_squared`], polling `progress` once per output row.
///
/// # Errors
///
/// Returns [`OrdoError::Canceled`] if the listener cancels.
pub fn double_center_squared_with_progress(
    d: &[Vec<f64>],
    progress: &dyn ProgressListener,
) -> Result<Vec<Vec<f64>>> {
    let n = d.len();
    let (sq, row_avg, col_avg, overall) = squared_averages(d);
    let mut b = Vec::with_capacity(n);
    for i in 0..n {
        progress.step(i, n)?;
        b.push(gower_row(&sq[i], &row_avg, col_avg[i], overall));
    }
    Ok(b)
}

fn squared_averages(d: &[Vec<f64>]) -> (Vec<Vec<f64>>, Vec<f64>, Vec<f64>, f64) {
    let n = d.len();
    let sq: Vec<Vec<f64>> = d
        .iter()
        .map(|row| row.iter().map(|v| v * v).collect())
        .collect();

    let mut row_avg = vec![0.0; n];
    let mut col_avg = vec![0.0; n];
    let mut overall = 0.0;
    for i in 0..n {
        for j in 0..n {
            row_avg[i] += sq[i][j];
            col_avg[j] += sq[i][j];
            overall += sq[i][j];
        }
    }
    if n > 0 {
        for v in row_avg.iter_mut().chain(col_avg.iter_mut()) {
            *v /= n as f64;
        }
        overall /= (n * n) as f64;
    }
    (sq, row_avg, col_avg, overall)
}

fn gower_row(sq_row: &[f64], row_avg: &[f64], col_avg_i: f64, overall: f64) -> Vec<f64> {
    sq_row
        .iter()
        .zip(row_avg)
        .map(|(s, r)| -0.5 * (s - r - col_avg_i + overall))
        .collect()
}

/// Cross-covariance of the columns of `x` (`n × p`) and `y` (`n × q`).
///
/// Entry `[a][b]` is `Σ (x_a − x̄_a)(y_b − ȳ_b) / n`, multiplied by
/// `n / (n − 1)` when `bias_corrected` is set.
///
/// # Errors
///
/// Returns an error if the row counts differ, a matrix is ragged or empty, or
/// `bias_corrected` is requested with a single row.
pub fn covariance(x: &[Vec<f64>], y: &[Vec<f64>], bias_corrected: bool) -> Result<Vec<Vec<f64>>> {
    let n = x.len();
    if n == 0 || y.len() != n {
        return Err(OrdoError::InvalidInput(format!(
            "covariance: row counts {} and {} must match and be non-zero",
            n,
            y.len()
        )));
    }
    if bias_corrected && n < 2 {
        return Err(OrdoError::InvalidInput(
            "covariance: bias correction needs at least 2 rows".into(),
        ));
    }
    check_rectangular(x, "covariance: x")?;
    check_rectangular(y, "covariance: y")?;

    let xc = center_columns(x);
    let yc = center_columns(y);
    let mut cov = multiply(&transpose(&xc), &yc)?;

    let factor = if bias_corrected {
        1.0 / (n - 1) as f64
    } else {
        1.0 / n as f64
    };
    for row in cov.iter_mut() {
        for v in row.iter_mut() {
            *v *= factor;
        }
    }
    Ok(cov)
}

/// Column means of a rectangular matrix.
pub fn column_means(x: &[Vec<f64>]) -> Vec<f64> {
    let n = x.len();
    let p = x.first().map_or(0, |r| r.len());
    let mut means = vec![0.0; p];
    for row in x {
        for (m, v) in means.iter_mut().zip(row) {
            *m += v;
        }
    }
    if n > 0 {
        for m in means.iter_mut() {
            *m /= n as f64;
        }
    }
    means
}

/// Subtract each column's mean.
pub fn center_columns(x: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let means = column_means(x);
    x.iter()
        .map(|row| row.iter().zip(&means).map(|(v, m)| v - m).collect())
        .collect()
}

/// Center each column, then divide it by `sqrt(sumSquares / (n − 1))`.
///
/// Columns whose scale is zero are only centered. A single row is centered
/// without scaling.
pub fn center_and_scale_columns(x: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = x.len();
    let mut centered = center_columns(x);
    if n < 2 {
        return centered;
    }
    let p = centered.first().map_or(0, |r| r.len());
    for j in 0..p {
        let ss: f64 = centered.iter().map(|row| row[j] * row[j]).sum();
        let scale = (ss / (n - 1) as f64).sqrt();
        if scale != 0.0 {
            for row in centered.iter_mut() {
                row[j] /= scale;
            }
        }
    }
    centered
}

/// Index permutation ordering `values` by decreasing absolute value.
///
/// The sort is stable, so equal magnitudes keep their original order.
pub fn sort_by_eigenvalue(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].abs().total_cmp(&values[a].abs()));
    order
}

/// Inverse of a 3×3 matrix, or `None` if it is singular.
pub fn inverse_3x3(m: &[[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let det = determinant_3x3(m);
    let scale = m
        .iter()
        .flat_map(|r| r.iter())
        .fold(0.0f64, |acc, v| acc.max(v.abs()));
    if det == 0.0 || !det.is_finite() || det.abs() <= 1e-14 * scale.powi(3) {
        return None;
    }
    let mut inv = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            // cofactor of (j, i) gives the adjugate entry (i, j)
            let (r0, r1) = ((j + 1) % 3, (j + 2) % 3);
            let (c0, c1) = ((i + 1) % 3, (i + 2) % 3);
            inv[i][j] = (m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0]) / det;
        }
    }
    Some(inv)
}

/// Determinant of a 3×3 matrix.
pub fn determinant_3x3(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Dot product.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean norm.
pub fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Scale `v` to unit length in place (no-op for the zero vector).
pub fn normalize(v: &mut [f64]) {
    let n = l2_norm(v);
    if n > 0.0 {
        for val in v.iter_mut() {
            *val /= n;
        }
    }
}

fn check_rectangular(a: &[Vec<f64>], what: &str) -> Result<()> {
    let cols = a.first().map_or(0, |r| r.len());
    if let Some(i) = a.iter().position(|r| r.len() != cols) {
        return Err(OrdoError::InvalidInput(format!(
            "{}: row {} has length {}, expected {}",
            what,
            i,
            a[i].len(),
            cols
        )));
    }
    Ok(())
}
