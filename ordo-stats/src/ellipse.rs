//! Direct least-squares ellipse fitting.
//!
//! Implements the Fitzgibbon–Pilu–Fisher fit in the numerically stable form of
//! Halir & Flusser, "Numerically stable direct least squares fitting of
//! ellipses" (1998). Typical input is the PCoA projection of one sample group.

use std::collections::BTreeMap;

use log::debug;
use ordo_core::{OrdoError, Result, Summarizable};

use crate::eigen::eigen_3x3;
use crate::linalg;
use crate::pcoa::PcoaResult;

/// Smallest number of points accepted by [`fit_ellipse`].
pub const MIN_POINTS: usize = 5;

/// Geometric ellipse parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ellipse {
    /// Center x.
    pub center_x: f64,
    /// Center y.
    pub center_y: f64,
    /// Semi-major axis length.
    pub a: f64,
    /// Semi-minor axis length.
    pub b: f64,
    /// Counter-clockwise rotation of the major axis from the x axis, in radians.
    pub angle: f64,
    /// Unit-norm conic coefficients `[A, B, C, D, E, F]` of
    /// `Ax² + Bxy + Cy² + Dx + Ey + F = 0`.
    conic: [f64; 6],
}

impl Ellipse {
    /// The fitted general conic, normalized to unit length.
    pub fn conic(&self) -> [f64; 6] {
        self.conic
    }

    /// Point at parameter `t` (radians) on the ellipse outline.
    pub fn point_at(&self, t: f64) -> (f64, f64) {
        let (sin, cos) = self.angle.sin_cos();
        let (u, v) = (self.a * t.cos(), self.b * t.sin());
        (
            self.center_x + u * cos - v * sin,
            self.center_y + u * sin + v * cos,
        )
    }

    /// Enclosed area.
    pub fn area(&self) -> f64 {
        std::f64::consts::PI * self.a * self.b
    }

    /// True if `(x, y)` lies inside or on the ellipse.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let (sin, cos) = self.angle.sin_cos();
        let (dx, dy) = (x - self.center_x, y - self.center_y);
        let u = dx * cos + dy * sin;
        let v = -dx * sin + dy * cos;
        (u / self.a).powi(2) + (v / self.b).powi(2) <= 1.0
    }
}

impl Summarizable for Ellipse {
    fn summary(&self) -> String {
        format!(
            "Ellipse: center ({:.4}, {:.4}), axes {:.4} x {:.4}, angle {:.4} rad",
            self.center_x, self.center_y, self.a, self.b, self.angle
        )
    }
}

/// Fit an ellipse to 2D points.
///
/// # Errors
///
/// Returns [`OrdoError::InvalidInput`] for fewer than [`MIN_POINTS`] points or
/// non-finite coordinates, and [`OrdoError::Degenerate`] when the points do
/// not determine an ellipse (collinear points, a hyperbola-only solution, or
/// `b² − ac = 0`).
pub fn fit_ellipse(points: &[[f64; 2]]) -> Result<Ellipse> {
    if points.len() < MIN_POINTS {
        return Err(OrdoError::InvalidInput(format!(
            "ellipse fit: at least {} points required, got {}",
            MIN_POINTS,
            points.len()
        )));
    }
    if points.iter().flatten().any(|v| !v.is_finite()) {
        return Err(OrdoError::InvalidInput(
            "ellipse fit: non-finite coordinate".into(),
        ));
    }

    let n = points.len() as f64;
    let mx = points.iter().map(|p| p[0]).sum::<f64>() / n;
    let my = points.iter().map(|p| p[1]).sum::<f64>() / n;

    // D1 = [x², xy, y²], D2 = [x, y, 1] on centered coordinates
    let mut s1 = [[0.0; 3]; 3];
    let mut s2 = [[0.0; 3]; 3];
    let mut s3 = [[0.0; 3]; 3];
    for p in points {
        let (x, y) = (p[0] - mx, p[1] - my);
        let d1 = [x * x, x * y, y * y];
        let d2 = [x, y, 1.0];
        for i in 0..3 {
            for j in 0..3 {
                s1[i][j] += d1[i] * d1[j];
                s2[i][j] += d1[i] * d2[j];
                s3[i][j] += d2[i] * d2[j];
            }
        }
    }

    let s3_inv = linalg::inverse_3x3(&s3)
        .ok_or_else(|| OrdoError::Degenerate("ellipse fit: points are collinear".into()))?;

    // T = -S3⁻¹ S2ᵀ
    let mut t = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            t[i][j] = -(0..3).map(|k| s3_inv[i][k] * s2[j][k]).sum::<f64>();
        }
    }
    // M = S1 + S2 T
    let mut m = s1;
    for i in 0..3 {
        for j in 0..3 {
            m[i][j] += (0..3).map(|k| s2[i][k] * t[k][j]).sum::<f64>();
        }
    }
    // premultiply by the inverse of the constraint matrix C1
    let reduced = [
        [m[2][0] / 2.0, m[2][1] / 2.0, m[2][2] / 2.0],
        [-m[1][0], -m[1][1], -m[1][2]],
        [m[0][0] / 2.0, m[0][1] / 2.0, m[0][2] / 2.0],
    ];

    let a1 = eigen_3x3(&reduced)
        .into_iter()
        .map(|(_, v)| v)
        .find(|v| 4.0 * v[0] * v[2] - v[1] * v[1] > 0.0)
        .ok_or_else(|| OrdoError::Degenerate("ellipse fit: no elliptic solution".into()))?;

    let a2: Vec<f64> = (0..3)
        .map(|i| (0..3).map(|k| t[i][k] * a1[k]).sum())
        .collect();
    let (ca, cb, cc) = (a1[0], a1[1], a1[2]);
    let (cd, ce, cf) = (a2[0], a2[1], a2[2]);

    // undo the centering translation
    let mut conic = [
        ca,
        cb,
        cc,
        cd - 2.0 * ca * mx - cb * my,
        ce - 2.0 * cc * my - cb * mx,
        cf + ca * mx * mx + cb * mx * my + cc * my * my - cd * mx - ce * my,
    ];
    linalg::normalize(&mut conic);

    conic_to_ellipse(conic)
}

/// Convert unit-norm conic coefficients to center, semi-axes and angle.
///
/// Uses the closed forms from Wolfram MathWorld's "Ellipse" entry, with
/// `a = A`, `b = B/2`, `c = C`, `d = D/2`, `f = E/2`, `g = F`. The conic is
/// first negated if needed so that `A + C > 0`; the returned `a` is then the
/// semi-major axis and `angle` its direction.
pub fn conic_to_ellipse(mut conic: [f64; 6]) -> Result<Ellipse> {
    if conic[0] + conic[2] < 0.0 {
        for v in conic.iter_mut() {
            *v = -*v;
        }
    }
    let a = conic[0];
    let b = conic[1] / 2.0;
    let c = conic[2];
    let d = conic[3] / 2.0;
    let f = conic[4] / 2.0;
    let g = conic[5];

    let num = b * b - a * c;
    if num == 0.0 {
        return Err(OrdoError::Degenerate(
            "ellipse fit: b^2 - ac = 0".into(),
        ));
    }

    let center_x = (c * d - b * f) / num;
    let center_y = (a * f - b * d) / num;

    let up = 2.0 * (a * f * f + c * d * d + g * b * b - 2.0 * b * d * f - a * c * g);
    let root = ((a - c) * (a - c) + 4.0 * b * b).sqrt();
    let semi_a = (up / (num * (root - (a + c)))).sqrt();
    let semi_b = (up / (num * (-root - (a + c)))).sqrt();
    if !(semi_a.is_finite() && semi_b.is_finite()) || semi_a <= 0.0 || semi_b <= 0.0 {
        return Err(OrdoError::Degenerate(format!(
            "ellipse fit: invalid semi-axes ({}, {})",
            semi_a, semi_b
        )));
    }

    let angle = if b == 0.0 {
        if a <= c {
            0.0
        } else {
            std::f64::consts::FRAC_PI_2
        }
    } else {
        let half = (2.0 * b / (a - c)).atan() / 2.0;
        if a > c {
            half + std::f64::consts::FRAC_PI_2
        } else {
            half
        }
    };

    Ok(Ellipse {
        center_x,
        center_y,
        a: semi_a,
        b: semi_b,
        angle,
        conic,
    })
}

/// Fit one ellipse per group on PCoA axes 1 and 2.
///
/// `groups` maps a group name to its sample names. Groups with fewer than
/// [`MIN_POINTS`] known samples, or whose fit is degenerate, are skipped.
pub fn fit_group_ellipses(
    result: &PcoaResult,
    groups: &BTreeMap<String, Vec<String>>,
) -> BTreeMap<String, Ellipse> {
    let mut ellipses = BTreeMap::new();
    for (group, samples) in groups {
        let points: Vec<[f64; 2]> = samples
            .iter()
            .filter_map(|s| result.projection(0, 1, 2, s))
            .map(|p| [p[0], p[1]])
            .collect();
        if points.len() < MIN_POINTS {
            debug!(
                "ellipse: skipping group '{}' with {} points",
                group,
                points.len()
            );
            continue;
        }
        match fit_ellipse(&points) {
            Ok(e) => {
                ellipses.insert(group.clone(), e);
            }
            Err(err) => debug!("ellipse: skipping group '{}': {}", group, err),
        }
    }
    ellipses
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sample(cx: f64, cy: f64, a: f64, b: f64, angle: f64, n: usize) -> Vec<[f64; 2]> {
        let (sin, cos) = angle.sin_cos();
        (0..n)
            .map(|i| {
                let t = 2.0 * PI * i as f64 / n as f64;
                let (u, v) = (a * t.cos(), b * t.sin());
                [cx + u * cos - v * sin, cy + u * sin + v * cos]
            })
            .collect()
    }

    /// Angle difference modulo π.
    fn angle_diff(x: f64, y: f64) -> f64 {
        let d = (x - y).rem_euclid(PI);
        d.min(PI - d)
    }

    #[test]
    fn recovers_axis_aligned_ellipse() {
        let e = fit_ellipse(&sample(0.0, 0.0, 5.0, 2.0, 0.0, 100)).unwrap();
        assert!(e.center_x.abs() < 1e-6, "cx = {}", e.center_x);
        assert!(e.center_y.abs() < 1e-6, "cy = {}", e.center_y);
        assert!((e.a - 5.0).abs() < 1e-6, "a = {}", e.a);
        assert!((e.b - 2.0).abs() < 1e-6, "b = {}", e.b);
        assert!(angle_diff(e.angle, 0.0) < 1e-6, "angle = {}", e.angle);
    }

    #[test]
    fn recovers_rotated_offset_ellipse() {
        let angle = 30f64.to_radians();
        let e = fit_ellipse(&sample(3.0, -2.0, 4.0, 1.5, angle, 1000)).unwrap();
        assert!((e.center_x - 3.0).abs() < 1e-2);
        assert!((e.center_y + 2.0).abs() < 1e-2);
        assert!((e.a - 4.0).abs() / 4.0 < 1e-2);
        assert!((e.b - 1.5).abs() / 1.5 < 1e-2);
        assert!(angle_diff(e.angle, angle) < 1e-2);
    }

    #[test]
    fn recovers_ellipse_with_major_axis_near_vertical() {
        let angle = 70f64.to_radians();
        let e = fit_ellipse(&sample(-1.0, 1.0, 3.0, 1.0, angle, 200)).unwrap();
        assert!((e.a - 3.0).abs() < 1e-3);
        assert!((e.b - 1.0).abs() < 1e-3);
        assert!(angle_diff(e.angle, angle) < 1e-3);
    }

    #[test]
    fn noisy_points_fit_loosely() {
        let mut points = sample(1.0, 2.0, 6.0, 3.0, 0.4, 400);
        let mut state: u64 = 7;
        for p in points.iter_mut() {
            for v in p.iter_mut() {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                let noise = ((state >> 11) as f64 / (1u64 << 53) as f64 - 0.5) * 0.05;
                *v += noise;
            }
        }
        let e = fit_ellipse(&points).unwrap();
        assert!((e.center_x - 1.0).abs() < 0.05);
        assert!((e.center_y - 2.0).abs() < 0.05);
        assert!((e.a - 6.0).abs() < 0.1);
        assert!((e.b - 3.0).abs() < 0.1);
        assert!(angle_diff(e.angle, 0.4) < 0.05);
    }

    #[test]
    fn conic_is_unit_norm() {
        let e = fit_ellipse(&sample(0.0, 0.0, 5.0, 2.0, 0.0, 50)).unwrap();
        let norm: f64 = e.conic().iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn too_few_points_error() {
        let pts = sample(0.0, 0.0, 1.0, 1.0, 0.0, 4);
        assert!(matches!(
            fit_ellipse(&pts),
            Err(OrdoError::InvalidInput(_))
        ));
    }

    #[test]
    fn collinear_points_degenerate() {
        let pts: Vec<[f64; 2]> = (0..10).map(|i| [i as f64, 2.0 * i as f64]).collect();
        assert!(fit_ellipse(&pts).is_err());
    }

    #[test]
    fn parabola_coefficients_degenerate() {
        // y = x²: A = 1, C = 0, b = 0 → b² − ac = 0
        let conic = [1.0, 0.0, 0.0, 0.0, -1.0, 0.0];
        assert!(matches!(
            conic_to_ellipse(conic),
            Err(OrdoError::Degenerate(_))
        ));
    }

    #[test]
    fn angle_convention_for_axis_aligned_conics() {
        // x²/4 + y²/25 = 1: a > c, so the 5-axis is vertical
        let e = conic_to_ellipse([0.25, 0.0, 0.04, 0.0, 0.0, -1.0]).unwrap();
        assert!((e.angle - PI / 2.0).abs() < 1e-12);
        assert!((e.a - 5.0).abs() < 1e-12);
        assert!((e.b - 2.0).abs() < 1e-12);
    }

    #[test]
    fn outline_and_containment() {
        let e = fit_ellipse(&sample(2.0, 1.0, 5.0, 2.0, 0.3, 100)).unwrap();
        for i in 0..8 {
            let (x, y) = e.point_at(i as f64);
            let [ca, cb, cc, cd, ce, cf] = e.conic();
            let value = ca * x * x + cb * x * y + cc * y * y + cd * x + ce * y + cf;
            assert!(value.abs() < 1e-8);
        }
        assert!(e.contains(2.0, 1.0));
        assert!(!e.contains(20.0, 1.0));
        assert!((e.area() - PI * 10.0).abs() < 1e-4);
    }

    #[test]
    fn group_ellipses_skip_small_groups() {
        use ordo_core::{Distances, Taxa};

        let pts = sample(0.0, 0.0, 4.0, 1.0, 0.5, 8);
        let mut labels: Vec<String> = (0..8).map(|i| format!("ring{}", i)).collect();
        labels.push("lonely".into());
        let mut all = pts.clone();
        all.push([10.0, 10.0]);
        let taxa = Taxa::from_labels(labels.clone()).unwrap();
        let mut d = Distances::new(all.len());
        for i in 0..all.len() {
            for j in (i + 1)..all.len() {
                let dx: f64 = all[i][0] - all[j][0];
                let dy: f64 = all[i][1] - all[j][1];
                d.set(i + 1, j + 1, (dx * dx + dy * dy).sqrt());
            }
        }
        let result = crate::pcoa::pcoa(&taxa, &d).unwrap();

        let mut groups = BTreeMap::new();
        groups.insert("ring".to_string(), labels[..8].to_vec());
        groups.insert("single".to_string(), vec!["lonely".to_string()]);
        let ellipses = fit_group_ellipses(&result, &groups);
        assert!(ellipses.contains_key("ring"));
        assert!(!ellipses.contains_key("single"));
    }
}
