//! Radial basis function kernel
//!
//! Global interpolant `f(x) = Σᵢ wᵢ · φ(‖x − xᵢ‖)` with weights solved from
//! `Φ w = z`. Dense O(n³) solve, so large observation sets are thinned to
//! `max_points` by taking every k-th observation.
//!
//! Reference:
//! Hardy, R.L. (1971). Multiquadric equations of topography and other
//! irregular surfaces. JGR, 76(8).

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use aquigrid_core::{Error, Result};

use super::Observation;
use crate::parallel::map_points;

/// Radial basis function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RbfFunction {
    /// `sqrt((r/ε)² + 1)`
    #[default]
    Multiquadric,
    /// `r² · ln(r)`
    ThinPlate,
    /// `exp(-(r/ε)²)`
    Gaussian,
    /// `r`
    Linear,
}

impl RbfFunction {
    #[inline]
    fn eval(self, r: f64, epsilon: f64) -> f64 {
        match self {
            RbfFunction::Multiquadric => ((r / epsilon).powi(2) + 1.0).sqrt(),
            RbfFunction::ThinPlate => {
                if r < 1e-15 {
                    0.0
                } else {
                    r * r * r.ln()
                }
            }
            RbfFunction::Gaussian => (-(r / epsilon).powi(2)).exp(),
            RbfFunction::Linear => r,
        }
    }
}

/// Parameters for the radial basis kernel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RbfParams {
    pub function: RbfFunction,
    /// Shape parameter. `None`: average nodal spacing,
    /// `(bbox area / n)^(1/2)`.
    pub epsilon: Option<f64>,
    /// Diagonal regularisation (0 = exact interpolation)
    pub smoothing: f64,
    /// Observations above this count are thinned by stride
    pub max_points: usize,
}

impl Default for RbfParams {
    fn default() -> Self {
        Self {
            function: RbfFunction::Multiquadric,
            epsilon: None,
            smoothing: 0.0,
            max_points: 800,
        }
    }
}

fn default_epsilon(points: &[Observation]) -> f64 {
    let (mut xmin, mut xmax) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut ymin, mut ymax) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in points {
        xmin = xmin.min(p.x);
        xmax = xmax.max(p.x);
        ymin = ymin.min(p.y);
        ymax = ymax.max(p.y);
    }
    let n = points.len() as f64;
    let (w, h) = (xmax - xmin, ymax - ymin);
    let eps = (w * h / n).sqrt();
    if eps.is_finite() && eps > 0.0 {
        eps
    } else {
        // Degenerate box (all points on an axis-parallel line)
        let span = w.max(h) / n;
        if span > 0.0 {
            span
        } else {
            1.0
        }
    }
}

/// Every k-th observation so that at most `max_points` remain
fn thin(points: &[Observation], max_points: usize) -> Vec<Observation> {
    if max_points == 0 || points.len() <= max_points {
        return points.to_vec();
    }
    let stride = points.len().div_ceil(max_points);
    debug!(from = points.len(), stride, "thinning observations for RBF");
    points.iter().step_by(stride).copied().collect()
}

/// Radial basis kernel evaluated at the given coordinates.
pub fn radial_basis(
    observations: &[Observation],
    xs: &Array2<f64>,
    ys: &Array2<f64>,
    params: &RbfParams,
) -> Result<Array2<f64>> {
    let pts = thin(observations, params.max_points);
    let n = pts.len();
    if n < 3 {
        return Err(Error::Algorithm(format!("radial basis needs at least 3 points, got {n}")));
    }
    let epsilon = params.epsilon.unwrap_or_else(|| default_epsilon(&pts));
    if !(epsilon.is_finite() && epsilon > 0.0) {
        return Err(Error::invalid("epsilon", epsilon, "must be a positive number"));
    }

    // Local origin keeps the distance matrix well scaled.
    let (ox, oy) = (pts[0].x, pts[0].y);
    let local: Vec<(f64, f64)> = pts.iter().map(|p| (p.x - ox, p.y - oy)).collect();

    let mut mat = vec![0.0_f64; n * n];
    let mut rhs: Vec<f64> = pts.iter().map(|p| p.value).collect();
    for i in 0..n {
        for j in 0..n {
            let (dx, dy) = (local[i].0 - local[j].0, local[i].1 - local[j].1);
            let r = (dx * dx + dy * dy).sqrt();
            mat[i * n + j] = params.function.eval(r, epsilon);
        }
        mat[i * n + i] -= params.smoothing;
    }

    let weights = gauss_solve(n, &mut mat, &mut rhs)?;
    let function = params.function;

    map_points(xs, ys, |x, y| {
        let (lx, ly) = (x - ox, y - oy);
        local
            .iter()
            .zip(&weights)
            .map(|(&(px, py), w)| {
                let r = ((lx - px).powi(2) + (ly - py).powi(2)).sqrt();
                w * function.eval(r, epsilon)
            })
            .sum()
    })
}

/// Solve `A x = b` by Gaussian elimination with partial pivoting.
///
/// `mat` is row-major `n × n`; both inputs are overwritten.
fn gauss_solve(n: usize, mat: &mut [f64], rhs: &mut [f64]) -> Result<Vec<f64>> {
    let scale = mat.iter().fold(0.0f64, |m, v| m.max(v.abs())).max(f64::MIN_POSITIVE);

    for col in 0..n {
        let (pivot_row, pivot_abs) = (col..n)
            .map(|r| (r, mat[r * n + col].abs()))
            .fold((col, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });

        if pivot_abs < 1e-13 * scale {
            return Err(Error::Algorithm(
                "radial basis system is singular (duplicate points?)".into(),
            ));
        }

        if pivot_row != col {
            for j in 0..n {
                mat.swap(col * n + j, pivot_row * n + j);
            }
            rhs.swap(col, pivot_row);
        }

        let pivot = mat[col * n + col];
        for row in (col + 1)..n {
            let factor = mat[row * n + col] / pivot;
            if factor == 0.0 {
                continue;
            }
            mat[row * n + col] = 0.0;
            for j in (col + 1)..n {
                mat[row * n + j] -= factor * mat[col * n + j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = vec![0.0_f64; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|j| mat[row * n + j] * x[j]).sum();
        x[row] = (rhs[row] - tail) / mat[row * n + row];
    }
    Ok(x)
}
