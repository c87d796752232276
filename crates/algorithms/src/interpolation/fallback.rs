//! Kernel dispatch, quality scoring, gap filling and the fallback chain.
//!
//! Every candidate method produces a `(field, quality)` pair. The chain keeps
//! the best-scoring field and fills its remaining gaps, first from the
//! nearest observation and then, as a last resort, with the median.

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use aquigrid_core::{Error, Result, StructuredGrid};

use super::kdtree::KdTree;
use super::{cubic, linear, nearest, radial_basis, Observation, RbfParams, ScatterObservations};

/// Weight of the finite fraction in the candidate score
const FINITE_WEIGHT: f64 = 0.7;
/// Weight of the plausible-range fraction in the candidate score
const REASONABLE_WEIGHT: f64 = 0.3;

/// Interpolation kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMethod {
    Linear,
    Nearest,
    Cubic,
    RadialBasis,
}

/// Candidate order used when none is given
pub const DEFAULT_CANDIDATES: [InterpolationMethod; 3] = [
    InterpolationMethod::Linear,
    InterpolationMethod::Cubic,
    InterpolationMethod::Nearest,
];

impl InterpolationMethod {
    pub fn name(&self) -> &'static str {
        match self {
            InterpolationMethod::Linear => "linear",
            InterpolationMethod::Nearest => "nearest",
            InterpolationMethod::Cubic => "cubic",
            InterpolationMethod::RadialBasis => "radial_basis",
        }
    }
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InterpolationMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(InterpolationMethod::Linear),
            "nearest" => Ok(InterpolationMethod::Nearest),
            "cubic" => Ok(InterpolationMethod::Cubic),
            "rbf" | "radial_basis" | "radial-basis" => Ok(InterpolationMethod::RadialBasis),
            other => Err(Error::invalid("method", other, "expected linear, nearest, cubic or rbf")),
        }
    }
}

/// Parameters shared by all kernels
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationParams {
    /// Search radius of the nearest kernel and of nearest back-fill.
    /// `None` for unlimited.
    pub max_radius: Option<f64>,
    /// Upper end of the plausible range, as a multiple of the largest
    /// observation
    pub reasonable_factor: f64,
    pub rbf: RbfParams,
}

impl Default for InterpolationParams {
    fn default() -> Self {
        Self {
            max_radius: None,
            reasonable_factor: 1.5,
            rbf: RbfParams::default(),
        }
    }
}

/// How a field was produced and how much of it had to be patched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldQuality {
    pub method: InterpolationMethod,
    /// Share of cells the kernel itself produced a finite value for
    pub finite_fraction: f64,
    /// Share of cells within `[0, reasonable_factor × max(observed)]`
    pub reasonable_fraction: f64,
    pub score: f64,
    pub nearest_filled: usize,
    pub median_filled: usize,
    /// Median fill was needed
    pub degraded: bool,
    /// Kernel error, if the kernel failed; its cells were all back-filled
    pub failure: Option<String>,
}

impl FieldQuality {
    fn failed(method: InterpolationMethod, err: &Error) -> Self {
        Self {
            method,
            finite_fraction: 0.0,
            reasonable_fraction: 0.0,
            score: 0.0,
            nearest_filled: 0,
            median_filled: 0,
            degraded: false,
            failure: Some(err.to_string()),
        }
    }
}

/// A field at cell-center resolution with its quality record
#[derive(Debug, Clone)]
pub struct InterpolatedField {
    pub values: Array2<f64>,
    pub quality: FieldQuality,
}

/// Score a raw kernel output before any gap filling.
pub fn assess(
    method: InterpolationMethod,
    values: &Array2<f64>,
    max_observed: f64,
    reasonable_factor: f64,
) -> FieldQuality {
    let total = values.len();
    let upper = reasonable_factor * max_observed;
    let (finite, reasonable) = values.iter().fold((0usize, 0usize), |(f, r), &v| {
        if v.is_finite() {
            (f + 1, r + usize::from((0.0..=upper).contains(&v)))
        } else {
            (f, r)
        }
    });
    let frac = |n: usize| if total == 0 { 0.0 } else { n as f64 / total as f64 };
    let finite_fraction = frac(finite);
    let reasonable_fraction = frac(reasonable);
    FieldQuality {
        method,
        finite_fraction,
        reasonable_fraction,
        score: FINITE_WEIGHT * finite_fraction + REASONABLE_WEIGHT * reasonable_fraction,
        nearest_filled: 0,
        median_filled: 0,
        degraded: false,
        failure: None,
    }
}

/// Evaluate one kernel at the given coordinates without gap filling.
pub fn evaluate_kernel(
    method: InterpolationMethod,
    points: &[Observation],
    xs: &Array2<f64>,
    ys: &Array2<f64>,
    params: &InterpolationParams,
) -> Result<Array2<f64>> {
    match method {
        InterpolationMethod::Linear => linear(points, xs, ys),
        InterpolationMethod::Nearest => nearest(points, xs, ys, params.max_radius),
        InterpolationMethod::Cubic => cubic(points, xs, ys),
        InterpolationMethod::RadialBasis => radial_basis(points, xs, ys, &params.rbf),
    }
}

/// Run one candidate; a kernel error becomes an all-NaN field scoring 0.
fn run_candidate(
    method: InterpolationMethod,
    observations: &ScatterObservations,
    xs: &Array2<f64>,
    ys: &Array2<f64>,
    params: &InterpolationParams,
) -> (Array2<f64>, FieldQuality) {
    let max_observed = observations.max().unwrap_or(0.0);
    match evaluate_kernel(method, observations.points(), xs, ys, params) {
        Ok(values) => {
            let quality = assess(method, &values, max_observed, params.reasonable_factor);
            debug!(
                %method,
                score = quality.score,
                finite = quality.finite_fraction,
                "candidate evaluated"
            );
            (values, quality)
        }
        Err(err) => {
            warn!(%method, error = %err, "interpolation kernel failed");
            (Array2::from_elem(xs.dim(), f64::NAN), FieldQuality::failed(method, &err))
        }
    }
}

/// Fill non-finite cells from the nearest observation, then with `median`.
///
/// Returns `(nearest_filled, median_filled)`.
pub fn fill_gaps(
    values: &mut Array2<f64>,
    points: &[Observation],
    xs: &Array2<f64>,
    ys: &Array2<f64>,
    max_radius: Option<f64>,
    median: f64,
) -> (usize, usize) {
    if values.iter().all(|v| v.is_finite()) {
        return (0, 0);
    }
    let tree = KdTree::build(points);
    let max_sq = max_radius.map(|r| r * r);
    let (mut by_nearest, mut by_median) = (0, 0);
    for ((r, c), v) in values.indexed_iter_mut() {
        if v.is_finite() {
            continue;
        }
        match tree.nearest(xs[(r, c)], ys[(r, c)]) {
            Some(n) if max_sq.map_or(true, |m| n.distance_sq <= m) => {
                *v = n.point.value;
                by_nearest += 1;
            }
            _ => {
                *v = median;
                by_median += 1;
            }
        }
    }
    (by_nearest, by_median)
}

fn finish(
    mut values: Array2<f64>,
    mut quality: FieldQuality,
    observations: &ScatterObservations,
    xs: &Array2<f64>,
    ys: &Array2<f64>,
    params: &InterpolationParams,
) -> Result<InterpolatedField> {
    let median = observations
        .median()
        .ok_or_else(|| Error::EmptyObservations("no observations to fill gaps from".into()))?;
    let (nearest_filled, median_filled) =
        fill_gaps(&mut values, observations.points(), xs, ys, params.max_radius, median);
    quality.nearest_filled = nearest_filled;
    quality.median_filled = median_filled;
    if nearest_filled > 0 {
        debug!(cells = nearest_filled, "back-filled gaps from nearest observation");
    }
    if median_filled > 0 {
        quality.degraded = true;
        warn!(cells = median_filled, median, "cells filled with the median observation");
    }
    Ok(InterpolatedField { values, quality })
}

fn ensure_observations(observations: &ScatterObservations) -> Result<()> {
    if observations.is_empty() {
        return Err(Error::EmptyObservations("interpolation needs at least one observation".into()));
    }
    Ok(())
}

/// Interpolate with one kernel at arbitrary target coordinates, gap-filled.
pub fn interpolate_at(
    observations: &ScatterObservations,
    xs: &Array2<f64>,
    ys: &Array2<f64>,
    method: InterpolationMethod,
    params: &InterpolationParams,
) -> Result<InterpolatedField> {
    ensure_observations(observations)?;
    let (values, quality) = run_candidate(method, observations, xs, ys, params);
    finish(values, quality, observations, xs, ys, params)
}

/// Interpolate observations onto the grid's cell centers with one kernel.
///
/// Cells the kernel leaves NaN are back-filled; the result is always finite.
pub fn interpolate(
    observations: &ScatterObservations,
    grid: &StructuredGrid,
    method: InterpolationMethod,
    params: &InterpolationParams,
) -> Result<InterpolatedField> {
    interpolate_at(observations, grid.xcellcenters(), grid.ycellcenters(), method, params)
}

/// Try every candidate and keep the best-scoring field.
///
/// Scores compare raw kernel output; ties keep the earlier candidate. An
/// empty `candidates` slice means [`DEFAULT_CANDIDATES`].
pub fn interpolate_with_fallback(
    observations: &ScatterObservations,
    grid: &StructuredGrid,
    candidates: &[InterpolationMethod],
    params: &InterpolationParams,
) -> Result<InterpolatedField> {
    ensure_observations(observations)?;
    let candidates = if candidates.is_empty() { &DEFAULT_CANDIDATES[..] } else { candidates };
    let (xs, ys) = (grid.xcellcenters(), grid.ycellcenters());

    let mut best: Option<(Array2<f64>, FieldQuality)> = None;
    for &method in candidates {
        let (values, quality) = run_candidate(method, observations, xs, ys, params);
        let better = best.as_ref().map_or(true, |(_, q)| quality.score > q.score);
        if better {
            best = Some((values, quality));
        }
    }
    let (values, quality) =
        best.ok_or_else(|| Error::Algorithm("no interpolation candidate".into()))?;
    debug!(method = %quality.method, score = quality.score, "fallback chain selected kernel");
    finish(values, quality, observations, xs, ys, params)
}
