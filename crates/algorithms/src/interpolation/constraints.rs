//! Boundary and physical plausibility constraints
//!
//! Boundary constraints add synthetic observations around the target extent
//! so kernels do not extrapolate wildly at the edges. Physical constraints
//! clamp a finished field into a plausible range and smooth it lightly.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use aquigrid_core::grid::Extent;
use aquigrid_core::{Error, Result};

use super::{Observation, ScatterObservations};
use crate::parallel::collect_rows;
use crate::stats;

/// Parameters for synthetic boundary observations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConstraintParams {
    /// Distance the extent is grown by before placing points
    pub buffer: f64,
    /// Evenly spaced points on each side, besides the corners
    pub edge_points_per_side: usize,
}

impl Default for BoundaryConstraintParams {
    fn default() -> Self {
        Self {
            buffer: 500.0,
            edge_points_per_side: 3,
        }
    }
}

/// Deterministic value in `[-1, 1]` derived from a position (splitmix64).
fn position_jitter(x: f64, y: f64) -> f64 {
    let mut z = x.to_bits() ^ y.to_bits().rotate_left(32) ^ 0x9E37_79B9_7F4A_7C15;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    let unit = (z >> 11) as f64 / (1u64 << 53) as f64;
    2.0 * unit - 1.0
}

/// Observations plus synthetic points around `extent`.
///
/// The four corners of the buffered extent get the median value. Each side
/// gets `edge_points_per_side` points placed `0.1 × buffer` outside the
/// buffered extent, valued `median ± j · IQR / 2` with `j ∈ [-1, 1]` a
/// function of the point position, so repeated runs agree.
pub fn add_boundary_constraints(
    observations: &ScatterObservations,
    extent: &Extent,
    params: &BoundaryConstraintParams,
) -> Result<ScatterObservations> {
    if !(params.buffer.is_finite() && params.buffer >= 0.0) {
        return Err(Error::invalid("buffer", params.buffer, "must be non-negative"));
    }
    let values = observations.values();
    let (Some(median), Some(iqr)) = (stats::median(&values), stats::iqr(&values)) else {
        return Err(Error::EmptyObservations("boundary constraints need observations".into()));
    };
    let half_iqr = 0.5 * iqr;
    let outer = extent.buffered(params.buffer);
    let offset = 0.1 * params.buffer;

    let mut out = observations.clone();
    for (x, y) in outer.corners() {
        out.push(Observation::new(x, y, median));
    }

    let n = params.edge_points_per_side;
    for k in 1..=n {
        let t = k as f64 / (n + 1) as f64;
        let x = outer.xmin + t * outer.width();
        let y = outer.ymin + t * outer.height();
        let sides = [
            (x, outer.ymin - offset),
            (x, outer.ymax + offset),
            (outer.xmin - offset, y),
            (outer.xmax + offset, y),
        ];
        for (px, py) in sides {
            out.push(Observation::new(px, py, median + half_iqr * position_jitter(px, py)));
        }
    }
    debug!(added = out.len() - observations.len(), median, iqr, "boundary constraint points");
    Ok(out)
}

/// Parameters for physical plausibility post-processing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalConstraintParams {
    /// Absolute lower bound; the floor is at least this
    pub min_floor: f64,
    /// Ceiling as a multiple of the largest observation, clamped to [1.1, 1.2]
    pub ceiling_factor: f64,
    /// Gaussian sigma in cells, clamped to [0.3, 0.5]
    pub sigma: f64,
    pub smooth: bool,
}

impl Default for PhysicalConstraintParams {
    fn default() -> Self {
        Self {
            min_floor: 0.5,
            ceiling_factor: 1.15,
            sigma: 0.4,
            smooth: true,
        }
    }
}

/// Range a constrained field is confined to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalBounds {
    pub floor: f64,
    pub ceiling: f64,
}

impl PhysicalBounds {
    /// `floor = max(min_floor, 0.9 · min)`, `ceiling = factor · max` (at
    /// least the floor).
    pub fn from_observations(
        observed: &ScatterObservations,
        params: &PhysicalConstraintParams,
    ) -> Result<Self> {
        let (Some(min), Some(max)) = (observed.min(), observed.max()) else {
            return Err(Error::EmptyObservations("physical bounds need observations".into()));
        };
        let floor = params.min_floor.max(0.9 * min);
        let ceiling = (params.ceiling_factor.clamp(1.1, 1.2) * max).max(floor);
        Ok(Self { floor, ceiling })
    }

    #[inline]
    pub fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.floor, self.ceiling)
    }
}

/// Normalised-weight Gaussian filter; NaN cells are skipped and stay NaN.
pub fn gaussian_smooth(data: &Array2<f64>, sigma: f64) -> Result<Array2<f64>> {
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(Error::invalid("sigma", sigma, "must be positive"));
    }
    let (rows, cols) = data.dim();
    let radius = (3.0 * sigma).ceil() as isize;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let size = (2 * radius + 1) as usize;
    let kernel: Vec<f64> = (0..size * size)
        .map(|i| {
            let (dr, dc) = ((i / size) as isize - radius, (i % size) as isize - radius);
            (-((dr * dr + dc * dc) as f64) / two_sigma_sq).exp()
        })
        .collect();

    collect_rows(rows, cols, |row| {
        let mut out = vec![f64::NAN; cols];
        for (col, cell) in out.iter_mut().enumerate() {
            if !data[(row, col)].is_finite() {
                continue;
            }
            let (mut sum, mut wsum) = (0.0, 0.0);
            for dr in -radius..=radius {
                let nr = row as isize + dr;
                if nr < 0 || nr as usize >= rows {
                    continue;
                }
                for dc in -radius..=radius {
                    let nc = col as isize + dc;
                    if nc < 0 || nc as usize >= cols {
                        continue;
                    }
                    let z = data[(nr as usize, nc as usize)];
                    if !z.is_finite() {
                        continue;
                    }
                    let w = kernel[((dr + radius) as usize) * size + (dc + radius) as usize];
                    sum += w * z;
                    wsum += w;
                }
            }
            if wsum > 0.0 {
                *cell = sum / wsum;
            }
        }
        out
    })
}

/// Confine `field` to the physical bounds implied by `observed`.
///
/// Non-finite cells take the (clamped) median observation, values are
/// clipped, lightly smoothed and clipped again, so every output cell lies in
/// `[floor, ceiling]`.
pub fn apply_physical_constraints(
    field: &Array2<f64>,
    observed: &ScatterObservations,
    params: &PhysicalConstraintParams,
) -> Result<Array2<f64>> {
    let bounds = PhysicalBounds::from_observations(observed, params)?;
    let median = bounds.clamp(
        observed
            .median()
            .ok_or_else(|| {
                Error::EmptyObservations("physical constraints need observations".into())
            })?,
    );

    let mut out = field.mapv(|v| if v.is_finite() { bounds.clamp(v) } else { median });
    if params.smooth {
        out = gaussian_smooth(&out, params.sigma.clamp(0.3, 0.5))?;
        out.mapv_inplace(|v| if v.is_finite() { bounds.clamp(v) } else { median });
    }
    debug!(floor = bounds.floor, ceiling = bounds.ceiling, "applied physical constraints");
    Ok(out)
}
