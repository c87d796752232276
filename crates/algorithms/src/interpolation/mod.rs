//! Interpolation of scattered and contour observations onto a model grid
//!
//! - Observations: `(x, y, value)` triples with non-finite values rejected
//! - Sampling: line features walked at a fixed arc-length step
//! - Kernels: linear (Delaunay), nearest (k-d tree), cubic (Bézier patches
//!   on the triangulation), radial basis functions
//! - Fallback: every candidate kernel scored, best one gap-filled
//! - Densification: intermediate iso-lines synthesized by marching squares
//! - Constraints: synthetic boundary points and physical bounds
//! - Pipelines: isohypses and aquifer thickness from line features

mod constraints;
mod contour;
mod cubic;
mod densify;
mod fallback;
mod isohypses;
pub mod kdtree;
mod nearest;
mod observations;
mod rbf;
mod sampling;
mod tin;

pub use constraints::{
    add_boundary_constraints, apply_physical_constraints, gaussian_smooth, BoundaryConstraintParams,
    PhysicalBounds, PhysicalConstraintParams,
};
pub use contour::{connect_segments, contour_levels, extract_isolines, march_squares, IsoLine};
pub use cubic::cubic;
pub use densify::{densify_contours, DensifyParams};
pub use fallback::{
    assess, evaluate_kernel, fill_gaps, interpolate, interpolate_at, interpolate_with_fallback,
    FieldQuality, InterpolatedField, InterpolationMethod, InterpolationParams, DEFAULT_CANDIDATES,
};
pub use isohypses::{
    clip_to_extent, detect_value_column, interpolate_isohypses_to_grid, interpolate_thickness,
    rasterize_and_sample, IsohypseParams, ThicknessParams, VALUE_COLUMN_CANDIDATES,
};
pub use kdtree::{KdTree, Neighbor};
pub use nearest::nearest;
pub use observations::{Observation, ScatterObservations};
pub use rbf::{radial_basis, RbfFunction, RbfParams};
pub use sampling::{
    dedup_points, densify_line, sample_points_from_lines, sample_vertices, DedupTolerance,
    SamplingParams,
};
pub use tin::{linear, Tin};

use serde::{Deserialize, Serialize};

use aquigrid_core::{Algorithm, Error, StructuredGrid};

/// Parameters for [`FieldInterpolator`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldInterpolatorParams {
    /// Kernels to try, in order of preference
    pub candidates: Vec<InterpolationMethod>,
    pub interpolation: InterpolationParams,
}

impl Default for FieldInterpolatorParams {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_CANDIDATES.to_vec(),
            interpolation: InterpolationParams::default(),
        }
    }
}

/// Scattered observations onto grid cell centers through the fallback chain
#[derive(Debug, Clone, Default)]
pub struct FieldInterpolator;

impl Algorithm for FieldInterpolator {
    type Input = (ScatterObservations, StructuredGrid);
    type Output = InterpolatedField;
    type Params = FieldInterpolatorParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "FieldInterpolator"
    }

    fn description(&self) -> &'static str {
        "Interpolate scattered observations onto grid cell centers \
         with a scored kernel fallback chain"
    }

    fn execute(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> Result<Self::Output, Self::Error> {
        let (observations, grid) = input;
        interpolate_with_fallback(&observations, &grid, &params.candidates, &params.interpolation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_interpolator_default_chain() {
        let grid = StructuredGrid::uniform(1, 4, 4, 1.0, 0.0, 0.0).unwrap();
        let obs = ScatterObservations::from_points(vec![
            Observation::new(-1.0, -1.0, 1.0),
            Observation::new(5.0, -1.0, 2.0),
            Observation::new(5.0, 5.0, 3.0),
            Observation::new(-1.0, 5.3, 4.0),
        ]);
        let field = FieldInterpolator.execute_default((obs, grid)).unwrap();
        assert_eq!(field.values.dim(), (4, 4));
        assert_eq!(field.quality.method, InterpolationMethod::Linear);
        assert!(field.values.iter().all(|v| v.is_finite()));
        assert!(!field.quality.degraded);
    }

    #[test]
    fn test_field_interpolator_rejects_empty() {
        let grid = StructuredGrid::uniform(1, 2, 2, 1.0, 0.0, 0.0).unwrap();
        let result = FieldInterpolator.execute_default((ScatterObservations::default(), grid));
        assert!(matches!(result, Err(Error::EmptyObservations(_))));
    }
}
