//! End-to-end pipelines from line features to a grid field
//!
//! Groundwater isohypses go through clipping, value-column detection and
//! linear interpolation of their vertices. Aquifer thickness contours use the
//! full chain: sampling, optional densification, boundary constraints, the
//! fallback chain and physical constraints.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use aquigrid_core::grid::Extent;
use aquigrid_core::vector::FeatureCollection;
use aquigrid_core::{Error, GeoTransform, Raster, Result, StructuredGrid};

use super::constraints::{
    add_boundary_constraints, apply_physical_constraints, BoundaryConstraintParams,
    PhysicalConstraintParams,
};
use super::densify::{densify_contours, DensifyParams};
use super::fallback::{
    interpolate, interpolate_with_fallback, InterpolatedField, InterpolationMethod,
    InterpolationParams, DEFAULT_CANDIDATES,
};
use super::sampling::{densify_line, sample_points_from_lines, sample_vertices, SamplingParams};
use crate::parallel::map_points;
use crate::vector::{align_to_grid, clip_by_rect, ClipRect};

/// Attribute names tried, in order, before falling back to any numeric one
pub const VALUE_COLUMN_CANDIDATES: [&str; 7] =
    ["ELEVATION", "ELEV", "VALUE", "Z", "GW_ELEV", "HEIGHT", "H"];

/// Name of the attribute holding the line values.
///
/// The first of [`VALUE_COLUMN_CANDIDATES`] present on any feature wins,
/// otherwise the alphabetically first attribute holding a number.
pub fn detect_value_column(features: &FeatureCollection) -> Result<String> {
    for candidate in VALUE_COLUMN_CANDIDATES {
        if features.iter().any(|f| f.properties.contains_key(candidate)) {
            return Ok(candidate.to_string());
        }
    }

    let mut numeric: Vec<&String> = features
        .iter()
        .flat_map(|f| f.properties.iter())
        .filter(|(_, v)| v.is_numeric())
        .map(|(k, _)| k)
        .collect();
    numeric.sort();
    numeric
        .first()
        .map(|k| k.to_string())
        .ok_or_else(|| Error::MissingAttribute(VALUE_COLUMN_CANDIDATES.join("|")))
}

/// Features clipped to `extent` grown by `buffer`.
///
/// Features without geometry or entirely outside are dropped. When nothing
/// survives the caller most likely mixed up coordinate systems.
pub fn clip_to_extent(
    features: &FeatureCollection,
    extent: &Extent,
    buffer: f64,
) -> Result<FeatureCollection> {
    let rect = ClipRect::from(extent.buffered(buffer));
    let mut clipped = FeatureCollection {
        features: Vec::with_capacity(features.len()),
        crs: features.crs.clone(),
    };
    for feature in features.iter() {
        let Some(geometry) = feature.geometry.as_ref().and_then(|g| clip_by_rect(g, rect)) else {
            continue;
        };
        let mut kept = feature.clone();
        kept.geometry = Some(geometry);
        clipped.push(kept);
    }
    debug!(
        before = features.len(),
        after = clipped.len(),
        buffer,
        "clipped features to grid extent"
    );
    if clipped.is_empty() {
        return Err(Error::NoFeaturesInExtent { buffer });
    }
    Ok(clipped)
}

/// Parameters for isohypse interpolation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IsohypseParams {
    /// Distance around the grid extent within which lines are kept
    pub buffer_distance: f64,
    /// Attribute to read; detected when `None`
    pub value_column: Option<String>,
    pub interpolation: InterpolationParams,
}

impl Default for IsohypseParams {
    fn default() -> Self {
        Self {
            buffer_distance: 500.0,
            value_column: None,
            interpolation: InterpolationParams::default(),
        }
    }
}

/// Groundwater heads at the cell centers from isohypse lines.
///
/// Only line vertices are used as observations. Cells outside their convex
/// hull are back-filled from the nearest vertex.
pub fn interpolate_isohypses_to_grid(
    features: &FeatureCollection,
    grid: &StructuredGrid,
    params: &IsohypseParams,
) -> Result<InterpolatedField> {
    let aligned = align_to_grid(features, grid)?;
    let clipped = clip_to_extent(&aligned, &grid.extent(), params.buffer_distance)?;
    let column = match &params.value_column {
        Some(c) => c.clone(),
        None => detect_value_column(&clipped)?,
    };
    let observations = sample_vertices(&clipped, &column)?;
    info!(column = %column, points = observations.len(), "interpolating isohypses");
    interpolate(&observations, grid, InterpolationMethod::Linear, &params.interpolation)
}

/// Parameters of the thickness pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThicknessParams {
    /// Attribute to read; detected when `None`
    pub value_column: Option<String>,
    pub sampling: SamplingParams,
    /// Contour interval to densify at; no densification when `None`
    pub densify_interval: Option<f64>,
    pub densify: DensifyParams,
    /// Synthetic points around the grid; skipped when `None`
    pub boundary: Option<BoundaryConstraintParams>,
    pub candidates: Vec<InterpolationMethod>,
    pub interpolation: InterpolationParams,
    pub physical: PhysicalConstraintParams,
}

impl Default for ThicknessParams {
    fn default() -> Self {
        Self {
            value_column: None,
            sampling: SamplingParams::default(),
            densify_interval: None,
            densify: DensifyParams::default(),
            boundary: Some(BoundaryConstraintParams::default()),
            candidates: DEFAULT_CANDIDATES.to_vec(),
            interpolation: InterpolationParams::default(),
            physical: PhysicalConstraintParams::default(),
        }
    }
}

/// Aquifer thickness at the cell centers from thickness contours.
///
/// The returned quality describes the winning kernel; the values are
/// additionally confined to the physical bounds of the sampled contours.
pub fn interpolate_thickness(
    features: &FeatureCollection,
    grid: &StructuredGrid,
    params: &ThicknessParams,
) -> Result<InterpolatedField> {
    let aligned = align_to_grid(features, grid)?;
    let column = match &params.value_column {
        Some(c) => c.clone(),
        None => detect_value_column(&aligned)?,
    };
    let sampled = sample_points_from_lines(&aligned, &column, &params.sampling)?;

    let mut observations = match params.densify_interval {
        Some(interval) => densify_contours(&sampled, interval, &params.densify)?,
        None => sampled.clone(),
    };
    if let Some(boundary) = &params.boundary {
        observations = add_boundary_constraints(&observations, &grid.extent(), boundary)?;
    }
    debug!(sampled = sampled.len(), total = observations.len(), "thickness observations ready");

    let mut field =
        interpolate_with_fallback(&observations, grid, &params.candidates, &params.interpolation)?;
    field.values = apply_physical_constraints(&field.values, &sampled, &params.physical)?;
    Ok(field)
}

/// Burn line values into a raster of `cell_size` pixels over the grid extent
/// and read it back at the cell centers.
///
/// Later features overwrite earlier ones. Cells whose center falls on an
/// unburned pixel are NaN.
pub fn rasterize_and_sample(
    features: &FeatureCollection,
    grid: &StructuredGrid,
    cell_size: f64,
) -> Result<ndarray::Array2<f64>> {
    if !(cell_size.is_finite() && cell_size > 0.0) {
        return Err(Error::invalid("cell_size", cell_size, "must be positive"));
    }
    let extent = grid.extent();
    let cols = (extent.width() / cell_size) as usize;
    let rows = (extent.height() / cell_size) as usize;
    if rows == 0 || cols == 0 {
        return Err(Error::invalid("cell_size", cell_size, "larger than the grid extent"));
    }

    let aligned = align_to_grid(features, grid)?;
    let column = detect_value_column(&aligned)?;
    let transform =
        GeoTransform::from_bounds(extent.xmin, extent.ymin, extent.xmax, extent.ymax, cols, rows);
    let mut raster = Raster::empty(rows, cols, transform);

    let step = 0.5 * transform.min_cell_size();
    let mut burned = 0usize;
    for feature in aligned.iter() {
        let Some(value) = feature.get_property(&column).and_then(|v| v.as_f64()) else {
            continue;
        };
        for line in feature.lines() {
            for c in densify_line(&line, step).into_iter().chain(line.0.iter().copied()) {
                if let Some((r, col)) = transform.rowcol(c.x, c.y, rows, cols) {
                    raster.set(r, col, value)?;
                    burned += 1;
                }
            }
        }
    }
    debug!(rows, cols, burned, "rasterized line features");

    map_points(grid.xcellcenters(), grid.ycellcenters(), |x, y| {
        raster.sample(x, y).unwrap_or(f64::NAN)
    })
}
