//! Vector operations on observation and boundary geometry
//!
//! - Clip: rectangle clipping of lines and polygons, convex clipping of rings
//! - Area: shoelace ring areas and polygon area inside a convex cell
//! - CRS alignment of feature collections with a grid

mod clip;

use std::borrow::Cow;

use tracing::warn;

use aquigrid_core::vector::FeatureCollection;
use aquigrid_core::{Result, StructuredGrid};

pub use clip::{
    area_within_convex, clip_by_rect, clip_line, clip_ring_convex, convex_ring, ring_area, ClipRect,
};

/// Features expressed in the grid's CRS.
///
/// Nothing happens when either side has no CRS or both are equivalent;
/// otherwise the features are reprojected (never the grid) and a warning is
/// logged. Unsupported pairs fail with `Error::CrsMismatch`.
pub fn align_to_grid<'a>(
    features: &'a FeatureCollection,
    grid: &StructuredGrid,
) -> Result<Cow<'a, FeatureCollection>> {
    match (&features.crs, grid.crs()) {
        (Some(source), Some(target)) if !source.is_equivalent(target) => {
            warn!(
                from = %source,
                to = %target,
                "feature CRS differs from grid CRS, reprojecting features"
            );
            Ok(Cow::Owned(features.to_crs(target)?))
        }
        _ => Ok(Cow::Borrowed(features)),
    }
}
