//! Regular raster surfaces
//!
//! Used for auxiliary high-resolution surfaces (contour densification,
//! line rasterization), not for the model grid itself, which may be rotated
//! and irregularly spaced (see [`crate::grid::StructuredGrid`]).

mod geotransform;
mod grid;

pub use geotransform::GeoTransform;
pub use grid::Raster;
