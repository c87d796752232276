//! # aquigrid core
//!
//! Core types for the aquigrid groundwater-grid toolkit.
//!
//! This crate provides:
//! - `StructuredGrid`: rectangular (optionally rotated) model grid with cell
//!   centers, vertices and node numbering
//! - `GeoTransform` / `Raster`: regular auxiliary surfaces
//! - `CRS`: coordinate reference systems and the small set of reprojections
//!   needed to reconcile boundary data with a grid
//! - `Feature` / `FeatureCollection`: vector features with attributes
//! - `BoundaryMask`: IBOUND-style active/inactive/fixed arrays
//! - Algorithm trait for a consistent API

pub mod crs;
pub mod error;
pub mod grid;
pub mod mask;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use grid::StructuredGrid;
pub use mask::{BoundaryMask, MaskCodes};
pub use raster::{GeoTransform, Raster};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::grid::{Extent, StructuredGrid};
    pub use crate::mask::{BoundaryMask, MaskCodes};
    pub use crate::raster::{GeoTransform, Raster};
    pub use crate::vector::{AttributeValue, Feature, FeatureCollection, FeatureFilter};
    pub use crate::Algorithm;
}

/// Core trait for the aquigrid algorithms.
///
/// Algorithms are pure functions: inputs are borrowed or consumed, outputs are
/// always newly allocated.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(
        &self,
        input: Self::Input,
    ) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
