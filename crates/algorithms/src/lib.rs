//! # aquigrid Algorithms
//!
//! Numerical core of the aquigrid groundwater-grid toolkit.
//!
//! ## Modules
//!
//! - **interpolation**: scattered and contour observations onto grid cell
//!   centers (linear, nearest, cubic, RBF) with a scored fallback chain,
//!   contour densification and physical constraints
//! - **boundary**: boundary cells from geometry, cell-identifier parsing,
//!   mask reconciliation, area-fraction active masks, submodel boundaries
//! - **vector**: clipping, ring areas, CRS alignment with a grid
//! - **stats**: small order statistics on finite values

pub mod boundary;
pub mod interpolation;
mod parallel;
pub mod stats;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::boundary::{
        build_ibound, compute_active_mask, ibound_from_active, intersect, parse_cell_identifier,
        parse_cell_identifiers, reconcile_with_mask, resolve_boundary_cells, BoundaryResolver,
        CellId, CellIdSet, IntersectParams, IntersectionStatus, RawCellId, ReconcileStats,
        ResolveParams,
    };
    pub use crate::interpolation::{
        add_boundary_constraints, apply_physical_constraints, densify_contours, interpolate,
        interpolate_isohypses_to_grid, interpolate_thickness, interpolate_with_fallback,
        sample_points_from_lines, BoundaryConstraintParams, DensifyParams, FieldInterpolator,
        FieldQuality, InterpolatedField, InterpolationMethod, InterpolationParams, Observation,
        PhysicalConstraintParams, SamplingParams, ScatterObservations, ThicknessParams,
    };
    pub use aquigrid_core::prelude::*;
}
