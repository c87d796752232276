//! Boundary cells of a model grid
//!
//! - Intersect: cells crossed by (or near) boundary lines and polygon rings
//! - Cell ids: normalisation of heterogeneous cell identifiers
//! - Reconcile: one-way `active -> fixed` update of an IBOUND-style mask
//! - Active: area-fraction classification and IBOUND synthesis
//! - Submodel: fixed-head perimeter of a window of a parent model

mod active;
mod cellid;
mod intersect;
mod reconcile;
mod submodel;

pub use active::{area_fractions, build_ibound, compute_active_mask, ibound_from_active};
pub use cellid::{parse_cell_identifier, parse_cell_identifiers, CellId, ParsedCellIds, RawCellId};
pub use intersect::{
    cells_touching_polygon, intersect, CellIdSet, Intersection, IntersectParams, IntersectionStatus,
};
pub use reconcile::{reconcile_with_mask, ReconcileStats};
pub use submodel::{
    extract_boundary_heads, submodel_bounds_cells, BoundaryHead, BoundarySide, CellWindow,
    ChdRecord, SubmodelBoundary, SubmodelGrid,
};

use serde::{Deserialize, Serialize};
use tracing::info;

use aquigrid_core::vector::FeatureCollection;
use aquigrid_core::{Algorithm, BoundaryMask, Error, MaskCodes, Result, StructuredGrid};

/// Parameters for [`resolve_boundary_cells`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveParams {
    pub intersect: IntersectParams,
    pub codes: MaskCodes,
}

/// Cells found for a boundary and the mask they were applied to
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryResolution {
    pub cells: CellIdSet,
    pub status: IntersectionStatus,
    pub mask: BoundaryMask,
    pub stats: ReconcileStats,
}

/// Intersect the boundary with the grid and fix the resulting cells in a copy
/// of `mask`.
pub fn resolve_boundary_cells(
    boundary: &FeatureCollection,
    grid: &StructuredGrid,
    mask: &BoundaryMask,
    params: &ResolveParams,
) -> Result<BoundaryResolution> {
    let Intersection { cells, status } = intersect(boundary, grid, &params.intersect)?;
    let (mask, stats) = reconcile_with_mask(&cells.to_cell_ids(), mask, grid, &params.codes);
    info!(
        cells = cells.len(),
        ?status,
        modified = stats.modified,
        "resolved boundary cells"
    );
    Ok(BoundaryResolution {
        cells,
        status,
        mask,
        stats,
    })
}

/// Boundary geometry to fixed cells of a boundary-condition array
#[derive(Debug, Clone, Default)]
pub struct BoundaryResolver;

impl Algorithm for BoundaryResolver {
    type Input = (FeatureCollection, StructuredGrid, BoundaryMask);
    type Output = BoundaryResolution;
    type Params = ResolveParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "BoundaryResolver"
    }

    fn description(&self) -> &'static str {
        "Intersect boundary geometry with the grid and mark the cells as fixed in the mask"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (boundary, grid, mask) = input;
        resolve_boundary_cells(&boundary, &grid, &mask, &params)
    }
}
