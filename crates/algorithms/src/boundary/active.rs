//! Active cells from the area fraction inside a domain polygon

use geo::{BooleanOps, BoundingRect, Intersects, MultiPolygon, Polygon, Rect};
use ndarray::{Array2, Array3, Axis};
use tracing::{debug, warn};

use aquigrid_core::vector::FeatureCollection;
use aquigrid_core::{Error, MaskCodes, Result, StructuredGrid};

use crate::parallel::collect_rows;
use crate::vector::{align_to_grid, area_within_convex, convex_ring};

/// Union of every boundary polygon, as disjoint parts
fn dissolve(polygons: Vec<Polygon<f64>>) -> MultiPolygon<f64> {
    let mut parts = polygons.into_iter();
    let Some(first) = parts.next() else {
        return MultiPolygon::new(Vec::new());
    };
    parts.fold(MultiPolygon::new(vec![first]), |acc, p| {
        acc.union(&MultiPolygon::new(vec![p]))
    })
}

/// Share of each cell's area inside the boundary.
///
/// Boundary polygons are unioned first, so overlapping parts count once.
/// Cells are convex, so each union part is clipped by the cell and the
/// clipped areas are summed (holes subtracted). Zero-area cells get NaN.
pub fn area_fractions(grid: &StructuredGrid, boundary: &FeatureCollection) -> Result<Array2<f64>> {
    let aligned = align_to_grid(boundary, grid)?;
    let polygons: Vec<Polygon<f64>> = aligned.iter().flat_map(|f| f.polygons()).collect();
    if polygons.is_empty() {
        warn!("boundary has no polygon features");
    }
    let domain = dissolve(polygons);
    let parts: Vec<(Polygon<f64>, Option<Rect<f64>>)> = domain
        .into_iter()
        .map(|p| {
            let rect = p.bounding_rect();
            (p, rect)
        })
        .collect();

    let (nrow, ncol) = grid.shape();
    collect_rows(nrow, ncol, |row| {
        (0..ncol)
            .map(|col| {
                let cell_area = grid.cell_area(row, col);
                if cell_area <= 0.0 {
                    return f64::NAN;
                }
                let cell = grid.cell_polygon(row, col);
                let cell_rect = cell.bounding_rect();
                let clip = convex_ring(&cell);
                let inside: f64 = parts
                    .iter()
                    .filter(|(_, rect)| match (rect, cell_rect) {
                        (Some(a), Some(b)) => a.intersects(&b),
                        _ => false,
                    })
                    .map(|(p, _)| area_within_convex(p, &clip))
                    .sum();
                (inside / cell_area).min(1.0)
            })
            .collect()
    })
}

/// Cells with at least `threshold` of their area inside the boundary.
///
/// The threshold is inclusive; zero-area cells are never active.
pub fn compute_active_mask(
    grid: &StructuredGrid,
    boundary: &FeatureCollection,
    threshold: f64,
) -> Result<Array2<bool>> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(Error::invalid("threshold", threshold, "must lie in [0, 1]"));
    }
    let fractions = area_fractions(grid, boundary)?;
    // NaN (zero-area cell) compares false
    let active = fractions.mapv(|f| f >= threshold);
    debug!(
        active = active.iter().filter(|&&a| a).count(),
        cells = active.len(),
        threshold,
        "classified cells by area fraction"
    );
    Ok(active)
}

/// `(nlay, nrow, ncol)` IBOUND array with the same plane on every layer
pub fn ibound_from_active(active: &Array2<bool>, nlay: usize, codes: &MaskCodes) -> Array3<i32> {
    let plane = active.mapv(|a| if a { codes.active } else { codes.inactive });
    let (nrow, ncol) = plane.dim();
    let mut ibound = Array3::from_elem((nlay, nrow, ncol), codes.inactive);
    for mut layer in ibound.axis_iter_mut(Axis(0)) {
        layer.assign(&plane);
    }
    ibound
}

/// IBOUND for every grid layer from a domain boundary, with default codes
pub fn build_ibound(
    grid: &StructuredGrid,
    boundary: &FeatureCollection,
    threshold: f64,
) -> Result<Array3<i32>> {
    let active = compute_active_mask(grid, boundary, threshold)?;
    Ok(ibound_from_active(&active, grid.nlay(), &MaskCodes::default()))
}
