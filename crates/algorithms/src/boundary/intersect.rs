//! Grid cells touched by boundary geometry

use std::collections::BTreeSet;

use geo::{BoundingRect, EuclideanDistance, Intersects, LineString, Polygon, Rect};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use aquigrid_core::vector::{FeatureCollection, FeatureFilter};
use aquigrid_core::{Error, Result, StructuredGrid};

use super::cellid::CellId;
use crate::vector::align_to_grid;

/// Parameters for boundary intersection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectParams {
    /// Dilation distance of the buffered strategy; half the smallest cell
    /// dimension when `None`
    pub buffer: Option<f64>,
    /// Only features matching this filter are used
    pub filter: Option<FeatureFilter>,
}

/// Which strategy produced the cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntersectionStatus {
    /// Cells crossed by the exact geometry
    Linestring,
    /// Cells within the buffer distance of the geometry
    Buffered,
    NoIntersection,
}

/// Sorted, unique `(row, col)` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellIdSet(BTreeSet<(usize, usize)>);

impl CellIdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, row: usize, col: usize) -> bool {
        self.0.insert((row, col))
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.0.contains(&(row, col))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ascending by row, then column
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.0.iter().copied()
    }

    /// Layerless identifiers, ready for reconciliation
    pub fn to_cell_ids(&self) -> Vec<CellId> {
        self.iter().map(|(r, c)| CellId::new(r, c)).collect()
    }
}

impl FromIterator<(usize, usize)> for CellIdSet {
    fn from_iter<I: IntoIterator<Item = (usize, usize)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Cells found for a boundary and the strategy that found them
#[derive(Debug, Clone, PartialEq)]
pub struct Intersection {
    pub cells: CellIdSet,
    pub status: IntersectionStatus,
}

fn rects_within(a: &Rect<f64>, b: &Rect<f64>, distance: f64) -> bool {
    a.min().x <= b.max().x + distance
        && b.min().x <= a.max().x + distance
        && a.min().y <= b.max().y + distance
        && b.min().y <= a.max().y + distance
}

/// Cells within `distance` of any line; `distance == 0` means touching.
fn cells_near(
    grid: &StructuredGrid,
    lines: &[(LineString<f64>, Rect<f64>)],
    distance: f64,
) -> CellIdSet {
    grid.cell_polygons()
        .filter(|(_, cell)| {
            let Some(cell_rect) = cell.bounding_rect() else {
                return false;
            };
            lines.iter().any(|(line, rect)| {
                rects_within(&cell_rect, rect, distance)
                    && if distance > 0.0 {
                        cell.euclidean_distance(line) <= distance
                    } else {
                        cell.intersects(line)
                    }
            })
        })
        .map(|(rc, _)| rc)
        .collect()
}

/// Cells overlapping any polygon area, boundary included
fn cells_covered(grid: &StructuredGrid, polygons: &[(Polygon<f64>, Rect<f64>)]) -> CellIdSet {
    grid.cell_polygons()
        .filter(|(_, cell)| {
            let Some(cell_rect) = cell.bounding_rect() else {
                return false;
            };
            polygons
                .iter()
                .any(|(poly, rect)| rects_within(&cell_rect, rect, 0.0) && cell.intersects(poly))
        })
        .map(|(rc, _)| rc)
        .collect()
}

fn with_rects<G>(geoms: Vec<G>) -> Vec<(G, Rect<f64>)>
where
    G: BoundingRect<f64, Output = Option<Rect<f64>>>,
{
    geoms
        .into_iter()
        .filter_map(|g| g.bounding_rect().map(|rect| (g, rect)))
        .collect()
}

/// Cells of `grid` passed through or covered by the boundary features.
///
/// Lines contribute the cells they cross; polygons the cells they overlap.
/// The exact geometry is tried first; if it touches no cell, every cell
/// within the buffer distance of a line or polygon ring is taken instead.
/// A boundary entirely off the grid is not an error: the result is empty
/// with [`IntersectionStatus::NoIntersection`].
pub fn intersect(
    boundary: &FeatureCollection,
    grid: &StructuredGrid,
    params: &IntersectParams,
) -> Result<Intersection> {
    let buffer = params.buffer.unwrap_or_else(|| 0.5 * grid.min_cell_dimension());
    if !(buffer.is_finite() && buffer >= 0.0) {
        return Err(Error::invalid("buffer", buffer, "must be non-negative"));
    }

    let aligned = align_to_grid(boundary, grid)?;
    let selected = aligned.filtered(params.filter.as_ref());
    let lines = with_rects(selected.iter().flat_map(|f| f.lines()).collect());
    let polygons = with_rects(selected.iter().flat_map(|f| f.polygons()).collect());
    debug!(
        features = selected.len(),
        lines = lines.len(),
        polygons = polygons.len(),
        buffer,
        "intersecting boundary with grid"
    );

    let mut exact = cells_near(grid, &lines, 0.0);
    if !polygons.is_empty() {
        exact.0.extend(cells_covered(grid, &polygons).iter());
    }
    if !exact.is_empty() {
        return Ok(Intersection {
            cells: exact,
            status: IntersectionStatus::Linestring,
        });
    }

    let buffered = if buffer > 0.0 {
        cells_near(grid, &lines, buffer)
    } else {
        CellIdSet::new()
    };
    if !buffered.is_empty() {
        debug!(cells = buffered.len(), "exact geometry missed the grid, using buffered strategy");
        return Ok(Intersection {
            cells: buffered,
            status: IntersectionStatus::Buffered,
        });
    }

    warn!(
        features = selected.len(),
        buffer,
        "boundary does not intersect the grid; check extent and CRS"
    );
    Ok(Intersection {
        cells: CellIdSet::new(),
        status: IntersectionStatus::NoIntersection,
    })
}

/// Cells whose polygon lies within `polygon` or crosses its boundary
pub fn cells_touching_polygon(grid: &StructuredGrid, polygon: &Polygon<f64>) -> CellIdSet {
    grid.cell_polygons()
        .filter(|(_, cell)| cell.intersects(polygon))
        .map(|(rc, _)| rc)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquigrid_core::vector::Feature;

    fn grid() -> StructuredGrid {
        // 10 x 10 cells of 10 m, extent (0, 100, 0, 100)
        StructuredGrid::uniform(1, 10, 10, 10.0, 0.0, 0.0).unwrap()
    }

    fn line(coords: Vec<(f64, f64)>) -> Feature {
        Feature::new(LineString::from(coords))
    }

    #[test]
    fn test_vertical_line_hits_one_column() {
        let fc: FeatureCollection = vec![line(vec![(5.0, 1.0), (5.0, 99.0)])].into_iter().collect();
        let hit = intersect(&fc, &grid(), &IntersectParams::default()).unwrap();
        assert_eq!(hit.status, IntersectionStatus::Linestring);
        assert_eq!(hit.cells.len(), 10);
        assert!(hit.cells.iter().all(|(_, c)| c == 0));
    }

    #[test]
    fn test_cells_are_sorted_and_unique() {
        let fc: FeatureCollection = vec![
            line(vec![(95.0, 95.0), (55.0, 55.0)]),
            line(vec![(55.0, 55.0), (95.0, 95.0)]),
        ]
        .into_iter()
        .collect();
        let hit = intersect(&fc, &grid(), &IntersectParams::default()).unwrap();
        let cells: Vec<_> = hit.cells.iter().collect();
        let mut sorted = cells.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(cells, sorted);
        assert!(hit.cells.contains(0, 9));
        assert!(hit.cells.contains(4, 5));
    }

    #[test]
    fn test_near_miss_uses_buffer() {
        // 3 m east of the grid
        let fc: FeatureCollection =
            vec![line(vec![(103.0, 10.0), (103.0, 30.0)])].into_iter().collect();
        let hit = intersect(&fc, &grid(), &IntersectParams::default()).unwrap();
        assert_eq!(hit.status, IntersectionStatus::Buffered);
        assert!(hit.cells.iter().all(|(_, c)| c == 9));
        assert!(hit.cells.contains(8, 9));
    }

    #[test]
    fn test_far_outside_reports_no_intersection() {
        let fc: FeatureCollection =
            vec![line(vec![(500.0, 500.0), (600.0, 600.0)])].into_iter().collect();
        let hit = intersect(&fc, &grid(), &IntersectParams::default()).unwrap();
        assert_eq!(hit.status, IntersectionStatus::NoIntersection);
        assert!(hit.cells.is_empty());
    }

    #[test]
    fn test_filter_selects_feature() {
        let fc: FeatureCollection = vec![
            line(vec![(5.0, 1.0), (5.0, 99.0)]).with_property("side", "west"),
            line(vec![(95.0, 1.0), (95.0, 99.0)]).with_property("side", "east"),
        ]
        .into_iter()
        .collect();
        let params = IntersectParams {
            filter: Some(FeatureFilter::new("side", "East")),
            ..Default::default()
        };
        let hit = intersect(&fc, &grid(), &params).unwrap();
        assert!(hit.cells.iter().all(|(_, c)| c == 9));
    }

    #[test]
    fn test_polygon_covers_interior_cells() {
        let square = Polygon::new(
            LineString::from(vec![
                (15.0, 15.0),
                (85.0, 15.0),
                (85.0, 85.0),
                (15.0, 85.0),
                (15.0, 15.0),
            ]),
            vec![],
        );
        let fc: FeatureCollection = vec![Feature::new(square.clone())].into_iter().collect();
        let hit = intersect(&fc, &grid(), &IntersectParams::default()).unwrap();
        // The whole 8 x 8 block from row/col 1 to 8, interior included
        assert_eq!(hit.status, IntersectionStatus::Linestring);
        assert_eq!(hit.cells.len(), 64);
        assert!(hit.cells.contains(4, 4));
        assert!(!hit.cells.contains(0, 0));
        assert_eq!(hit.cells, cells_touching_polygon(&grid(), &square));
    }

    #[test]
    fn test_polygon_enclosing_grid_takes_every_cell() {
        let around = Polygon::new(
            LineString::from(vec![
                (-50.0, -50.0),
                (150.0, -50.0),
                (150.0, 150.0),
                (-50.0, 150.0),
                (-50.0, -50.0),
            ]),
            vec![],
        );
        let fc: FeatureCollection = vec![Feature::new(around)].into_iter().collect();
        let hit = intersect(&fc, &grid(), &IntersectParams::default()).unwrap();
        assert_eq!(hit.status, IntersectionStatus::Linestring);
        assert_eq!(hit.cells.len(), 100);
    }
}
