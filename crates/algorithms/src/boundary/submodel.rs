//! Fixed-head boundaries for a submodel cut out of a parent model
//!
//! The submodel window is located in the parent grid, the parent heads along
//! its perimeter are collected and turned into constant-head records.

use ndarray::{s, Array3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use aquigrid_core::grid::Extent;
use aquigrid_core::{Error, Result, StructuredGrid};

/// Inclusive row/column window of the parent grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellWindow {
    pub row_min: usize,
    pub row_max: usize,
    pub col_min: usize,
    pub col_max: usize,
}

impl CellWindow {
    pub fn nrow(&self) -> usize {
        self.row_max - self.row_min + 1
    }

    pub fn ncol(&self) -> usize {
        self.col_max - self.col_min + 1
    }
}

/// Side of the submodel a boundary cell lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundarySide {
    North,
    South,
    West,
    East,
}

/// Parent head at one perimeter cell. `row`/`col` are submodel indices,
/// `layer` the parent layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryHead {
    pub layer: usize,
    pub row: usize,
    pub col: usize,
    pub head: f64,
    pub side: BoundarySide,
}

/// Spacing and placement of the submodel grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmodelGrid {
    pub nrow: usize,
    pub ncol: usize,
    pub nlay: usize,
    pub delr: Vec<f64>,
    pub delc: Vec<f64>,
    /// West edge
    pub xorigin: f64,
    /// North edge
    pub yorigin: f64,
}

impl SubmodelGrid {
    /// The submodel as a [`StructuredGrid`]
    pub fn to_grid(&self) -> Result<StructuredGrid> {
        let height: f64 = self.delc.iter().sum();
        StructuredGrid::regular(
            self.nlay,
            &self.delr,
            &self.delc,
            self.xorigin,
            self.yorigin - height,
            0.0,
        )
    }
}

/// Everything needed to set up a submodel's fixed-head boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmodelBoundary {
    pub heads: Vec<BoundaryHead>,
    pub grid: SubmodelGrid,
    pub window: CellWindow,
    pub layers: Vec<usize>,
}

/// One constant-head record, 0-based
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChdRecord {
    pub layer: usize,
    pub row: usize,
    pub col: usize,
    pub start_head: f64,
    pub end_head: f64,
}

/// Column edges west to east and row edges north to south
fn axis_edges(grid: &StructuredGrid) -> Result<(Vec<f64>, Vec<f64>)> {
    let xv = grid.xvertices();
    let yv = grid.yvertices();
    let (nrow, ncol) = grid.shape();
    let tol = 1e-9 * grid.min_cell_dimension();
    let rotated = (0..=ncol).any(|c| (yv[(0, c)] - yv[(0, 0)]).abs() > tol)
        || (0..=nrow).any(|r| (xv[(r, 0)] - xv[(0, 0)]).abs() > tol);
    if rotated {
        return Err(Error::invalid("grid", "rotated", "submodel windows need an axis-aligned grid"));
    }
    let x_edges = (0..=ncol).map(|c| xv[(0, c)]).collect();
    let y_edges = (0..=nrow).map(|r| yv[(r, 0)]).collect();
    Ok((x_edges, y_edges))
}

/// Parent cell window covering `bounds`, grown by `buffer_cells` on each
/// side and clamped to the grid.
pub fn submodel_bounds_cells(
    grid: &StructuredGrid,
    bounds: &Extent,
    buffer_cells: usize,
) -> Result<CellWindow> {
    if !(bounds.xmin <= bounds.xmax && bounds.ymin <= bounds.ymax) {
        return Err(Error::invalid("bounds", format!("{bounds:?}"), "min must not exceed max"));
    }
    if !grid.extent().intersects(bounds) {
        return Err(Error::invalid("bounds", format!("{bounds:?}"), "outside the grid"));
    }
    let (x_edges, y_edges) = axis_edges(grid)?;
    let (nrow, ncol) = grid.shape();

    let col_of = |x: f64| (1..=ncol).take_while(|&c| x >= x_edges[c]).count().min(ncol - 1);
    let row_of = |y: f64| (1..=nrow).take_while(|&r| y < y_edges[r]).count().min(nrow - 1);

    let window = CellWindow {
        row_min: row_of(bounds.ymax).saturating_sub(buffer_cells),
        row_max: (row_of(bounds.ymin) + buffer_cells).min(nrow - 1),
        col_min: col_of(bounds.xmin).saturating_sub(buffer_cells),
        col_max: (col_of(bounds.xmax) + buffer_cells).min(ncol - 1),
    };
    debug!(?window, buffer_cells, "located submodel window");
    Ok(window)
}

/// Parent heads along the perimeter of the submodel window.
///
/// `heads` has shape `(nlay, nrow, ncol)` of the parent grid. `layers`
/// defaults to all layers. NaN heads (dry or inactive cells) are skipped.
pub fn extract_boundary_heads(
    heads: &Array3<f64>,
    grid: &StructuredGrid,
    bounds: &Extent,
    layers: Option<&[usize]>,
    buffer_cells: usize,
) -> Result<SubmodelBoundary> {
    let (hl, hr, hc) = heads.dim();
    if (hr, hc) != grid.shape() {
        return Err(Error::SizeMismatch {
            er: grid.nrow(),
            ec: grid.ncol(),
            ar: hr,
            ac: hc,
        });
    }
    let layers: Vec<usize> = match layers {
        Some(l) => l.to_vec(),
        None => (0..hl).collect(),
    };
    if let Some(&bad) = layers.iter().find(|&&l| l >= hl) {
        return Err(Error::invalid("layers", bad, format!("heads have {hl} layers")));
    }

    let window = submodel_bounds_cells(grid, bounds, buffer_cells)?;
    let (nrow, ncol) = (window.nrow(), window.ncol());
    let mut boundary = Vec::new();
    for &layer in &layers {
        let sub = heads.slice(s![
            layer,
            window.row_min..=window.row_max,
            window.col_min..=window.col_max
        ]);
        let mut push = |row: usize, col: usize, side: BoundarySide| {
            let head = sub[(row, col)];
            if !head.is_nan() {
                boundary.push(BoundaryHead { layer, row, col, head, side });
            }
        };
        for col in 0..ncol {
            push(0, col, BoundarySide::North);
            if nrow > 1 {
                push(nrow - 1, col, BoundarySide::South);
            }
        }
        for row in 1..nrow.saturating_sub(1) {
            push(row, 0, BoundarySide::West);
            if ncol > 1 {
                push(row, ncol - 1, BoundarySide::East);
            }
        }
    }

    let (x_edges, y_edges) = axis_edges(grid)?;
    let sub_grid = SubmodelGrid {
        nrow,
        ncol,
        nlay: layers.len(),
        delr: (window.col_min..=window.col_max).map(|c| x_edges[c + 1] - x_edges[c]).collect(),
        delc: (window.row_min..=window.row_max).map(|r| y_edges[r] - y_edges[r + 1]).collect(),
        xorigin: x_edges[window.col_min],
        yorigin: y_edges[window.row_min],
    };
    debug!(cells = boundary.len(), layers = layers.len(), "extracted submodel boundary heads");
    Ok(SubmodelBoundary {
        heads: boundary,
        grid: sub_grid,
        window,
        layers,
    })
}

impl SubmodelBoundary {
    /// Steady constant-head records (start head equals end head)
    pub fn chd_records(&self) -> Vec<ChdRecord> {
        self.heads
            .iter()
            .map(|h| ChdRecord {
                layer: h.layer,
                row: h.row,
                col: h.col,
                start_head: h.head,
                end_head: h.head,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// 10 x 10 cells of 10 m over (0, 100, 0, 100), 2 layers
    fn parent() -> StructuredGrid {
        StructuredGrid::uniform(2, 10, 10, 10.0, 0.0, 0.0).unwrap()
    }

    fn heads() -> Array3<f64> {
        Array3::from_shape_fn((2, 10, 10), |(l, r, c)| {
            100.0 * l as f64 + 10.0 * r as f64 + c as f64
        })
    }

    #[test]
    fn test_window_without_buffer() {
        let w = submodel_bounds_cells(&parent(), &Extent::new(35.0, 65.0, 25.0, 55.0), 0).unwrap();
        // x 35..65 -> cols 3..6, y 55 -> row 4, y 25 -> row 7
        assert_eq!(w, CellWindow { row_min: 4, row_max: 7, col_min: 3, col_max: 6 });
    }

    #[test]
    fn test_window_buffer_clamped() {
        let w = submodel_bounds_cells(&parent(), &Extent::new(5.0, 25.0, 75.0, 95.0), 2).unwrap();
        assert_eq!(w, CellWindow { row_min: 0, row_max: 4, col_min: 0, col_max: 4 });
    }

    #[test]
    fn test_window_outside_grid() {
        let far = Extent::new(500.0, 600.0, 0.0, 10.0);
        assert!(submodel_bounds_cells(&parent(), &far, 0).is_err());
    }

    #[test]
    fn test_perimeter_heads() {
        let bounds = Extent::new(35.0, 65.0, 25.0, 55.0);
        let sub = extract_boundary_heads(&heads(), &parent(), &bounds, Some(&[1]), 0).unwrap();
        // 4 x 4 window: 16 cells minus 4 interior
        assert_eq!(sub.heads.len(), 12);
        let nw = sub.heads.iter().find(|h| h.row == 0 && h.col == 0).unwrap();
        assert_eq!(nw.side, BoundarySide::North);
        assert_relative_eq!(nw.head, 100.0 + 40.0 + 3.0);
        assert_eq!(sub.grid.delr, vec![10.0; 4]);
        assert_relative_eq!(sub.grid.xorigin, 30.0);
        assert_relative_eq!(sub.grid.yorigin, 60.0);
        let g = sub.grid.to_grid().unwrap();
        assert_relative_eq!(g.extent().ymin, 20.0);
    }

    #[test]
    fn test_nan_heads_skipped_and_chd() {
        let mut h = heads();
        h[[0, 4, 3]] = f64::NAN;
        let bounds = Extent::new(35.0, 65.0, 25.0, 55.0);
        let sub = extract_boundary_heads(&h, &parent(), &bounds, None, 0).unwrap();
        assert_eq!(sub.heads.len(), 23);
        let chd = sub.chd_records();
        assert_eq!(chd.len(), 23);
        assert!(chd.iter().all(|r| r.start_head == r.end_head));
        assert_eq!(chd[0].layer, 0);
    }

    #[test]
    fn test_heads_shape_checked() {
        let h = Array3::zeros((1, 5, 5));
        let bounds = Extent::new(0.0, 10.0, 0.0, 10.0);
        assert!(extract_boundary_heads(&h, &parent(), &bounds, None, 0).is_err());
    }

    #[test]
    fn test_rotated_grid_rejected() {
        let g = StructuredGrid::regular(1, &[10.0; 3], &[10.0; 3], 0.0, 0.0, 15.0).unwrap();
        assert!(submodel_bounds_cells(&g, &Extent::new(5.0, 10.0, 5.0, 10.0), 0).is_err());
    }
}
