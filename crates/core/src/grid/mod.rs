//! Structured model grid
//!
//! A rectangular arrangement of `nrow x ncol` cells (times `nlay` layers),
//! described by its corner vertices. Row 0 is the northern row and column 0
//! the western column, matching MODFLOW/FloPy structured grids. The grid may
//! be rotated and may have variable row/column spacing.

use geo::{LineString, Polygon};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::crs::CRS;
use crate::error::{Error, Result};

/// Axis-aligned extent in FloPy order `(xmin, xmax, ymin, ymax)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Extent {
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Self {
        Self { xmin, xmax, ymin, ymax }
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Extent grown by `distance` on every side
    pub fn buffered(&self, distance: f64) -> Self {
        Self {
            xmin: self.xmin - distance,
            xmax: self.xmax + distance,
            ymin: self.ymin - distance,
            ymax: self.ymax + distance,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }

    pub fn intersects(&self, other: &Extent) -> bool {
        self.xmin <= other.xmax
            && self.xmax >= other.xmin
            && self.ymin <= other.ymax
            && self.ymax >= other.ymin
    }

    /// Corners in counter-clockwise order starting at (xmin, ymin)
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.xmin, self.ymin),
            (self.xmax, self.ymin),
            (self.xmax, self.ymax),
            (self.xmin, self.ymax),
        ]
    }

    pub fn to_polygon(&self) -> Polygon<f64> {
        let mut ring: Vec<(f64, f64)> = self.corners().to_vec();
        ring.push(ring[0]);
        Polygon::new(LineString::from(ring), vec![])
    }

    /// Smallest extent containing every given coordinate
    pub fn from_points<I: IntoIterator<Item = (f64, f64)>>(points: I) -> Option<Self> {
        points.into_iter().fold(None, |acc, (x, y)| match acc {
            None => Some(Self::new(x, x, y, y)),
            Some(e) => Some(Self::new(e.xmin.min(x), e.xmax.max(x), e.ymin.min(y), e.ymax.max(y))),
        })
    }
}

/// A structured (row/column/layer) model grid.
#[derive(Debug, Clone)]
pub struct StructuredGrid {
    nlay: usize,
    /// Corner x coordinates, shape (nrow + 1, ncol + 1)
    xvertices: Array2<f64>,
    /// Corner y coordinates, shape (nrow + 1, ncol + 1)
    yvertices: Array2<f64>,
    xcenters: Array2<f64>,
    ycenters: Array2<f64>,
    crs: Option<CRS>,
}

impl StructuredGrid {
    /// Build a grid from column widths (`delr`) and row heights (`delc`).
    ///
    /// `(xoff, yoff)` is the lower-left corner and `angrot` a counter-clockwise
    /// rotation in degrees about that corner.
    pub fn regular(
        nlay: usize,
        delr: &[f64],
        delc: &[f64],
        xoff: f64,
        yoff: f64,
        angrot: f64,
    ) -> Result<Self> {
        if delr.is_empty() || delc.is_empty() || nlay == 0 {
            return Err(Error::InvalidDimensions {
                rows: delc.len(),
                cols: delr.len(),
            });
        }
        if let Some(bad) = delr.iter().chain(delc).find(|d| !d.is_finite() || **d <= 0.0) {
            return Err(Error::invalid("delr/delc", bad, "cell spacing must be positive"));
        }

        let ncol = delr.len();
        let nrow = delc.len();

        let mut x_edges = Vec::with_capacity(ncol + 1);
        x_edges.push(0.0);
        for d in delr {
            x_edges.push(x_edges[x_edges.len() - 1] + d);
        }
        let total_height: f64 = delc.iter().sum();
        let mut y_edges = Vec::with_capacity(nrow + 1);
        y_edges.push(total_height);
        for d in delc {
            y_edges.push(y_edges[y_edges.len() - 1] - d);
        }

        let (sin, cos) = angrot.to_radians().sin_cos();
        let place = |lx: f64, ly: f64| (xoff + lx * cos - ly * sin, yoff + lx * sin + ly * cos);

        let xvertices =
            Array2::from_shape_fn((nrow + 1, ncol + 1), |(r, c)| place(x_edges[c], y_edges[r]).0);
        let yvertices =
            Array2::from_shape_fn((nrow + 1, ncol + 1), |(r, c)| place(x_edges[c], y_edges[r]).1);

        let mid = |r: usize, c: usize| {
            place(
                0.5 * (x_edges[c] + x_edges[c + 1]),
                0.5 * (y_edges[r] + y_edges[r + 1]),
            )
        };
        let xcenters = Array2::from_shape_fn((nrow, ncol), |(r, c)| mid(r, c).0);
        let ycenters = Array2::from_shape_fn((nrow, ncol), |(r, c)| mid(r, c).1);

        Ok(Self {
            nlay,
            xvertices,
            yvertices,
            xcenters,
            ycenters,
            crs: None,
        })
    }

    /// Unrotated grid of square cells
    pub fn uniform(
        nlay: usize,
        nrow: usize,
        ncol: usize,
        cell_size: f64,
        xoff: f64,
        yoff: f64,
    ) -> Result<Self> {
        Self::regular(nlay, &vec![cell_size; ncol], &vec![cell_size; nrow], xoff, yoff, 0.0)
    }

    /// Build a grid from explicit corner arrays of shape `(nrow + 1, ncol + 1)`.
    ///
    /// Cell centers are the mean of the four cell corners.
    pub fn from_vertices(
        xvertices: Array2<f64>,
        yvertices: Array2<f64>,
        nlay: usize,
    ) -> Result<Self> {
        let (vr, vc) = xvertices.dim();
        if yvertices.dim() != (vr, vc) {
            let (ar, ac) = yvertices.dim();
            return Err(Error::SizeMismatch { er: vr, ec: vc, ar, ac });
        }
        if vr < 2 || vc < 2 || nlay == 0 {
            return Err(Error::InvalidDimensions {
                rows: vr.saturating_sub(1),
                cols: vc.saturating_sub(1),
            });
        }
        let (nrow, ncol) = (vr - 1, vc - 1);
        let corner_mean = |v: &Array2<f64>, r: usize, c: usize| {
            0.25 * (v[(r, c)] + v[(r, c + 1)] + v[(r + 1, c + 1)] + v[(r + 1, c)])
        };
        let xcenters = Array2::from_shape_fn((nrow, ncol), |(r, c)| corner_mean(&xvertices, r, c));
        let ycenters = Array2::from_shape_fn((nrow, ncol), |(r, c)| corner_mean(&yvertices, r, c));

        Ok(Self {
            nlay,
            xvertices,
            yvertices,
            xcenters,
            ycenters,
            crs: None,
        })
    }

    /// Attach a coordinate reference system
    pub fn with_crs(mut self, crs: CRS) -> Self {
        self.crs = Some(crs);
        self
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn nrow(&self) -> usize {
        self.xcenters.nrows()
    }

    pub fn ncol(&self) -> usize {
        self.xcenters.ncols()
    }

    pub fn nlay(&self) -> usize {
        self.nlay
    }

    /// Cell array shape `(nrow, ncol)`
    pub fn shape(&self) -> (usize, usize) {
        self.xcenters.dim()
    }

    /// Number of cells in one layer
    pub fn ncpl(&self) -> usize {
        self.nrow() * self.ncol()
    }

    pub fn xcellcenters(&self) -> &Array2<f64> {
        &self.xcenters
    }

    pub fn ycellcenters(&self) -> &Array2<f64> {
        &self.ycenters
    }

    pub fn xvertices(&self) -> &Array2<f64> {
        &self.xvertices
    }

    pub fn yvertices(&self) -> &Array2<f64> {
        &self.yvertices
    }

    /// Center of cell (row, col)
    pub fn cell_center(&self, row: usize, col: usize) -> Option<(f64, f64)> {
        Some((*self.xcenters.get((row, col))?, *self.ycenters.get((row, col))?))
    }

    /// Axis-aligned extent of all vertices
    pub fn extent(&self) -> Extent {
        let (xmin, xmax) = min_max(self.xvertices.iter());
        let (ymin, ymax) = min_max(self.yvertices.iter());
        Extent::new(xmin, xmax, ymin, ymax)
    }

    /// Corners of cell (row, col) in the order (r,c), (r,c+1), (r+1,c+1), (r+1,c)
    pub fn cell_corners(&self, row: usize, col: usize) -> [(f64, f64); 4] {
        let v = |r: usize, c: usize| (self.xvertices[(r, c)], self.yvertices[(r, c)]);
        [v(row, col), v(row, col + 1), v(row + 1, col + 1), v(row + 1, col)]
    }

    /// Cell (row, col) as a closed polygon
    pub fn cell_polygon(&self, row: usize, col: usize) -> Polygon<f64> {
        let corners = self.cell_corners(row, col);
        let mut ring = corners.to_vec();
        ring.push(corners[0]);
        Polygon::new(LineString::from(ring), vec![])
    }

    /// Every cell polygon, row-major
    pub fn cell_polygons(&self) -> impl Iterator<Item = ((usize, usize), Polygon<f64>)> + '_ {
        let ncol = self.ncol();
        (0..self.ncpl()).map(move |i| {
            let (r, c) = (i / ncol, i % ncol);
            ((r, c), self.cell_polygon(r, c))
        })
    }

    /// Unsigned area of cell (row, col) (shoelace formula)
    pub fn cell_area(&self, row: usize, col: usize) -> f64 {
        let p = self.cell_corners(row, col);
        let twice: f64 = (0..4)
            .map(|i| {
                let (x0, y0) = p[i];
                let (x1, y1) = p[(i + 1) % 4];
                x0 * y1 - x1 * y0
            })
            .sum();
        0.5 * twice.abs()
    }

    /// Smaller of the minimum column width and minimum row height
    pub fn min_cell_dimension(&self) -> f64 {
        let (nrow, ncol) = self.shape();
        let edge = |(r0, c0): (usize, usize), (r1, c1): (usize, usize)| {
            let dx = self.xvertices[(r1, c1)] - self.xvertices[(r0, c0)];
            let dy = self.yvertices[(r1, c1)] - self.yvertices[(r0, c0)];
            dx.hypot(dy)
        };
        let widths = (0..ncol).map(|c| edge((0, c), (0, c + 1)));
        let heights = (0..nrow).map(|r| edge((r, 0), (r + 1, 0)));
        widths.chain(heights).fold(f64::INFINITY, f64::min)
    }

    pub fn contains_cell(&self, row: usize, col: usize) -> bool {
        row < self.nrow() && col < self.ncol()
    }

    /// Convert a flat node number into `(layer, row, col)`.
    ///
    /// Nodes are numbered layer by layer, row-major within a layer.
    pub fn node_to_lrc(&self, node: usize) -> Option<(usize, usize, usize)> {
        let ncpl = self.ncpl();
        if node >= ncpl * self.nlay {
            return None;
        }
        let layer = node / ncpl;
        let rem = node % ncpl;
        Some((layer, rem / self.ncol(), rem % self.ncol()))
    }

    /// Inverse of [`Self::node_to_lrc`]
    pub fn lrc_to_node(&self, layer: usize, row: usize, col: usize) -> Option<usize> {
        (layer < self.nlay && self.contains_cell(row, col))
            .then(|| layer * self.ncpl() + row * self.ncol() + col)
    }
}

fn min_max<'a>(values: impl Iterator<Item = &'a f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}
