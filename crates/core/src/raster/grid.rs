//! Auxiliary raster surface

use crate::error::{Error, Result};
use crate::raster::GeoTransform;
use ndarray::{Array2, ArrayView2};

/// A georeferenced, north-up 2D surface of `f64` values.
///
/// `NaN` marks cells without a value. Row 0 is the northern row, as in
/// every GDAL-style raster.
///
/// # Example
///
/// ```ignore
/// use aquigrid_core::{GeoTransform, Raster};
///
/// let transform = GeoTransform::from_bounds(0.0, 0.0, 100.0, 100.0, 50, 50);
/// let mut surface = Raster::empty(50, 50, transform);
/// surface.set(10, 20, 42.0)?;
/// assert_eq!(surface.sample(41.0, 79.0), Some(42.0));
/// ```
#[derive(Debug, Clone)]
pub struct Raster {
    /// Values stored in row-major order (row, col)
    data: Array2<f64>,
    /// Affine transformation
    transform: GeoTransform,
}

impl Raster {
    /// Create a raster where every cell is `NaN`
    pub fn empty(rows: usize, cols: usize, transform: GeoTransform) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), f64::NAN),
            transform,
        }
    }

    /// Create a raster from an existing array
    pub fn from_array(data: Array2<f64>, transform: GeoTransform) -> Self {
        Self { data, transform }
    }

    /// Create a raster from row-major values
    pub fn from_vec(
        data: Vec<f64>,
        rows: usize,
        cols: usize,
        transform: GeoTransform,
    ) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions { rows, cols });
        }
        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self::from_array(array, transform))
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        let (rows, cols) = self.shape();
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds { row, col, rows, cols }),
        }
    }

    /// Get a view of the underlying data
    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<f64> {
        &mut self.data
    }

    /// Consume the raster and return the underlying array
    pub fn into_array(self) -> Array2<f64> {
        self.data
    }

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Map coordinates of every pixel center as `(x, y)` arrays
    pub fn cell_centers(&self) -> (Array2<f64>, Array2<f64>) {
        let (rows, cols) = self.shape();
        let xs = Array2::from_shape_fn((rows, cols), |(r, c)| self.transform.pixel_to_geo(c, r).0);
        let ys = Array2::from_shape_fn((rows, cols), |(r, c)| self.transform.pixel_to_geo(c, r).1);
        (xs, ys)
    }

    /// Map coordinates of the center of pixel (row, col)
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Map bounds `(min_x, min_y, max_x, max_y)`
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Value of the pixel containing `(x, y)`; `None` outside the raster or
    /// on `NaN` cells.
    pub fn sample(&self, x: f64, y: f64) -> Option<f64> {
        let (rows, cols) = self.shape();
        self.transform
            .rowcol(x, y, rows, cols)
            .map(|(r, c)| self.data[(r, c)])
            .filter(|v| v.is_finite())
    }

    /// Minimum and maximum over finite cells
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Number of finite cells
    pub fn finite_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_finite()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_transform() -> GeoTransform {
        GeoTransform::from_bounds(0.0, 0.0, 10.0, 10.0, 10, 10)
    }

    #[test]
    fn test_raster_creation() {
        let raster = Raster::empty(10, 20, unit_transform());
        assert_eq!(raster.rows(), 10);
        assert_eq!(raster.cols(), 20);
        assert_eq!(raster.finite_count(), 0);
    }

    #[test]
    fn test_raster_access() {
        let mut raster = Raster::empty(10, 10, unit_transform());
        raster.set(5, 5, 42.0).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 42.0);
        assert!(raster.set(10, 0, 1.0).is_err());
        assert!(raster.get(0, 10).is_err());
    }

    #[test]
    fn test_raster_sample() {
        let mut raster = Raster::empty(10, 10, unit_transform());
        raster.set(0, 0, 7.0).unwrap();
        assert_eq!(raster.sample(0.2, 9.9), Some(7.0));
        assert_eq!(raster.sample(5.0, 5.0), None);
        assert_eq!(raster.sample(-1.0, 5.0), None);
    }

    #[test]
    fn test_finite_range_and_centers() {
        let data = Array2::from_shape_fn((10, 10), |(r, c)| (r * 10 + c) as f64);
        let raster = Raster::from_array(data, unit_transform());
        assert_eq!(raster.finite_range(), Some((0.0, 99.0)));

        let (xs, ys) = raster.cell_centers();
        assert_eq!(xs[(0, 0)], 0.5);
        assert_eq!(ys[(0, 0)], 9.5);
        assert_eq!(ys[(9, 3)], 0.5);
    }

    #[test]
    fn test_from_vec_dimension_check() {
        assert!(Raster::from_vec(vec![0.0; 5], 2, 3, unit_transform()).is_err());
        assert!(Raster::from_vec(vec![0.0; 6], 2, 3, unit_transform()).is_ok());
    }
}
