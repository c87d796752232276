//! Row-parallel evaluation helpers.
//!
//! With the `parallel` feature, rows are distributed over the rayon thread
//! pool; without it (e.g. WASM builds) the same closures run sequentially.
//! Output order is identical either way.

use ndarray::Array2;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use aquigrid_core::{Error, Result};

/// Build a `rows × cols` array row by row.
///
/// `row_fn` must return exactly `cols` values.
pub(crate) fn collect_rows<F>(rows: usize, cols: usize, row_fn: F) -> Result<Array2<f64>>
where
    F: Fn(usize) -> Vec<f64> + Sync + Send,
{
    #[cfg(feature = "parallel")]
    let data: Vec<f64> = (0..rows).into_par_iter().flat_map(|row| row_fn(row)).collect();
    #[cfg(not(feature = "parallel"))]
    let data: Vec<f64> = (0..rows).flat_map(|row| row_fn(row)).collect();

    Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))
}

/// Evaluate `f(x, y)` at every position of two coordinate arrays.
pub(crate) fn map_points<F>(xs: &Array2<f64>, ys: &Array2<f64>, f: F) -> Result<Array2<f64>>
where
    F: Fn(f64, f64) -> f64 + Sync + Send,
{
    if xs.dim() != ys.dim() {
        let (er, ec) = xs.dim();
        let (ar, ac) = ys.dim();
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }
    let (rows, cols) = xs.dim();
    collect_rows(rows, cols, |row| {
        (0..cols)
            .map(|col| f(xs[(row, col)], ys[(row, col)]))
            .collect()
    })
}
