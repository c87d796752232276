//! Nearest-neighbour kernel
//!
//! Each target takes the value of the closest observation (Voronoi
//! assignment). Also used to back-fill cells the other kernels leave NaN.

use ndarray::Array2;

use aquigrid_core::{Error, Result};

use super::kdtree::KdTree;
use super::Observation;
use crate::parallel::map_points;

/// Evaluate nearest-neighbour values at the given coordinates.
///
/// Targets farther than `max_radius` from every observation are NaN.
pub fn nearest(
    observations: &[Observation],
    xs: &Array2<f64>,
    ys: &Array2<f64>,
    max_radius: Option<f64>,
) -> Result<Array2<f64>> {
    if observations.is_empty() {
        return Err(Error::EmptyObservations("nearest-neighbour kernel".into()));
    }
    let tree = KdTree::build(observations);
    let max_sq = max_radius.map(|r| r * r);

    map_points(xs, ys, |x, y| match tree.nearest(x, y) {
        Some(n) if max_sq.map_or(true, |m| n.distance_sq <= m) => n.point.value,
        _ => f64::NAN,
    })
}
