//! Scattered observations of a scalar field.

use serde::{Deserialize, Serialize};
use tracing::warn;

use aquigrid_core::grid::Extent;

use crate::stats;

/// A single `(x, y, value)` observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

impl Observation {
    pub fn new(x: f64, y: f64, value: f64) -> Self {
        Self { x, y, value }
    }

    /// Squared Euclidean distance to another point
    #[inline]
    pub fn dist_sq(&self, other_x: f64, other_y: f64) -> f64 {
        let dx = self.x - other_x;
        let dy = self.y - other_y;
        dx * dx + dy * dy
    }

    #[inline]
    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.value.is_finite()
    }
}

/// A set of finite observations.
///
/// Entries with a non-finite coordinate or value never enter the set; they
/// are counted in [`rejected`](Self::rejected).
#[derive(Debug, Clone, Default)]
pub struct ScatterObservations {
    points: Vec<Observation>,
    rejected: usize,
}

impl ScatterObservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect observations, dropping non-finite ones with a warning.
    pub fn from_points<I: IntoIterator<Item = Observation>>(points: I) -> Self {
        let mut set = Self::new();
        set.extend(points);
        if set.rejected > 0 {
            warn!(rejected = set.rejected, kept = set.len(), "dropped non-finite observations");
        }
        set
    }

    /// Add one observation; returns `false` if it was rejected.
    pub fn push(&mut self, obs: Observation) -> bool {
        if obs.is_finite() {
            self.points.push(obs);
            true
        } else {
            self.rejected += 1;
            false
        }
    }

    pub fn extend<I: IntoIterator<Item = Observation>>(&mut self, points: I) {
        for p in points {
            self.push(p);
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.points.iter()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn min(&self) -> Option<f64> {
        self.points.iter().map(|p| p.value).reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.points.iter().map(|p| p.value).reduce(f64::max)
    }

    pub fn median(&self) -> Option<f64> {
        stats::median(&self.values())
    }

    pub fn quantile(&self, q: f64) -> Option<f64> {
        stats::quantile(&self.values(), q)
    }

    /// Bounding box of the observation locations
    pub fn bounds(&self) -> Option<Extent> {
        Extent::from_points(self.points.iter().map(|p| (p.x, p.y)))
    }
}

impl FromIterator<Observation> for ScatterObservations {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        Self::from_points(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_finite_rejected() {
        let obs = ScatterObservations::from_points(vec![
            Observation::new(0.0, 0.0, 1.0),
            Observation::new(1.0, 0.0, f64::NAN),
            Observation::new(f64::INFINITY, 0.0, 2.0),
            Observation::new(2.0, 0.0, 3.0),
        ]);
        assert_eq!(obs.len(), 2);
        assert_eq!(obs.rejected(), 2);
        assert_eq!(obs.values(), vec![1.0, 3.0]);
    }

    #[test]
    fn test_summary_statistics() {
        let obs: ScatterObservations = (0..5)
            .map(|i| Observation::new(i as f64, 2.0 * i as f64, 10.0 + i as f64))
            .collect();
        assert_eq!(obs.min(), Some(10.0));
        assert_eq!(obs.max(), Some(14.0));
        assert_eq!(obs.median(), Some(12.0));
        let b = obs.bounds().unwrap();
        assert_eq!((b.xmin, b.xmax, b.ymin, b.ymax), (0.0, 4.0, 0.0, 8.0));
    }

    #[test]
    fn test_empty() {
        let obs = ScatterObservations::new();
        assert!(obs.is_empty());
        assert_eq!(obs.median(), None);
        assert!(obs.bounds().is_none());
    }
}
