//! Observation extraction from line features.

use geo::{Coord, LineString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use aquigrid_core::vector::{Feature, FeatureCollection};
use aquigrid_core::{Error, Result};

use super::kdtree::KdTree;
use super::{Observation, ScatterObservations};

/// Minimum distance between kept samples, as a fraction of the spacing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupTolerance {
    /// `0.05 × spacing`
    #[default]
    Fine,
    /// `0.1 × spacing`
    Coarse,
}

impl DedupTolerance {
    pub fn factor(self) -> f64 {
        match self {
            DedupTolerance::Fine => 0.05,
            DedupTolerance::Coarse => 0.1,
        }
    }
}

/// Parameters for line sampling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    /// Arc-length step between samples, in map units
    pub spacing: f64,
    pub dedup: DedupTolerance,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            spacing: 10.0,
            dedup: DedupTolerance::Fine,
        }
    }
}

fn line_length(line: &LineString<f64>) -> f64 {
    line.0
        .windows(2)
        .map(|w| (w[1].x - w[0].x).hypot(w[1].y - w[0].y))
        .sum()
}

/// Points at `n + 1` equal arc-length steps, `n = max(2, ⌊L / spacing⌋)`.
///
/// A zero-length line yields its single coordinate.
pub fn densify_line(line: &LineString<f64>, spacing: f64) -> Vec<Coord<f64>> {
    let Some(&first) = line.0.first() else {
        return Vec::new();
    };
    let total = line_length(line);
    if total == 0.0 {
        return vec![first];
    }
    let n = ((total / spacing) as usize).max(2);
    let step = total / n as f64;

    let mut out = Vec::with_capacity(n + 1);
    let mut seg = 0usize;
    let mut walked = 0.0;
    for k in 0..=n {
        let target = if k == n { total } else { k as f64 * step };
        // Advance to the segment containing `target`.
        while seg + 2 < line.0.len() {
            let len = (line.0[seg + 1].x - line.0[seg].x).hypot(line.0[seg + 1].y - line.0[seg].y);
            if walked + len >= target {
                break;
            }
            walked += len;
            seg += 1;
        }
        let (a, b) = (line.0[seg], line.0[seg + 1]);
        let len = (b.x - a.x).hypot(b.y - a.y);
        let t = if len > 0.0 { ((target - walked) / len).clamp(0.0, 1.0) } else { 0.0 };
        out.push(Coord {
            x: a.x + t * (b.x - a.x),
            y: a.y + t * (b.y - a.y),
        });
    }
    out
}

/// Drop points closer than `tolerance` to an earlier kept point.
pub fn dedup_points(points: &[Observation], tolerance: f64) -> Vec<Observation> {
    if tolerance <= 0.0 {
        return points.to_vec();
    }
    let tree = KdTree::build(points);
    let mut removed = vec![false; points.len()];
    let mut kept = Vec::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        if removed[i] {
            continue;
        }
        kept.push(*p);
        for n in tree.within_radius(p.x, p.y, tolerance) {
            if n.index > i && n.distance_sq < tolerance * tolerance {
                removed[n.index] = true;
            }
        }
    }
    kept
}

/// Numeric value of `column` for every feature that has one.
///
/// Errors with [`Error::MissingAttribute`] if no feature carries the column.
fn feature_values<'a>(
    features: &'a FeatureCollection,
    column: &str,
) -> Result<Vec<(&'a Feature, f64)>> {
    let mut with_column = 0usize;
    let mut out = Vec::with_capacity(features.len());
    for f in features.iter() {
        if let Some(attr) = f.get_property(column) {
            with_column += 1;
            match attr.as_f64() {
                Some(v) => out.push((f, v)),
                None => debug!(column, ?attr, "feature value is not numeric, skipped"),
            }
        }
    }
    if with_column == 0 {
        return Err(Error::MissingAttribute(column.to_string()));
    }
    Ok(out)
}

fn finish(points: Vec<Observation>, what: &str) -> Result<ScatterObservations> {
    let obs = ScatterObservations::from_points(points);
    if obs.is_empty() {
        return Err(Error::EmptyObservations(what.to_string()));
    }
    Ok(obs)
}

/// Sample every line feature at `params.spacing`, including its vertices.
///
/// Each point carries its feature's `value_column` value. Points closer than
/// the dedup tolerance to an earlier point are dropped.
pub fn sample_points_from_lines(
    features: &FeatureCollection,
    value_column: &str,
    params: &SamplingParams,
) -> Result<ScatterObservations> {
    if !(params.spacing.is_finite() && params.spacing > 0.0) {
        return Err(Error::invalid("spacing", params.spacing, "must be positive"));
    }
    let mut raw = Vec::new();
    for (feature, value) in feature_values(features, value_column)? {
        for line in feature.lines() {
            raw.extend(
                densify_line(&line, params.spacing)
                    .into_iter()
                    .chain(line.0.iter().copied())
                    .map(|c| Observation::new(c.x, c.y, value)),
            );
        }
    }
    let tolerance = params.dedup.factor() * params.spacing;
    let points = dedup_points(&raw, tolerance);
    debug!(raw = raw.len(), kept = points.len(), tolerance, "sampled line features");
    if !raw.is_empty() && points.len() * 2 < raw.len() {
        warn!(
            raw = raw.len(),
            kept = points.len(),
            "dedup removed most samples; spacing may be too small"
        );
    }
    finish(points, "no points could be sampled from the line features")
}

/// Vertices of every line feature, each carrying its feature's value.
pub fn sample_vertices(
    features: &FeatureCollection,
    value_column: &str,
) -> Result<ScatterObservations> {
    let mut points = Vec::new();
    for (feature, value) in feature_values(features, value_column)? {
        for line in feature.lines() {
            points.extend(line.0.iter().map(|c| Observation::new(c.x, c.y, value)));
        }
    }
    finish(points, "line features have no vertices")
}
