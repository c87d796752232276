//! Contour densification
//!
//! Sparse contour sets leave wide gaps between observed levels. An
//! auxiliary linear surface is contoured at the missing multiples of the
//! level interval and the resulting iso-lines are sampled as extra
//! observations.

use serde::{Deserialize, Serialize};
use tracing::debug;

use aquigrid_core::{Error, GeoTransform, Raster, Result};

use super::contour::{contour_levels, extract_isolines};
use super::fallback::{interpolate_at, InterpolationMethod, InterpolationParams};
use super::sampling::{dedup_points, densify_line, DedupTolerance};
use super::{Observation, ScatterObservations};

/// Upper bound on synthesized levels per call
const MAX_LEVELS: usize = 1000;

/// Parameters for contour densification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DensifyParams {
    /// Cells per side of the auxiliary surface
    pub resolution: usize,
    /// Sampling step along synthesized iso-lines, in map units
    pub spacing: f64,
    pub dedup: DedupTolerance,
}

impl Default for DensifyParams {
    fn default() -> Self {
        Self {
            resolution: 100,
            spacing: 10.0,
            dedup: DedupTolerance::Fine,
        }
    }
}

fn is_observed(level: f64, observed: &[f64]) -> bool {
    let tol = 1e-9 * level.abs().max(1.0);
    observed.iter().any(|v| (v - level).abs() <= tol)
}

/// Original observations plus samples of iso-lines at every multiple of
/// `level_interval` inside the observed range that is not already observed.
pub fn densify_contours(
    observations: &ScatterObservations,
    level_interval: f64,
    params: &DensifyParams,
) -> Result<ScatterObservations> {
    if !(level_interval.is_finite() && level_interval > 0.0) {
        return Err(Error::invalid("level_interval", level_interval, "must be positive"));
    }
    if !(params.spacing.is_finite() && params.spacing > 0.0) {
        return Err(Error::invalid("spacing", params.spacing, "must be positive"));
    }
    if params.resolution < 2 {
        return Err(Error::invalid(
            "resolution",
            params.resolution,
            "need at least 2 cells per side",
        ));
    }
    let (Some(min), Some(max), Some(bounds)) =
        (observations.min(), observations.max(), observations.bounds())
    else {
        return Err(Error::EmptyObservations("nothing to densify".into()));
    };
    if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
        debug!("observations are degenerate in one direction, densification skipped");
        return Ok(observations.clone());
    }

    let mut values = observations.values();
    values.sort_by(f64::total_cmp);
    values.dedup();
    let levels: Vec<f64> = contour_levels(min, max, level_interval)
        .into_iter()
        .filter(|l| !is_observed(*l, &values))
        .collect();
    if levels.len() > MAX_LEVELS {
        return Err(Error::invalid(
            "level_interval",
            level_interval,
            format!("would synthesize {} levels", levels.len()),
        ));
    }
    if levels.is_empty() {
        debug!("no missing levels to synthesize");
        return Ok(observations.clone());
    }

    let n = params.resolution;
    let transform =
        GeoTransform::from_bounds(bounds.xmin, bounds.ymin, bounds.xmax, bounds.ymax, n, n);
    let mut aux = Raster::empty(n, n, transform);
    let (xs, ys) = aux.cell_centers();
    let surface = interpolate_at(
        observations,
        &xs,
        &ys,
        InterpolationMethod::Linear,
        &InterpolationParams::default(),
    )?;
    *aux.data_mut() = surface.values;

    let mut synthesized = Vec::new();
    for level in levels {
        let lines = extract_isolines(&aux, level);
        if lines.is_empty() {
            debug!(level, "no iso-line extracted, level skipped");
            continue;
        }
        for iso in lines {
            synthesized.extend(
                densify_line(&iso.line, params.spacing)
                    .into_iter()
                    .map(|c| Observation::new(c.x, c.y, level)),
            );
        }
    }

    let synthesized = dedup_points(&synthesized, params.dedup.factor() * params.spacing);
    debug!(original = observations.len(), added = synthesized.len(), "densified contours");
    let mut out = observations.clone();
    out.extend(synthesized);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_contours() -> ScatterObservations {
        let mut pts = Vec::new();
        for i in 0..=18 {
            let x = i as f64 * 0.5;
            pts.push(Observation::new(x, 2.0, 10.0));
            pts.push(Observation::new(x, 7.0, 20.0));
        }
        ScatterObservations::from_points(pts)
    }

    #[test]
    fn test_synthesizes_missing_level() {
        let obs = two_contours();
        let params = DensifyParams {
            spacing: 0.5,
            ..Default::default()
        };
        let dense = densify_contours(&obs, 5.0, &params).unwrap();
        assert!(dense.len() > obs.len());
        assert_eq!(&dense.points()[..obs.len()], obs.points());

        let added = &dense.points()[obs.len()..];
        assert!(added.iter().all(|p| p.value == 15.0));
        assert!(added.iter().all(|p| (p.y - 4.5).abs() < 1e-6), "iso-line 15 must lie at y = 4.5");
    }

    #[test]
    fn test_observed_levels_not_repeated() {
        let obs = two_contours();
        let dense = densify_contours(&obs, 10.0, &DensifyParams::default()).unwrap();
        assert_eq!(dense.len(), obs.len());
    }

    #[test]
    fn test_invalid_interval() {
        let obs = two_contours();
        assert!(densify_contours(&obs, 0.0, &DensifyParams::default()).is_err());
        assert!(densify_contours(&obs, f64::NAN, &DensifyParams::default()).is_err());
    }

    #[test]
    fn test_empty_observations() {
        let err = densify_contours(&ScatterObservations::new(), 1.0, &DensifyParams::default());
        assert!(matches!(err, Err(Error::EmptyObservations(_))));
    }
}
