//! Iso-line extraction by marching squares over raster cell centers.

use std::collections::{HashMap, VecDeque};

use geo::{Coord, LineString};
use ndarray::Array2;

use aquigrid_core::Raster;

/// One connected iso-line
#[derive(Debug, Clone)]
pub struct IsoLine {
    pub level: f64,
    pub line: LineString<f64>,
    pub closed: bool,
}

/// Multiples of `interval` within `[min, max]`.
pub fn contour_levels(min: f64, max: f64, interval: f64) -> Vec<f64> {
    if !(interval.is_finite() && interval > 0.0 && min <= max) {
        return Vec::new();
    }
    let first = (min / interval).ceil() as i64;
    let last = (max / interval).floor() as i64;
    (first..=last).map(|k| k as f64 * interval).collect()
}

/// Crossing point on the edge from `(x1, y1)` to `(x2, y2)`.
fn interpolate_edge(
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    v1: f64,
    v2: f64,
    level: f64,
) -> Coord<f64> {
    let t = if (v2 - v1).abs() < f64::EPSILON {
        0.5
    } else {
        ((level - v1) / (v2 - v1)).clamp(0.0, 1.0)
    };
    Coord {
        x: x1 + t * (x2 - x1),
        y: y1 + t * (y2 - y1),
    }
}

/// Segments of the `level` iso-line in index space (`x` = column,
/// `y` = row, both at cell centers). Squares touching NaN are skipped.
pub fn march_squares(data: &Array2<f64>, level: f64) -> Vec<[Coord<f64>; 2]> {
    let (rows, cols) = data.dim();
    let mut segments = Vec::new();
    if rows < 2 || cols < 2 {
        return segments;
    }

    for r in 0..rows - 1 {
        for c in 0..cols - 1 {
            let tl = data[(r, c)];
            let tr = data[(r, c + 1)];
            let br = data[(r + 1, c + 1)];
            let bl = data[(r + 1, c)];
            if !(tl.is_finite() && tr.is_finite() && br.is_finite() && bl.is_finite()) {
                continue;
            }

            let mut case = 0u8;
            if tl >= level {
                case |= 1;
            }
            if tr >= level {
                case |= 2;
            }
            if br >= level {
                case |= 4;
            }
            if bl >= level {
                case |= 8;
            }
            if case == 0 || case == 15 {
                continue;
            }

            let (x, y) = (c as f64, r as f64);
            let top = interpolate_edge(x, y, x + 1.0, y, tl, tr, level);
            let right = interpolate_edge(x + 1.0, y, x + 1.0, y + 1.0, tr, br, level);
            let bottom = interpolate_edge(x, y + 1.0, x + 1.0, y + 1.0, bl, br, level);
            let left = interpolate_edge(x, y, x, y + 1.0, tl, bl, level);
            let center_high = 0.25 * (tl + tr + br + bl) >= level;

            match case {
                1 | 14 => segments.push([left, top]),
                2 | 13 => segments.push([top, right]),
                3 | 12 => segments.push([left, right]),
                4 | 11 => segments.push([right, bottom]),
                6 | 9 => segments.push([top, bottom]),
                7 | 8 => segments.push([left, bottom]),
                // Saddles, resolved by the square's mean
                5 if center_high => {
                    segments.push([top, right]);
                    segments.push([left, bottom]);
                }
                5 => {
                    segments.push([left, top]);
                    segments.push([right, bottom]);
                }
                10 if center_high => {
                    segments.push([left, top]);
                    segments.push([right, bottom]);
                }
                10 => {
                    segments.push([top, right]);
                    segments.push([left, bottom]);
                }
                _ => {}
            }
        }
    }
    segments
}

fn endpoint_key(c: Coord<f64>) -> (i64, i64) {
    ((c.x * 1e9).round() as i64, (c.y * 1e9).round() as i64)
}

/// Join segments sharing endpoints into polylines. Returns `(points, closed)`.
pub fn connect_segments(segments: &[[Coord<f64>; 2]]) -> Vec<(Vec<Coord<f64>>, bool)> {
    let mut at: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (i, s) in segments.iter().enumerate() {
        at.entry(endpoint_key(s[0])).or_default().push(i);
        at.entry(endpoint_key(s[1])).or_default().push(i);
    }

    let mut used = vec![false; segments.len()];
    // Unused segment at `point` and its far endpoint
    let take_next = |point: Coord<f64>, used: &mut Vec<bool>| -> Option<Coord<f64>> {
        let key = endpoint_key(point);
        let j = at.get(&key)?.iter().copied().find(|&j| !used[j])?;
        used[j] = true;
        let s = segments[j];
        Some(if endpoint_key(s[0]) == key { s[1] } else { s[0] })
    };

    let mut lines = Vec::new();
    for start in 0..segments.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let mut chain: VecDeque<Coord<f64>> = VecDeque::from(segments[start].to_vec());

        while let Some(next) = chain.back().copied().and_then(|p| take_next(p, &mut used)) {
            chain.push_back(next);
        }
        while let Some(prev) = chain.front().copied().and_then(|p| take_next(p, &mut used)) {
            chain.push_front(prev);
        }

        let closed = chain.len() > 3
            && chain.front().map(|&c| endpoint_key(c)) == chain.back().map(|&c| endpoint_key(c));
        lines.push((chain.into_iter().collect(), closed));
    }
    lines
}

/// Iso-lines of `raster` at `level`, in map coordinates.
pub fn extract_isolines(raster: &Raster, level: f64) -> Vec<IsoLine> {
    let transform = raster.transform();
    let segments = march_squares(raster.data(), level);
    connect_segments(&segments)
        .into_iter()
        .map(|(points, closed)| {
            let coords: Vec<Coord<f64>> = points
                .into_iter()
                .map(|p| {
                    let (x, y) = transform.fractional_to_geo(p.x + 0.5, p.y + 0.5);
                    Coord { x, y }
                })
                .collect();
            IsoLine {
                level,
                line: LineString::new(coords),
                closed,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquigrid_core::GeoTransform;
    use approx::assert_relative_eq;

    #[test]
    fn test_contour_levels() {
        assert_eq!(contour_levels(10.0, 20.0, 5.0), vec![10.0, 15.0, 20.0]);
        assert_eq!(contour_levels(11.0, 19.0, 5.0), vec![15.0]);
        assert_eq!(contour_levels(-3.0, 3.0, 2.0), vec![-2.0, 0.0, 2.0]);
        assert!(contour_levels(0.0, 10.0, 0.0).is_empty());
        assert!(contour_levels(5.0, 1.0, 1.0).is_empty());
    }

    #[test]
    fn test_interpolate_edge() {
        let p = interpolate_edge(0.0, 0.0, 1.0, 0.0, 10.0, 20.0, 12.5);
        assert_relative_eq!(p.x, 0.25);
        let flat = interpolate_edge(0.0, 0.0, 1.0, 0.0, 5.0, 5.0, 5.0);
        assert_relative_eq!(flat.x, 0.5);
    }

    #[test]
    fn test_flat_field_has_no_segments() {
        let data = Array2::from_elem((5, 5), 3.0);
        assert!(march_squares(&data, 4.0).is_empty());
    }

    #[test]
    fn test_ramp_gives_one_straight_line() {
        // Value grows with column: iso-line is vertical
        let data = Array2::from_shape_fn((6, 8), |(_, c)| c as f64);
        let segs = march_squares(&data, 2.5);
        assert_eq!(segs.len(), 5);
        let lines = connect_segments(&segs);
        assert_eq!(lines.len(), 1);
        let (pts, closed) = &lines[0];
        assert!(!closed);
        assert_eq!(pts.len(), 6);
        assert!(pts.iter().all(|p| (p.x - 2.5).abs() < 1e-12));
    }

    #[test]
    fn test_closed_ring_around_peak() {
        let data = Array2::from_shape_fn((7, 7), |(r, c)| {
            let (dr, dc) = (r as f64 - 3.0, c as f64 - 3.0);
            10.0 - (dr * dr + dc * dc).sqrt()
        });
        let lines = connect_segments(&march_squares(&data, 8.5));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].1);
    }

    #[test]
    fn test_extract_isolines_map_coordinates() {
        // Value equals y: iso-line at level 4.5 must be y = 4.5
        let transform = GeoTransform::from_bounds(0.0, 0.0, 10.0, 10.0, 20, 20);
        let mut raster = Raster::empty(20, 20, transform);
        let (_, ys) = raster.cell_centers();
        *raster.data_mut() = ys;
        let lines = extract_isolines(&raster, 4.5);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].line.0.iter().all(|c| (c.y - 4.5).abs() < 1e-9));
        assert_relative_eq!(lines[0].level, 4.5);
    }
}
