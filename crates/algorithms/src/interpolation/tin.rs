//! Triangulated irregular network (TIN) and the linear kernel
//!
//! Delaunay triangulation by incremental Bowyer-Watson insertion, in
//! coordinates relative to the lower-left observation so that projected
//! coordinates in the millions keep their precision. Hull edges are closed by
//! ghost triangles, so the triangulation covers the whole convex hull.
//! Evaluation inside a triangle is barycentric, which is what
//! `griddata(method="linear")` does; targets outside the convex hull get NaN.

use std::collections::{HashMap, HashSet};

use ndarray::Array2;
use tracing::debug;

use aquigrid_core::{Error, Result};

use super::Observation;
use crate::parallel::map_points;

/// Barycentric tolerance for "inside triangle"
const INSIDE_EPS: f64 = -1e-10;
/// Triangles with |2·area| below this fraction of the squared hull size are
/// discarded as slivers.
const SLIVER_REL: f64 = 1e-12;

/// A Delaunay triangulation of distinct observation locations.
#[derive(Debug)]
pub struct Tin {
    origin: (f64, f64),
    vertices: Vec<[f64; 2]>,
    values: Vec<f64>,
    /// Counter-clockwise vertex triples
    triangles: Vec<[usize; 3]>,
    buckets: Buckets,
}

#[derive(Debug, Clone, Copy)]
struct Circle {
    cx: f64,
    cy: f64,
    r_sq: f64,
}

fn circumcircle(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> Option<Circle> {
    let d = 2.0 * (a[0] * (b[1] - c[1]) + b[0] * (c[1] - a[1]) + c[0] * (a[1] - b[1]));
    if d.abs() < 1e-300 {
        return None;
    }
    let a2 = a[0] * a[0] + a[1] * a[1];
    let b2 = b[0] * b[0] + b[1] * b[1];
    let c2 = c[0] * c[0] + c[1] * c[1];
    let cx = (a2 * (b[1] - c[1]) + b2 * (c[1] - a[1]) + c2 * (a[1] - b[1])) / d;
    let cy = (a2 * (c[0] - b[0]) + b2 * (a[0] - c[0]) + c2 * (b[0] - a[0])) / d;
    let (dx, dy) = (a[0] - cx, a[1] - cy);
    Some(Circle {
        cx,
        cy,
        r_sq: dx * dx + dy * dy,
    })
}

#[inline]
fn cross(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])
}

/// Barycentric weights of `p` in triangle `(a, b, c)`
#[inline]
pub(crate) fn barycentric(p: [f64; 2], a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> [f64; 3] {
    let det = cross(a, b, c);
    let wb = cross(a, p, c) / det;
    let wc = cross(a, b, p) / det;
    [1.0 - wb - wc, wb, wc]
}

/// Vertex index standing for the point at infinity
const GHOST: usize = usize::MAX;

/// Bowyer-Watson over `pts`; returns CCW triangles indexing into `pts`.
///
/// Hull edges carry a ghost triangle `[u, v, GHOST]` whose outside lies to
/// the left of `u -> v`. A point outside the hull conflicts with every ghost
/// whose edge it sees, so the result covers the convex hull exactly. Returns
/// `None` when every point is collinear.
fn delaunay(pts: &[[f64; 2]], scale: f64) -> Option<Vec<[usize; 3]>> {
    let (i0, i1) = (0, 1);
    let eps = 1e-12 * scale * scale;
    let i2 = (2..pts.len()).find(|&k| cross(pts[i0], pts[i1], pts[k]).abs() > eps)?;
    let (i1, i2) = if cross(pts[i0], pts[i1], pts[i2]) > 0.0 { (i1, i2) } else { (i2, i1) };

    let circle = |t: [usize; 3]| circumcircle(pts[t[0]], pts[t[1]], pts[t[2]]);
    let mut tris: Vec<([usize; 3], Option<Circle>)> = vec![
        ([i0, i1, i2], circle([i0, i1, i2])),
        ([i1, i0, GHOST], None),
        ([i2, i1, GHOST], None),
        ([i0, i2, GHOST], None),
    ];

    for (vi, p) in pts.iter().enumerate() {
        if vi == i0 || vi == i1 || vi == i2 {
            continue;
        }
        let mut edges: HashMap<(usize, usize), (usize, usize, u32)> = HashMap::new();
        let mut kept = Vec::with_capacity(tris.len() + 4);

        for (tri, cc) in tris.drain(..) {
            let bad = if tri[2] == GHOST {
                ghost_conflict(pts[tri[0]], pts[tri[1]], *p)
            } else {
                cc.map_or(false, |c| {
                    let (dx, dy) = (p[0] - c.cx, p[1] - c.cy);
                    dx * dx + dy * dy <= c.r_sq
                })
            };
            if !bad {
                kept.push((tri, cc));
                continue;
            }
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                let key = (a.min(b), a.max(b));
                edges.entry(key).and_modify(|e| e.2 += 1).or_insert((a, b, 1));
            }
        }

        let mut boundary: Vec<(usize, usize)> = edges
            .into_values()
            .filter(|e| e.2 == 1)
            .map(|e| (e.0, e.1))
            .collect();
        // HashMap order is arbitrary; keep the output reproducible.
        boundary.sort_unstable();

        for (a, b) in boundary {
            let tri = match (a, b) {
                (GHOST, b) => [b, vi, GHOST],
                (a, GHOST) => [vi, a, GHOST],
                (a, b) => [a, b, vi],
            };
            let cc = if tri[2] == GHOST { None } else { circle(tri) };
            kept.push((tri, cc));
        }
        tris = kept;
    }

    Some(
        tris.into_iter()
            .map(|(t, _)| t)
            .filter(|t| t[2] != GHOST)
            .collect(),
    )
}

/// Whether `p` lies in the open half-plane outside hull edge `u -> v`, or on
/// the edge itself.
fn ghost_conflict(u: [f64; 2], v: [f64; 2], p: [f64; 2]) -> bool {
    let side = cross(u, v, p);
    if side != 0.0 {
        return side > 0.0;
    }
    let along = (p[0] - u[0]) * (v[0] - u[0]) + (p[1] - u[1]) * (v[1] - u[1]);
    let len_sq = (v[0] - u[0]).powi(2) + (v[1] - u[1]).powi(2);
    along > 0.0 && along < len_sq
}

impl Tin {
    /// Triangulate the observations. Repeated locations keep their first value.
    ///
    /// Fails with [`Error::Algorithm`] on fewer than three distinct points or
    /// when every point is collinear.
    pub fn build(observations: &[Observation]) -> Result<Self> {
        let origin = observations.iter().fold((f64::INFINITY, f64::INFINITY), |(x, y), p| {
            (x.min(p.x), y.min(p.y))
        });

        let mut seen = HashSet::new();
        let mut vertices = Vec::with_capacity(observations.len());
        let mut values = Vec::with_capacity(observations.len());
        for p in observations {
            let local = [p.x - origin.0, p.y - origin.1];
            if seen.insert((local[0].to_bits(), local[1].to_bits())) {
                vertices.push(local);
                values.push(p.value);
            }
        }
        if vertices.len() < 3 {
            return Err(Error::Algorithm(format!(
                "triangulation needs at least 3 distinct points, got {}",
                vertices.len()
            )));
        }
        if vertices.len() < observations.len() {
            debug!(dropped = observations.len() - vertices.len(), "duplicate locations ignored");
        }

        let (width, height) = vertices
            .iter()
            .fold((0.0f64, 0.0f64), |(w, h), v| (w.max(v[0]), h.max(v[1])));
        let min_area = SLIVER_REL * (width * width + height * height);

        let triangles: Vec<[usize; 3]> = delaunay(&vertices, width.max(height))
            .unwrap_or_default()
            .into_iter()
            .filter(|t| cross(vertices[t[0]], vertices[t[1]], vertices[t[2]]) > min_area)
            .collect();
        if triangles.is_empty() {
            return Err(Error::Algorithm("triangulation is empty (collinear points?)".into()));
        }
        debug!(points = vertices.len(), triangles = triangles.len(), "built TIN");

        let buckets = Buckets::new(&vertices, &triangles, width, height);
        Ok(Self {
            origin,
            vertices,
            values,
            triangles,
            buckets,
        })
    }

    pub fn num_points(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Vertex position relative to the triangulation origin
    pub(crate) fn local(&self, i: usize) -> [f64; 2] {
        self.vertices[i]
    }

    pub fn value(&self, i: usize) -> f64 {
        self.values[i]
    }

    pub(crate) fn to_local(&self, x: f64, y: f64) -> [f64; 2] {
        [x - self.origin.0, y - self.origin.1]
    }

    /// Containing triangle and barycentric weights for a world coordinate.
    pub fn locate(&self, x: f64, y: f64) -> Option<(usize, [f64; 3])> {
        let p = self.to_local(x, y);
        self.buckets.candidates(p).iter().find_map(|&ti| {
            let [a, b, c] = self.triangles[ti];
            let w = barycentric(p, self.vertices[a], self.vertices[b], self.vertices[c]);
            (w.iter().all(|&v| v >= INSIDE_EPS)).then_some((ti, w))
        })
    }

    /// Piecewise-linear value at a world coordinate; NaN outside the hull.
    pub fn linear_at(&self, x: f64, y: f64) -> f64 {
        match self.locate(x, y) {
            Some((ti, w)) => {
                let [a, b, c] = self.triangles[ti];
                w[0] * self.values[a] + w[1] * self.values[b] + w[2] * self.values[c]
            }
            None => f64::NAN,
        }
    }
}

/// Linear kernel: barycentric interpolation on the Delaunay triangulation.
pub fn linear(
    observations: &[Observation],
    xs: &Array2<f64>,
    ys: &Array2<f64>,
) -> Result<Array2<f64>> {
    let tin = Tin::build(observations)?;
    map_points(xs, ys, |x, y| tin.linear_at(x, y))
}

/// Uniform bucket grid over the hull bounding box for point location.
#[derive(Debug)]
struct Buckets {
    nx: usize,
    ny: usize,
    cell_w: f64,
    cell_h: f64,
    cells: Vec<Vec<usize>>,
}

impl Buckets {
    fn new(vertices: &[[f64; 2]], triangles: &[[usize; 3]], width: f64, height: f64) -> Self {
        let side = ((triangles.len() as f64).sqrt().ceil() as usize).clamp(1, 512);
        let nx = if width > 0.0 { side } else { 1 };
        let ny = if height > 0.0 { side } else { 1 };
        let cell_w = if width > 0.0 { width / nx as f64 } else { 1.0 };
        let cell_h = if height > 0.0 { height / ny as f64 } else { 1.0 };

        let mut buckets = Self {
            nx,
            ny,
            cell_w,
            cell_h,
            cells: vec![Vec::new(); nx * ny],
        };
        for (ti, t) in triangles.iter().enumerate() {
            let xs = t.map(|v| vertices[v][0]);
            let ys = t.map(|v| vertices[v][1]);
            let lo = buckets.clamp_index(
                xs.iter().copied().fold(f64::INFINITY, f64::min),
                ys.iter().copied().fold(f64::INFINITY, f64::min),
            );
            let hi = buckets.clamp_index(
                xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                ys.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            );
            for j in lo.1..=hi.1 {
                for i in lo.0..=hi.0 {
                    buckets.cells[j * nx + i].push(ti);
                }
            }
        }
        buckets
    }

    fn clamp_index(&self, x: f64, y: f64) -> (usize, usize) {
        let i = ((x / self.cell_w).floor().max(0.0) as usize).min(self.nx - 1);
        let j = ((y / self.cell_h).floor().max(0.0) as usize).min(self.ny - 1);
        (i, j)
    }

    fn candidates(&self, p: [f64; 2]) -> &[usize] {
        let tol_x = 1e-9 * self.cell_w * self.nx as f64;
        let tol_y = 1e-9 * self.cell_h * self.ny as f64;
        let outside = p[0] < -tol_x
            || p[1] < -tol_y
            || p[0] > self.cell_w * self.nx as f64 + tol_x
            || p[1] > self.cell_h * self.ny as f64 + tol_y;
        if outside || !p[0].is_finite() || !p[1].is_finite() {
            return &[];
        }
        let (i, j) = self.clamp_index(p[0], p[1]);
        &self.cells[j * self.nx + i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn corner_points() -> Vec<Observation> {
        vec![
            Observation::new(0.0, 10.0, 10.0),
            Observation::new(10.0, 10.0, 20.0),
            Observation::new(0.0, 0.0, 30.0),
            Observation::new(10.0, 0.0, 40.0),
        ]
    }

    fn centers(n: usize, size: f64) -> (Array2<f64>, Array2<f64>) {
        let step = size / n as f64;
        (
            Array2::from_shape_fn((n, n), |(_, c)| (c as f64 + 0.5) * step),
            Array2::from_shape_fn((n, n), |(r, _)| size - (r as f64 + 0.5) * step),
        )
    }

    #[test]
    fn test_square_gives_two_triangles() {
        let tin = Tin::build(&corner_points()).unwrap();
        assert_eq!(tin.triangles().len(), 2);
        for t in tin.triangles() {
            assert!(cross(tin.local(t[0]), tin.local(t[1]), tin.local(t[2])) > 0.0);
        }
    }

    #[test]
    fn test_barycentric_at_vertices_and_centroid() {
        let (a, b, c) = ([0.0, 0.0], [10.0, 0.0], [0.0, 10.0]);
        let w = barycentric(a, a, b, c);
        assert_relative_eq!(w[0], 1.0, epsilon = 1e-12);
        let w = barycentric(b, a, b, c);
        assert_relative_eq!(w[1], 1.0, epsilon = 1e-12);
        let w = barycentric([10.0 / 3.0, 10.0 / 3.0], a, b, c);
        for v in w {
            assert_relative_eq!(v, 1.0 / 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_plane_reproduced_exactly() {
        let mut pts = Vec::new();
        for i in 0..6 {
            for j in 0..6 {
                let (x, y) = (i as f64 * 2.0 + 0.3 * (j % 2) as f64, j as f64 * 2.0);
                pts.push(Observation::new(x, y, 3.0 + 2.0 * x - y));
            }
        }
        let (xs, ys) = centers(10, 10.0);
        let out = linear(&pts, &xs, &ys).unwrap();
        let mut finite = 0;
        for ((r, c), v) in out.indexed_iter() {
            if v.is_finite() {
                finite += 1;
                assert_relative_eq!(*v, 3.0 + 2.0 * xs[(r, c)] - ys[(r, c)], epsilon = 1e-9);
            }
        }
        assert!(finite > 80, "only {finite} finite cells");
    }

    #[test]
    fn test_outside_hull_is_nan() {
        let pts = vec![
            Observation::new(0.0, 0.0, 1.0),
            Observation::new(4.0, 0.0, 1.0),
            Observation::new(0.0, 4.0, 1.0),
        ];
        let tin = Tin::build(&pts).unwrap();
        assert!(tin.linear_at(3.5, 3.5).is_nan());
        assert!(tin.linear_at(-1.0, 0.0).is_nan());
        assert_relative_eq!(tin.linear_at(1.0, 1.0), 1.0);
    }

    #[test]
    fn test_large_projected_coordinates() {
        let (x0, y0) = (2_600_000.0, 1_200_000.0);
        let pts: Vec<Observation> = corner_points()
            .into_iter()
            .map(|p| Observation::new(p.x + x0, p.y + y0, p.y))
            .collect();
        let tin = Tin::build(&pts).unwrap();
        assert_relative_eq!(tin.linear_at(x0 + 5.0, y0 + 2.5), 2.5, epsilon = 1e-9);
    }

    #[test]
    fn test_duplicates_and_collinear() {
        let dup = vec![
            Observation::new(0.0, 0.0, 1.0),
            Observation::new(0.0, 0.0, 2.0),
            Observation::new(1.0, 0.0, 3.0),
        ];
        assert!(Tin::build(&dup).is_err());

        let line: Vec<Observation> = (0..5).map(|i| Observation::new(i as f64, 0.0, 1.0)).collect();
        assert!(Tin::build(&line).is_err());
    }

    #[test]
    fn test_parallel_contour_lines() {
        // Densely sampled lines are collinear runs; the chords must still
        // triangulate the strip between them.
        let mut pts = Vec::new();
        for i in 0..=40 {
            let x = i as f64 * 0.25;
            pts.push(Observation::new(x, 2.0, 10.0));
            pts.push(Observation::new(x, 7.0, 20.0));
        }
        let tin = Tin::build(&pts).unwrap();
        assert_relative_eq!(tin.linear_at(4.1, 4.5), 15.0, epsilon = 1e-9);
        assert_relative_eq!(tin.linear_at(9.9, 2.5), 11.0, epsilon = 1e-9);
    }

    #[test]
    fn test_shallow_arc_hull_is_covered() {
        // Consecutive arc points have circumcircles far larger than the point
        // set; the hull triangles along the arc must still exist.
        let plane = |x: f64, y: f64| 2.0 * x - 3.0 * y;
        let mut pts: Vec<Observation> = (0..=10)
            .map(|i| {
                let x = i as f64;
                let y = 0.001 * x * x;
                Observation::new(x, y, plane(x, y))
            })
            .collect();
        pts.push(Observation::new(5.0, 5.0, plane(5.0, 5.0)));
        let tin = Tin::build(&pts).unwrap();
        for x in [1.5, 3.0, 5.0, 7.0, 8.5] {
            let y = 0.001 * x * x + 0.002;
            assert_relative_eq!(tin.linear_at(x, y), plane(x, y), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_no_nan_inside_hull_random_sets() {
        use geo::{Contains, ConvexHull, MultiPoint, Point};

        // xorshift64, fixed seed
        let mut state = 0x2545_F491_4F6C_DD1Du64;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        let (xs, ys) = centers(50, 100.0);

        for trial in 0..150 {
            let n = 3 + (next() * 40.0) as usize;
            let pts: Vec<Observation> = (0..n)
                .map(|_| Observation::new(next() * 100.0, next() * 100.0, next()))
                .collect();
            let Ok(tin) = Tin::build(&pts) else {
                continue;
            };
            let hull =
                MultiPoint::from(pts.iter().map(|p| (p.x, p.y)).collect::<Vec<_>>()).convex_hull();
            for ((r, c), &x) in xs.indexed_iter() {
                let y = ys[(r, c)];
                if hull.contains(&Point::new(x, y)) {
                    assert!(
                        tin.linear_at(x, y).is_finite(),
                        "trial {trial} (n = {n}): NaN at ({x}, {y}) inside the hull"
                    );
                }
            }
        }
    }
}
