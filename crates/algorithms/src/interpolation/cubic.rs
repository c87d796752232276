//! Cubic kernel: cubic Bézier triangle patches on the Delaunay triangulation.
//!
//! Vertex gradients are the area-weighted mean of the planar gradients of
//! the incident triangles. Each triangle gets a cubic patch through its three
//! vertex values, matching the vertex gradients along its edges. Patches share
//! edge control points, so the surface is continuous, and a linear field is
//! reproduced exactly. Targets outside the hull are NaN.

use ndarray::Array2;

use aquigrid_core::Result;

use super::tin::Tin;
use super::Observation;
use crate::parallel::map_points;

/// Control net of one patch, in the order
/// `b300 b030 b003 b210 b201 b120 b021 b102 b012 b111`.
type ControlNet = [f64; 10];

fn planar_gradient(p: [[f64; 2]; 3], f: [f64; 3]) -> ([f64; 2], f64) {
    let (e1, e2) = ([p[1][0] - p[0][0], p[1][1] - p[0][1]], [p[2][0] - p[0][0], p[2][1] - p[0][1]]);
    let det = e1[0] * e2[1] - e2[0] * e1[1];
    let (df1, df2) = (f[1] - f[0], f[2] - f[0]);
    let gx = (df1 * e2[1] - df2 * e1[1]) / det;
    let gy = (e1[0] * df2 - e2[0] * df1) / det;
    ([gx, gy], 0.5 * det.abs())
}

fn vertex_gradients(tin: &Tin) -> Vec<[f64; 2]> {
    let n = tin.num_points();
    let mut acc = vec![[0.0f64; 3]; n];
    for t in tin.triangles() {
        let p = t.map(|v| tin.local(v));
        let f = t.map(|v| tin.value(v));
        let (g, area) = planar_gradient(p, f);
        for &v in t {
            acc[v][0] += area * g[0];
            acc[v][1] += area * g[1];
            acc[v][2] += area;
        }
    }
    acc.into_iter()
        .map(|[gx, gy, w]| if w > 0.0 { [gx / w, gy / w] } else { [0.0, 0.0] })
        .collect()
}

fn control_net(p: [[f64; 2]; 3], f: [f64; 3], g: [[f64; 2]; 3]) -> ControlNet {
    // Value one third of the way from vertex i towards vertex j along the
    // tangent plane at i.
    let edge = |i: usize, j: usize| {
        f[i] + (g[i][0] * (p[j][0] - p[i][0]) + g[i][1] * (p[j][1] - p[i][1])) / 3.0
    };
    let b210 = edge(0, 1);
    let b201 = edge(0, 2);
    let b120 = edge(1, 0);
    let b021 = edge(1, 2);
    let b102 = edge(2, 0);
    let b012 = edge(2, 1);
    let e = (b210 + b201 + b120 + b021 + b102 + b012) / 6.0;
    let v = (f[0] + f[1] + f[2]) / 3.0;
    let b111 = e + 0.5 * (e - v);
    [f[0], f[1], f[2], b210, b201, b120, b021, b102, b012, b111]
}

fn eval_patch(b: &ControlNet, w: [f64; 3]) -> f64 {
    let [u, v, t] = w;
    b[0] * u * u * u
        + b[1] * v * v * v
        + b[2] * t * t * t
        + 3.0 * (b[3] * u * u * v + b[4] * u * u * t + b[5] * u * v * v)
        + 3.0 * (b[6] * v * v * t + b[7] * u * t * t + b[8] * v * t * t)
        + 6.0 * b[9] * u * v * t
}

/// Cubic kernel evaluated at the given coordinates.
pub fn cubic(
    observations: &[Observation],
    xs: &Array2<f64>,
    ys: &Array2<f64>,
) -> Result<Array2<f64>> {
    let tin = Tin::build(observations)?;
    let grads = vertex_gradients(&tin);
    let nets: Vec<ControlNet> = tin
        .triangles()
        .iter()
        .map(|t| control_net(t.map(|v| tin.local(v)), t.map(|v| tin.value(v)), t.map(|v| grads[v])))
        .collect();

    map_points(xs, ys, |x, y| match tin.locate(x, y) {
        Some((ti, w)) => eval_patch(&nets[ti], w),
        None => f64::NAN,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn lattice(f: impl Fn(f64, f64) -> f64) -> Vec<Observation> {
        let mut pts = Vec::new();
        for i in 0..=8 {
            for j in 0..=8 {
                let x = i as f64 * 1.25 + if j % 2 == 1 { 0.1 } else { 0.0 };
                let y = j as f64 * 1.25;
                pts.push(Observation::new(x, y, f(x, y)));
            }
        }
        pts
    }

    fn targets() -> (Array2<f64>, Array2<f64>) {
        (
            Array2::from_shape_fn((9, 9), |(_, c)| 0.6 + c as f64 * 1.1),
            Array2::from_shape_fn((9, 9), |(r, _)| 9.4 - r as f64 * 1.1),
        )
    }

    #[test]
    fn test_linear_field_exact() {
        let plane = |x: f64, y: f64| 5.0 - 0.5 * x + 1.5 * y;
        let (xs, ys) = targets();
        let out = cubic(&lattice(plane), &xs, &ys).unwrap();
        for ((r, c), v) in out.indexed_iter() {
            if v.is_finite() {
                assert_relative_eq!(*v, plane(xs[(r, c)], ys[(r, c)]), epsilon = 1e-9);
            }
        }
        assert!(out.iter().filter(|v| v.is_finite()).count() > 60);
    }

    #[test]
    fn test_interpolates_vertices() {
        let pts = lattice(|x, y| (x * 0.3).sin() + y * y * 0.05);
        let xs = Array2::from_shape_fn((1, 3), |(_, c)| pts[10 + c].x);
        let ys = Array2::from_shape_fn((1, 3), |(_, c)| pts[10 + c].y);
        let out = cubic(&pts, &xs, &ys).unwrap();
        for c in 0..3 {
            assert_relative_eq!(out[(0, c)], pts[10 + c].value, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_closer_than_linear_on_curved_field() {
        let f = |x: f64, y: f64| 0.1 * x * x + 0.05 * y * y;
        let pts = lattice(f);
        let (xs, ys) = targets();
        let cub = cubic(&pts, &xs, &ys).unwrap();
        let lin = super::super::tin::linear(&pts, &xs, &ys).unwrap();
        let err = |a: &Array2<f64>| -> f64 {
            a.indexed_iter()
                .filter(|(_, v)| v.is_finite())
                .map(|((r, c), v)| (v - f(xs[(r, c)], ys[(r, c)])).abs())
                .sum()
        };
        assert!(err(&cub) < err(&lin));
    }

    #[test]
    fn test_control_net_of_constant() {
        let p = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        let net = control_net(p, [4.0; 3], [[0.0, 0.0]; 3]);
        assert!(net.iter().all(|&b| (b - 4.0).abs() < 1e-12));
        assert_relative_eq!(eval_patch(&net, [0.2, 0.3, 0.5]), 4.0, epsilon = 1e-12);
    }
}
