//! 2D k-d tree over observations
//!
//! Nearest-neighbour back-fill and the dedup pass of line sampling query the
//! same observation set thousands of times; the tree keeps both O(log n).
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

use std::cmp::Ordering;

use super::Observation;

/// A 2D k-d tree over a copy of the input points.
#[derive(Debug, Default)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    root: Option<usize>,
    points: Vec<Observation>,
}

#[derive(Debug)]
struct KdNode {
    /// Index into `points` (input order)
    point_idx: usize,
    /// 0 = x, 1 = y
    axis: u8,
    left: Option<usize>,
    right: Option<usize>,
}

/// A point found by a query
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    pub point: Observation,
    pub distance_sq: f64,
    /// Position of the point in the slice the tree was built from
    pub index: usize,
}

impl KdTree {
    /// Build a tree; O(n log n) with median selection per level.
    pub fn build(points: &[Observation]) -> Self {
        let mut order: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::with_capacity(points.len());
        let root = build_level(points, &mut order, 0, &mut nodes);
        Self {
            nodes,
            root,
            points: points.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Closest point to `(qx, qy)`; `None` on an empty tree.
    pub fn nearest(&self, qx: f64, qy: f64) -> Option<Neighbor> {
        let root = self.root?;
        let mut best = (f64::INFINITY, 0usize);
        self.nearest_from(root, qx, qy, &mut best);
        Some(Neighbor {
            point: self.points[best.1],
            distance_sq: best.0,
            index: best.1,
        })
    }

    /// Every point with distance ≤ `radius`, unordered.
    pub fn within_radius(&self, qx: f64, qy: f64, radius: f64) -> Vec<Neighbor> {
        let mut found = Vec::new();
        if let Some(root) = self.root {
            if radius >= 0.0 {
                self.radius_from(root, qx, qy, radius * radius, &mut found);
            }
        }
        found
    }

    fn split_offset(&self, node: &KdNode, qx: f64, qy: f64) -> f64 {
        let p = &self.points[node.point_idx];
        if node.axis == 0 {
            qx - p.x
        } else {
            qy - p.y
        }
    }

    fn nearest_from(&self, idx: usize, qx: f64, qy: f64, best: &mut (f64, usize)) {
        let node = &self.nodes[idx];
        let d = self.points[node.point_idx].dist_sq(qx, qy);
        // Ties resolve to the earliest input point.
        if d < best.0 || (d == best.0 && node.point_idx < best.1) {
            *best = (d, node.point_idx);
        }

        let diff = self.split_offset(node, qx, qy);
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };
        if let Some(child) = near {
            self.nearest_from(child, qx, qy, best);
        }
        if diff * diff <= best.0 {
            if let Some(child) = far {
                self.nearest_from(child, qx, qy, best);
            }
        }
    }

    fn radius_from(&self, idx: usize, qx: f64, qy: f64, radius_sq: f64, found: &mut Vec<Neighbor>) {
        let node = &self.nodes[idx];
        let p = self.points[node.point_idx];
        let d = p.dist_sq(qx, qy);
        if d <= radius_sq {
            found.push(Neighbor {
                point: p,
                distance_sq: d,
                index: node.point_idx,
            });
        }

        let diff = self.split_offset(node, qx, qy);
        let crosses = diff * diff <= radius_sq;
        if let Some(left) = node.left {
            if diff < 0.0 || crosses {
                self.radius_from(left, qx, qy, radius_sq, found);
            }
        }
        if let Some(right) = node.right {
            if diff >= 0.0 || crosses {
                self.radius_from(right, qx, qy, radius_sq, found);
            }
        }
    }
}

fn build_level(
    points: &[Observation],
    order: &mut [usize],
    depth: usize,
    nodes: &mut Vec<KdNode>,
) -> Option<usize> {
    if order.is_empty() {
        return None;
    }
    let axis = (depth % 2) as u8;
    let key = |i: usize| if axis == 0 { points[i].x } else { points[i].y };

    let mid = order.len() / 2;
    order.select_nth_unstable_by(mid, |&a, &b| {
        key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal)
    });

    let node_idx = nodes.len();
    nodes.push(KdNode {
        point_idx: order[mid],
        axis,
        left: None,
        right: None,
    });

    let (lower, rest) = order.split_at_mut(mid);
    let upper = &mut rest[1..];
    let left = build_level(points, lower, depth + 1, nodes);
    let right = build_level(points, upper, depth + 1, nodes);
    nodes[node_idx].left = left;
    nodes[node_idx].right = right;

    Some(node_idx)
}
