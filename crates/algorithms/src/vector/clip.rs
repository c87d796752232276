//! Clipping operations
//!
//! Rectangle clipping (Cohen-Sutherland for lines, Sutherland-Hodgman for
//! polygon rings) and clipping of rings by an arbitrary convex polygon, which
//! is what area fractions of grid cells need.

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPolygon, Polygon};

use aquigrid_core::grid::Extent;

/// A clipping rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl ClipRect {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    fn contains(&self, c: Coord<f64>) -> bool {
        c.x >= self.min_x && c.x <= self.max_x && c.y >= self.min_y && c.y <= self.max_y
    }

    /// Rectangle as a counter-clockwise ring (not closed)
    fn ring(&self) -> [Coord<f64>; 4] {
        [
            Coord { x: self.min_x, y: self.min_y },
            Coord { x: self.max_x, y: self.min_y },
            Coord { x: self.max_x, y: self.max_y },
            Coord { x: self.min_x, y: self.max_y },
        ]
    }
}

impl From<Extent> for ClipRect {
    fn from(e: Extent) -> Self {
        Self::new(e.xmin, e.ymin, e.xmax, e.ymax)
    }
}

/// Cohen-Sutherland region codes
const INSIDE: u8 = 0b0000;
const LEFT: u8 = 0b0001;
const RIGHT: u8 = 0b0010;
const BOTTOM: u8 = 0b0100;
const TOP: u8 = 0b1000;

fn outcode(p: Coord<f64>, rect: &ClipRect) -> u8 {
    let mut code = INSIDE;
    if p.x < rect.min_x {
        code |= LEFT;
    }
    if p.x > rect.max_x {
        code |= RIGHT;
    }
    if p.y < rect.min_y {
        code |= BOTTOM;
    }
    if p.y > rect.max_y {
        code |= TOP;
    }
    code
}

fn clip_segment(
    mut p0: Coord<f64>,
    mut p1: Coord<f64>,
    rect: &ClipRect,
) -> Option<(Coord<f64>, Coord<f64>)> {
    let mut code0 = outcode(p0, rect);
    let mut code1 = outcode(p1, rect);

    loop {
        if (code0 | code1) == INSIDE {
            return Some((p0, p1));
        }
        if (code0 & code1) != 0 {
            return None;
        }

        let code_out = if code0 != 0 { code0 } else { code1 };
        let (dx, dy) = (p1.x - p0.x, p1.y - p0.y);
        let clipped = if code_out & TOP != 0 {
            Coord { x: p0.x + (rect.max_y - p0.y) / dy * dx, y: rect.max_y }
        } else if code_out & BOTTOM != 0 {
            Coord { x: p0.x + (rect.min_y - p0.y) / dy * dx, y: rect.min_y }
        } else if code_out & RIGHT != 0 {
            Coord { x: rect.max_x, y: p0.y + (rect.max_x - p0.x) / dx * dy }
        } else {
            Coord { x: rect.min_x, y: p0.y + (rect.min_x - p0.x) / dx * dy }
        };

        if code_out == code0 {
            p0 = clipped;
            code0 = outcode(p0, rect);
        } else {
            p1 = clipped;
            code1 = outcode(p1, rect);
        }
    }
}

/// Pieces of a line inside `rect`; a line leaving and re-entering yields
/// several pieces.
pub fn clip_line(line: &LineString<f64>, rect: &ClipRect) -> Vec<LineString<f64>> {
    let mut pieces = Vec::new();
    let mut current: Vec<Coord<f64>> = Vec::new();

    for w in line.0.windows(2) {
        match clip_segment(w[0], w[1], rect) {
            Some((a, b)) => {
                if current.last() != Some(&a) {
                    if current.len() >= 2 {
                        pieces.push(LineString::new(std::mem::take(&mut current)));
                    }
                    current.clear();
                    current.push(a);
                }
                current.push(b);
            }
            None => {
                if current.len() >= 2 {
                    pieces.push(LineString::new(std::mem::take(&mut current)));
                }
                current.clear();
            }
        }
    }
    if current.len() >= 2 {
        pieces.push(LineString::new(current));
    }
    pieces
}

/// Open ring (closing vertex dropped)
fn open_ring(ring: &LineString<f64>) -> Vec<Coord<f64>> {
    let mut v = ring.0.clone();
    if v.len() > 1 && v.first() == v.last() {
        v.pop();
    }
    v
}

fn close_ring(mut v: Vec<Coord<f64>>) -> LineString<f64> {
    if let Some(&first) = v.first() {
        v.push(first);
    }
    LineString::new(v)
}

/// `(b - a) × (p - a)`
#[inline]
fn cross(a: Coord<f64>, b: Coord<f64>, p: Coord<f64>) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Intersection of segment `p`-`q` with the infinite line through `a`-`b`
fn line_intersection(p: Coord<f64>, q: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> Coord<f64> {
    let dp = cross(a, b, p);
    let dq = cross(a, b, q);
    let t = dp / (dp - dq);
    Coord {
        x: p.x + t * (q.x - p.x),
        y: p.y + t * (q.y - p.y),
    }
}

/// Sutherland-Hodgman: clip an open ring by a convex, counter-clockwise
/// open ring. The subject may be concave; the area of the result is exact.
pub fn clip_ring_convex(subject: &[Coord<f64>], clip: &[Coord<f64>]) -> Vec<Coord<f64>> {
    let mut output = subject.to_vec();
    for i in 0..clip.len() {
        if output.is_empty() {
            break;
        }
        let (a, b) = (clip[i], clip[(i + 1) % clip.len()]);
        let input = std::mem::take(&mut output);
        for j in 0..input.len() {
            let current = input[j];
            let next = input[(j + 1) % input.len()];
            let current_in = cross(a, b, current) >= 0.0;
            let next_in = cross(a, b, next) >= 0.0;
            match (current_in, next_in) {
                (true, true) => output.push(next),
                (true, false) => output.push(line_intersection(current, next, a, b)),
                (false, true) => {
                    output.push(line_intersection(current, next, a, b));
                    output.push(next);
                }
                (false, false) => {}
            }
        }
    }
    output
}

/// Signed shoelace area of an open or closed ring (CCW positive)
pub fn ring_area(ring: &[Coord<f64>]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let n = ring.len();
    0.5 * (0..n)
        .map(|i| {
            let (p, q) = (ring[i], ring[(i + 1) % n]);
            p.x * q.y - q.x * p.y
        })
        .sum::<f64>()
}

/// Counter-clockwise open ring of a convex polygon's exterior
pub fn convex_ring(poly: &Polygon<f64>) -> Vec<Coord<f64>> {
    let mut ring = open_ring(poly.exterior());
    if ring_area(&ring) < 0.0 {
        ring.reverse();
    }
    ring
}

/// Area of `poly` (holes subtracted) inside the convex, CCW `clip` ring.
pub fn area_within_convex(poly: &Polygon<f64>, clip: &[Coord<f64>]) -> f64 {
    let exterior = ring_area(&clip_ring_convex(&open_ring(poly.exterior()), clip)).abs();
    let holes: f64 = poly
        .interiors()
        .iter()
        .map(|h| ring_area(&clip_ring_convex(&open_ring(h), clip)).abs())
        .sum();
    (exterior - holes).max(0.0)
}

fn clip_polygon(poly: &Polygon<f64>, rect: &ClipRect) -> Option<Polygon<f64>> {
    let ring = rect.ring();
    let exterior = clip_ring_convex(&open_ring(poly.exterior()), &ring);
    if exterior.len() < 3 {
        return None;
    }
    let interiors = poly
        .interiors()
        .iter()
        .map(|h| clip_ring_convex(&open_ring(h), &ring))
        .filter(|h| h.len() >= 3)
        .map(close_ring)
        .collect();
    Some(Polygon::new(close_ring(exterior), interiors))
}

/// Clip a geometry by a rectangular extent.
///
/// # Returns
/// Clipped geometry, or `None` if nothing remains inside.
pub fn clip_by_rect(geom: &Geometry<f64>, rect: ClipRect) -> Option<Geometry<f64>> {
    match geom {
        Geometry::Point(p) => rect.contains(p.0).then(|| geom.clone()),
        Geometry::LineString(ls) => lines_geometry(clip_line(ls, &rect)),
        Geometry::MultiLineString(mls) => {
            lines_geometry(mls.0.iter().flat_map(|ls| clip_line(ls, &rect)).collect())
        }
        Geometry::Polygon(poly) => clip_polygon(poly, &rect).map(Geometry::Polygon),
        Geometry::MultiPolygon(mp) => {
            let parts: Vec<Polygon<f64>> =
                mp.0.iter().filter_map(|p| clip_polygon(p, &rect)).collect();
            (!parts.is_empty()).then(|| Geometry::MultiPolygon(MultiPolygon::new(parts)))
        }
        Geometry::GeometryCollection(gc) => {
            let parts: Vec<Geometry<f64>> =
                gc.0.iter().filter_map(|g| clip_by_rect(g, rect)).collect();
            (!parts.is_empty())
                .then(|| Geometry::GeometryCollection(geo::GeometryCollection(parts)))
        }
        other => Some(other.clone()),
    }
}

fn lines_geometry(mut pieces: Vec<LineString<f64>>) -> Option<Geometry<f64>> {
    match pieces.len() {
        0 => None,
        1 => pieces.pop().map(Geometry::LineString),
        _ => Some(Geometry::MultiLineString(MultiLineString::new(pieces))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::Point;

    fn unit_rect() -> ClipRect {
        ClipRect::new(0.0, 0.0, 10.0, 10.0)
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
            vec![],
        )
    }

    #[test]
    fn test_clip_point() {
        assert!(clip_by_rect(&Geometry::Point(Point::new(5.0, 5.0)), unit_rect()).is_some());
        assert!(clip_by_rect(&Geometry::Point(Point::new(15.0, 5.0)), unit_rect()).is_none());
    }

    #[test]
    fn test_clip_line_partial() {
        let line = LineString::from(vec![(-5.0, 5.0), (15.0, 5.0)]);
        let pieces = clip_line(&line, &unit_rect());
        assert_eq!(pieces.len(), 1);
        assert_relative_eq!(pieces[0].0[0].x, 0.0);
        assert_relative_eq!(pieces[0].0[1].x, 10.0);
    }

    #[test]
    fn test_clip_line_reentering_splits() {
        // Leaves through the top and comes back in
        let line = LineString::from(vec![(1.0, 5.0), (3.0, 15.0), (5.0, 5.0), (7.0, 5.0)]);
        match clip_by_rect(&Geometry::LineString(line), unit_rect()) {
            Some(Geometry::MultiLineString(mls)) => assert_eq!(mls.0.len(), 2),
            other => panic!("expected two pieces, got {other:?}"),
        }
    }

    #[test]
    fn test_clip_line_fully_outside() {
        let line = Geometry::LineString(LineString::from(vec![(20.0, 20.0), (30.0, 30.0)]));
        assert!(clip_by_rect(&line, unit_rect()).is_none());
    }

    #[test]
    fn test_clip_polygon_partial() {
        let poly = Geometry::Polygon(square(-5.0, -5.0, 5.0, 5.0));
        let Some(Geometry::Polygon(clipped)) = clip_by_rect(&poly, unit_rect()) else {
            panic!("expected polygon");
        };
        assert_relative_eq!(ring_area(&open_ring(clipped.exterior())).abs(), 25.0, epsilon = 1e-9);
    }

    #[test]
    fn test_clip_polygon_fully_outside() {
        let poly = Geometry::Polygon(square(20.0, 20.0, 30.0, 30.0));
        assert!(clip_by_rect(&poly, unit_rect()).is_none());
    }

    #[test]
    fn test_ring_area_orientation() {
        let ccw = open_ring(square(0.0, 0.0, 2.0, 3.0).exterior());
        assert_relative_eq!(ring_area(&ccw), 6.0);
        let mut cw = ccw.clone();
        cw.reverse();
        assert_relative_eq!(ring_area(&cw), -6.0);
    }

    #[test]
    fn test_area_within_convex_with_hole() {
        let clip = convex_ring(&square(0.0, 0.0, 10.0, 10.0));
        let hole =
            LineString::from(vec![(6.0, 2.0), (8.0, 2.0), (8.0, 4.0), (6.0, 4.0), (6.0, 2.0)]);
        let poly = Polygon::new(square(5.0, 0.0, 15.0, 10.0).exterior().clone(), vec![hole]);
        assert_relative_eq!(area_within_convex(&poly, &clip), 50.0 - 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_concave_subject() {
        // L-shape, 3 units² of which 2 fall in the clip square
        let l = Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (2.0, 0.0),
                (2.0, 1.0),
                (1.0, 1.0),
                (1.0, 2.0),
                (0.0, 2.0),
                (0.0, 0.0),
            ]),
            vec![],
        );
        let clip = convex_ring(&square(0.0, 0.0, 2.0, 1.0));
        assert_relative_eq!(area_within_convex(&l, &clip), 2.0, epsilon = 1e-12);
        let clip = convex_ring(&square(0.5, 0.5, 1.5, 1.5));
        assert_relative_eq!(area_within_convex(&l, &clip), 0.75, epsilon = 1e-12);
    }
}
