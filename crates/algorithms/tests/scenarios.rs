//! End-to-end scenarios on small synthetic grids.
//!
//! Each test builds its grid and features in memory; no fixtures are needed.

use approx::assert_relative_eq;
use geo::{LineString, Polygon};
use ndarray::Array2;

use aquigrid_algorithms::boundary::{
    compute_active_mask, intersect, parse_cell_identifiers, reconcile_with_mask, CellId,
    IntersectParams, IntersectionStatus, RawCellId,
};
use aquigrid_algorithms::interpolation::{
    apply_physical_constraints, densify_contours, interpolate, sample_points_from_lines,
    DensifyParams, InterpolationMethod, InterpolationParams, Observation, PhysicalBounds,
    PhysicalConstraintParams, SamplingParams, ScatterObservations,
};
use aquigrid_core::vector::{Feature, FeatureCollection};
use aquigrid_core::{BoundaryMask, MaskCodes, StructuredGrid};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// 10 x 10 grid with cell centers at integer coordinates 0..9
fn unit_grid() -> StructuredGrid {
    StructuredGrid::uniform(1, 10, 10, 1.0, -0.5, -0.5).unwrap()
}

fn contour(x0: f64, x1: f64, y: f64, value: f64) -> Feature {
    Feature::new(LineString::from(vec![(x0, y), (x1, y)])).with_property("ELEV", value)
}

fn spacing(s: f64) -> SamplingParams {
    SamplingParams { spacing: s, ..Default::default() }
}

#[test]
fn linear_covers_every_cell_after_fallback() {
    init_tracing();
    let grid = unit_grid();
    // Hull covers only part of the grid; gaps must be back-filled
    let obs = ScatterObservations::from_points(vec![
        Observation::new(2.0, 2.0, 5.0),
        Observation::new(7.0, 2.5, 6.0),
        Observation::new(4.0, 8.0, 9.0),
    ]);
    let field = interpolate(
        &obs,
        &grid,
        InterpolationMethod::Linear,
        &InterpolationParams::default(),
    )
    .unwrap();
    assert!(field.values.iter().all(|v| v.is_finite()));
    assert!(field.quality.nearest_filled > 0);
    assert_eq!(field.quality.median_filled, 0);
    assert!(!field.quality.degraded);
}

#[test]
fn two_parallel_contours() {
    init_tracing();
    let grid = unit_grid();
    let fc: FeatureCollection = vec![contour(0.0, 9.0, 2.0, 10.0), contour(0.0, 9.0, 7.0, 20.0)]
        .into_iter()
        .collect();
    let obs = sample_points_from_lines(&fc, "ELEV", &spacing(1.0)).unwrap();
    let field = interpolate(
        &obs,
        &grid,
        InterpolationMethod::Linear,
        &InterpolationParams::default(),
    )
    .unwrap();

    for r in 0..10 {
        for c in 0..10 {
            let y = grid.ycellcenters()[[r, c]];
            if (2.0..=7.0).contains(&y) {
                let expected = 10.0 + (y - 2.0) / 5.0 * 10.0;
                assert!((field.values[[r, c]] - expected).abs() <= 0.5, "y = {y}");
            }
        }
    }

    // The value at y = 4.5 itself, between rows
    let params = DensifyParams { resolution: 50, spacing: 1.0, ..Default::default() };
    let dense = densify_contours(&obs, 5.0, &params).unwrap();
    let at_mid: Vec<f64> =
        dense.iter().filter(|p| (p.y - 4.5).abs() < 0.2).map(|p| p.value).collect();
    assert!(!at_mid.is_empty());
    assert!(at_mid.iter().all(|v| (v - 15.0).abs() <= 0.5));
}

#[test]
fn constant_line_round_trip() {
    let grid = unit_grid();
    let fc: FeatureCollection = vec![contour(1.0, 8.0, 4.0, 42.5)].into_iter().collect();
    let obs = sample_points_from_lines(&fc, "ELEV", &spacing(0.5)).unwrap();
    // Collinear samples: the linear kernel has no triangles, nearest carries the value
    let field = interpolate(
        &obs,
        &grid,
        InterpolationMethod::Linear,
        &InterpolationParams::default(),
    )
    .unwrap();
    for r in 0..10 {
        for c in 0..10 {
            let (x, y) = (grid.xcellcenters()[[r, c]], grid.ycellcenters()[[r, c]]);
            if (1.0..=8.0).contains(&x) && (y - 4.0).abs() <= 1.0 {
                assert_relative_eq!(field.values[[r, c]], 42.5, epsilon = 1e-9);
            }
        }
    }
}

#[test]
fn physical_constraints_bound_any_field() {
    let obs = ScatterObservations::from_points(vec![
        Observation::new(0.0, 0.0, 4.0),
        Observation::new(5.0, 0.0, 12.0),
        Observation::new(0.0, 5.0, 30.0),
    ]);
    let params = PhysicalConstraintParams::default();
    let bounds = PhysicalBounds::from_observations(&obs, &params).unwrap();
    let wild = Array2::from_shape_fn((12, 9), |(r, c)| match (r * 9 + c) % 5 {
        0 => f64::NAN,
        1 => -1e6,
        2 => 1e6,
        3 => f64::INFINITY,
        _ => (r * c) as f64,
    });
    let out = apply_physical_constraints(&wild, &obs, &params).unwrap();
    assert!(out.iter().all(|&v| v >= bounds.floor && v <= bounds.ceiling));
}

#[test]
fn boundary_outside_grid_reports_no_intersection() {
    init_tracing();
    let fc: FeatureCollection = vec![contour(100.0, 120.0, 100.0, 0.0)].into_iter().collect();
    let hit = intersect(&fc, &unit_grid(), &IntersectParams::default()).unwrap();
    assert_eq!(hit.status, IntersectionStatus::NoIntersection);
    assert!(hit.cells.is_empty());
}

#[test]
fn layerless_ids_on_layered_mask() {
    let grid = StructuredGrid::uniform(2, 5, 5, 1.0, 0.0, 0.0).unwrap();
    let codes = MaskCodes::default();
    let mask = BoundaryMask::filled(2, 5, 5, codes.active);
    let raw: Vec<RawCellId> = serde_json::from_str("[[1, 3], [[4, 0]]]").unwrap();
    let parsed = parse_cell_identifiers(&raw, &grid);
    assert_eq!(parsed.unrecognized, 0);

    let (out, stats) = reconcile_with_mask(&parsed.cells, &mask, &grid, &codes);
    for layer in 0..2 {
        assert_eq!(out.get(layer, 1, 3), Some(codes.fixed));
        assert_eq!(out.get(layer, 4, 0), Some(codes.fixed));
    }
    assert_eq!(stats.modified, 4);
}

#[test]
fn reconciliation_is_idempotent_and_one_way() {
    let grid = StructuredGrid::uniform(1, 5, 5, 1.0, 0.0, 0.0).unwrap();
    let codes = MaskCodes::default();
    let plane = Array2::from_shape_fn((5, 5), |(r, c)| match (r + c) % 3 {
        0 => codes.active,
        1 => codes.inactive,
        _ => codes.fixed,
    });
    let mask = BoundaryMask::TwoD(plane.clone());
    let cells: Vec<CellId> = (0..5).flat_map(|r| (0..5).map(move |c| CellId::new(r, c))).collect();

    let (once, _) = reconcile_with_mask(&cells, &mask, &grid, &codes);
    let (twice, _) = reconcile_with_mask(&cells, &once, &grid, &codes);
    assert_eq!(once, twice);
    for r in 0..5 {
        for c in 0..5 {
            if plane[[r, c]] != codes.active {
                assert_eq!(once.get(0, r, c), Some(plane[[r, c]]));
            }
        }
    }
}

#[test]
fn area_fraction_threshold() {
    // Three 10 x 10 cells in a row
    let grid = StructuredGrid::uniform(1, 1, 3, 10.0, 0.0, 0.0).unwrap();
    let rect = |x0: f64, x1: f64| {
        Polygon::new(
            LineString::from(vec![(x0, 0.0), (x1, 0.0), (x1, 10.0), (x0, 10.0), (x0, 0.0)]),
            vec![],
        )
    };
    // Cell 0 fully covered, cell 1 at 30 %, cell 2 at exactly 50 %
    let fc: FeatureCollection = vec![Feature::new(rect(-1.0, 13.0)), Feature::new(rect(20.0, 25.0))]
        .into_iter()
        .collect();
    let active = compute_active_mask(&grid, &fc, 0.5).unwrap();
    assert_eq!(active.row(0).to_vec(), vec![true, false, true]);
}
