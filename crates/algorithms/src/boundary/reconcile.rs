//! Applying resolved boundary cells to a boundary-condition array

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use aquigrid_core::{BoundaryMask, MaskCodes, StructuredGrid};

use super::cellid::CellId;

/// Outcome counts of a reconciliation.
///
/// `attempted`, `out_of_grid` and `out_of_mask` count identifiers;
/// `modified` and `not_active` count `(layer, row, col)` cells, so a layerless
/// identifier on a 3D mask may contribute once per layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub attempted: usize,
    pub modified: usize,
    pub out_of_grid: usize,
    pub out_of_mask: usize,
    pub not_active: usize,
}

impl ReconcileStats {
    /// Nothing changed even though identifiers were supplied
    pub fn is_noop(&self) -> bool {
        self.attempted > 0 && self.modified == 0
    }
}

/// Mark `cells` as fixed in a copy of `mask`.
///
/// Each identifier is bounds-checked against the grid and, separately,
/// against the mask's own shape, since the two can disagree. Only cells
/// holding `codes.active` are changed, to `codes.fixed`; inactive and fixed
/// cells are left alone, which makes the operation idempotent. Identifiers
/// without a layer apply to every layer of the mask.
pub fn reconcile_with_mask(
    cells: &[CellId],
    mask: &BoundaryMask,
    grid: &StructuredGrid,
    codes: &MaskCodes,
) -> (BoundaryMask, ReconcileStats) {
    let mut out = mask.clone();
    let mut stats = ReconcileStats::default();
    let (mask_rows, mask_cols) = mask.plane_shape();
    let mask_layers = mask.nlay();

    for cell in cells {
        stats.attempted += 1;

        let in_grid = grid.contains_cell(cell.row, cell.col)
            && cell.layer.map_or(true, |l| l < grid.nlay());
        if !in_grid {
            stats.out_of_grid += 1;
            continue;
        }
        let in_mask = cell.row < mask_rows
            && cell.col < mask_cols
            && cell.layer.map_or(true, |l| l < mask_layers);
        if !in_mask {
            stats.out_of_mask += 1;
            continue;
        }

        let layers = match cell.layer {
            Some(l) => l..l + 1,
            None => 0..mask_layers,
        };
        for layer in layers {
            if out.get(layer, cell.row, cell.col) == Some(codes.active) {
                out.set(layer, cell.row, cell.col, codes.fixed);
                stats.modified += 1;
            } else {
                stats.not_active += 1;
            }
        }
    }

    if stats.out_of_grid + stats.out_of_mask > 0 {
        warn!(
            out_of_grid = stats.out_of_grid,
            out_of_mask = stats.out_of_mask,
            grid_shape = ?(grid.nlay(), grid.nrow(), grid.ncol()),
            mask_shape = ?(mask_layers, mask_rows, mask_cols),
            "cell identifiers outside the grid or mask were skipped"
        );
    }
    if stats.is_noop() {
        warn!(attempted = stats.attempted, "reconciliation modified no cells");
    }
    debug!(?stats, "reconciled boundary cells with mask");
    (out, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn grid(nlay: usize) -> StructuredGrid {
        StructuredGrid::uniform(nlay, 5, 5, 1.0, 0.0, 0.0).unwrap()
    }

    #[test]
    fn test_layerless_ids_hit_every_layer() {
        let codes = MaskCodes::default();
        let mask = BoundaryMask::filled(2, 5, 5, codes.active);
        let (out, stats) = reconcile_with_mask(&[CellId::new(2, 3)], &mask, &grid(2), &codes);
        assert_eq!(out.get(0, 2, 3), Some(codes.fixed));
        assert_eq!(out.get(1, 2, 3), Some(codes.fixed));
        assert_eq!(stats.attempted, 1);
        assert_eq!(stats.modified, 2);
        assert_eq!(out.count(codes.fixed), 2);
    }

    #[test]
    fn test_only_active_cells_change() {
        let codes = MaskCodes::default();
        let mut plane = Array2::from_elem((5, 5), codes.active);
        plane[[0, 0]] = codes.inactive;
        plane[[0, 1]] = codes.fixed;
        let mask = BoundaryMask::TwoD(plane);
        let cells = [CellId::new(0, 0), CellId::new(0, 1), CellId::new(0, 2)];
        let (out, stats) = reconcile_with_mask(&cells, &mask, &grid(1), &codes);
        assert_eq!(out.get(0, 0, 0), Some(codes.inactive));
        assert_eq!(out.get(0, 0, 1), Some(codes.fixed));
        assert_eq!(out.get(0, 0, 2), Some(codes.fixed));
        assert_eq!(stats.modified, 1);
        assert_eq!(stats.not_active, 2);
    }

    #[test]
    fn test_idempotent() {
        let codes = MaskCodes::default();
        let mask = BoundaryMask::filled(2, 5, 5, codes.active);
        let cells = [CellId::new(1, 1), CellId::with_layer(1, 4, 4), CellId::new(0, 4)];
        let (once, first) = reconcile_with_mask(&cells, &mask, &grid(2), &codes);
        let (twice, second) = reconcile_with_mask(&cells, &once, &grid(2), &codes);
        assert_eq!(once, twice);
        assert_eq!(first.modified, 5);
        assert_eq!(second.modified, 0);
        assert!(second.is_noop());
    }

    #[test]
    fn test_input_mask_untouched() {
        let codes = MaskCodes::default();
        let mask = BoundaryMask::filled(1, 5, 5, codes.active);
        let _ = reconcile_with_mask(&[CellId::new(0, 0)], &mask, &grid(1), &codes);
        assert_eq!(mask.count(codes.active), 25);
    }

    #[test]
    fn test_grid_and_mask_shapes_disagree() {
        let codes = MaskCodes::default();
        // Grid reports 5 x 5 but the mask is only 3 x 5
        let mask = BoundaryMask::TwoD(Array2::from_elem((3, 5), codes.active));
        let cells = [
            CellId::new(4, 0),
            CellId::new(7, 0),
            CellId::new(2, 0),
            CellId::with_layer(1, 0, 0),
        ];
        let (out, stats) = reconcile_with_mask(&cells, &mask, &grid(2), &codes);
        assert_eq!(stats.attempted, 4);
        assert_eq!(stats.out_of_mask, 2);
        assert_eq!(stats.out_of_grid, 1);
        assert_eq!(stats.modified, 1);
        assert_eq!(out.get(0, 2, 0), Some(codes.fixed));
    }

    #[test]
    fn test_custom_codes() {
        let codes = MaskCodes { active: 2, inactive: 9, fixed: 7 };
        let mask = BoundaryMask::filled(1, 5, 5, 2);
        let (out, _) = reconcile_with_mask(&[CellId::new(3, 3)], &mask, &grid(1), &codes);
        assert_eq!(out.get(0, 3, 3), Some(7));
    }
}
