//! IBOUND-style boundary-condition arrays

use ndarray::{Array2, Array3, Axis};
use serde::{Deserialize, Serialize};

/// Integer codes used in a boundary-condition array.
///
/// Defaults follow the MODFLOW IBOUND convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskCodes {
    /// Active (variable-head) cell
    pub active: i32,
    /// Inactive (no-flow) cell
    pub inactive: i32,
    /// Fixed-value (constant-head) cell
    pub fixed: i32,
}

impl Default for MaskCodes {
    fn default() -> Self {
        Self {
            active: 1,
            inactive: 0,
            fixed: -1,
        }
    }
}

/// A 2D `(row, col)` or 3D `(layer, row, col)` boundary-condition array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryMask {
    TwoD(Array2<i32>),
    ThreeD(Array3<i32>),
}

impl BoundaryMask {
    /// 3D mask of shape `(nlay, nrow, ncol)` filled with `code`
    pub fn filled(nlay: usize, nrow: usize, ncol: usize, code: i32) -> Self {
        BoundaryMask::ThreeD(Array3::from_elem((nlay, nrow, ncol), code))
    }

    /// Number of layers (1 for a 2D mask)
    pub fn nlay(&self) -> usize {
        match self {
            BoundaryMask::TwoD(_) => 1,
            BoundaryMask::ThreeD(a) => a.len_of(Axis(0)),
        }
    }

    /// Row/column shape `(nrow, ncol)`
    pub fn plane_shape(&self) -> (usize, usize) {
        match self {
            BoundaryMask::TwoD(a) => a.dim(),
            BoundaryMask::ThreeD(a) => {
                let (_, r, c) = a.dim();
                (r, c)
            }
        }
    }

    pub fn is_layered(&self) -> bool {
        matches!(self, BoundaryMask::ThreeD(_))
    }

    /// Code at `(layer, row, col)`; a 2D mask only has layer 0.
    pub fn get(&self, layer: usize, row: usize, col: usize) -> Option<i32> {
        match self {
            BoundaryMask::TwoD(a) if layer == 0 => a.get((row, col)).copied(),
            BoundaryMask::TwoD(_) => None,
            BoundaryMask::ThreeD(a) => a.get((layer, row, col)).copied(),
        }
    }

    /// Set the code at `(layer, row, col)`. Returns `false` when out of bounds.
    pub fn set(&mut self, layer: usize, row: usize, col: usize, code: i32) -> bool {
        let cell = match self {
            BoundaryMask::TwoD(a) if layer == 0 => a.get_mut((row, col)),
            BoundaryMask::TwoD(_) => None,
            BoundaryMask::ThreeD(a) => a.get_mut((layer, row, col)),
        };
        match cell {
            Some(v) => {
                *v = code;
                true
            }
            None => false,
        }
    }

    /// Number of cells carrying `code`
    pub fn count(&self, code: i32) -> usize {
        match self {
            BoundaryMask::TwoD(a) => a.iter().filter(|&&v| v == code).count(),
            BoundaryMask::ThreeD(a) => a.iter().filter(|&&v| v == code).count(),
        }
    }

    /// Layered view of the mask; a 2D mask becomes a single layer
    pub fn to_layered(&self) -> Array3<i32> {
        match self {
            BoundaryMask::TwoD(a) => a.clone().insert_axis(Axis(0)),
            BoundaryMask::ThreeD(a) => a.clone(),
        }
    }
}

impl From<Array2<i32>> for BoundaryMask {
    fn from(a: Array2<i32>) -> Self {
        BoundaryMask::TwoD(a)
    }
}

impl From<Array3<i32>> for BoundaryMask {
    fn from(a: Array3<i32>) -> Self {
        BoundaryMask::ThreeD(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_d_access() {
        let mut mask = BoundaryMask::from(Array2::from_elem((3, 4), 1));
        assert_eq!(mask.nlay(), 1);
        assert_eq!(mask.plane_shape(), (3, 4));
        assert!(mask.set(0, 2, 3, -1));
        assert_eq!(mask.get(0, 2, 3), Some(-1));
        assert!(!mask.set(1, 0, 0, -1));
        assert_eq!(mask.get(1, 0, 0), None);
        assert_eq!(mask.count(1), 11);
    }

    #[test]
    fn test_three_d_access() {
        let mut mask = BoundaryMask::filled(2, 5, 5, 1);
        assert!(mask.is_layered());
        assert_eq!(mask.nlay(), 2);
        assert!(mask.set(1, 4, 4, 0));
        assert!(!mask.set(2, 0, 0, 0));
        assert_eq!(mask.count(0), 1);
        assert_eq!(mask.to_layered().dim(), (2, 5, 5));
    }

    #[test]
    fn test_default_codes() {
        let codes = MaskCodes::default();
        assert_eq!((codes.active, codes.inactive, codes.fixed), (1, 0, -1));
    }
}
