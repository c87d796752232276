//! Cell identifiers in their many shapes
//!
//! Identifiers arrive as flat node numbers, `(row, col)` or
//! `(layer, row, col)` tuples, singleton-nested tuples, or records with named
//! fields. They are normalised once into [`CellId`] at ingestion.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use tracing::warn;

use aquigrid_core::StructuredGrid;

/// A cell identifier as it was handed over.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawCellId {
    /// Flat node number
    Node(i64),
    /// Tuple or list, possibly nested
    Sequence(Vec<RawCellId>),
    /// Record with named fields such as `{"k": 0, "i": 3, "j": 4}`
    Record(BTreeMap<String, i64>),
    /// Anything else
    Unrecognized(IgnoredAny),
}

impl From<i64> for RawCellId {
    fn from(node: i64) -> Self {
        RawCellId::Node(node)
    }
}

impl From<(i64, i64)> for RawCellId {
    fn from((row, col): (i64, i64)) -> Self {
        RawCellId::Sequence(vec![RawCellId::Node(row), RawCellId::Node(col)])
    }
}

impl From<(i64, i64, i64)> for RawCellId {
    fn from((layer, row, col): (i64, i64, i64)) -> Self {
        RawCellId::Sequence(vec![
            RawCellId::Node(layer),
            RawCellId::Node(row),
            RawCellId::Node(col),
        ])
    }
}

/// A normalised cell identifier. `layer` is `None` when the source had no
/// layer information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId {
    pub layer: Option<usize>,
    pub row: usize,
    pub col: usize,
}

impl CellId {
    pub fn new(row: usize, col: usize) -> Self {
        Self { layer: None, row, col }
    }

    pub fn with_layer(layer: usize, row: usize, col: usize) -> Self {
        Self {
            layer: Some(layer),
            row,
            col,
        }
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.layer {
            Some(l) => write!(f, "({}, {}, {})", l, self.row, self.col),
            None => write!(f, "({}, {})", self.row, self.col),
        }
    }
}

/// Identifiers that could be parsed, and how many could not
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedCellIds {
    pub cells: Vec<CellId>,
    pub unrecognized: usize,
}

fn index(raw: &RawCellId) -> Option<usize> {
    match raw {
        RawCellId::Node(v) => usize::try_from(*v).ok(),
        RawCellId::Sequence(items) if items.len() == 1 => index(&items[0]),
        _ => None,
    }
}

fn field(record: &BTreeMap<String, i64>, names: &[&str]) -> Option<Option<usize>> {
    let value = record
        .iter()
        .find(|(k, _)| names.iter().any(|n| k.eq_ignore_ascii_case(n)))
        .map(|(_, v)| *v);
    match value {
        None => Some(None),
        Some(v) => usize::try_from(v).ok().map(Some),
    }
}

fn normalise(raw: &RawCellId, grid: &StructuredGrid) -> Option<CellId> {
    match raw {
        RawCellId::Node(node) => {
            let node = usize::try_from(*node).ok()?;
            let (layer, row, col) = grid.node_to_lrc(node)?;
            Some(CellId::with_layer(layer, row, col))
        }
        RawCellId::Sequence(items) => match items.as_slice() {
            [single] => normalise(single, grid),
            [row, col] => Some(CellId::new(index(row)?, index(col)?)),
            [layer, row, col] => Some(CellId::with_layer(index(layer)?, index(row)?, index(col)?)),
            _ => None,
        },
        RawCellId::Record(record) => {
            let layer = field(record, &["k", "layer", "lay"])?;
            let row = field(record, &["i", "row"])??;
            let col = field(record, &["j", "col", "column"])??;
            Some(CellId { layer, row, col })
        }
        RawCellId::Unrecognized(_) => None,
    }
}

/// Normalise one identifier.
///
/// Node numbers are converted with the grid's node numbering. Unrecognised
/// shapes and negative indices yield `None` and are logged.
pub fn parse_cell_identifier(raw: &RawCellId, grid: &StructuredGrid) -> Option<CellId> {
    let parsed = normalise(raw, grid);
    if parsed.is_none() {
        warn!(raw = ?raw, "unrecognised cell identifier");
    }
    parsed
}

/// Normalise a batch of identifiers, counting the ones that fail.
pub fn parse_cell_identifiers<'a, I>(raw: I, grid: &StructuredGrid) -> ParsedCellIds
where
    I: IntoIterator<Item = &'a RawCellId>,
{
    let mut parsed = ParsedCellIds::default();
    for id in raw {
        match parse_cell_identifier(id, grid) {
            Some(cell) => parsed.cells.push(cell),
            None => parsed.unrecognized += 1,
        }
    }
    if parsed.unrecognized > 0 {
        warn!(
            unrecognized = parsed.unrecognized,
            parsed = parsed.cells.len(),
            "some cell identifiers were skipped"
        );
    }
    parsed
}
