//! Cell positions and rectangular areas.

use serde::{Deserialize, Serialize};

/// A 0-based cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellPos {
    pub row: usize,
    pub col: usize,
}

impl CellPos {
    #[inline]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl std::fmt::Display for CellPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", crate::address::to_address(self.row, self.col))
    }
}

/// A rectangle anchored at (row, col) spanning `row_count` x `col_count` cells.
///
/// Counts are always >= 1; an area never describes zero cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellArea {
    pub row: usize,
    pub col: usize,
    pub row_count: usize,
    pub col_count: usize,
}

impl CellArea {
    pub fn new(row: usize, col: usize, row_count: usize, col_count: usize) -> Self {
        Self {
            row,
            col,
            row_count: row_count.max(1),
            col_count: col_count.max(1),
        }
    }

    pub fn single(row: usize, col: usize) -> Self {
        Self::new(row, col, 1, 1)
    }

    /// Build from two inclusive corners in any order.
    pub fn from_corners(a: CellPos, b: CellPos) -> Self {
        let (r1, r2) = (a.row.min(b.row), a.row.max(b.row));
        let (c1, c2) = (a.col.min(b.col), a.col.max(b.col));
        Self::new(r1, c1, (r2 - r1).saturating_add(1), (c2 - c1).saturating_add(1))
    }

    pub fn start(&self) -> CellPos {
        CellPos::new(self.row, self.col)
    }

    /// Last row (inclusive). Saturates at `usize::MAX` for oversized areas.
    pub fn end_row(&self) -> usize {
        self.row.saturating_add(self.row_count.max(1) - 1)
    }

    /// Last column (inclusive). Saturates like `end_row`.
    pub fn end_col(&self) -> usize {
        self.col.saturating_add(self.col_count.max(1) - 1)
    }

    pub fn is_single_cell(&self) -> bool {
        self.row_count == 1 && self.col_count == 1
    }

    pub fn cell_count(&self) -> usize {
        self.row_count.saturating_mul(self.col_count)
    }

    pub fn contains(&self, pos: CellPos) -> bool {
        pos.row >= self.row && pos.row <= self.end_row() && pos.col >= self.col && pos.col <= self.end_col()
    }

    /// Smallest area covering both.
    pub fn union(&self, other: &CellArea) -> CellArea {
        CellArea::from_corners(
            CellPos::new(self.row.min(other.row), self.col.min(other.col)),
            CellPos::new(self.end_row().max(other.end_row()), self.end_col().max(other.end_col())),
        )
    }

    /// Iterate cells row-major.
    pub fn cells(&self) -> impl Iterator<Item = CellPos> + '_ {
        (self.row..=self.end_row())
            .flat_map(move |r| (self.col..=self.end_col()).map(move |c| CellPos::new(r, c)))
    }
}

impl std::fmt::Display for CellArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&crate::address::format_range(self))
    }
}
