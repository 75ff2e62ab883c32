//! Formula representation, parsing, printing, and evaluation.

mod ast;
mod evaluator;
mod parser;
mod printer;

pub use ast::{
    anchor_at, A1Ref, Anchor, BinaryOp, CompareOp, Expr, RangeRef, RefMode, RefVisit, UnaryOp,
};
pub use evaluator::Evaluator;
pub use parser::{parse_formula, FormulaParseError};
pub use printer::format_formula;

use cellgrid_model::{CellKey, ColId, Position, RowId};

use crate::axis::AxisIndex;

/// Resolve an anchor to the position it currently denotes.
///
/// Returns `None` when the base cell's identifiers are retired or the
/// offset lands outside the live axis extents — the `#REF!` cases.
pub fn resolve_anchor_pos(
    anchor: &Anchor,
    rows: &AxisIndex<RowId>,
    cols: &AxisIndex<ColId>,
) -> Option<Position> {
    let base_row = rows.id_to_pos(anchor.base.row)?;
    let base_col = cols.id_to_pos(anchor.base.col)?;
    let row = base_row as i64 + anchor.d_row;
    let col = base_col as i64 + anchor.d_col;
    if row < 1 || col < 1 || row > rows.max_pos() as i64 || col > cols.max_pos() as i64 {
        return None;
    }
    Some(Position::new(row as u32, col as u32))
}

/// Resolve an anchor all the way to the identifiers at its address.
pub fn resolve_anchor_key(
    anchor: &Anchor,
    rows: &AxisIndex<RowId>,
    cols: &AxisIndex<ColId>,
) -> Option<CellKey> {
    let pos = resolve_anchor_pos(anchor, rows, cols)?;
    let row = rows.pos_to_id(pos.row)?;
    let col = cols.pos_to_id(pos.col)?;
    Some(CellKey::new(row, col))
}

/// A resolved rectangle, in current 1-based positions (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub top: u32,
    pub left: u32,
    pub bottom: u32,
    pub right: u32,
}

impl Rect {
    /// Identifier keys for every address in the rectangle, row-major.
    /// Bounded by the live axis extents by construction.
    pub fn cell_keys(&self, rows: &AxisIndex<RowId>, cols: &AxisIndex<ColId>) -> Vec<CellKey> {
        let rows_len = (self.bottom - self.top + 1) as usize;
        let cols_len = (self.right - self.left + 1) as usize;
        let mut keys = Vec::with_capacity(rows_len.saturating_mul(cols_len));
        for r in self.top..=self.bottom {
            let Some(row_id) = rows.pos_to_id(r) else {
                continue;
            };
            for c in self.left..=self.right {
                if let Some(col_id) = cols.pos_to_id(c) {
                    keys.push(CellKey::new(row_id, col_id));
                }
            }
        }
        keys
    }
}

/// Resolve a range to its rectangle. `None` if either anchor is dead or
/// the range has collapsed (start past end on either axis).
pub fn resolve_range_rect(
    range: &RangeRef<Anchor>,
    rows: &AxisIndex<RowId>,
    cols: &AxisIndex<ColId>,
) -> Option<Rect> {
    let start = resolve_anchor_pos(&range.start, rows, cols)?;
    let end = resolve_anchor_pos(&range.end, rows, cols)?;
    if start.row > end.row || start.col > end.col {
        return None;
    }
    Some(Rect {
        top: start.row,
        left: start.col,
        bottom: end.row,
        right: end.col,
    })
}
