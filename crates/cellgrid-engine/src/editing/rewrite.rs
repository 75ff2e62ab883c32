//! Formula rewriting for structural edits.
//!
//! A [`Splice`] describes a row/column insertion and/or deletion. Before
//! the axis index mutates, every formula AST is transformed here while
//! `id_to_pos` still reports pre-splice positions; transforming after the
//! mutation would double-apply the shift.
//!
//! Transformation is mode-independent: base and target positions both map
//! through the splice image, so a surviving anchor keeps resolving to the
//! identifiers it resolved to before (reference modes only matter for
//! display and copy re-anchoring). An anchor whose base or target falls
//! inside the deletion window is dead, which collapses the containing
//! formula to `#REF!`; a range whose corners cross after transformation
//! collapses the same way.

use cellgrid_model::{CellKey, ColId, Position, RowId};

use crate::axis::AxisIndex;
use crate::eval::{Anchor, Expr, RangeRef, RefMode};

/// The axis a splice operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Row,
    Col,
}

/// A structural edit: at `at_pos`, delete `del` positions and insert
/// `ins` fresh ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Splice {
    pub axis: Axis,
    pub at_pos: u32,
    pub ins: u32,
    pub del: u32,
}

impl Splice {
    /// Map a pre-splice position to its post-splice image. `None` means
    /// the position falls inside the deletion window.
    pub fn map_pos(&self, pos: u32) -> Option<u32> {
        if pos < self.at_pos {
            return Some(pos);
        }
        if pos < self.at_pos + self.del {
            return None;
        }
        Some(pos - self.del + self.ins)
    }

    fn map_pos_i64(&self, pos: i64) -> Option<i64> {
        // Positions below 1 denote already-unresolvable offsets; the
        // splice window cannot contain them, so they pass through.
        if pos < 1 {
            return Some(pos);
        }
        self.map_pos(pos as u32).map(i64::from)
    }
}

/// Transform a formula AST for `splice`, reading pre-splice positions
/// from the axes. `None` means the formula collapses to `#REF!`.
pub fn transform_expr(
    expr: &Expr<Anchor>,
    rows: &AxisIndex<RowId>,
    cols: &AxisIndex<ColId>,
    splice: &Splice,
) -> Option<Expr<Anchor>> {
    match expr {
        Expr::Number(n) => Some(Expr::Number(*n)),
        Expr::Error(e) => Some(Expr::Error(*e)),
        Expr::Ref(anchor) => {
            let (anchor, _) = transform_anchor(anchor, rows, cols, splice)?;
            Some(Expr::Ref(anchor))
        }
        Expr::Range(range) => {
            let (start, (start_row, start_col)) =
                transform_anchor(&range.start, rows, cols, splice)?;
            let (end, (end_row, end_col)) = transform_anchor(&range.end, rows, cols, splice)?;
            if start_row > end_row || start_col > end_col {
                return None;
            }
            Some(Expr::Range(RangeRef { start, end }))
        }
        Expr::Unary { op, expr } => Some(Expr::Unary {
            op: *op,
            expr: Box::new(transform_expr(expr, rows, cols, splice)?),
        }),
        Expr::Binary { op, left, right } => Some(Expr::Binary {
            op: *op,
            left: Box::new(transform_expr(left, rows, cols, splice)?),
            right: Box::new(transform_expr(right, rows, cols, splice)?),
        }),
        Expr::Compare { op, left, right } => Some(Expr::Compare {
            op: *op,
            left: Box::new(transform_expr(left, rows, cols, splice)?),
            right: Box::new(transform_expr(right, rows, cols, splice)?),
        }),
        Expr::FunctionCall { name, args } => {
            let mut out = Vec::with_capacity(args.len());
            for arg in args {
                out.push(transform_expr(arg, rows, cols, splice)?);
            }
            Some(Expr::FunctionCall {
                name: name.clone(),
                args: out,
            })
        }
    }
}

/// Transform one anchor, returning the rewritten anchor plus the
/// post-splice position its target will occupy (for range ordering
/// checks). `None` if the base or target dies.
fn transform_anchor(
    anchor: &Anchor,
    rows: &AxisIndex<RowId>,
    cols: &AxisIndex<ColId>,
    splice: &Splice,
) -> Option<(Anchor, (i64, i64))> {
    let base_row = rows.id_to_pos(anchor.base.row)? as i64;
    let base_col = cols.id_to_pos(anchor.base.col)? as i64;

    match splice.axis {
        Axis::Row => {
            let new_base = splice.map_pos_i64(base_row)?;
            let new_target = splice.map_pos_i64(base_row + anchor.d_row)?;
            let anchor = Anchor {
                d_row: new_target - new_base,
                ..*anchor
            };
            Some((anchor, (new_target, base_col + anchor.d_col)))
        }
        Axis::Col => {
            let new_base = splice.map_pos_i64(base_col)?;
            let new_target = splice.map_pos_i64(base_col + anchor.d_col)?;
            let anchor = Anchor {
                d_col: new_target - new_base,
                ..*anchor
            };
            Some((anchor, (base_row + anchor.d_row, new_target)))
        }
    }
}

/// Re-anchor a formula copied from `src_pos` to the cell `dst_key` at
/// `dst_pos`: relative offsets travel with the formula, absolute axes
/// stay pinned to the position they resolved to at the source.
pub fn reanchor_for_copy(
    expr: &Expr<Anchor>,
    src_pos: Position,
    dst_pos: Position,
    dst_key: CellKey,
) -> Expr<Anchor> {
    expr.map_refs(&mut |a| {
        let d_row = match a.row_mode {
            RefMode::Relative => a.d_row,
            RefMode::Absolute => src_pos.row as i64 + a.d_row - dst_pos.row as i64,
        };
        let d_col = match a.col_mode {
            RefMode::Relative => a.d_col,
            RefMode::Absolute => src_pos.col as i64 + a.d_col - dst_pos.col as i64,
        };
        Anchor {
            base: dst_key,
            row_mode: a.row_mode,
            col_mode: a.col_mode,
            d_row,
            d_col,
        }
    })
}
