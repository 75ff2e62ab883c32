//! Canonical formula text from an anchored AST.
//!
//! Anchors are resolved against the current axis state, so the printed
//! text always names what the reference means *now*: a formula entered
//! as `=A1` prints as `=A2` after a row is inserted above its target.
//! Unresolvable anchors (dead base, out-of-range target) print as the
//! `#REF!` literal, which parses back to an error leaf.

use cellgrid_model::{col_to_letters, format_number, ColId, RowId};

use super::ast::{Anchor, BinaryOp, CompareOp, Expr, RangeRef, RefMode, UnaryOp};
use super::resolve_anchor_pos;
use crate::axis::AxisIndex;

/// Render an anchored AST as canonical formula text (without the leading
/// `=`).
pub fn format_formula(
    expr: &Expr<Anchor>,
    rows: &AxisIndex<RowId>,
    cols: &AxisIndex<ColId>,
) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, rows, cols);
    out
}

const PREC_COMPARE: u8 = 1;
const PREC_ADD: u8 = 2;
const PREC_MUL: u8 = 3;
const PREC_POW: u8 = 4;
const PREC_UNARY: u8 = 5;
const PREC_ATOM: u8 = 6;

fn precedence(expr: &Expr<Anchor>) -> u8 {
    match expr {
        Expr::Compare { .. } => PREC_COMPARE,
        Expr::Binary { op, .. } => match op {
            BinaryOp::Add | BinaryOp::Sub => PREC_ADD,
            BinaryOp::Mul | BinaryOp::Div => PREC_MUL,
            BinaryOp::Pow => PREC_POW,
        },
        Expr::Unary { .. } => PREC_UNARY,
        _ => PREC_ATOM,
    }
}

fn write_expr(out: &mut String, expr: &Expr<Anchor>, rows: &AxisIndex<RowId>, cols: &AxisIndex<ColId>) {
    match expr {
        Expr::Number(n) => out.push_str(&format_number(*n)),
        Expr::Error(e) => out.push_str(e.as_code()),
        Expr::Ref(anchor) => write_anchor(out, anchor, rows, cols),
        Expr::Range(range) => write_range(out, range, rows, cols),
        Expr::Unary { op, expr: inner } => {
            out.push(match op {
                UnaryOp::Plus => '+',
                UnaryOp::Minus => '-',
            });
            write_child(out, inner, PREC_UNARY, rows, cols);
        }
        Expr::Binary { op, left, right } => {
            let prec = precedence(expr);
            write_child(out, left, prec, rows, cols);
            out.push(match op {
                BinaryOp::Add => '+',
                BinaryOp::Sub => '-',
                BinaryOp::Mul => '*',
                BinaryOp::Div => '/',
                BinaryOp::Pow => '^',
            });
            // Left-associative: equal-precedence right operands keep their
            // parentheses.
            write_child_strict(out, right, prec, rows, cols);
        }
        Expr::Compare { op, left, right } => {
            write_child(out, left, PREC_COMPARE, rows, cols);
            out.push_str(match op {
                CompareOp::Eq => "=",
                CompareOp::Ne => "<>",
                CompareOp::Lt => "<",
                CompareOp::Le => "<=",
                CompareOp::Gt => ">",
                CompareOp::Ge => ">=",
            });
            write_child_strict(out, right, PREC_COMPARE, rows, cols);
        }
        Expr::FunctionCall { name, args } => {
            out.push_str(name);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_expr(out, arg, rows, cols);
            }
            out.push(')');
        }
    }
}

fn write_child(
    out: &mut String,
    child: &Expr<Anchor>,
    parent_prec: u8,
    rows: &AxisIndex<RowId>,
    cols: &AxisIndex<ColId>,
) {
    if precedence(child) < parent_prec {
        out.push('(');
        write_expr(out, child, rows, cols);
        out.push(')');
    } else {
        write_expr(out, child, rows, cols);
    }
}

fn write_child_strict(
    out: &mut String,
    child: &Expr<Anchor>,
    parent_prec: u8,
    rows: &AxisIndex<RowId>,
    cols: &AxisIndex<ColId>,
) {
    if precedence(child) <= parent_prec {
        out.push('(');
        write_expr(out, child, rows, cols);
        out.push(')');
    } else {
        write_expr(out, child, rows, cols);
    }
}

fn write_anchor(out: &mut String, anchor: &Anchor, rows: &AxisIndex<RowId>, cols: &AxisIndex<ColId>) {
    let Some(pos) = resolve_anchor_pos(anchor, rows, cols) else {
        out.push_str("#REF!");
        return;
    };
    if anchor.col_mode == RefMode::Absolute {
        out.push('$');
    }
    out.push_str(&col_to_letters(pos.col));
    if anchor.row_mode == RefMode::Absolute {
        out.push('$');
    }
    out.push_str(&pos.row.to_string());
}

fn write_range(
    out: &mut String,
    range: &RangeRef<Anchor>,
    rows: &AxisIndex<RowId>,
    cols: &AxisIndex<ColId>,
) {
    write_anchor(out, &range.start, rows, cols);
    out.push(':');
    write_anchor(out, &range.end, rows, cols);
}
