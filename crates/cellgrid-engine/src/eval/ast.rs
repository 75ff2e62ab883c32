//! Formula representation.
//!
//! The parser produces a position-based AST (`Expr<A1Ref>`); the engine
//! lowers it to an anchored AST (`Expr<Anchor>`) against the formula
//! cell's own position and key. Anchors are position-independent: they
//! name a base cell by stable identifiers plus per-axis offsets, so a
//! reference keeps meaning the same thing while rows and columns move
//! around it.
//!
//! AST nodes are immutable values; structural transformations build new
//! trees rather than mutating in place.

use cellgrid_model::{CellKey, ErrorValue, Position};

/// Per-axis reference mode. `$A$1` is absolute on both axes, `A1` is
/// relative on both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefMode {
    Relative,
    Absolute,
}

/// A reference as written in formula text: an absolute 1-based position
/// plus the per-axis modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct A1Ref {
    pub row: u32,
    pub col: u32,
    pub row_mode: RefMode,
    pub col_mode: RefMode,
}

/// A position-independent reference.
///
/// The anchor resolves by looking up the current position of `base`,
/// adding `(d_row, d_col)`, and mapping the resulting position back to
/// identifiers. It stays correct while its base cell remains in the
/// sheet; structural edits rewrite the offsets (see `editing::splice`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub base: CellKey,
    pub row_mode: RefMode,
    pub col_mode: RefMode,
    pub d_row: i64,
    pub d_col: i64,
}

/// A rectangular reference between two anchors, both based at the
/// formula's own cell. Invariant: `start` resolves componentwise <=
/// `end`, or the range has collapsed to `#REF!`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRef<R> {
    pub start: R,
    pub end: R,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Formula AST, generic over the reference leaf type.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<R> {
    Number(f64),
    Error(ErrorValue),
    Ref(R),
    Range(RangeRef<R>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr<R>>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr<R>>,
        right: Box<Expr<R>>,
    },
    Compare {
        op: CompareOp,
        left: Box<Expr<R>>,
        right: Box<Expr<R>>,
    },
    /// `NAME(arg, …)`; the name is stored uppercase.
    FunctionCall {
        name: String,
        args: Vec<Expr<R>>,
    },
}

/// A reference encountered while walking an AST.
pub enum RefVisit<'a, R> {
    Cell(&'a R),
    Range(&'a RangeRef<R>),
}

impl<R> Expr<R> {
    /// Rebuild the tree with every reference leaf mapped through `f`.
    pub fn map_refs<T>(&self, f: &mut impl FnMut(&R) -> T) -> Expr<T> {
        match self {
            Expr::Number(n) => Expr::Number(*n),
            Expr::Error(e) => Expr::Error(*e),
            Expr::Ref(r) => Expr::Ref(f(r)),
            Expr::Range(range) => Expr::Range(RangeRef {
                start: f(&range.start),
                end: f(&range.end),
            }),
            Expr::Unary { op, expr } => Expr::Unary {
                op: *op,
                expr: Box::new(expr.map_refs(f)),
            },
            Expr::Binary { op, left, right } => Expr::Binary {
                op: *op,
                left: Box::new(left.map_refs(f)),
                right: Box::new(right.map_refs(f)),
            },
            Expr::Compare { op, left, right } => Expr::Compare {
                op: *op,
                left: Box::new(left.map_refs(f)),
                right: Box::new(right.map_refs(f)),
            },
            Expr::FunctionCall { name, args } => Expr::FunctionCall {
                name: name.clone(),
                args: args.iter().map(|a| a.map_refs(f)).collect(),
            },
        }
    }

    /// Visit every reference in the tree, distinguishing single-cell
    /// references from ranges. Producer collection, watcher registration,
    /// and splice transformation all walk the AST through this.
    pub fn visit_refs<'a>(&'a self, f: &mut impl FnMut(RefVisit<'a, R>)) {
        match self {
            Expr::Number(_) | Expr::Error(_) => {}
            Expr::Ref(r) => f(RefVisit::Cell(r)),
            Expr::Range(range) => f(RefVisit::Range(range)),
            Expr::Unary { expr, .. } => expr.visit_refs(f),
            Expr::Binary { left, right, .. } | Expr::Compare { left, right, .. } => {
                left.visit_refs(f);
                right.visit_refs(f);
            }
            Expr::FunctionCall { args, .. } => {
                for arg in args {
                    arg.visit_refs(f);
                }
            }
        }
    }

    /// True if any reference in the tree is a range.
    pub fn has_ranges(&self) -> bool {
        let mut found = false;
        self.visit_refs(&mut |v| {
            if matches!(v, RefVisit::Range(_)) {
                found = true;
            }
        });
        found
    }
}

/// Lower a parsed AST to anchored form against the formula cell at
/// `base_pos` / `base_key`. Offsets are target minus base for both modes;
/// the modes matter for display and copy re-anchoring, not resolution.
pub fn anchor_at(expr: &Expr<A1Ref>, base_pos: Position, base_key: CellKey) -> Expr<Anchor> {
    expr.map_refs(&mut |r| Anchor {
        base: base_key,
        row_mode: r.row_mode,
        col_mode: r.col_mode,
        d_row: r.row as i64 - base_pos.row as i64,
        d_col: r.col as i64 - base_pos.col as i64,
    })
}
