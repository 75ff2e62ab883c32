#![forbid(unsafe_code)]

//! Evaluation core of a sparse spreadsheet engine.
//!
//! Sheets can logically span ~10^6 rows by ~1.6·10^4 columns while memory
//! stays proportional to the number of populated cells. Formulas reference
//! cells through position-independent *anchors* over stable row/column
//! identifiers, so structural edits (row/column insertion and deletion)
//! transform formulas instead of breaking them.
//!
//! The public surface is [`Engine`]: set values and formulas, read values
//! and canonical formula text, and apply structural edits. Recalculation
//! is synchronous — every mutating call returns with a fully consistent
//! sheet.

pub mod axis;
pub mod editing;
pub mod eval;
pub mod graph;
pub mod store;
pub mod watch;

mod engine;

pub use cellgrid_model::{
    A1ParseError, CellKey, ColId, ErrorValue, Position, RowId, Value,
};

pub use engine::Engine;
pub use eval::{parse_formula, Anchor, Expr, FormulaParseError, RangeRef, RefMode};
