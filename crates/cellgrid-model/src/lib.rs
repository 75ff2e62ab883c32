//! `cellgrid-model` defines the core in-memory spreadsheet data structures.
//!
//! The crate is intentionally self-contained so it can be reused by:
//! - the evaluation engine (axis indexes, dependency graph, recalculation)
//! - UI and IPC boundaries via `serde` (JSON-safe schema)
//!
//! Positions are **1-based** and volatile under structural edits; axis
//! identifiers are opaque, stable, and never reused within a sheet.

mod key;
mod position;
mod value;

pub use key::{AxisId, CellKey, ColId, RowId};
pub use position::{col_to_letters, letters_to_col, A1ParseError, Position};
pub use value::{format_number, ErrorValue, Value};

/// Maximum rows per sheet (matches Excel's 1,048,576-row grid).
pub const SHEET_MAX_ROWS: u32 = 1_048_576;

/// Maximum columns per sheet (matches Excel's 16,384-column grid).
pub const SHEET_MAX_COLS: u32 = 16_384;
