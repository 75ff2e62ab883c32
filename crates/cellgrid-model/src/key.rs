use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// A stable identifier minted by an axis index.
///
/// Identifiers are opaque tokens: two identifiers compare equal iff they
/// denote the same axis element. They are minted monotonically and never
/// reused within the lifetime of a sheet, so a retired identifier stays
/// dangling forever rather than aliasing a later row or column.
pub trait AxisId: Copy + Eq + Ord + Hash {
    fn from_raw(raw: u64) -> Self;
    fn raw(self) -> u64;
}

/// Stable identifier for a row.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RowId(u64);

/// Stable identifier for a column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ColId(u64);

impl AxisId for RowId {
    #[inline]
    fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    fn raw(self) -> u64 {
        self.0
    }
}

impl AxisId for ColId {
    #[inline]
    fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

impl fmt::Display for ColId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Key used for sparse cell storage and dependency-graph nodes.
///
/// Unlike a [`Position`](crate::Position), a `CellKey` survives structural
/// edits: inserting or deleting rows changes which position the key maps
/// to, not the key itself. The ordering is the identifier mint order, used
/// only to make iteration deterministic — it is *not* the on-screen order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub row: RowId,
    pub col: ColId,
}

impl CellKey {
    #[inline]
    pub const fn new(row: RowId, col: ColId) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}
