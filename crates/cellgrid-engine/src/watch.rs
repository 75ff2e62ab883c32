//! Range observation tables.
//!
//! The dependency graph carries per-cell edges as the primary
//! invalidation channel. Watchers supplement it: when a previously empty
//! address inside an observed rectangle is written, `watchers_of` names
//! the formulas to invalidate even though the write created the cell.
//!
//! Watchers are installed when a formula is set and refreshed when a
//! splice reshapes its rectangles — never as an evaluation side effect.

use ahash::{AHashMap, AHashSet};
use cellgrid_model::CellKey;

use crate::eval::{Anchor, RangeRef};

#[derive(Debug, Default)]
pub struct RangeWatchers {
    /// Consulted when a cell is written: address → observing formulas.
    watchers: AHashMap<CellKey, AHashSet<CellKey>>,
    /// The ranges each formula declared, for re-resolution after splices.
    formula_ranges: AHashMap<CellKey, Vec<RangeRef<Anchor>>>,
    /// Reverse registration: formula → addresses it is registered on.
    /// Makes retraction O(registered cells) instead of a table scan.
    registered: AHashMap<CellKey, AHashSet<CellKey>>,
}

impl RangeWatchers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `formula` observes `range`. Cell registration is
    /// separate (`register_cell`) because the rectangle is enumerated
    /// against the axis state the caller holds.
    pub fn add_watch(&mut self, range: RangeRef<Anchor>, formula: CellKey) {
        self.formula_ranges.entry(formula).or_default().push(range);
    }

    /// Register `formula` as a watcher of `cell`. Idempotent.
    pub fn register_cell(&mut self, cell: CellKey, formula: CellKey) {
        self.watchers.entry(cell).or_default().insert(formula);
        self.registered.entry(formula).or_default().insert(cell);
    }

    /// Retract every watch and registration `formula` holds.
    pub fn remove_watches(&mut self, formula: CellKey) {
        self.formula_ranges.remove(&formula);
        if let Some(cells) = self.registered.remove(&formula) {
            for cell in cells {
                if let Some(set) = self.watchers.get_mut(&cell) {
                    set.remove(&formula);
                    if set.is_empty() {
                        self.watchers.remove(&cell);
                    }
                }
            }
        }
    }

    /// The formulas observing `cell`, sorted for determinism.
    pub fn watchers_of(&self, cell: CellKey) -> Vec<CellKey> {
        let mut out: Vec<CellKey> = self
            .watchers
            .get(&cell)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    /// The ranges `formula` declared, if any.
    pub fn ranges_of(&self, formula: CellKey) -> Option<&[RangeRef<Anchor>]> {
        self.formula_ranges.get(&formula).map(Vec::as_slice)
    }

    /// Every formula that currently observes at least one range.
    pub fn watching_formulas(&self) -> Vec<CellKey> {
        let mut out: Vec<CellKey> = self.formula_ranges.keys().copied().collect();
        out.sort();
        out
    }
}
