//! Sparse cell storage keyed by stable identifiers.
//!
//! Only populated cells exist in the store; absence denotes emptiness.
//! Because keys are identifier pairs rather than positions, structural
//! edits never rewrite cell records — bulk removal on identifier
//! retirement is the only structural operation the store sees.

use ahash::{AHashMap, AHashSet};
use cellgrid_model::{CellKey, ColId, RowId, Value};

use crate::eval::{Anchor, Expr};

/// A formula cell: the anchored AST plus the last computed scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaCell {
    pub ast: Expr<Anchor>,
    pub cached: Option<Value>,
}

/// A populated cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Value(Value),
    Formula(FormulaCell),
}

impl Cell {
    #[inline]
    pub const fn is_formula(&self) -> bool {
        matches!(self, Cell::Formula(_))
    }
}

/// Sparse mapping from `(RowId, ColId)` to cell records.
///
/// Iteration order is unspecified; callers that need determinism sort the
/// keys themselves. The store never holds a cell whose row or column
/// identifier has been retired — every retirement is paired with a bulk
/// removal.
#[derive(Debug, Default)]
pub struct CellStore {
    cells: AHashMap<CellKey, Cell>,
}

impl CellStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: CellKey) -> Option<&Cell> {
        self.cells.get(&key)
    }

    pub fn get_mut(&mut self, key: CellKey) -> Option<&mut Cell> {
        self.cells.get_mut(&key)
    }

    pub fn set(&mut self, key: CellKey, cell: Cell) {
        self.cells.insert(key, cell);
    }

    pub fn remove(&mut self, key: CellKey) -> Option<Cell> {
        self.cells.remove(&key)
    }

    pub fn contains(&self, key: CellKey) -> bool {
        self.cells.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CellKey, &Cell)> {
        self.cells.iter().map(|(k, c)| (*k, c))
    }

    /// Keys of every formula cell, in unspecified order.
    pub fn formula_keys(&self) -> Vec<CellKey> {
        self.cells
            .iter()
            .filter_map(|(k, c)| c.is_formula().then_some(*k))
            .collect()
    }

    /// Remove every cell whose row identifier is being retired. Returns
    /// the removed keys.
    pub fn remove_rows(&mut self, retired: &[RowId]) -> Vec<CellKey> {
        let retired: AHashSet<RowId> = retired.iter().copied().collect();
        self.remove_matching(|key| retired.contains(&key.row))
    }

    /// Remove every cell whose column identifier is being retired. Returns
    /// the removed keys.
    pub fn remove_cols(&mut self, retired: &[ColId]) -> Vec<CellKey> {
        let retired: AHashSet<ColId> = retired.iter().copied().collect();
        self.remove_matching(|key| retired.contains(&key.col))
    }

    fn remove_matching(&mut self, mut pred: impl FnMut(CellKey) -> bool) -> Vec<CellKey> {
        let mut removed = Vec::new();
        self.cells.retain(|key, _| {
            if pred(*key) {
                removed.push(*key);
                false
            } else {
                true
            }
        });
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellgrid_model::AxisId;

    fn key(r: u64, c: u64) -> CellKey {
        CellKey::new(RowId::from_raw(r), ColId::from_raw(c))
    }

    #[test]
    fn set_get_remove() {
        let mut store = CellStore::new();
        assert!(store.is_empty());

        store.set(key(1, 1), Cell::Value(Value::Number(5.0)));
        assert_eq!(store.len(), 1);
        assert!(store.contains(key(1, 1)));
        assert_eq!(
            store.get(key(1, 1)),
            Some(&Cell::Value(Value::Number(5.0)))
        );

        assert!(store.remove(key(1, 1)).is_some());
        assert!(store.get(key(1, 1)).is_none());
    }

    #[test]
    fn bulk_removal_only_touches_matching_ids() {
        let mut store = CellStore::new();
        store.set(key(1, 1), Cell::Value(Value::Number(1.0)));
        store.set(key(1, 2), Cell::Value(Value::Number(2.0)));
        store.set(key(2, 1), Cell::Value(Value::Number(3.0)));

        let mut removed = store.remove_rows(&[RowId::from_raw(1)]);
        removed.sort();
        assert_eq!(removed, vec![key(1, 1), key(1, 2)]);
        assert_eq!(store.len(), 1);
        assert!(store.contains(key(2, 1)));

        let removed = store.remove_cols(&[ColId::from_raw(1)]);
        assert_eq!(removed, vec![key(2, 1)]);
        assert!(store.is_empty());
    }
}
