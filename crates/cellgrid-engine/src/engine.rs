//! The engine coordinator.
//!
//! All public operations run synchronously: mutations update the store
//! and graph, accumulate dirty keys, and drain them in topological order
//! before returning, so callers always observe a fully consistent sheet.
//! Recoverable failures never escape — they become in-band error
//! sentinels stored in cells; out-of-range positions are no-ops.

use ahash::AHashSet;
use cellgrid_model::{
    CellKey, ColId, ErrorValue, Position, RowId, Value, SHEET_MAX_COLS, SHEET_MAX_ROWS,
};

use crate::axis::AxisIndex;
use crate::editing::{reanchor_for_copy, transform_expr, Axis, Splice};
use crate::eval::{
    anchor_at, format_formula, parse_formula, resolve_anchor_key, resolve_range_rect, Anchor,
    Evaluator, Expr, RangeRef, RefVisit,
};
use crate::graph::DepGraph;
use crate::store::{Cell, CellStore, FormulaCell};
use crate::watch::RangeWatchers;

/// A single sheet and its evaluation machinery.
///
/// Multiple engines coexist independently; there is no process-global
/// state.
pub struct Engine {
    rows: AxisIndex<RowId>,
    cols: AxisIndex<ColId>,
    store: CellStore,
    graph: DepGraph,
    watchers: RangeWatchers,
}

impl Engine {
    /// Create a sheet with the given initial extents (clamped to the
    /// maximum grid size).
    pub fn new(initial_rows: u32, initial_cols: u32) -> Self {
        Self {
            rows: AxisIndex::new(initial_rows.min(SHEET_MAX_ROWS)),
            cols: AxisIndex::new(initial_cols.min(SHEET_MAX_COLS)),
            store: CellStore::new(),
            graph: DepGraph::new(),
            watchers: RangeWatchers::new(),
        }
    }

    /// Current number of live rows.
    pub fn row_count(&self) -> u32 {
        self.rows.max_pos()
    }

    /// Current number of live columns.
    pub fn col_count(&self) -> u32 {
        self.cols.max_pos()
    }

    /// Number of populated cells.
    pub fn cell_count(&self) -> usize {
        self.store.len()
    }

    /// Store a literal number at `pos`. Out-of-range positions are
    /// no-ops.
    pub fn set_value(&mut self, pos: Position, number: f64) {
        let Some(key) = self.resolve_pos(pos) else {
            return;
        };
        self.retract_formula_state(key);
        self.store.set(key, Cell::Value(Value::Number(number)));
        let dirty = self.dirty_for_write(key);
        self.recalc(dirty);
    }

    /// Parse `text` and store it as the formula of `pos`. Parse failures
    /// store `#REF!`; a formula whose dependencies would close a cycle is
    /// stored with its AST intact, a `#CYCLE!` cache, and no edges.
    pub fn set_formula(&mut self, pos: Position, text: &str) {
        let Some(key) = self.resolve_pos(pos) else {
            return;
        };
        let parsed = match parse_formula(text) {
            Ok(parsed) => parsed,
            Err(_) => {
                self.retract_formula_state(key);
                self.store
                    .set(key, Cell::Value(Value::Error(ErrorValue::Ref)));
                let dirty = self.dirty_for_write(key);
                self.recalc(dirty);
                return;
            }
        };
        let ast = anchor_at(&parsed, pos, key);
        self.install_formula(key, ast);
    }

    /// The scalar at `pos`: blank for empty or out-of-range addresses,
    /// the cached value for formulas (evaluated on demand iff uncached).
    pub fn get_value(&self, pos: Position) -> Value {
        let Some(key) = self.resolve_pos(pos) else {
            return Value::Blank;
        };
        match self.store.get(key) {
            None => Value::Blank,
            Some(Cell::Value(v)) => *v,
            Some(Cell::Formula(f)) => match f.cached {
                Some(v) => v,
                None => Evaluator::new(&self.rows, &self.cols, &self.store).eval_cell(key),
            },
        }
    }

    /// The source text of `pos`: canonical formula text (with `=`) for
    /// formulas, the displayed literal for values, `""` when empty.
    pub fn get_source(&self, pos: Position) -> String {
        let Some(key) = self.resolve_pos(pos) else {
            return String::new();
        };
        match self.store.get(key) {
            None => String::new(),
            Some(Cell::Value(v)) => v.to_string(),
            Some(Cell::Formula(f)) => {
                format!("={}", format_formula(&f.ast, &self.rows, &self.cols))
            }
        }
    }

    /// Remove the cell at `pos`, retracting any dependencies it declared.
    pub fn clear(&mut self, pos: Position) {
        let Some(key) = self.resolve_pos(pos) else {
            return;
        };
        if !self.store.contains(key) {
            return;
        }
        self.retract_formula_state(key);
        self.store.remove(key);
        let dirty = self.dirty_for_write(key);
        self.recalc(dirty);
    }

    /// Copy a single cell from `src` to `dst` with Excel-style
    /// re-anchoring: relative references travel with the formula,
    /// absolute axes stay pinned to the source's resolved targets.
    pub fn copy(&mut self, src: Position, dst: Position) {
        let Some(src_key) = self.resolve_pos(src) else {
            return;
        };
        let Some(dst_key) = self.resolve_pos(dst) else {
            return;
        };
        if src_key == dst_key {
            return;
        }

        match self.store.get(src_key).cloned() {
            None => self.clear(dst),
            Some(Cell::Value(v)) => {
                self.retract_formula_state(dst_key);
                self.store.set(dst_key, Cell::Value(v));
                let dirty = self.dirty_for_write(dst_key);
                self.recalc(dirty);
            }
            Some(Cell::Formula(f)) => {
                let ast = reanchor_for_copy(&f.ast, src, dst, dst_key);
                self.install_formula(dst_key, ast);
            }
        }
    }

    /// Insert `count` fresh rows so they occupy positions
    /// `at_pos..at_pos + count - 1`. Positions beyond the end append.
    pub fn insert_rows(&mut self, at_pos: u32, count: u32) {
        let count = count.min(SHEET_MAX_ROWS - self.rows.max_pos());
        if count == 0 {
            return;
        }
        let at_pos = at_pos.clamp(1, self.rows.max_pos() + 1);
        self.apply_splice(Splice {
            axis: Axis::Row,
            at_pos,
            ins: count,
            del: 0,
        });
    }

    /// Delete rows `from..=to` (1-based, inclusive, clamped to the live
    /// extent). An empty range is a no-op.
    pub fn delete_rows(&mut self, from: u32, to: u32) {
        let from = from.max(1);
        let to = to.min(self.rows.max_pos());
        if from > to {
            return;
        }
        self.apply_splice(Splice {
            axis: Axis::Row,
            at_pos: from,
            ins: 0,
            del: to - from + 1,
        });
    }

    /// Column analogue of [`insert_rows`](Self::insert_rows).
    pub fn insert_cols(&mut self, at_pos: u32, count: u32) {
        let count = count.min(SHEET_MAX_COLS - self.cols.max_pos());
        if count == 0 {
            return;
        }
        let at_pos = at_pos.clamp(1, self.cols.max_pos() + 1);
        self.apply_splice(Splice {
            axis: Axis::Col,
            at_pos,
            ins: count,
            del: 0,
        });
    }

    /// Column analogue of [`delete_rows`](Self::delete_rows).
    pub fn delete_cols(&mut self, from: u32, to: u32) {
        let from = from.max(1);
        let to = to.min(self.cols.max_pos());
        if from > to {
            return;
        }
        self.apply_splice(Splice {
            axis: Axis::Col,
            at_pos: from,
            ins: 0,
            del: to - from + 1,
        });
    }

    /// Direct producers of the formula at `pos`, as current positions,
    /// sorted.
    pub fn precedents(&self, pos: Position) -> Vec<Position> {
        let Some(key) = self.resolve_pos(pos) else {
            return Vec::new();
        };
        self.keys_to_positions(self.graph.dependencies_of(key))
    }

    /// Direct consumers of the cell at `pos`, as current positions,
    /// sorted.
    pub fn dependents(&self, pos: Position) -> Vec<Position> {
        let Some(key) = self.resolve_pos(pos) else {
            return Vec::new();
        };
        self.keys_to_positions(self.graph.dependents_of(key))
    }

    fn resolve_pos(&self, pos: Position) -> Option<CellKey> {
        let row = self.rows.pos_to_id(pos.row)?;
        let col = self.cols.pos_to_id(pos.col)?;
        Some(CellKey::new(row, col))
    }

    fn position_of(&self, key: CellKey) -> Option<Position> {
        let row = self.rows.id_to_pos(key.row)?;
        let col = self.cols.id_to_pos(key.col)?;
        Some(Position::new(row, col))
    }

    fn keys_to_positions(&self, keys: Vec<CellKey>) -> Vec<Position> {
        let mut out: Vec<Position> = keys
            .into_iter()
            .filter_map(|k| self.position_of(k))
            .collect();
        out.sort();
        out
    }

    /// Dirty seed for a write to `key`: the address itself plus every
    /// formula watching a rectangle that covers it.
    fn dirty_for_write(&self, key: CellKey) -> AHashSet<CellKey> {
        let mut dirty: AHashSet<CellKey> = AHashSet::new();
        dirty.insert(key);
        dirty.extend(self.watchers.watchers_of(key));
        dirty
    }

    /// If `key` currently holds a formula, retract its producer edges and
    /// watches. The edges *from* `key` to its consumers stay: they belong
    /// to the consumers' formulas.
    fn retract_formula_state(&mut self, key: CellKey) {
        if matches!(self.store.get(key), Some(Cell::Formula(_))) {
            self.graph.replace_all_inbound(key, &[]);
            self.watchers.remove_watches(key);
        }
    }

    fn collect_producers(&self, ast: &Expr<Anchor>) -> (Vec<CellKey>, Vec<RangeRef<Anchor>>) {
        let mut producers: Vec<CellKey> = Vec::new();
        let mut ranges: Vec<RangeRef<Anchor>> = Vec::new();
        ast.visit_refs(&mut |visit| match visit {
            RefVisit::Cell(anchor) => {
                if let Some(key) = resolve_anchor_key(anchor, &self.rows, &self.cols) {
                    producers.push(key);
                }
            }
            RefVisit::Range(range) => {
                ranges.push(*range);
                if let Some(rect) = resolve_range_rect(range, &self.rows, &self.cols) {
                    producers.extend(rect.cell_keys(&self.rows, &self.cols));
                }
            }
        });
        (producers, ranges)
    }

    fn install_formula(&mut self, key: CellKey, ast: Expr<Anchor>) {
        let (producers, ranges) = self.collect_producers(&ast);

        if producers
            .iter()
            .any(|&p| self.graph.would_create_cycle(p, key))
        {
            // Keep the user's formula but mark the error; no edges, so a
            // later edit on this cell can succeed.
            self.retract_formula_state(key);
            self.store.set(
                key,
                Cell::Formula(FormulaCell {
                    ast,
                    cached: Some(Value::Error(ErrorValue::Cycle)),
                }),
            );
            // Consumers and range observers of this address see the
            // sentinel now.
            let mut dirty: AHashSet<CellKey> =
                self.graph.dependents_of(key).into_iter().collect();
            dirty.extend(self.watchers.watchers_of(key));
            self.recalc(dirty);
            return;
        }

        self.watchers.remove_watches(key);
        self.graph.replace_all_inbound(key, &producers);
        self.register_watches(key, &ranges);
        self.store.set(key, Cell::Formula(FormulaCell { ast, cached: None }));
        let dirty = self.dirty_for_write(key);
        self.recalc(dirty);
    }

    fn register_watches(&mut self, key: CellKey, ranges: &[RangeRef<Anchor>]) {
        for range in ranges {
            if let Some(rect) = resolve_range_rect(range, &self.rows, &self.cols) {
                for cell in rect.cell_keys(&self.rows, &self.cols) {
                    self.watchers.register_cell(cell, key);
                }
            }
            self.watchers.add_watch(*range, key);
        }
    }

    /// Re-resolve the rectangles of a surviving range formula and publish
    /// the refreshed producer set and watcher registrations. A splice can
    /// change which addresses a rectangle spans even when nothing is
    /// dirty.
    fn refresh_range_formula(&mut self, key: CellKey) {
        let ast = match self.store.get(key) {
            Some(Cell::Formula(f)) => f.ast.clone(),
            _ => {
                self.watchers.remove_watches(key);
                return;
            }
        };
        let (producers, ranges) = self.collect_producers(&ast);
        self.graph.replace_all_inbound(key, &producers);
        self.watchers.remove_watches(key);
        self.register_watches(key, &ranges);
    }

    /// Execute the splice protocol. The ordering is load-bearing:
    /// formulas transform against pre-splice positions, then the axis
    /// mutates, then retired cells and edges are cleaned up, then
    /// surviving range formulas refresh, then the dirty set drains.
    fn apply_splice(&mut self, splice: Splice) {
        // 1. Transform every formula AST while `id_to_pos` still reports
        //    pre-splice positions.
        let mut collapsed: Vec<CellKey> = Vec::new();
        for key in self.store.formula_keys() {
            let ast = match self.store.get(key) {
                Some(Cell::Formula(f)) => f.ast.clone(),
                _ => continue,
            };
            match transform_expr(&ast, &self.rows, &self.cols, &splice) {
                Some(new_ast) => {
                    if let Some(Cell::Formula(f)) = self.store.get_mut(key) {
                        f.ast = new_ast;
                    }
                }
                None => collapsed.push(key),
            }
        }

        // 2. Mutate the axis: insert, then remove.
        let mut retired_rows: Vec<RowId> = Vec::new();
        let mut retired_cols: Vec<ColId> = Vec::new();
        match splice.axis {
            Axis::Row => {
                self.rows.insert(splice.at_pos, splice.ins);
                if splice.del > 0 {
                    let from = splice.at_pos + splice.ins;
                    retired_rows = self.rows.remove(from, from + splice.del - 1);
                }
            }
            Axis::Col => {
                self.cols.insert(splice.at_pos, splice.ins);
                if splice.del > 0 {
                    let from = splice.at_pos + splice.ins;
                    retired_cols = self.cols.remove(from, from + splice.del - 1);
                }
            }
        }

        // 3. Bulk-remove cells on retired identifiers and seed the dirty
        //    set with everything the retirement invalidates. The affected
        //    closure must be taken before edges are torn down.
        let removed_cells = match splice.axis {
            Axis::Row => self.store.remove_rows(&retired_rows),
            Axis::Col => self.store.remove_cols(&retired_cols),
        };

        let retired_row_set: AHashSet<RowId> = retired_rows.into_iter().collect();
        let retired_col_set: AHashSet<ColId> = retired_cols.into_iter().collect();
        let mut dead_keys: AHashSet<CellKey> = removed_cells.iter().copied().collect();
        dead_keys.extend(self.graph.keys().into_iter().filter(|k| {
            retired_row_set.contains(&k.row) || retired_col_set.contains(&k.col)
        }));

        let mut seeds: AHashSet<CellKey> = dead_keys.clone();
        seeds.extend(collapsed.iter().copied());
        let dirty = self.graph.affected_from(seeds.iter().copied());

        for &key in &collapsed {
            if !self.store.contains(key) {
                continue; // its row or column was retired with it
            }
            self.retract_formula_state(key);
            self.store
                .set(key, Cell::Value(Value::Error(ErrorValue::Ref)));
        }

        for key in dead_keys {
            self.graph.remove_all(key);
            self.watchers.remove_watches(key);
        }

        // 4. Rectangle membership can change without anything being
        //    dirty; refresh every surviving range formula.
        for key in self.watchers.watching_formulas() {
            self.refresh_range_formula(key);
        }

        // 5. Drain.
        self.recalc(dirty);
    }

    /// Synchronous recalculation driver.
    fn recalc(&mut self, dirty: AHashSet<CellKey>) {
        if dirty.is_empty() {
            return;
        }

        for &key in &dirty {
            if let Some(Cell::Formula(f)) = self.store.get_mut(key) {
                f.cached = None;
            }
        }

        let affected = self.graph.affected_from(dirty.iter().copied());
        let (order, cycle_members) = self.graph.topo_order(&affected);

        for &key in &cycle_members {
            if let Some(Cell::Formula(f)) = self.store.get_mut(key) {
                f.cached = Some(Value::Error(ErrorValue::Cycle));
            }
        }

        for key in order {
            let ast = match self.store.get(key) {
                Some(Cell::Formula(f)) => f.ast.clone(),
                _ => continue,
            };
            if self.watchers.ranges_of(key).is_some() {
                self.refresh_range_formula(key);
            }
            let value = {
                let mut evaluator = Evaluator::new(&self.rows, &self.cols, &self.store);
                evaluator.eval_formula(key, &ast)
            };
            if let Some(Cell::Formula(f)) = self.store.get_mut(key) {
                f.cached = Some(value);
            }
        }
    }
}

// Internal consistency checks used by integration tests.
impl Engine {
    /// Number of directed dependency edges (for tests).
    pub fn dependency_edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Verify the position ↔ identifier bijection and store/graph
    /// liveness invariants; panics on violation (test helper).
    #[doc(hidden)]
    pub fn assert_consistent(&self) {
        for pos in 1..=self.rows.max_pos() {
            let id = self.rows.pos_to_id(pos).expect("live position");
            assert_eq!(self.rows.id_to_pos(id), Some(pos));
        }
        for pos in 1..=self.cols.max_pos() {
            let id = self.cols.pos_to_id(pos).expect("live position");
            assert_eq!(self.cols.id_to_pos(id), Some(pos));
        }
        for (key, cell) in self.store.iter() {
            assert!(
                self.rows.id_to_pos(key.row).is_some() && self.cols.id_to_pos(key.col).is_some(),
                "stored cell {key} has a retired identifier"
            );
            // Cached formula results must agree with a fresh evaluation
            // (cycle sentinels are written by policy, not by evaluation).
            if let Cell::Formula(f) = cell {
                if let Some(cached) = f.cached {
                    if cached != Value::Error(ErrorValue::Cycle) {
                        let fresh = Evaluator::new(&self.rows, &self.cols, &self.store)
                            .eval_formula(key, &f.ast);
                        assert_eq!(fresh, cached, "stale cache at {key}");
                    }
                }
            }
        }
    }
}
