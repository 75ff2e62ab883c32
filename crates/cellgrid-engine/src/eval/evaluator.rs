//! AST evaluation against the current sheet state.
//!
//! Evaluation is structural: it follows the AST, reading producer cells
//! through their cached values. A formula encountered without a cache is
//! evaluated on the spot; the in-flight set turns re-entry into
//! `#CYCLE!`. Errors short-circuit left-to-right through operators and
//! scalar function arguments; range aggregation skips blanks and
//! non-numeric scalars.

use ahash::AHashSet;
use cellgrid_model::{CellKey, ColId, ErrorValue, RowId, Value};

use super::ast::{Anchor, BinaryOp, CompareOp, Expr, UnaryOp};
use super::{resolve_anchor_key, resolve_range_rect, Rect};
use crate::axis::AxisIndex;
use crate::store::{Cell, CellStore};

/// Evaluates anchored ASTs against a sheet snapshot (axes + store).
pub struct Evaluator<'a> {
    rows: &'a AxisIndex<RowId>,
    cols: &'a AxisIndex<ColId>,
    store: &'a CellStore,
    in_flight: AHashSet<CellKey>,
}

enum EvalValue {
    Scalar(Value),
    Range(Rect),
}

impl<'a> Evaluator<'a> {
    pub fn new(rows: &'a AxisIndex<RowId>, cols: &'a AxisIndex<ColId>, store: &'a CellStore) -> Self {
        Self {
            rows,
            cols,
            store,
            in_flight: AHashSet::new(),
        }
    }

    /// Evaluate the cell at `key` as a scalar: blank for missing cells,
    /// the stored scalar for value cells, cached-or-computed for formulas.
    pub fn eval_cell(&mut self, key: CellKey) -> Value {
        self.value_of_key(key)
    }

    /// Evaluate `expr` as the formula of the cell at `key`, guarding
    /// against self-reference through the evaluation stack.
    pub fn eval_formula(&mut self, key: CellKey, expr: &Expr<Anchor>) -> Value {
        if !self.in_flight.insert(key) {
            return Value::Error(ErrorValue::Cycle);
        }
        let value = self.eval_scalar(expr);
        self.in_flight.remove(&key);
        value
    }

    fn eval_scalar(&mut self, expr: &Expr<Anchor>) -> Value {
        match self.eval_value(expr) {
            EvalValue::Scalar(v) => v,
            EvalValue::Range(rect) => {
                if rect.top == rect.bottom && rect.left == rect.right {
                    match rect.cell_keys(self.rows, self.cols).first() {
                        Some(&key) => self.value_of_key(key),
                        None => Value::Error(ErrorValue::Ref),
                    }
                } else {
                    // A multi-cell rectangle has no scalar reading.
                    Value::Error(ErrorValue::Value)
                }
            }
        }
    }

    fn eval_value(&mut self, expr: &Expr<Anchor>) -> EvalValue {
        match expr {
            Expr::Number(n) => EvalValue::Scalar(Value::Number(*n)),
            Expr::Error(e) => EvalValue::Scalar(Value::Error(*e)),
            Expr::Ref(anchor) => {
                let value = match resolve_anchor_key(anchor, self.rows, self.cols) {
                    Some(key) => self.value_of_key(key),
                    None => Value::Error(ErrorValue::Ref),
                };
                EvalValue::Scalar(value)
            }
            Expr::Range(range) => match resolve_range_rect(range, self.rows, self.cols) {
                Some(rect) => EvalValue::Range(rect),
                None => EvalValue::Scalar(Value::Error(ErrorValue::Ref)),
            },
            Expr::Unary { op, expr } => {
                let v = self.eval_scalar(expr);
                let n = match v.coerce_to_number() {
                    Ok(n) => n,
                    Err(e) => return EvalValue::Scalar(Value::Error(e)),
                };
                EvalValue::Scalar(Value::Number(match op {
                    UnaryOp::Plus => n,
                    UnaryOp::Minus => -n,
                }))
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval_scalar(left);
                if let Value::Error(e) = l {
                    return EvalValue::Scalar(Value::Error(e));
                }
                let r = self.eval_scalar(right);
                if let Value::Error(e) = r {
                    return EvalValue::Scalar(Value::Error(e));
                }
                let ln = match l.coerce_to_number() {
                    Ok(n) => n,
                    Err(e) => return EvalValue::Scalar(Value::Error(e)),
                };
                let rn = match r.coerce_to_number() {
                    Ok(n) => n,
                    Err(e) => return EvalValue::Scalar(Value::Error(e)),
                };
                EvalValue::Scalar(apply_binary(*op, ln, rn))
            }
            Expr::Compare { op, left, right } => {
                let l = self.eval_scalar(left);
                if let Value::Error(e) = l {
                    return EvalValue::Scalar(Value::Error(e));
                }
                let r = self.eval_scalar(right);
                if let Value::Error(e) = r {
                    return EvalValue::Scalar(Value::Error(e));
                }
                let ln = match l.coerce_to_number() {
                    Ok(n) => n,
                    Err(e) => return EvalValue::Scalar(Value::Error(e)),
                };
                let rn = match r.coerce_to_number() {
                    Ok(n) => n,
                    Err(e) => return EvalValue::Scalar(Value::Error(e)),
                };
                let holds = match op {
                    CompareOp::Eq => ln == rn,
                    CompareOp::Ne => ln != rn,
                    CompareOp::Lt => ln < rn,
                    CompareOp::Le => ln <= rn,
                    CompareOp::Gt => ln > rn,
                    CompareOp::Ge => ln >= rn,
                };
                EvalValue::Scalar(Value::Number(if holds { 1.0 } else { 0.0 }))
            }
            Expr::FunctionCall { name, args } => {
                EvalValue::Scalar(self.call_function(name, args))
            }
        }
    }

    fn value_of_key(&mut self, key: CellKey) -> Value {
        match self.store.get(key) {
            None => Value::Blank,
            Some(Cell::Value(v)) => *v,
            Some(Cell::Formula(f)) => match f.cached {
                Some(v) => v,
                None => {
                    let ast = f.ast.clone();
                    self.eval_formula(key, &ast)
                }
            },
        }
    }

    fn call_function(&mut self, name: &str, args: &[Expr<Anchor>]) -> Value {
        match name {
            "SUM" => {
                let mut sum = 0.0;
                match self.for_each_numeric(args, |n| sum += n) {
                    Some(e) => Value::Error(e),
                    None => Value::Number(sum),
                }
            }
            "AVERAGE" => {
                let mut sum = 0.0;
                let mut count = 0u64;
                match self.for_each_numeric(args, |n| {
                    sum += n;
                    count += 1;
                }) {
                    Some(e) => Value::Error(e),
                    None if count == 0 => Value::Error(ErrorValue::Div0),
                    None => Value::Number(sum / count as f64),
                }
            }
            "COUNT" => {
                let mut count = 0u64;
                for arg in args {
                    match self.eval_value(arg) {
                        EvalValue::Scalar(Value::Number(_)) => count += 1,
                        EvalValue::Scalar(_) => {}
                        EvalValue::Range(rect) => {
                            for key in rect.cell_keys(self.rows, self.cols) {
                                if matches!(self.value_of_key(key), Value::Number(_)) {
                                    count += 1;
                                }
                            }
                        }
                    }
                }
                Value::Number(count as f64)
            }
            "MAX" => self.fold_extremum(args, f64::max),
            "MIN" => self.fold_extremum(args, f64::min),
            "IF" => {
                if args.len() < 2 || args.len() > 3 {
                    return Value::Error(ErrorValue::Value);
                }
                let cond = self.eval_scalar(&args[0]);
                let n = match cond.coerce_to_number() {
                    Ok(n) => n,
                    Err(e) => return Value::Error(e),
                };
                if n != 0.0 {
                    self.eval_scalar(&args[1])
                } else if let Some(otherwise) = args.get(2) {
                    self.eval_scalar(otherwise)
                } else {
                    Value::Number(0.0)
                }
            }
            "AND" | "OR" => {
                if args.is_empty() {
                    return Value::Error(ErrorValue::Value);
                }
                let mut acc = name == "AND";
                for arg in args {
                    let n = match self.eval_scalar(arg).coerce_to_number() {
                        Ok(n) => n,
                        Err(e) => return Value::Error(e),
                    };
                    let truthy = n != 0.0;
                    acc = if name == "AND" {
                        acc && truthy
                    } else {
                        acc || truthy
                    };
                }
                Value::Number(if acc { 1.0 } else { 0.0 })
            }
            "NOT" => {
                if args.len() != 1 {
                    return Value::Error(ErrorValue::Value);
                }
                match self.eval_scalar(&args[0]).coerce_to_number() {
                    Ok(n) => Value::Number(if n == 0.0 { 1.0 } else { 0.0 }),
                    Err(e) => Value::Error(e),
                }
            }
            _ => Value::Error(ErrorValue::Name),
        }
    }

    /// Feed every numeric operand of `args` to `f`.
    ///
    /// Scalar arguments coerce (errors propagate); range cells follow the
    /// aggregation rule — only numeric scalars participate, blanks and
    /// error cells are skipped.
    fn for_each_numeric(
        &mut self,
        args: &[Expr<Anchor>],
        mut f: impl FnMut(f64),
    ) -> Option<ErrorValue> {
        for arg in args {
            match self.eval_value(arg) {
                EvalValue::Scalar(v) => match v.coerce_to_number() {
                    Ok(n) => f(n),
                    Err(e) => return Some(e),
                },
                EvalValue::Range(rect) => {
                    for key in rect.cell_keys(self.rows, self.cols) {
                        if let Value::Number(n) = self.value_of_key(key) {
                            f(n);
                        }
                    }
                }
            }
        }
        None
    }

    fn fold_extremum(&mut self, args: &[Expr<Anchor>], pick: fn(f64, f64) -> f64) -> Value {
        let mut best: Option<f64> = None;
        let err = self.for_each_numeric(args, |n| {
            best = Some(match best {
                Some(b) => pick(b, n),
                None => n,
            });
        });
        match err {
            Some(e) => Value::Error(e),
            None => Value::Number(best.unwrap_or(0.0)),
        }
    }
}

fn apply_binary(op: BinaryOp, ln: f64, rn: f64) -> Value {
    match op {
        BinaryOp::Add => Value::Number(ln + rn),
        BinaryOp::Sub => Value::Number(ln - rn),
        BinaryOp::Mul => Value::Number(ln * rn),
        BinaryOp::Div => {
            if rn == 0.0 {
                Value::Error(ErrorValue::Div0)
            } else {
                Value::Number(ln / rn)
            }
        }
        BinaryOp::Pow => {
            if ln == 0.0 && rn < 0.0 {
                return Value::Error(ErrorValue::Div0);
            }
            let out = ln.powf(rn);
            if out.is_nan() {
                Value::Error(ErrorValue::Num)
            } else {
                Value::Number(out)
            }
        }
    }
}
