use std::fmt;

use serde::{Deserialize, Serialize};

/// Error sentinels returned in place of scalars.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorValue {
    /// `#REF!` — a reference targets a retired identifier or an
    /// out-of-range position.
    Ref,
    /// `#CYCLE!` — the formula would close a dependency cycle.
    Cycle,
    /// `#DIV0!` — division by zero.
    Div0,
    /// `#NAME!` — unknown function name.
    Name,
    /// `#VALUE!` — type coercion failure.
    Value,
    /// `#NUM!` — numeric domain failure.
    Num,
}

impl ErrorValue {
    /// Canonical spelling of the sentinel (including punctuation).
    pub const fn as_code(self) -> &'static str {
        match self {
            ErrorValue::Ref => "#REF!",
            ErrorValue::Cycle => "#CYCLE!",
            ErrorValue::Div0 => "#DIV0!",
            ErrorValue::Name => "#NAME!",
            ErrorValue::Value => "#VALUE!",
            ErrorValue::Num => "#NUM!",
        }
    }

    /// Parse an error literal (e.g. `#REF!`) into an [`ErrorValue`].
    ///
    /// Returns `None` for unknown literals.
    pub fn from_code(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("#REF!") {
            return Some(ErrorValue::Ref);
        }
        if raw.eq_ignore_ascii_case("#CYCLE!") {
            return Some(ErrorValue::Cycle);
        }
        if raw.eq_ignore_ascii_case("#DIV0!") {
            return Some(ErrorValue::Div0);
        }
        if raw.eq_ignore_ascii_case("#NAME!") {
            return Some(ErrorValue::Name);
        }
        if raw.eq_ignore_ascii_case("#VALUE!") {
            return Some(ErrorValue::Value);
        }
        if raw.eq_ignore_ascii_case("#NUM!") {
            return Some(ErrorValue::Num);
        }
        None
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// A scalar cell value.
///
/// Arithmetic uses IEEE-754 doubles. `Blank` denotes an unpopulated
/// address: it contributes 0 to arithmetic and renders as the empty
/// string. Errors are ordinary values that flow through evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Blank,
    Number(f64),
    Error(ErrorValue),
}

impl Value {
    #[inline]
    pub const fn is_blank(&self) -> bool {
        matches!(self, Value::Blank)
    }

    #[inline]
    pub const fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// The numeric reading of this value, if it has one. `Blank` counts
    /// as 0; errors have none.
    #[inline]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Value::Blank => Some(0.0),
            Value::Number(n) => Some(*n),
            Value::Error(_) => None,
        }
    }

    /// Coerce to a number for arithmetic, propagating errors.
    #[inline]
    pub fn coerce_to_number(&self) -> Result<f64, ErrorValue> {
        match self {
            Value::Blank => Ok(0.0),
            Value::Number(n) => Ok(*n),
            Value::Error(e) => Err(*e),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<ErrorValue> for Value {
    fn from(e: ErrorValue) -> Self {
        Value::Error(e)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Blank => Ok(()),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Error(e) => f.write_str(e.as_code()),
        }
    }
}

/// Render a number the way a cell displays it: integral values without a
/// trailing `.0`, everything else via the shortest `f64` representation.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}
