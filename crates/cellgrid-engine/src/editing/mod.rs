//! Structural edits: splice descriptions and formula rewriting.

mod rewrite;

pub use rewrite::{reanchor_for_copy, transform_expr, Axis, Splice};
