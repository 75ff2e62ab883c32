//! Structural-edit law: a formula keeps reading the same cells while rows
//! and columns are inserted around it, wherever the splice lands. Deletion
//! collapse paths have deterministic coverage in `editing_operations.rs`;
//! this drives the surviving-anchor side under arbitrary interleavings.

use cellgrid_engine::{Engine, Position, Value};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Ins {
    Rows { at: u32, count: u32 },
    Cols { at: u32, count: u32 },
}

fn arb_inserts() -> impl Strategy<Value = Vec<Ins>> {
    prop::collection::vec(
        prop_oneof![
            (1u32..=70, 1u32..=4).prop_map(|(at, count)| Ins::Rows { at, count }),
            (1u32..=12, 1u32..=3).prop_map(|(at, count)| Ins::Cols { at, count }),
        ],
        0..10,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn formulas_track_their_targets_across_insertions(ops in arb_inserts()) {
        let mut engine = Engine::new(60, 8);
        for row in 1..=10u32 {
            engine.set_value(Position::new(row, 1), f64::from(row));
        }
        engine.set_formula(Position::new(12, 2), "=SUM(A1:A10)");
        engine.set_formula(Position::new(12, 3), "=A7+$A$1");

        // Mirror where the two formula cells end up; the values they read
        // must never change, because their anchors follow identifiers.
        let (mut sum_row, mut sum_col) = (12u32, 2u32);
        let (mut ref_row, mut ref_col) = (12u32, 3u32);

        for op in ops {
            match op {
                Ins::Rows { at, count } => {
                    let at = at.min(engine.row_count() + 1);
                    engine.insert_rows(at, count);
                    if at <= sum_row {
                        sum_row += count;
                    }
                    if at <= ref_row {
                        ref_row += count;
                    }
                }
                Ins::Cols { at, count } => {
                    let at = at.min(engine.col_count() + 1);
                    engine.insert_cols(at, count);
                    if at <= sum_col {
                        sum_col += count;
                    }
                    if at <= ref_col {
                        ref_col += count;
                    }
                }
            }

            // Inserted rows inside the rectangle are blank and sum to 0.
            prop_assert_eq!(
                engine.get_value(Position::new(sum_row, sum_col)),
                Value::Number(55.0)
            );
            prop_assert_eq!(
                engine.get_value(Position::new(ref_row, ref_col)),
                Value::Number(8.0)
            );
        }

        engine.assert_consistent();
    }
}
