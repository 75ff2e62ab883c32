use cellgrid_engine::{Engine, ErrorValue, Position, Value};
use pretty_assertions::assert_eq;

fn pos(row: u32, col: u32) -> Position {
    Position::new(row, col)
}

fn engine() -> Engine {
    Engine::new(100, 26)
}

#[test]
fn sum_invalidates_when_an_empty_in_range_cell_becomes_populated() {
    let mut engine = engine();
    engine.set_formula(pos(5, 1), "=SUM(A1:A4)");
    assert_eq!(engine.get_value(pos(5, 1)), Value::Number(0.0));

    engine.set_value(pos(2, 1), 7.0);
    assert_eq!(engine.get_value(pos(5, 1)), Value::Number(7.0));

    // And clearing it invalidates again.
    engine.clear(pos(2, 1));
    assert_eq!(engine.get_value(pos(5, 1)), Value::Number(0.0));
}

#[test]
fn cycle_detection_blocks_edges_but_preserves_the_ast() {
    let mut engine = engine();
    engine.set_formula(pos(1, 1), "=A2");
    engine.set_formula(pos(2, 1), "=A1");

    // The second formula is stored with its text intact but no edges.
    assert_eq!(
        engine.get_value(pos(2, 1)),
        Value::Error(ErrorValue::Cycle)
    );
    assert_eq!(engine.get_source(pos(2, 1)), "=A1");
    // Only the first formula's edge exists.
    assert_eq!(engine.dependency_edge_count(), 1);
    assert!(engine.precedents(pos(2, 1)).is_empty());
    assert_eq!(engine.precedents(pos(1, 1)), vec![pos(2, 1)]);
}

#[test]
fn self_reference_is_a_cycle() {
    let mut engine = engine();
    engine.set_formula(pos(1, 1), "=A1");
    assert_eq!(
        engine.get_value(pos(1, 1)),
        Value::Error(ErrorValue::Cycle)
    );
    assert_eq!(engine.dependency_edge_count(), 0);
}

#[test]
fn sum_covering_its_own_cell_is_a_cycle() {
    let mut engine = engine();
    engine.set_formula(pos(3, 1), "=SUM(A1:A5)");
    assert_eq!(
        engine.get_value(pos(3, 1)),
        Value::Error(ErrorValue::Cycle)
    );
    assert_eq!(engine.dependency_edge_count(), 0);
}

#[test]
fn editing_the_blocked_cell_recovers_from_a_cycle() {
    let mut engine = engine();
    engine.set_formula(pos(1, 1), "=A2");
    engine.set_formula(pos(2, 1), "=A1"); // blocked

    engine.set_value(pos(2, 1), 5.0);
    assert_eq!(engine.get_value(pos(2, 1)), Value::Number(5.0));
    assert_eq!(engine.get_value(pos(1, 1)), Value::Number(5.0));

    // Re-entering the once-blocked formula also works now that the loop
    // is gone.
    engine.set_value(pos(1, 1), 3.0);
    engine.set_formula(pos(2, 1), "=A1*2");
    assert_eq!(engine.get_value(pos(2, 1)), Value::Number(6.0));
}

#[test]
fn replacing_a_formula_atomically_swaps_its_producers() {
    let mut engine = engine();
    engine.set_value(pos(1, 1), 1.0);
    engine.set_value(pos(2, 1), 2.0);

    engine.set_formula(pos(3, 1), "=A1");
    assert_eq!(engine.precedents(pos(3, 1)), vec![pos(1, 1)]);

    engine.set_formula(pos(3, 1), "=A2");
    assert_eq!(engine.precedents(pos(3, 1)), vec![pos(2, 1)]);
    assert_eq!(engine.dependency_edge_count(), 1);

    // The old producer no longer invalidates it.
    engine.set_value(pos(1, 1), 100.0);
    assert_eq!(engine.get_value(pos(3, 1)), Value::Number(2.0));
}

#[test]
fn overwriting_a_formula_with_a_value_retracts_its_dependencies() {
    let mut engine = engine();
    engine.set_value(pos(1, 1), 1.0);
    engine.set_formula(pos(2, 1), "=A1");
    assert_eq!(engine.dependency_edge_count(), 1);

    engine.set_value(pos(2, 1), 42.0);
    assert_eq!(engine.dependency_edge_count(), 0);
    assert_eq!(engine.get_value(pos(2, 1)), Value::Number(42.0));

    // Changing the old producer leaves the overwritten cell alone.
    engine.set_value(pos(1, 1), 9.0);
    assert_eq!(engine.get_value(pos(2, 1)), Value::Number(42.0));
}

#[test]
fn dependents_and_precedents_report_current_positions() {
    let mut engine = engine();
    engine.set_value(pos(1, 1), 1.0);
    engine.set_formula(pos(5, 1), "=A1");

    assert_eq!(engine.dependents(pos(1, 1)), vec![pos(5, 1)]);
    assert_eq!(engine.precedents(pos(5, 1)), vec![pos(1, 1)]);

    // Positions reported after a splice are the post-splice ones.
    engine.insert_rows(1, 1);
    assert_eq!(engine.dependents(pos(2, 1)), vec![pos(6, 1)]);
    assert_eq!(engine.precedents(pos(6, 1)), vec![pos(2, 1)]);
}

#[test]
fn diamond_dependencies_recalculate_consistently() {
    let mut engine = engine();
    engine.set_value(pos(1, 1), 1.0);
    engine.set_formula(pos(2, 1), "=A1+1");
    engine.set_formula(pos(3, 1), "=A1*10");
    engine.set_formula(pos(4, 1), "=A2+A3");
    assert_eq!(engine.get_value(pos(4, 1)), Value::Number(12.0));

    engine.set_value(pos(1, 1), 2.0);
    assert_eq!(engine.get_value(pos(4, 1)), Value::Number(23.0));
}

#[test]
fn error_values_flow_through_dependents() {
    let mut engine = engine();
    engine.set_value(pos(1, 1), 1.0);
    engine.set_formula(pos(2, 1), "=A1");
    engine.set_formula(pos(3, 1), "=A2*2");

    engine.set_formula(pos(1, 1), "=1/0");
    assert_eq!(
        engine.get_value(pos(2, 1)),
        Value::Error(ErrorValue::Div0)
    );
    assert_eq!(
        engine.get_value(pos(3, 1)),
        Value::Error(ErrorValue::Div0)
    );

    engine.set_value(pos(1, 1), 4.0);
    assert_eq!(engine.get_value(pos(3, 1)), Value::Number(8.0));
}

#[test]
fn watchers_survive_splices() {
    let mut engine = engine();
    engine.set_formula(pos(10, 1), "=SUM(A1:A5)");
    assert_eq!(engine.get_value(pos(10, 1)), Value::Number(0.0));

    // Shift everything down; the rectangle follows its identifiers.
    engine.insert_rows(1, 3);
    assert_eq!(engine.get_source(pos(13, 1)), "=SUM(A4:A8)");

    // A write into the tracked rectangle still invalidates.
    engine.set_value(pos(5, 1), 9.0);
    assert_eq!(engine.get_value(pos(13, 1)), Value::Number(9.0));

    // A write just outside does not change it.
    engine.set_value(pos(3, 1), 100.0);
    assert_eq!(engine.get_value(pos(13, 1)), Value::Number(9.0));
}

#[test]
fn multiple_watchers_of_one_cell_all_invalidate() {
    let mut engine = engine();
    engine.set_formula(pos(10, 1), "=SUM(A1:A4)");
    engine.set_formula(pos(11, 1), "=SUM(A2:A6)");

    engine.set_value(pos(3, 1), 5.0);
    assert_eq!(engine.get_value(pos(10, 1)), Value::Number(5.0));
    assert_eq!(engine.get_value(pos(11, 1)), Value::Number(5.0));
}
