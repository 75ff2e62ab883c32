use cellgrid_engine::{Engine, ErrorValue, Position, Value};
use pretty_assertions::assert_eq;

fn pos(row: u32, col: u32) -> Position {
    Position::new(row, col)
}

fn engine() -> Engine {
    Engine::new(100, 26)
}

#[test]
fn relative_reference_tracks_its_target_across_insertion() {
    let mut engine = engine();
    engine.set_value(pos(1, 1), 10.0);
    engine.set_formula(pos(2, 1), "=A1");

    engine.insert_rows(1, 1);

    // The formula moved from row 2 to row 3 and still reads the moved 10.
    assert_eq!(engine.get_source(pos(3, 1)), "=A2");
    assert_eq!(engine.get_value(pos(3, 1)), Value::Number(10.0));
    assert_eq!(engine.get_value(pos(1, 1)), Value::Blank);
    engine.assert_consistent();
}

#[test]
fn absolute_reference_keeps_tracking_its_cell() {
    let mut engine = engine();
    engine.set_value(pos(1, 1), 10.0);
    engine.set_formula(pos(2, 1), "=$A$1");

    engine.insert_rows(1, 1);

    // Structural edits move absolute references with their content (the
    // modes only pin targets under copy); the value is preserved.
    assert_eq!(engine.get_value(pos(3, 1)), Value::Number(10.0));
    assert_eq!(engine.get_source(pos(3, 1)), "=$A$2");
}

#[test]
fn deleting_the_column_a_formula_reads_collapses_it_to_ref_error() {
    let mut engine = engine();
    engine.set_value(pos(1, 2), 5.0);
    engine.set_formula(pos(1, 1), "=B1");

    engine.delete_cols(2, 2);

    assert_eq!(engine.get_value(pos(1, 1)), Value::Error(ErrorValue::Ref));
    // The collapsed cell is a plain value now; it declares no
    // dependencies.
    assert!(engine.precedents(pos(1, 1)).is_empty());
    assert_eq!(engine.dependency_edge_count(), 0);
    engine.assert_consistent();
}

#[test]
fn splice_transformation_applies_exactly_once() {
    let mut engine = engine();
    engine.set_value(pos(1, 1), 10.0);
    engine.set_formula(pos(5, 1), "=A1");

    engine.insert_rows(3, 1);

    // The formula moved to row 6; its target did not move.
    assert_eq!(engine.get_source(pos(6, 1)), "=A1");
    assert_eq!(engine.get_value(pos(6, 1)), Value::Number(10.0));
}

#[test]
fn insertion_at_position_one_shifts_the_entire_axis() {
    let mut engine = engine();
    engine.set_value(pos(1, 1), 1.0);
    engine.set_value(pos(100, 26), 2.0);

    engine.insert_rows(1, 2);

    assert_eq!(engine.get_value(pos(3, 1)), Value::Number(1.0));
    assert_eq!(engine.get_value(pos(102, 26)), Value::Number(2.0));
    assert_eq!(engine.row_count(), 102);
}

#[test]
fn insertion_beyond_the_end_appends() {
    let mut engine = Engine::new(5, 5);
    engine.insert_rows(900, 3);
    assert_eq!(engine.row_count(), 8);

    engine.insert_cols(6, 1);
    assert_eq!(engine.col_count(), 6);
}

#[test]
fn deleting_the_entire_axis_empties_the_store() {
    let mut engine = Engine::new(10, 5);
    engine.set_value(pos(1, 1), 1.0);
    engine.set_value(pos(10, 5), 2.0);
    engine.set_formula(pos(5, 3), "=A1");

    engine.delete_rows(1, 10);

    assert_eq!(engine.row_count(), 0);
    assert_eq!(engine.cell_count(), 0);
    assert_eq!(engine.dependency_edge_count(), 0);
    assert_eq!(engine.get_value(pos(1, 1)), Value::Blank);
}

#[test]
fn empty_delete_range_is_a_no_op() {
    let mut engine = Engine::new(10, 5);
    engine.set_value(pos(1, 1), 1.0);
    engine.delete_rows(7, 3);
    engine.delete_cols(9, 2);
    assert_eq!(engine.row_count(), 10);
    assert_eq!(engine.col_count(), 5);
    assert_eq!(engine.get_value(pos(1, 1)), Value::Number(1.0));
}

#[test]
fn insert_then_delete_is_a_no_op_on_values_and_graph() {
    let mut engine = engine();
    engine.set_value(pos(1, 1), 10.0);
    engine.set_formula(pos(5, 1), "=A1*2");
    engine.set_formula(pos(6, 1), "=SUM(A1:A5)");
    let edges_before = engine.dependency_edge_count();

    engine.insert_rows(3, 4);
    engine.delete_rows(3, 6);

    assert_eq!(engine.get_value(pos(1, 1)), Value::Number(10.0));
    assert_eq!(engine.get_value(pos(5, 1)), Value::Number(20.0));
    assert_eq!(engine.get_source(pos(5, 1)), "=A1*2");
    assert_eq!(engine.get_source(pos(6, 1)), "=SUM(A1:A5)");
    assert_eq!(engine.get_value(pos(6, 1)), Value::Number(30.0));
    assert_eq!(engine.dependency_edge_count(), edges_before);
    assert_eq!(engine.row_count(), 100);
    engine.assert_consistent();
}

#[test]
fn deleting_rows_inside_a_sum_range_shrinks_the_rectangle() {
    let mut engine = engine();
    for row in 1..=4 {
        engine.set_value(pos(row, 1), row as f64);
    }
    engine.set_formula(pos(6, 1), "=SUM(A1:A4)");
    assert_eq!(engine.get_value(pos(6, 1)), Value::Number(10.0));

    engine.delete_rows(2, 3); // removes the 2 and the 3

    assert_eq!(engine.get_source(pos(4, 1)), "=SUM(A1:A2)");
    assert_eq!(engine.get_value(pos(4, 1)), Value::Number(5.0));
    engine.assert_consistent();
}

#[test]
fn inserting_rows_inside_a_sum_range_extends_the_rectangle() {
    let mut engine = engine();
    engine.set_value(pos(1, 1), 1.0);
    engine.set_value(pos(4, 1), 4.0);
    engine.set_formula(pos(6, 1), "=SUM(A1:A4)");
    assert_eq!(engine.get_value(pos(6, 1)), Value::Number(5.0));

    engine.insert_rows(2, 2);

    assert_eq!(engine.get_source(pos(8, 1)), "=SUM(A1:A6)");
    // Writing into a freshly inserted in-range row invalidates the sum.
    engine.set_value(pos(2, 1), 10.0);
    assert_eq!(engine.get_value(pos(8, 1)), Value::Number(15.0));
}

#[test]
fn deleting_a_whole_observed_range_collapses_the_formula() {
    let mut engine = engine();
    engine.set_formula(pos(10, 1), "=SUM(A2:A4)");
    engine.delete_rows(2, 4);
    assert_eq!(engine.get_value(pos(7, 1)), Value::Error(ErrorValue::Ref));
    assert_eq!(engine.dependency_edge_count(), 0);
}

#[test]
fn column_splices_mirror_row_splices() {
    let mut engine = engine();
    engine.set_value(pos(1, 1), 7.0);
    engine.set_formula(pos(1, 3), "=A1");

    engine.insert_cols(2, 1);
    assert_eq!(engine.get_source(pos(1, 4)), "=A1");
    assert_eq!(engine.get_value(pos(1, 4)), Value::Number(7.0));

    engine.delete_cols(1, 1);
    assert_eq!(engine.get_value(pos(1, 3)), Value::Error(ErrorValue::Ref));
}

#[test]
fn formulas_in_deleted_rows_disappear_with_their_cells() {
    let mut engine = engine();
    engine.set_value(pos(1, 1), 1.0);
    engine.set_formula(pos(3, 1), "=A1");

    engine.delete_rows(3, 3);

    assert_eq!(engine.cell_count(), 1);
    assert_eq!(engine.dependency_edge_count(), 0);
    assert_eq!(engine.get_value(pos(3, 1)), Value::Blank);
    engine.assert_consistent();
}

#[test]
fn copy_adjusts_relative_and_pins_absolute_references() {
    let mut engine = engine();
    engine.set_value(pos(1, 1), 1.0);
    engine.set_value(pos(2, 1), 2.0);
    engine.set_formula(pos(1, 2), "=A1+$A$1");

    engine.copy(pos(1, 2), pos(2, 2));

    assert_eq!(engine.get_source(pos(2, 2)), "=A2+$A$1");
    assert_eq!(engine.get_value(pos(2, 2)), Value::Number(3.0));
    // The original is untouched.
    assert_eq!(engine.get_source(pos(1, 2)), "=A1+$A$1");
}

#[test]
fn copying_a_value_cell_replaces_the_destination() {
    let mut engine = engine();
    engine.set_value(pos(1, 1), 9.0);
    engine.set_formula(pos(2, 1), "=1+1");

    engine.copy(pos(1, 1), pos(2, 1));
    assert_eq!(engine.get_value(pos(2, 1)), Value::Number(9.0));
    assert_eq!(engine.get_source(pos(2, 1)), "9");

    // Copying an empty cell clears the destination.
    engine.copy(pos(50, 1), pos(2, 1));
    assert_eq!(engine.get_value(pos(2, 1)), Value::Blank);
}

#[test]
fn clearing_a_cell_invalidates_its_consumers() {
    let mut engine = engine();
    engine.set_value(pos(1, 1), 5.0);
    engine.set_formula(pos(2, 1), "=A1+1");
    assert_eq!(engine.get_value(pos(2, 1)), Value::Number(6.0));

    engine.clear(pos(1, 1));
    assert_eq!(engine.get_value(pos(2, 1)), Value::Number(1.0));
    assert_eq!(engine.get_value(pos(1, 1)), Value::Blank);
}
