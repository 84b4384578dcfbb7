//! Property-based test generators using proptest.
//!
//! Cells are generated per declared column type and stay inside what every
//! store round-trips exactly: reals are finite and text never equals the
//! null token.

use proptest::prelude::*;
use tabsync_core::{CellValue, ColumnType, Row, TableDescriptor, NULL_SENTINEL};

/// Strategy for table and column names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for text cells, weighted towards strings the document format
/// has to quote or block.
pub fn text_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "\\PC{0,24}",
        1 => Just(String::new()),
        1 => Just(" leading and trailing ".to_string()),
        1 => Just("key: value # not a comment".to_string()),
        1 => Just("first line\nsecond line\n".to_string()),
        1 => Just("- looks like an item".to_string()),
        1 => Just("\"quoted\" and 'single'".to_string()),
        1 => Just("~".to_string()),
        1 => Just("tab\there\r\n".to_string()),
    ]
    .prop_filter("text must not be the null token", |s| s != NULL_SENTINEL)
}

/// Strategy for blob cells, including empty and all-zero buffers.
pub fn blob_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        4 => prop::collection::vec(any::<u8>(), 0..200),
        1 => (0usize..40).prop_map(|n| vec![0u8; n]),
        1 => Just((0u8..=255).collect::<Vec<u8>>()),
    ]
}

/// Strategy for a non-null cell of the given type.
pub fn value_strategy(column_type: ColumnType) -> BoxedStrategy<CellValue> {
    match column_type {
        ColumnType::Integer => any::<i64>().prop_map(CellValue::Integer).boxed(),
        ColumnType::Real => prop::num::f64::NORMAL
            .prop_union(prop::num::f64::ZERO)
            .prop_map(CellValue::Real)
            .boxed(),
        ColumnType::Text => text_strategy().prop_map(CellValue::Text).boxed(),
        ColumnType::Blob => blob_strategy().prop_map(CellValue::Blob).boxed(),
        ColumnType::Boolean => any::<bool>().prop_map(CellValue::Boolean).boxed(),
    }
}

/// Strategy for a cell of the given type, null one time in five when
/// `nullable`.
pub fn cell_strategy(column_type: ColumnType, nullable: bool) -> BoxedStrategy<CellValue> {
    if nullable {
        prop_oneof![
            1 => Just(CellValue::Null),
            4 => value_strategy(column_type),
        ]
        .boxed()
    } else {
        value_strategy(column_type)
    }
}

/// Strategy for a full row of `table`, every declared column set in
/// declared order.
pub fn row_strategy(table: &TableDescriptor) -> BoxedStrategy<Row> {
    let columns: Vec<(String, BoxedStrategy<CellValue>)> = table
        .columns
        .iter()
        .map(|c| (c.name.clone(), cell_strategy(c.column_type, c.nullable)))
        .collect();

    let names: Vec<String> = columns.iter().map(|(n, _)| n.clone()).collect();
    let cells: Vec<BoxedStrategy<CellValue>> = columns.into_iter().map(|(_, s)| s).collect();

    cells
        .prop_map(move |values| names.iter().cloned().zip(values).collect::<Row>())
        .boxed()
}

/// Strategy for up to `max_rows` rows of `table`.
pub fn rows_strategy(table: &TableDescriptor, max_rows: usize) -> BoxedStrategy<Vec<Row>> {
    prop::collection::vec(row_strategy(table), 0..=max_rows).boxed()
}
