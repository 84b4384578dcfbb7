//! Benchmark utilities.

#![warn(missing_docs)]

use rand::Rng;
use tabsync_core::{ColumnType, Row, TableDescriptor};

/// Generate random bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// A table with one column of each scalar type plus a blob.
pub fn bench_table(name: &str) -> TableDescriptor {
    TableDescriptor::new(name)
        .column("id", ColumnType::Integer)
        .column("name", ColumnType::Text)
        .column("score", ColumnType::Real)
        .column("active", ColumnType::Boolean)
        .column("payload", ColumnType::Blob)
}

/// Generate `count` rows for [`bench_table`] with blobs of `payload_size`.
pub fn generate_rows(count: usize, payload_size: usize) -> Vec<Row> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            Row::new()
                .with("id", i as i64)
                .with("name", format!("user {i}"))
                .with("score", rng.gen_range(0.0..100.0f64))
                .with("active", rng.gen_bool(0.5))
                .with("payload", random_data(payload_size))
        })
        .collect()
}
