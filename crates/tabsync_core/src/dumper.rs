//! File dumper: typed rows to table file.

use crate::dir::write_atomic;
use crate::document::{DocumentRow, TableDocument};
use crate::error::SyncResult;
use crate::sentinel::SentinelCodec;
use std::path::Path;
use tabsync_store::{CellValue, Row, TableDescriptor};
use tracing::{debug, debug_span};

/// Encodes rows and writes table files.
#[derive(Debug, Clone)]
pub struct FileDumper {
    codec: SentinelCodec,
    version: String,
}

impl FileDumper {
    /// Creates a dumper that stamps files with `version`.
    pub fn new(codec: SentinelCodec, version: impl Into<String>) -> Self {
        Self {
            codec,
            version: version.into(),
        }
    }

    /// Encodes rows into document rows.
    ///
    /// Every declared column is written, in declared order. A column the row
    /// does not carry is written as null.
    pub fn encode_rows(&self, table: &TableDescriptor, rows: &[Row]) -> Vec<DocumentRow> {
        rows.iter()
            .map(|row| {
                table
                    .columns
                    .iter()
                    .map(|column| {
                        let value = row.get(&column.name).unwrap_or(&CellValue::Null);
                        (column.name.clone(), self.codec.encode(value, column.column_type))
                    })
                    .collect()
            })
            .collect()
    }

    /// Renders the table file text for `rows`.
    pub fn render(&self, table: &TableDescriptor, rows: &[Row]) -> String {
        TableDocument::new(self.version.as_str(), self.encode_rows(table, rows)).to_text()
    }

    /// Writes the table file atomically and returns the number of rows.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written. The previous file,
    /// if any, is left in place.
    pub fn dump(&self, table: &TableDescriptor, rows: &[Row], path: &Path) -> SyncResult<usize> {
        let _span = debug_span!("dump_table", table = %table.name).entered();

        let text = self.render(table, rows);
        write_atomic(path, text.as_bytes())?;

        debug!(rows = rows.len(), bytes = text.len(), "table file written");
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::FileLoader;
    use crate::sentinel::{BlobEncoding, NULL_SENTINEL};
    use std::fs;
    use tabsync_store::ColumnType;
    use tempfile::tempdir;

    fn dumper() -> FileDumper {
        FileDumper::new(SentinelCodec::default(), "1.0")
    }

    #[test]
    fn render_writes_declared_columns_in_order() {
        let table = TableDescriptor::new("users")
            .column("id", ColumnType::Integer)
            .column("name", ColumnType::Text);
        let rows = vec![
            Row::new().with("name", "Ada").with("id", 1i64),
            Row::new().with("id", 2i64),
        ];

        assert_eq!(
            dumper().render(&table, &rows),
            format!(
                "version: 1.0\nrows:\n  - id: 1\n    name: Ada\n  - id: 2\n    name: {NULL_SENTINEL}\n"
            )
        );
    }

    #[test]
    fn render_empty_table() {
        let table = TableDescriptor::new("t").column("a", ColumnType::Text);
        assert_eq!(dumper().render(&table, &[]), "version: 1.0\nrows: []\n");
    }

    #[test]
    fn blob_cells_become_literal_blocks() {
        let table = TableDescriptor::new("files").column("data", ColumnType::Blob);
        let rows = vec![Row::new().with("data", b"Man ".to_vec())];

        let text = dumper().render(&table, &rows);
        assert_eq!(
            text,
            "version: 1.0\nrows:\n  - data: |-\n      <:__BASE85__:>\n      9jqo^\n"
        );
    }

    #[test]
    fn dump_then_load_round_trips() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("sub").join("mixed.yaml");
        let table = TableDescriptor::new("mixed")
            .column("i", ColumnType::Integer)
            .column("r", ColumnType::Real)
            .column("t", ColumnType::Text)
            .column("b", ColumnType::Blob)
            .column("f", ColumnType::Boolean);
        let rows = vec![
            Row::new()
                .with("i", -7i64)
                .with("r", 0.1f64)
                .with("t", "line one\nline two")
                .with("b", (0u8..=255).collect::<Vec<_>>())
                .with("f", true),
            Row::new()
                .with("i", CellValue::Null)
                .with("r", CellValue::Null)
                .with("t", "")
                .with("b", Vec::<u8>::new())
                .with("f", false),
        ];

        for encoding in [BlobEncoding::Base85, BlobEncoding::Base64] {
            let codec = SentinelCodec::new(NULL_SENTINEL, encoding);
            let written = FileDumper::new(codec.clone(), "1.0")
                .dump(&table, &rows, &path)
                .unwrap();
            assert_eq!(written, 2);

            let load = FileLoader::new(codec, "1.0").load(&table, &path).unwrap();
            assert_eq!(load.rows, rows);
            assert!(!load.report.version_mismatch);
        }
    }

    #[test]
    fn dump_is_byte_stable() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("t.yaml");
        let table = TableDescriptor::new("t").column("a", ColumnType::Text);
        let rows = vec![Row::new().with("a", "x: y")];

        dumper().dump(&table, &rows, &path).unwrap();
        let first = fs::read(&path).unwrap();
        dumper().dump(&table, &rows, &path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
    }
}
