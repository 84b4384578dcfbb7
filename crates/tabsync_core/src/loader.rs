//! File loader: table file to typed rows.

use crate::document::{DocumentError, DocumentRow, TableDocument};
use crate::error::{SyncError, SyncResult};
use crate::sentinel::SentinelCodec;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;
use tabsync_store::{Row, TableDescriptor};
use tracing::{debug, debug_span, warn};

/// What a load found for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLoadReport {
    /// Table name.
    pub table: String,
    /// Whether the table file existed.
    pub file_existed: bool,
    /// Version tag found in the file, if any.
    pub stored_version: Option<String>,
    /// Number of rows read.
    pub rows: usize,
    /// True if the file existed and its version tag differs from the
    /// configured one (a missing tag counts as different).
    pub version_mismatch: bool,
}

/// A loaded table: its rows plus the report.
#[derive(Debug, Clone)]
pub struct TableLoad {
    /// What the load found.
    pub report: TableLoadReport,
    /// Decoded rows, in file order.
    pub rows: Vec<Row>,
}

/// Reads table files and decodes their cells.
#[derive(Debug, Clone)]
pub struct FileLoader {
    codec: SentinelCodec,
    version: String,
}

impl FileLoader {
    /// Creates a loader expecting `version` in the files it reads.
    pub fn new(codec: SentinelCodec, version: impl Into<String>) -> Self {
        Self {
            codec,
            version: version.into(),
        }
    }

    /// Loads one table file.
    ///
    /// A missing file is an empty table. A version tag other than the
    /// configured one is logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns `Parse` if the file is not a table document, `Validation` if
    /// a cell does not decode as its column type or a non-nullable column
    /// holds null, and `Io` if the file cannot be read.
    pub fn load(&self, table: &TableDescriptor, path: &Path) -> SyncResult<TableLoad> {
        let _span = debug_span!("load_table", table = %table.name).entered();

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no table file, loading empty table");
                return Ok(TableLoad {
                    report: TableLoadReport {
                        table: table.name.clone(),
                        file_existed: false,
                        stored_version: None,
                        rows: 0,
                        version_mismatch: false,
                    },
                    rows: Vec::new(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        let parse_error = |message: String| SyncError::Parse {
            table: table.name.clone(),
            path: path.to_path_buf(),
            message,
        };

        let text = String::from_utf8(bytes)
            .map_err(|e| parse_error(format!("file is not valid UTF-8: {e}")))?;
        let document = TableDocument::from_text(&text).map_err(|e| match e {
            DocumentError::Codec(err) => parse_error(err.to_string()),
            DocumentError::Shape(message) => parse_error(message),
        })?;

        let version_mismatch = document.version.as_deref() != Some(self.version.as_str());
        if version_mismatch {
            warn!(
                table = %table.name,
                found = document.version.as_deref().unwrap_or("<none>"),
                expected = %self.version,
                "table file version differs, loading anyway"
            );
        }

        let rows = self.decode_rows(table, &document.rows)?;
        debug!(rows = rows.len(), "table file loaded");

        Ok(TableLoad {
            report: TableLoadReport {
                table: table.name.clone(),
                file_existed: true,
                stored_version: document.version,
                rows: rows.len(),
                version_mismatch,
            },
            rows,
        })
    }

    /// Decodes document rows into typed rows.
    ///
    /// Cells are taken in declared column order. Declared columns a row does
    /// not carry are left out of the row; undeclared ones are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for the first cell that fails to decode.
    pub fn decode_rows(
        &self,
        table: &TableDescriptor,
        rows: &[DocumentRow],
    ) -> SyncResult<Vec<Row>> {
        let mut unknown = BTreeSet::new();

        let decoded = rows
            .iter()
            .enumerate()
            .map(|(index, doc_row)| {
                for (column, _) in doc_row {
                    if table.find_column(column).is_none() {
                        unknown.insert(column.as_str());
                    }
                }

                let mut row = Row::new();
                for column in &table.columns {
                    let Some((_, text)) = doc_row.iter().find(|(name, _)| *name == column.name)
                    else {
                        continue;
                    };

                    let value = self.codec.decode(text, column.column_type).map_err(|e| {
                        SyncError::validation(&table.name, index, &column.name, e.to_string())
                    })?;
                    if value.is_null() && !column.nullable {
                        return Err(SyncError::validation(
                            &table.name,
                            index,
                            &column.name,
                            "null in non-nullable column",
                        ));
                    }
                    row.set(column.name.as_str(), value);
                }
                Ok(row)
            })
            .collect::<SyncResult<Vec<_>>>()?;

        if !unknown.is_empty() {
            debug!(table = %table.name, columns = ?unknown, "ignoring undeclared columns");
        }
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentinel::{BlobEncoding, NULL_SENTINEL};
    use tabsync_store::{CellValue, ColumnType};
    use tempfile::tempdir;

    fn users() -> TableDescriptor {
        TableDescriptor::new("users")
            .column("id", ColumnType::Integer)
            .column("name", ColumnType::Text)
    }

    fn loader() -> FileLoader {
        FileLoader::new(SentinelCodec::default(), "1.0")
    }

    #[test]
    fn missing_file_is_empty_table() {
        let temp = tempdir().unwrap();
        let load = loader()
            .load(&users(), &temp.path().join("users.yaml"))
            .unwrap();

        assert!(load.rows.is_empty());
        assert!(!load.report.file_existed);
        assert!(!load.report.version_mismatch);
    }

    #[test]
    fn load_decodes_cells_in_order() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("users.yaml");
        fs::write(
            &path,
            format!("version: 1.0\nrows:\n  - id: 1\n    name: Ada\n  - name: {NULL_SENTINEL}\n    id: 2\n"),
        )
        .unwrap();

        let load = loader().load(&users(), &path).unwrap();
        assert_eq!(load.report.rows, 2);
        assert!(load.report.file_existed);
        assert_eq!(load.report.stored_version.as_deref(), Some("1.0"));
        assert_eq!(
            load.rows,
            vec![
                Row::new().with("id", 1i64).with("name", "Ada"),
                Row::new().with("id", 2i64).with("name", CellValue::Null),
            ]
        );
    }

    #[test]
    fn absent_column_is_not_null() {
        let rows = loader()
            .decode_rows(&users(), &[vec![("id".into(), "5".into())]])
            .unwrap();
        assert!(!rows[0].contains("name"));
    }

    #[test]
    fn undeclared_columns_are_skipped() {
        let rows = loader()
            .decode_rows(
                &users(),
                &[vec![("extra".into(), "x".into()), ("id".into(), "5".into())]],
            )
            .unwrap();
        assert_eq!(rows[0], Row::new().with("id", 5i64));
    }

    #[test]
    fn foreign_version_is_tolerated() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("users.yaml");
        fs::write(&path, "version: 0.1\nrows:\n  - id: 1\n").unwrap();

        let load = loader().load(&users(), &path).unwrap();
        assert!(load.report.version_mismatch);
        assert_eq!(load.rows.len(), 1);

        fs::write(&path, "rows: []\n").unwrap();
        let load = loader().load(&users(), &path).unwrap();
        assert!(load.report.version_mismatch);
        assert_eq!(load.report.stored_version, None);
    }

    #[test]
    fn unparsable_scalar_is_validation_error() {
        let err = loader()
            .decode_rows(
                &users(),
                &[
                    vec![("id".into(), "1".into())],
                    vec![("id".into(), "one".into())],
                ],
            )
            .unwrap_err();

        match err {
            SyncError::Validation { table, row, column, .. } => {
                assert_eq!(table, "users");
                assert_eq!(row, 1);
                assert_eq!(column, "id");
            }
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn null_in_non_nullable_column() {
        let table = TableDescriptor::new("t")
            .with_column(tabsync_store::ColumnDescriptor::new("id", ColumnType::Text).not_null());
        let err = loader()
            .decode_rows(&table, &[vec![("id".into(), NULL_SENTINEL.into())]])
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation { .. }));
    }

    #[test]
    fn malformed_blob_is_validation_error() {
        let table = TableDescriptor::new("files").column("data", ColumnType::Blob);
        let loader = FileLoader::new(SentinelCodec::new(NULL_SENTINEL, BlobEncoding::Base64), "1.0");
        let err = loader
            .decode_rows(&table, &[vec![("data".into(), "<:__BASE64__:>\n@@@@".into())]])
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation { .. }));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("users.yaml");

        for content in [&b"rows:\n  - id: \"1\n"[..], &b"rows: 3\n"[..], &b"\xff\xfe"[..]] {
            fs::write(&path, content).unwrap();
            let err = loader().load(&users(), &path).unwrap_err();
            assert!(matches!(err, SyncError::Parse { .. }), "{err}");
        }
    }
}
