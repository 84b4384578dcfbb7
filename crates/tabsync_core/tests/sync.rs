//! Integration tests for the synchronizer against SQLite and in-memory stores.

use std::fs;
use tabsync_core::{
    BlobEncoding, CellValue, ColumnDescriptor, ColumnType, InMemoryStore, Phase,
    RelationalStore, Row, SqliteStore, StoreError, SyncConfig, SyncError, SyncState, Synchronizer,
    TableDescriptor, NULL_SENTINEL,
};
use tabsync_testkit::prelude::*;

// ============================================================================
// Scenario
// ============================================================================

#[test]
fn users_round_trip_through_files() {
    init_tracing();
    let root = TestRoot::new();
    let users = scenarios::users_table();

    let mut sync = root.sqlite_sync(vec![users.clone()], 2);
    sync.run(|store| {
        store.insert_rows(&users, &scenarios::users_rows())?;
        Ok::<_, SyncError>(())
    })
    .unwrap();

    assert_eq!(
        root.read_table("users"),
        format!("version: 1.0\nrows:\n  - id: 1\n    name: Ada\n  - id: 2\n    name: {NULL_SENTINEL}\n")
    );

    let mut fresh = root.sqlite_sync(vec![users.clone()], 2);
    let scope = fresh.open().unwrap();
    let rows = scope.store().scan_table(&users).unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("name"), Some(&CellValue::from("Ada")));
    assert_eq!(rows[1].get("name"), Some(&CellValue::Null));
    assert_ne!(rows[1].get("name"), Some(&CellValue::from(NULL_SENTINEL)));
    scope.close().unwrap();
}

#[test]
fn sql_changes_are_saved_on_close() {
    let root = TestRoot::new();
    root.write_table(
        "users",
        "version: 1.0\nrows:\n  - id: 1\n    name: Ada\n  - id: 2\n    name: Grace\n",
    );

    let mut sync = root.sqlite_sync(vec![scenarios::users_table()], 1);
    let scope = sync.open().unwrap();
    scope
        .store()
        .connection()
        .execute("UPDATE users SET name = NULL WHERE id = '2'", [])
        .unwrap();
    scope
        .store()
        .connection()
        .execute("INSERT INTO users (id, name) VALUES ('3', 'Linus')", [])
        .unwrap();
    scope.close().unwrap();

    assert_eq!(
        root.read_table("users"),
        format!(
            "version: 1.0\nrows:\n  - id: 1\n    name: Ada\n  - id: 2\n    name: {NULL_SENTINEL}\n  - id: 3\n    name: Linus\n"
        )
    );
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn absent_files_load_as_empty_tables() {
    let root = TestRoot::new();
    let tables = scenarios::numbered_tables(3);

    let mut sync = root.sqlite_sync(tables.clone(), 3);
    let scope = sync.open().unwrap();

    for (table, report) in tables.iter().zip(scope.load_report()) {
        assert_eq!(report.table, table.name);
        assert!(!report.file_existed);
        assert_eq!(report.rows, 0);
        assert!(scope.store().scan_table(table).unwrap().is_empty());
    }
    scope.abort();
}

#[test]
fn foreign_and_missing_versions_are_rewritten() {
    let root = TestRoot::new();
    root.write_table("users", "version: 0.7\nrows:\n  - id: 1\n    name: Ada\n");
    root.write_table("legacy", "_naay_version: 0.9\nrows:\n  - id: 1\n");
    root.write_table("bare", "rows:\n  - id: 1\n");

    let legacy = TableDescriptor::new("legacy").column("id", ColumnType::Integer);
    let bare = TableDescriptor::new("bare").column("id", ColumnType::Integer);
    let mut sync = root.sqlite_sync(vec![scenarios::users_table(), legacy, bare], 2);

    let scope = sync.open().unwrap();
    let reports = scope.load_report();
    assert!(reports.iter().all(|r| r.version_mismatch && r.rows == 1));
    assert_eq!(reports[0].stored_version.as_deref(), Some("0.7"));
    assert_eq!(reports[1].stored_version.as_deref(), Some("0.9"));
    assert_eq!(reports[2].stored_version, None);
    scope.close().unwrap();

    for table in ["users", "legacy", "bare"] {
        assert!(root.read_table(table).starts_with("version: 1.0\n"), "{table}");
        assert!(!root.read_table(table).contains("_naay_version"));
    }
}

#[test]
fn hand_edited_files_load() {
    let root = TestRoot::new();
    root.write_table(
        "users",
        "# maintained by hand\n---\nversion: '1.0'\nrows:\n- id: \"1\"\n  name: Ada   # first\n\n- name: 'Grace Hopper'\n  id: 2\n...\n",
    );

    let users = scenarios::users_table();
    let mut sync = root.sqlite_sync(vec![users.clone()], 1);
    let scope = sync.open().unwrap();
    assert_eq!(
        scope.store().scan_table(&users).unwrap(),
        vec![
            Row::new().with("id", "1").with("name", "Ada"),
            Row::new().with("id", "2").with("name", "Grace Hopper"),
        ]
    );
    assert!(!scope.load_report()[0].version_mismatch);
    scope.abort();
}

#[test]
fn failed_load_rolls_back_every_table() {
    let root = TestRoot::new();
    let tables = scenarios::numbered_tables(3);
    root.write_table("t0", "version: 1.0\nrows:\n  - id: 10\n    value: fresh\n");
    root.write_table("t2", "version: 1.0\nrows:\n  - id: not-a-number\n");

    let mut store = SqliteStore::open_in_memory().unwrap();
    for (i, table) in tables.iter().enumerate() {
        seed(&mut store, table, &scenarios::numbered_rows(i, 2));
    }

    let mut sync = Synchronizer::new(tables.clone(), store, root.config().with_workers(3)).unwrap();
    let err = sync.open().unwrap_err();

    assert!(
        matches!(&err, SyncError::Validation { table, row: 0, column, .. } if table == "t2" && column == "id"),
        "{err}"
    );
    assert_eq!(sync.state(), SyncState::Idle);
    for (i, table) in tables.iter().enumerate() {
        assert_eq!(dump_rows(sync.store(), table), scenarios::numbered_rows(i, 2));
    }
}

#[test]
fn insert_failure_rolls_back_earlier_tables() {
    let root = TestRoot::new();
    let t0 = scenarios::numbered_tables(1).remove(0);
    let keys = TableDescriptor::new("keys")
        .with_column(ColumnDescriptor::new("code", ColumnType::Text).primary_key());
    root.write_table("t0", "version: 1.0\nrows:\n  - id: 10\n    value: fresh\n");
    root.write_table("keys", "version: 1.0\nrows:\n  - code: a\n  - code: a\n");

    let mut store = SqliteStore::open_in_memory().unwrap();
    seed(&mut store, &t0, &scenarios::numbered_rows(0, 2));

    let mut sync = Synchronizer::new(vec![t0.clone(), keys], store, root.config()).unwrap();
    let err = sync.open().unwrap_err();

    assert_eq!(err.table(), Some("keys"));
    assert!(matches!(&err, SyncError::Table { source, .. } if matches!(**source, SyncError::Store(_))));
    assert_eq!(dump_rows(sync.store(), &t0), scenarios::numbered_rows(0, 2));
}

#[test]
fn several_broken_files_are_all_reported() {
    let root = TestRoot::new();
    let tables = scenarios::numbered_tables(4);
    root.write_table("t1", "rows: [\n");
    root.write_table("t3", "rows:\n  - plain\n");

    let mut sync = root.sqlite_sync(tables, 4);
    let err = sync.open().unwrap_err();

    match err {
        SyncError::Phase { phase, failures } => {
            assert_eq!(phase, Phase::Load);
            let tables: Vec<_> = failures.iter().filter_map(SyncError::table).collect();
            assert_eq!(tables, vec!["t1", "t3"]);
        }
        other => panic!("expected a phase error, got {other}"),
    }
}

#[test]
fn non_nullable_column_rejects_null_token() {
    let root = TestRoot::new();
    root.write_table(
        "mixed",
        &format!("version: 1.0\nrows:\n  - key: {NULL_SENTINEL}\n"),
    );

    let mut sync = root.memory_sync(vec![scenarios::mixed_table()], 1);
    let err = sync.open().unwrap_err();
    assert!(matches!(err, SyncError::Validation { .. }));
}

#[test]
fn absent_column_takes_the_store_default() {
    let root = TestRoot::new();
    root.write_table("users", "version: 1.0\nrows:\n  - id: 1\n");

    let users = scenarios::users_table();
    let mut sync = root.sqlite_sync(vec![users.clone()], 1);
    let scope = sync.open().unwrap();
    let rows = scope.store().scan_table(&users).unwrap();
    assert_eq!(rows[0].get("name"), Some(&CellValue::Null));
    scope.close().unwrap();

    // Written back in full once saved.
    assert!(root.read_table("users").contains(&format!("name: {NULL_SENTINEL}")));
}

// ============================================================================
// Saving
// ============================================================================

#[test]
fn saving_twice_is_byte_identical() {
    let root = TestRoot::new();
    let table = scenarios::mixed_table();
    let rows = vec![
        Row::new()
            .with("key", "a")
            .with("count", 3i64)
            .with("ratio", 0.25f64)
            .with("label", "multi\nline\n")
            .with("payload", (0u8..=255).collect::<Vec<_>>())
            .with("active", true),
        Row::new()
            .with("key", "b")
            .with("count", CellValue::Null)
            .with("ratio", -1.5e300f64)
            .with("label", "")
            .with("payload", Vec::<u8>::new())
            .with("active", false),
    ];

    let mut sync = root.sqlite_sync(vec![table.clone()], 1);
    let mut scope = sync.open().unwrap();
    scope.store_mut().insert_rows(&table, &rows).unwrap();

    assert_eq!(scope.save().unwrap(), 2);
    let first = root.read_table_bytes("mixed");
    scope.close().unwrap();
    assert_eq!(root.read_table_bytes("mixed"), first);

    let mut again = root.sqlite_sync(vec![table.clone()], 1);
    again.open().unwrap().close().unwrap();
    assert_eq!(root.read_table_bytes("mixed"), first);
}

#[test]
fn integer_key_table_keeps_file_order() {
    let root = TestRoot::new();
    let table = TableDescriptor::new("keyed")
        .with_column(ColumnDescriptor::new("id", ColumnType::Integer).primary_key())
        .column("name", ColumnType::Text);
    let text = "version: 1.0\nrows:\n  - id: 2\n    name: b\n  - id: 1\n    name: a\n";
    root.write_table("keyed", text);

    let mut sync = root.sqlite_sync(vec![table], 1);
    sync.open().unwrap().close().unwrap();

    assert_eq!(root.read_table("keyed"), text);
}

#[test]
fn non_utf8_bytes_in_text_column_fail_the_save() {
    let root = TestRoot::new();
    let users = scenarios::users_table();
    let original = "version: 1.0\nrows:\n  - id: 1\n    name: Ada\n";
    root.write_table("users", original);

    let mut sync = root.sqlite_sync(vec![users], 1);
    let scope = sync.open().unwrap();
    scope
        .store()
        .connection()
        .execute("UPDATE users SET name = x'ff00fe'", [])
        .unwrap();

    let failed = scope.close().unwrap_err();
    assert_eq!(failed.error().table(), Some("users"));
    assert!(matches!(
        failed.error(),
        SyncError::Table { source, .. }
            if matches!(**source, SyncError::Store(StoreError::Conversion { .. }))
    ));
    drop(failed);
    assert_eq!(root.read_table("users"), original);
}

#[test]
fn abnormal_exit_leaves_files_untouched() {
    let root = TestRoot::new();
    let original = "version: 1.0\nrows:\n  - id: 1\n    name: Ada\n";
    root.write_table("users", original);

    let users = scenarios::users_table();
    let mut sync = root.sqlite_sync(vec![users.clone()], 1);
    let result: Result<(), SyncError> = sync.run(|store| {
        store.clear_table(&users)?;
        Err(SyncError::invalid_config("caller gave up"))
    });

    assert!(result.is_err());
    assert_eq!(sync.state(), SyncState::Closed);
    assert_eq!(root.read_table("users"), original);
}

#[test]
fn closed_synchronizer_cannot_reopen() {
    let root = TestRoot::new();
    let mut sync = root.memory_sync(vec![scenarios::users_table()], 1);
    sync.open().unwrap().close().unwrap();

    assert!(matches!(
        sync.open(),
        Err(SyncError::InvalidStateTransition { from: SyncState::Closed, .. })
    ));
}

#[test]
fn failed_close_can_be_retried() {
    let root = TestRoot::new();
    let users = scenarios::users_table();
    let mut sync = root.memory_sync(vec![users.clone()], 1);

    let mut scope = sync.open().unwrap();
    scope
        .store_mut()
        .insert_rows(&users, &scenarios::users_rows())
        .unwrap();

    // A directory where the file should go makes the rename fail.
    fs::create_dir(root.table_path("users")).unwrap();
    let failed = scope.close().unwrap_err();
    assert_eq!(failed.error().table(), Some("users"));

    fs::remove_dir(root.table_path("users")).unwrap();
    failed.into_scope().close().unwrap();
    assert_eq!(sync.state(), SyncState::Closed);
    assert!(root.read_table("users").contains("name: Ada"));
}

#[test]
fn partial_save_failure_keeps_sibling_files() {
    let root = TestRoot::new();
    let tables = scenarios::numbered_tables(3);
    let mut sync = root.memory_sync(tables.clone(), 3);

    let mut scope = sync.open().unwrap();
    for (i, table) in tables.iter().enumerate() {
        scope
            .store_mut()
            .insert_rows(table, &scenarios::numbered_rows(i, 3))
            .unwrap();
    }

    fs::create_dir(root.table_path("t1")).unwrap();
    let err = scope.save().unwrap_err();
    assert_eq!(err.table(), Some("t1"));
    assert!(root.has_table_file("t0"));
    assert!(root.has_table_file("t2"));
    scope.abort();
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn base64_files_load_under_base85_config() {
    let root = TestRoot::new();
    let table = TableDescriptor::new("files")
        .with_column(ColumnDescriptor::new("name", ColumnType::Text).primary_key())
        .column("data", ColumnType::Blob);
    let rows = vec![
        Row::new().with("name", "zeros").with("data", vec![0u8; 9]),
        Row::new().with("name", "empty").with("data", Vec::<u8>::new()),
    ];

    let config = root.config().with_blob_encoding(BlobEncoding::Base64);
    let mut writer =
        Synchronizer::new(vec![table.clone()], InMemoryStore::new(), config).unwrap();
    writer
        .run(|store| {
            store.insert_rows(&table, &rows)?;
            Ok::<_, SyncError>(())
        })
        .unwrap();
    assert!(root.read_table("files").contains("<:__BASE64__:>"));

    let mut reader = root.sqlite_sync(vec![table.clone()], 1);
    let scope = reader.open().unwrap();
    assert_eq!(scope.store().scan_table(&table).unwrap(), rows);
    scope.close().unwrap();
    assert!(root.read_table("files").contains("<:__BASE85__:>"));
}

#[test]
fn custom_null_token_and_extension() {
    let root = TestRoot::new();
    let users = scenarios::users_table();
    let config = root
        .config()
        .with_null_token("~null~")
        .with_file_extension("yml")
        .with_format_version("2.0");

    let mut sync = Synchronizer::new(vec![users.clone()], InMemoryStore::new(), config).unwrap();
    sync.run(|store| {
        store.insert_rows(&users, &scenarios::users_rows())?;
        Ok::<_, SyncError>(())
    })
    .unwrap();

    let text = fs::read_to_string(root.path().join("users.yml")).unwrap();
    assert_eq!(
        text,
        "version: 2.0\nrows:\n  - id: 1\n    name: Ada\n  - id: 2\n    name: \"~null~\"\n"
    );
}

#[test]
fn config_from_options_drives_a_sync() {
    let root = TestRoot::new();
    let path = root.path().to_string_lossy().into_owned();
    let config = SyncConfig::from_options([
        ("storage_path", path.as_str()),
        ("write_workers", "2"),
        ("blob_encoding", "base64"),
    ])
    .unwrap();

    let mut sync =
        Synchronizer::new(vec![scenarios::users_table()], InMemoryStore::new(), config).unwrap();
    sync.open().unwrap().close().unwrap();
    assert_eq!(root.read_table("users"), "version: 1.0\nrows: []\n");
}

#[test]
fn config_from_json() {
    let config: SyncConfig = serde_json::from_str(
        r#"{"storage_root": "/var/lib/tables", "workers": 4, "lock_directory": false}"#,
    )
    .unwrap();

    assert_eq!(config.resolved_workers(), 4);
    assert!(!config.lock_directory);
    assert_eq!(config.file_extension, "yaml");
}

#[test]
fn unlocked_roots_allow_two_scopes() {
    let root = TestRoot::new();
    let config = root.config().with_lock_directory(false);
    let mut first =
        Synchronizer::new(vec![scenarios::users_table()], InMemoryStore::new(), config.clone())
            .unwrap();
    let mut second =
        Synchronizer::new(vec![scenarios::users_table()], InMemoryStore::new(), config).unwrap();

    let a = first.open().unwrap();
    let b = second.open().unwrap();
    a.abort();
    b.abort();
}
