use std::fs;

use xbase::{
    config::Config,
    executor::{table_editor::TableEditor, table_reader::TableReader},
    storage::{edit_session::SessionPhase, header::Header, schema::ColumnSpec},
    types::{error::XBaseError, field_type::FieldType, table_type::TableType, value::Value},
    utils::mock::TempTable,
};

fn contacts(table: &TempTable, table_type: TableType) {
    table
        .create(
            Header::new(table_type),
            &[
                ColumnSpec::new("name", FieldType::Char).length(16),
                ColumnSpec::new("age", FieldType::Numeric).length(3),
                ColumnSpec::new("notes", FieldType::Memo),
            ],
        )
        .expect("create table");
}

fn add_contact(editor: &mut TableEditor, name: &str, age: i64, notes: Option<&str>) {
    let mut record = editor.append_record().unwrap();
    record
        .set("name", name)
        .unwrap()
        .set("age", age)
        .unwrap()
        .set("notes", notes)
        .unwrap();
    editor.write_record(&mut record).unwrap();
}

fn names(table: &TempTable) -> Vec<String> {
    let mut reader = TableReader::open(&table.path).unwrap();
    reader
        .records()
        .map(|r| r.unwrap().get("name").and_then(Value::as_str).unwrap().to_string())
        .collect()
}

#[test]
fn test_append_and_save() {
    let table = TempTable::new().unwrap();
    contacts(&table, TableType::DBase3Memo);

    let mut editor = TableEditor::open(&table.path).unwrap();
    assert_eq!(editor.phase(), SessionPhase::Opened);
    add_contact(&mut editor, "Ada", 36, Some("wrote the first program"));
    add_contact(&mut editor, "Alan", 41, None);
    assert_eq!(editor.phase(), SessionPhase::Cloned);
    assert_eq!(editor.record_count(), 2);
    editor.save().unwrap();
    assert_eq!(editor.phase(), SessionPhase::Finalized);
    editor.close().unwrap();

    assert_eq!(table.files().unwrap(), vec!["test.dbf", "test.dbt"]);
    let mut reader = TableReader::open(&table.path).unwrap();
    assert_eq!(reader.record_count(), 2);
    let ada = reader.record(0).unwrap();
    assert_eq!(ada.get("age"), Some(&Value::Integer(36)));
    assert_eq!(ada.get("notes"), Some(&Value::Text("wrote the first program".into())));
    let alan = reader.record(1).unwrap();
    assert_eq!(alan.get("notes"), Some(&Value::Null));
}

#[test]
fn test_abandoned_session_keeps_original_bytes() {
    let table = TempTable::new().unwrap();
    contacts(&table, TableType::DBase3Memo);
    let mut editor = TableEditor::open(&table.path).unwrap();
    add_contact(&mut editor, "Grace", 85, Some("compilers"));
    editor.save().unwrap();
    editor.close().unwrap();

    let table_before = fs::read(&table.path).unwrap();
    let memo_before = fs::read(table.sibling("test.dbt")).unwrap();

    let mut editor = TableEditor::open(&table.path).unwrap();
    add_contact(&mut editor, "Edsger", 72, Some("structured programming"));
    let mut first = editor.record(0).unwrap();
    first.set("age", 86).unwrap();
    editor.write_record(&mut first).unwrap();
    editor.delete_record(0).unwrap();
    editor.close().unwrap();

    assert_eq!(fs::read(&table.path).unwrap(), table_before);
    assert_eq!(fs::read(table.sibling("test.dbt")).unwrap(), memo_before);
    assert_eq!(table.files().unwrap(), vec!["test.dbf", "test.dbt"]);

    // Dropping without close behaves the same.
    {
        let mut editor = TableEditor::open(&table.path).unwrap();
        add_contact(&mut editor, "Barbara", 30, None);
    }
    assert_eq!(fs::read(&table.path).unwrap(), table_before);
    assert_eq!(table.files().unwrap(), vec!["test.dbf", "test.dbt"]);
}

#[test]
fn test_reads_see_unsaved_writes() {
    let table = TempTable::new().unwrap();
    contacts(&table, TableType::DBase4Memo);

    let mut editor = TableEditor::open(&table.path).unwrap();
    add_contact(&mut editor, "Ken", 80, Some("unix"));
    let record = editor.record(0).unwrap();
    assert_eq!(record.get("name").and_then(Value::as_str), Some("Ken"));
    assert_eq!(record.get("notes").and_then(Value::as_str), Some("unix"));

    // The original still has no records.
    assert_eq!(TableReader::open(&table.path).unwrap().record_count(), 0);
}

#[test]
fn test_update_existing_record() {
    let table = TempTable::new().unwrap();
    contacts(&table, TableType::FoxProMemo);
    let mut editor = TableEditor::open(&table.path).unwrap();
    add_contact(&mut editor, "Dennis", 70, Some("c"));
    add_contact(&mut editor, "Brian", 80, Some("awk"));
    editor.save().unwrap();

    let mut record = editor.record(1).unwrap();
    record.set("notes", "the c programming language").unwrap();
    assert!(record.has_pending_memos());
    editor.write_record(&mut record).unwrap();
    assert!(!record.has_pending_memos());
    editor.save().unwrap();

    let mut reader = TableReader::open(&table.path).unwrap();
    assert_eq!(reader.record_count(), 2);
    assert_eq!(
        reader.record(1).unwrap().get("notes"),
        Some(&Value::Text("the c programming language".into()))
    );
    assert_eq!(
        reader.record(0).unwrap().get("notes"),
        Some(&Value::Text("c".into()))
    );
}

#[test]
fn test_save_without_writes_changes_nothing() {
    let table = TempTable::new().unwrap();
    contacts(&table, TableType::DBase3Memo);
    let before = fs::read(&table.path).unwrap();

    let mut editor = TableEditor::open(&table.path).unwrap();
    editor.save().unwrap();
    assert_eq!(editor.phase(), SessionPhase::Opened);
    assert_eq!(fs::read(&table.path).unwrap(), before);
}

#[test]
fn test_delete_undelete_and_pack() {
    let table = TempTable::new().unwrap();
    contacts(&table, TableType::DBase3Memo);
    let mut editor = TableEditor::open(&table.path).unwrap();
    for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
        add_contact(&mut editor, name, i as i64, None);
    }
    editor.delete_record(1).unwrap();
    editor.delete_record(2).unwrap();
    editor.undelete_record(2).unwrap();
    assert!(editor.record(1).unwrap().is_deleted());
    assert!(!editor.record(2).unwrap().is_deleted());
    editor.save().unwrap();

    let mut reader = TableReader::open(&table.path).unwrap();
    assert_eq!(reader.record_count(), 4);
    assert!(reader.record(1).unwrap().is_deleted());
    drop(reader);

    assert_eq!(editor.pack().unwrap(), 1);
    assert_eq!(editor.record_count(), 3);
    editor.save().unwrap();

    assert_eq!(names(&table), vec!["a", "c", "d"]);
    let header_length = TableReader::open(&table.path).unwrap().header_length() as u64;
    let record_length = 1 + 16 + 3 + 10;
    assert_eq!(
        fs::metadata(&table.path).unwrap().len(),
        header_length + 3 * record_length + 1
    );
}

#[test]
fn test_bounds_and_column_errors() {
    let table = TempTable::new().unwrap();
    contacts(&table, TableType::DBase3Memo);
    let mut editor = TableEditor::open(&table.path).unwrap();
    add_contact(&mut editor, "x", 1, None);

    assert!(matches!(
        editor.record(1),
        Err(XBaseError::RecordOutOfBounds { index: 1, count: 1 })
    ));
    assert!(matches!(
        editor.delete_record(5),
        Err(XBaseError::RecordOutOfBounds { .. })
    ));

    let mut record = editor.append_record().unwrap();
    assert_eq!(record.index(), 1);
    assert!(matches!(
        record.set("nope", 1),
        Err(XBaseError::ColumnNotFound { .. })
    ));
    assert!(matches!(
        record.set("age", 1000),
        Err(XBaseError::NumericOverflow { .. })
    ));
    assert!(matches!(
        record.set("name", "a name longer than sixteen"),
        Err(XBaseError::Codec { .. })
    ));
    // Failed assignments leave the record blank.
    assert_eq!(record.get("age"), Some(&Value::Null));
    assert_eq!(record.get("name"), Some(&Value::Text(String::new())));
}

#[test]
fn test_pending_appends_get_distinct_indices() {
    let table = TempTable::new().unwrap();
    contacts(&table, TableType::DBase3Memo);
    let mut editor = TableEditor::open(&table.path).unwrap();

    let mut first = editor.append_record().unwrap();
    first.set("name", "first").unwrap();
    let mut second = editor.append_record().unwrap();
    second.set("name", "second").unwrap();
    assert_eq!((first.index(), second.index()), (0, 1));
    assert!(first.is_new());

    editor.write_record(&mut first).unwrap();
    editor.write_record(&mut second).unwrap();
    assert!(!first.is_new());
    assert_eq!(editor.record_count(), 2);
    editor.save().unwrap();
    editor.close().unwrap();

    assert_eq!(names(&table), vec!["first", "second"]);
}

#[test]
fn test_appends_are_written_in_order() {
    let table = TempTable::new().unwrap();
    contacts(&table, TableType::DBase3Memo);
    let mut editor = TableEditor::open(&table.path).unwrap();

    let mut first = editor.append_record().unwrap();
    let mut second = editor.append_record().unwrap();
    second.set("name", "second").unwrap();
    assert!(matches!(
        editor.write_record(&mut second),
        Err(XBaseError::UnsupportedOperation { .. })
    ));
    assert_eq!(editor.record_count(), 0);

    first.set("name", "first").unwrap();
    editor.write_record(&mut first).unwrap();
    editor.write_record(&mut second).unwrap();

    // Once written, the record is an ordinary row and rewrites in place.
    second.set("name", "again").unwrap();
    editor.write_record(&mut second).unwrap();
    assert_eq!(editor.record_count(), 2);
    editor.save().unwrap().close().unwrap();

    assert_eq!(names(&table), vec!["first", "again"]);
}

#[test]
fn test_append_taken_before_pack_is_rejected() {
    let table = TempTable::new().unwrap();
    contacts(&table, TableType::DBase3Memo);
    let mut editor = TableEditor::open(&table.path).unwrap();
    add_contact(&mut editor, "gone", 1, None);
    add_contact(&mut editor, "kept", 2, None);
    editor.delete_record(0).unwrap();

    let mut stale = editor.append_record().unwrap();
    assert_eq!(stale.index(), 2);
    assert_eq!(editor.pack().unwrap(), 1);
    assert!(matches!(
        editor.write_record(&mut stale),
        Err(XBaseError::UnsupportedOperation { .. })
    ));

    let fresh = editor.append_record().unwrap();
    assert_eq!(fresh.index(), 1);
    editor.close().unwrap();
}

#[test]
fn test_save_then_close_chain() {
    let table = TempTable::new().unwrap();
    contacts(&table, TableType::DBase3Memo);
    let mut editor = TableEditor::open(&table.path).unwrap();
    add_contact(&mut editor, "chained", 7, Some("saved then closed"));
    editor.save().unwrap().close().unwrap();

    assert_eq!(editor.phase(), SessionPhase::Discarded);
    let mut record = editor.append_record().unwrap();
    assert!(matches!(
        editor.write_record(&mut record),
        Err(XBaseError::UnsupportedOperation { .. })
    ));
    assert_eq!(table.files().unwrap(), vec!["test.dbf", "test.dbt"]);
    assert_eq!(names(&table), vec!["chained"]);
}

#[test]
fn test_dbase3_memo_rejects_terminator_pair() {
    let payload = vec![1u8, 2, 0x1A, 0x1A, 3, 4, 5];

    let table = TempTable::new().unwrap();
    contacts(&table, TableType::DBase3Memo);
    let mut editor = TableEditor::open(&table.path).unwrap();
    let mut record = editor.append_record().unwrap();
    assert!(matches!(
        record.set("notes", payload.clone()),
        Err(XBaseError::Codec { .. })
    ));
    assert_eq!(record.get("notes"), Some(&Value::Null));
    assert!(!record.has_pending_memos());
    editor.close().unwrap();

    // dBase IV entries carry their length, so the same bytes survive.
    let table = TempTable::new().unwrap();
    contacts(&table, TableType::DBase4Memo);
    let mut editor = TableEditor::open(&table.path).unwrap();
    let mut record = editor.append_record().unwrap();
    record.set("name", "binary").unwrap().set("notes", payload.clone()).unwrap();
    editor.write_record(&mut record).unwrap();
    editor.save().unwrap().close().unwrap();

    let mut reader = TableReader::open(&table.path).unwrap();
    let stored = reader.record(0).unwrap();
    assert_eq!(stored.get("notes").and_then(Value::as_bytes), Some(&payload[..]));
}

#[test]
fn test_failed_save_keeps_error_and_discards_copy() {
    let table = TempTable::new().unwrap();
    table
        .create(
            Header::new(TableType::DBase3),
            &[ColumnSpec::new("name", FieldType::Char).length(8)],
        )
        .unwrap();
    let mut editor = TableEditor::open(&table.path).unwrap();
    let mut record = editor.append_record().unwrap();
    record.set("name", "lost").unwrap();
    editor.write_record(&mut record).unwrap();

    // A directory in place of the original makes the final rename fail.
    fs::remove_file(&table.path).unwrap();
    fs::create_dir(&table.path).unwrap();

    assert!(matches!(
        editor.save(),
        Err(XBaseError::PersistFailed { .. })
    ));
    assert_eq!(editor.phase(), SessionPhase::Discarded);
    assert_eq!(table.files().unwrap(), vec!["test.dbf"]);
    assert!(table.path.is_dir());
}

#[test]
fn test_editing_continues_after_save() {
    let table = TempTable::new().unwrap();
    contacts(&table, TableType::DBase3Memo);
    let mut editor = TableEditor::open(&table.path).unwrap();
    add_contact(&mut editor, "one", 1, Some("first"));
    editor.save().unwrap();
    add_contact(&mut editor, "two", 2, Some("second"));
    assert_eq!(editor.phase(), SessionPhase::Cloned);
    editor.save().unwrap();
    editor.close().unwrap();

    assert_eq!(names(&table), vec!["one", "two"]);
    let mut reader = TableReader::open(&table.path).unwrap();
    assert_eq!(
        reader.record(1).unwrap().get("notes").and_then(Value::as_str),
        Some("second")
    );
    assert_eq!(
        reader.record(0).unwrap().get("notes").and_then(Value::as_str),
        Some("first")
    );
}

#[test]
fn test_custom_clone_prefix() {
    let table = TempTable::new().unwrap();
    contacts(&table, TableType::DBase3Memo);
    let config = Config::default().with_clone_prefix(".edit-");
    let mut editor = TableEditor::open_with_config(&table.path, config).unwrap();
    add_contact(&mut editor, "z", 9, Some("memo"));

    assert_eq!(
        table.files().unwrap(),
        vec![".edit-test.dbf", ".edit-test.dbt", "test.dbf", "test.dbt"]
    );
    editor.close().unwrap();
    assert_eq!(table.files().unwrap(), vec!["test.dbf", "test.dbt"]);
}

#[test]
fn test_directory_is_unsupported() {
    let table = TempTable::new().unwrap();
    assert!(matches!(
        TableEditor::open(table.dir()),
        Err(XBaseError::UnsupportedOperation { .. })
    ));
}

#[test]
fn test_visual_foxpro_types() {
    use chrono::NaiveDate;

    let table = TempTable::new().unwrap();
    table
        .create(
            Header::new(TableType::VisualFoxPro),
            &[
                ColumnSpec::new("id", FieldType::Integer),
                ColumnSpec::new("price", FieldType::Currency),
                ColumnSpec::new("stamp", FieldType::DateTime),
                ColumnSpec::new("photo", FieldType::General),
            ],
        )
        .unwrap();

    let stamp = NaiveDate::from_ymd_opt(2021, 6, 30)
        .unwrap()
        .and_hms_opt(8, 15, 30)
        .unwrap();
    let photo = vec![0x89, b'P', b'N', b'G', 0x00, 0xFF, 0x10];

    let mut editor = TableEditor::open(&table.path).unwrap();
    let mut record = editor.append_record().unwrap();
    record
        .set("id", 7)
        .unwrap()
        .set("price", 19.99)
        .unwrap()
        .set("stamp", stamp)
        .unwrap()
        .set("photo", photo.clone())
        .unwrap();
    editor.write_record(&mut record).unwrap();
    editor.save().unwrap();

    let mut reader = TableReader::open(&table.path).unwrap();
    assert!(reader.is_foxpro());
    let record = reader.record(0).unwrap();
    assert_eq!(record.get("id"), Some(&Value::Integer(7)));
    assert_eq!(record.get("price"), Some(&Value::Number(19.99)));
    assert_eq!(record.get("stamp"), Some(&Value::DateTime(stamp)));
    assert_eq!(record.get("photo"), Some(&Value::Blob(photo)));
    // Binary memo pointer: first data block after the 512-byte header.
    assert_eq!(record.raw_field("photo"), Some(&8u32.to_le_bytes()[..]));
}
