use xbase::types::{
    error::XBaseError,
    field_type::FieldType,
    table_type::{MemoKind, TableType},
};

#[test]
fn test_version_bytes() {
    let cases = [
        (0x02, TableType::FoxBase),
        (0x03, TableType::DBase3),
        (0x04, TableType::DBase7),
        (0x30, TableType::VisualFoxPro),
        (0x31, TableType::VisualFoxProAutoInc),
        (0x83, TableType::DBase3Memo),
        (0x8B, TableType::DBase4Memo),
        (0x8C, TableType::DBase7Memo),
        (0xF5, TableType::FoxProMemo),
    ];
    for (byte, table_type) in cases {
        assert_eq!(TableType::from_byte(byte).unwrap(), table_type);
        assert_eq!(table_type.to_byte(), byte);
    }
    assert!(matches!(
        TableType::from_byte(0x42),
        Err(XBaseError::UnknownTableType(0x42))
    ));
}

#[test]
fn test_validity_matrix() {
    assert!(TableType::DBase3Memo.supports(FieldType::Memo));
    assert!(!TableType::DBase3Memo.supports(FieldType::Double));
    assert!(!TableType::DBase3.supports(FieldType::General));
    assert!(!TableType::DBase3.supports(FieldType::Memo));
    assert!(TableType::DBase4Memo.supports(FieldType::Float));
    assert!(TableType::DBase7.supports(FieldType::Timestamp));
    assert!(!TableType::DBase7.supports(FieldType::Memo));
    assert!(TableType::FoxProMemo.supports(FieldType::Picture));
    assert!(TableType::VisualFoxPro.supports(FieldType::Currency));
    assert!(!TableType::VisualFoxPro.supports(FieldType::Timestamp));

    for table_type in [TableType::DBase3, TableType::DBase7, TableType::VisualFoxPro] {
        assert!(table_type.supports(FieldType::Char));
        assert!(table_type.supports(FieldType::Logical));
    }
}

#[test]
fn test_memo_kinds() {
    assert_eq!(TableType::DBase3.memo_kind(), None);
    assert_eq!(TableType::DBase3Memo.memo_kind(), Some(MemoKind::DBase3));
    assert_eq!(TableType::DBase4Memo.memo_kind(), Some(MemoKind::DBase4));
    assert_eq!(TableType::DBase7Memo.memo_kind(), Some(MemoKind::DBase4));
    assert_eq!(TableType::FoxProMemo.memo_kind(), Some(MemoKind::FoxPro));
    assert_eq!(TableType::VisualFoxPro.memo_kind(), Some(MemoKind::FoxPro));
}

#[test]
fn test_header_geometry() {
    assert_eq!(TableType::DBase3Memo.header_length(6), 225);
    assert_eq!(TableType::DBase7.header_length(2), 68 + 2 * 48 + 1);
    assert_eq!(TableType::VisualFoxPro.header_length(1), 32 + 32 + 1 + 263);
    assert_eq!(TableType::DBase7.max_column_name_length(), 31);
    assert_eq!(TableType::DBase3.max_column_name_length(), 10);
    assert!(TableType::VisualFoxPro.binary_memo_pointer());
    assert!(!TableType::FoxProMemo.binary_memo_pointer());
    assert!(TableType::FoxProMemo.is_foxpro());
    assert!(!TableType::DBase4Memo.is_foxpro());
}
