use xbase::types::{error::XBaseError, field_type::FieldType};

const ALL: &[FieldType] = &[
    FieldType::Char,
    FieldType::Date,
    FieldType::Numeric,
    FieldType::Float,
    FieldType::Logical,
    FieldType::Memo,
    FieldType::General,
    FieldType::Blob,
    FieldType::Picture,
    FieldType::Integer,
    FieldType::Double,
    FieldType::Currency,
    FieldType::DateTime,
    FieldType::Timestamp,
    FieldType::AutoIncrement,
    FieldType::NullFlags,
];

#[test]
fn test_type_bytes_are_stable() {
    for &field_type in ALL {
        assert_eq!(FieldType::from_byte(field_type.to_byte()).unwrap(), field_type);
    }
    assert_eq!(FieldType::Double.to_byte(), b'O');
    assert_eq!(FieldType::Timestamp.to_byte(), b'@');
    assert_eq!(FieldType::Currency.to_string(), "Y");
}

#[test]
fn test_lowercase_type_byte_is_accepted() {
    assert_eq!(FieldType::from_byte(b'c').unwrap(), FieldType::Char);
    assert_eq!(FieldType::from_byte(b'm').unwrap(), FieldType::Memo);
}

#[test]
fn test_unknown_type_byte() {
    match FieldType::from_byte(b'Z') {
        Err(XBaseError::UnknownFieldType(c)) => assert_eq!(c, 'Z'),
        other => panic!("expected UnknownFieldType, got {:?}", other),
    }
}

#[test]
fn test_fixed_lengths() {
    assert_eq!(FieldType::Logical.fixed_length(false), Some(1));
    assert_eq!(FieldType::Date.fixed_length(false), Some(8));
    assert_eq!(FieldType::Memo.fixed_length(false), Some(10));
    assert_eq!(FieldType::Memo.fixed_length(true), Some(4));
    assert_eq!(FieldType::Integer.fixed_length(false), Some(4));
    assert_eq!(FieldType::Double.fixed_length(false), Some(8));
    assert_eq!(FieldType::Char.fixed_length(false), None);
    assert_eq!(FieldType::Numeric.fixed_length(true), None);
}

#[test]
fn test_memo_classification() {
    let memos: Vec<_> = ALL.iter().copied().filter(|t| t.is_memo()).collect();
    assert_eq!(
        memos,
        vec![FieldType::Memo, FieldType::General, FieldType::Blob, FieldType::Picture]
    );
    assert!(FieldType::Memo.is_text_memo());
    assert!(!FieldType::Blob.is_text_memo());
    assert!(FieldType::Float.has_decimals());
    assert!(!FieldType::Integer.has_decimals());
}
