use std::path::PathBuf;

use thiserror::Error;

use crate::types::{field_type::FieldType, table_type::TableType};

#[derive(Error, Debug)]
pub enum XBaseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid column definition: {details}")]
    SchemaError { details: String },

    #[error("Field type {field_type:?} is not supported by table type {table_type:?}")]
    UnsupportedFieldType {
        field_type: FieldType,
        table_type: TableType,
    },

    #[error("Cannot encode or decode column '{column}': {details}")]
    Codec { column: String, details: String },

    #[error("Value {value} does not fit into column '{column}' of length {length}")]
    NumericOverflow {
        column: String,
        value: String,
        length: u8,
    },

    #[error("Record index {index} out of bounds (record count: {count})")]
    RecordOutOfBounds { index: u32, count: u32 },

    #[error("Column '{name}' not found")]
    ColumnNotFound { name: String },

    #[error("Invalid table header: {reason}")]
    InvalidHeader { reason: String },

    #[error("Unknown table type byte 0x{0:02X}")]
    UnknownTableType(u8),

    #[error("Unknown field type '{0}'")]
    UnknownFieldType(char),

    #[error("Corrupted memo: block={block}, reason={reason}")]
    CorruptedMemo { block: u32, reason: String },

    #[error("Memo file missing: {path}")]
    MemoFileMissing { path: PathBuf },

    #[error("Failed to clone original file {path}: {source}")]
    CloneFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to replace {path} with edited copy: {source}")]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported operation: {details}")]
    UnsupportedOperation { details: String },
}

pub type Result<T> = std::result::Result<T, XBaseError>;
