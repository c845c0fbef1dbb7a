pub mod config;
pub mod executor;
pub mod storage;
pub mod types;
pub mod utils;

pub use config::Config;
pub use executor::{
    create_table::TableCreator, scan::Scanner, table_editor::TableEditor,
    table_reader::TableReader,
};
pub use storage::{
    edit_session::SessionPhase,
    header::{Header, TableFlags},
    schema::{Column, ColumnSpec},
};
pub use types::{
    codepage::Codepage, error::XBaseError, field_type::FieldType, record::Record,
    table_type::TableType, value::Value,
};
