pub mod create_table;
pub mod scan;
pub mod table_editor;
pub mod table_reader;
