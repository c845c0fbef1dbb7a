pub mod codepage;
pub mod error;
pub mod field_type;
pub mod record;
pub mod table_type;
pub mod value;

// Common type aliases
pub type RecordIndex = u32;
pub type BlockIndex = u32;

// Constants following the dBase file layout
pub const FIELD_TERMINATOR: u8 = 0x0D;
pub const EOF_MARKER: u8 = 0x1A;
pub const RECORD_ACTIVE: u8 = b' ';
pub const RECORD_DELETED: u8 = b'*';
pub const DELETION_FLAG_SIZE: usize = 1;
