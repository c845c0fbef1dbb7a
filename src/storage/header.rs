use std::io::Read;

use chrono::{Datelike, Local, NaiveDate};
use tracing::warn;

use crate::{
    storage::schema::{self, Column},
    types::{
        FIELD_TERMINATOR,
        codepage::Codepage,
        error::XBaseError,
        field_type::FieldType,
        table_type::TableType,
    },
};

/// Header flags as a bitset.
///
/// The low byte mirrors byte 28 of the file (structural index / FoxPro table
/// flags). The transaction and encryption bytes are folded into the high bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableFlags(u16);

impl TableFlags {
    pub const NONE: TableFlags = TableFlags(0);
    pub const STRUCTURAL_INDEX: TableFlags = TableFlags(0x01);
    pub const HAS_MEMO: TableFlags = TableFlags(0x02);
    pub const DATABASE: TableFlags = TableFlags(0x04);
    pub const INCOMPLETE_TRANSACTION: TableFlags = TableFlags(0x100);
    pub const ENCRYPTED: TableFlags = TableFlags(0x200);

    pub fn contains(self, other: TableFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: TableFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: TableFlags) {
        self.0 &= !other.0;
    }

    /// The raw byte 28 of the header.
    pub fn mdx_byte(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    fn from_bytes(mdx: u8, transaction: u8, encrypted: u8) -> Self {
        let mut flags = TableFlags(mdx as u16);
        if transaction != 0 {
            flags.insert(TableFlags::INCOMPLETE_TRANSACTION);
        }
        if encrypted != 0 {
            flags.insert(TableFlags::ENCRYPTED);
        }
        flags
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub version: TableType,
    pub last_update: Option<NaiveDate>,
    pub record_count: u32,
    pub header_length: u16,
    pub record_length: u16,
    pub flags: TableFlags,
    pub codepage: Codepage,
    pub columns: Vec<Column>,
}

impl Header {
    /// An empty header for a new table of the given dialect.
    pub fn new(version: TableType) -> Self {
        Self {
            version,
            last_update: Some(Local::now().date_naive()),
            record_count: 0,
            header_length: version.header_length(0) as u16,
            record_length: 1,
            flags: TableFlags::NONE,
            codepage: Codepage::Undefined,
            columns: Vec::new(),
        }
    }

    pub fn with_codepage(mut self, codepage: Codepage) -> Self {
        self.codepage = codepage;
        self
    }

    /// Replace the column list and recompute the derived lengths.
    pub fn set_columns(&mut self, columns: Vec<Column>) -> Result<(), XBaseError> {
        let header_length = self.version.header_length(columns.len());
        self.header_length = u16::try_from(header_length).map_err(|_| XBaseError::SchemaError {
            details: format!("Header length {} exceeds 65535 bytes", header_length),
        })?;
        self.record_length = schema::record_length(&columns) as u16;
        if self.version.is_visual_foxpro() && columns.iter().any(Column::is_memo) {
            self.flags.insert(TableFlags::HAS_MEMO);
        }
        self.columns = columns;
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn has_memo_columns(&self) -> bool {
        self.columns.iter().any(Column::is_memo)
    }

    pub fn language_code(&self) -> u8 {
        self.codepage.id()
    }

    /// Offset of a record slot within the table file.
    pub fn record_offset(&self, index: u32) -> u64 {
        self.header_length as u64 + index as u64 * self.record_length as u64
    }

    /// The leading 32 bytes shared by every dialect.
    pub fn fixed_bytes(&self) -> [u8; 32] {
        let mut buffer = [0u8; 32];
        buffer[0] = self.version.to_byte();
        if let Some(date) = self.last_update {
            buffer[1] = (date.year() - 1900).clamp(0, 255) as u8;
            buffer[2] = date.month() as u8;
            buffer[3] = date.day() as u8;
        }
        buffer[4..8].copy_from_slice(&self.record_count.to_le_bytes());
        buffer[8..10].copy_from_slice(&self.header_length.to_le_bytes());
        buffer[10..12].copy_from_slice(&self.record_length.to_le_bytes());
        buffer[14] = self.flags.contains(TableFlags::INCOMPLETE_TRANSACTION) as u8;
        buffer[15] = self.flags.contains(TableFlags::ENCRYPTED) as u8;
        buffer[28] = self.flags.mdx_byte();
        buffer[29] = self.codepage.id();
        buffer
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.header_length as usize);
        buffer.extend_from_slice(&self.fixed_bytes());
        // dBase 7: language driver name and reserved bytes
        buffer.resize(self.version.fixed_header_size(), 0);

        for column in &self.columns {
            if self.version.is_dbase7() {
                Self::write_dbase7_descriptor(&mut buffer, column);
            } else {
                Self::write_descriptor(&mut buffer, column);
            }
        }

        buffer.push(FIELD_TERMINATOR);
        buffer.resize(self.header_length as usize, 0);
        buffer
    }

    fn write_descriptor(buffer: &mut Vec<u8>, column: &Column) {
        let mut name = [0u8; 11];
        let len = column.name.len().min(10);
        name[..len].copy_from_slice(&column.name.as_bytes()[..len]);
        buffer.extend_from_slice(&name);
        buffer.push(column.field_type.to_byte());
        buffer.extend_from_slice(&(column.byte_pos as u32).to_le_bytes());
        buffer.push(column.length);
        buffer.push(column.decimal_count);
        buffer.push(column.flags);
        buffer.extend_from_slice(&[0u8; 13]);
    }

    fn write_dbase7_descriptor(buffer: &mut Vec<u8>, column: &Column) {
        let mut name = [0u8; 32];
        let len = column.name.len().min(31);
        name[..len].copy_from_slice(&column.name.as_bytes()[..len]);
        buffer.extend_from_slice(&name);
        buffer.push(column.field_type.to_byte());
        buffer.push(column.length);
        buffer.push(column.decimal_count);
        buffer.extend_from_slice(&[0u8; 5]);
        let next_autoincrement: u32 = if column.field_type == FieldType::AutoIncrement { 1 } else { 0 };
        buffer.extend_from_slice(&next_autoincrement.to_le_bytes());
        buffer.extend_from_slice(&[0u8; 4]);
    }

    /// Parse a header, column descriptors included, from the start of a table.
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self, XBaseError> {
        let mut fixed = [0u8; 32];
        reader.read_exact(&mut fixed).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => XBaseError::InvalidHeader {
                reason: "Header too short".to_string(),
            },
            _ => XBaseError::Io(e),
        })?;

        let version = TableType::from_byte(fixed[0])?;
        let last_update =
            NaiveDate::from_ymd_opt(1900 + fixed[1] as i32, fixed[2] as u32, fixed[3] as u32);
        let record_count = u32::from_le_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);
        let header_length = u16::from_le_bytes([fixed[8], fixed[9]]);
        let record_length = u16::from_le_bytes([fixed[10], fixed[11]]);
        let flags = TableFlags::from_bytes(fixed[28], fixed[14], fixed[15]);
        let codepage = Codepage::from_id(fixed[29]);

        let fixed_size = version.fixed_header_size();
        if (header_length as usize) < fixed_size + 1 {
            return Err(XBaseError::InvalidHeader {
                reason: format!("Header length {} is too small", header_length),
            });
        }

        let mut rest = vec![0u8; header_length as usize - 32];
        reader.read_exact(&mut rest).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => XBaseError::InvalidHeader {
                reason: "File shorter than declared header length".to_string(),
            },
            _ => XBaseError::Io(e),
        })?;

        let descriptors = &rest[fixed_size - 32..];
        let columns = Self::parse_descriptors(version, descriptors)?;

        let computed = schema::record_length(&columns);
        if computed > record_length as usize {
            return Err(XBaseError::InvalidHeader {
                reason: format!(
                    "Columns need {} bytes per record, header declares {}",
                    computed, record_length
                ),
            });
        }
        if computed < record_length as usize {
            warn!(computed, declared = record_length, "record length larger than column total");
        }

        Ok(Self {
            version,
            last_update,
            record_count,
            header_length,
            record_length,
            flags,
            codepage,
            columns,
        })
    }

    fn parse_descriptors(version: TableType, bytes: &[u8]) -> Result<Vec<Column>, XBaseError> {
        let size = version.descriptor_size();
        let name_size = if version.is_dbase7() { 32 } else { 11 };
        let mut columns = Vec::new();
        let mut offset = 0;
        let mut byte_pos: usize = 1;

        loop {
            match bytes.get(offset) {
                Some(&FIELD_TERMINATOR) => break,
                Some(_) if offset + size <= bytes.len() => {}
                _ => {
                    return Err(XBaseError::InvalidHeader {
                        reason: "Missing column descriptor terminator".to_string(),
                    });
                }
            }

            let descriptor = &bytes[offset..offset + size];
            let name_bytes = &descriptor[..name_size];
            let name_end = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_size);
            let name = String::from_utf8_lossy(&name_bytes[..name_end]).trim().to_string();
            let field_type = FieldType::from_byte(descriptor[name_size])?;

            let (length, decimal_count, flags) = if version.is_dbase7() {
                (descriptor[33], descriptor[34], 0)
            } else {
                (descriptor[16], descriptor[17], descriptor[18])
            };

            columns.push(Column {
                name,
                field_type,
                length,
                decimal_count,
                byte_pos: u16::try_from(byte_pos).map_err(|_| XBaseError::InvalidHeader {
                    reason: "Record length exceeds 65535 bytes".to_string(),
                })?,
                flags,
            });
            byte_pos += length as usize;
            offset += size;
        }

        Ok(columns)
    }
}
