use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::{
    DELETION_FLAG_SIZE,
    error::XBaseError,
    field_type::FieldType,
    table_type::TableType,
};

/// Represents a column definition in a table header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub field_type: FieldType,
    pub length: u8,
    pub decimal_count: u8,
    /// Offset of the column's first byte within a record.
    pub byte_pos: u16,
    /// Visual FoxPro field flags (system, nullable, binary).
    pub flags: u8,
}

impl Column {
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = self.byte_pos as usize;
        start..start + self.length as usize
    }

    pub fn is_memo(&self) -> bool {
        self.field_type.is_memo()
    }
}

/// Column specification accumulated by [`TableCreator`](crate::executor::create_table::TableCreator).
///
/// Every field is optional so that an incomplete specification can be
/// described; [`ColumnSpec::build`] rejects it with a schema error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: Option<String>,
    pub field_type: Option<FieldType>,
    pub length: Option<u8>,
    pub decimal_count: Option<u8>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: Some(name.into()),
            field_type: Some(field_type),
            length: None,
            decimal_count: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn field_type(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    pub fn length(mut self, length: u8) -> Self {
        self.length = Some(length);
        self
    }

    pub fn decimal_count(mut self, decimal_count: u8) -> Self {
        self.decimal_count = Some(decimal_count);
        self
    }

    /// Validate against a dialect and produce a column placed at `byte_pos`.
    pub fn build(&self, table_type: TableType, byte_pos: u16) -> Result<Column, XBaseError> {
        let name = match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(XBaseError::SchemaError {
                    details: "Column name is missing".to_string(),
                });
            }
        };

        let field_type = self.field_type.ok_or_else(|| XBaseError::SchemaError {
            details: format!("Column '{}' has no type", name),
        })?;

        if name.len() > table_type.max_column_name_length() {
            return Err(XBaseError::SchemaError {
                details: format!(
                    "Column name '{}' exceeds {} bytes",
                    name,
                    table_type.max_column_name_length()
                ),
            });
        }
        if name.bytes().any(|b| b == 0) {
            return Err(XBaseError::SchemaError {
                details: format!("Column name '{}' contains a NUL byte", name),
            });
        }

        if !table_type.supports(field_type) {
            return Err(XBaseError::UnsupportedFieldType {
                field_type,
                table_type,
            });
        }

        let length = match (field_type.fixed_length(table_type.binary_memo_pointer()), self.length) {
            (Some(fixed), None) => fixed,
            (Some(fixed), Some(given)) if given == fixed => fixed,
            (Some(fixed), Some(given)) => {
                return Err(XBaseError::SchemaError {
                    details: format!(
                        "Column '{}' of type {} has fixed length {}, got {}",
                        name, field_type, fixed, given
                    ),
                });
            }
            (None, Some(given)) if given >= 1 && given <= field_type.max_length() => given,
            (None, Some(given)) => {
                return Err(XBaseError::SchemaError {
                    details: format!(
                        "Column '{}' length {} outside 1..={}",
                        name,
                        given,
                        field_type.max_length()
                    ),
                });
            }
            (None, None) => {
                return Err(XBaseError::SchemaError {
                    details: format!("Column '{}' of type {} requires a length", name, field_type),
                });
            }
        };

        let decimal_count = match self.decimal_count {
            None | Some(0) => 0,
            Some(d) if field_type.has_decimals() && d < length.saturating_sub(1) => d,
            Some(d) if field_type.has_decimals() => {
                return Err(XBaseError::SchemaError {
                    details: format!(
                        "Column '{}' decimal count {} does not fit length {}",
                        name, d, length
                    ),
                });
            }
            Some(_) => {
                return Err(XBaseError::SchemaError {
                    details: format!("Column '{}' of type {} takes no decimals", name, field_type),
                });
            }
        };

        Ok(Column {
            name: name.to_string(),
            field_type,
            length,
            decimal_count,
            byte_pos,
            flags: 0,
        })
    }
}

/// Validate specs for a dialect and lay them out contiguously from byte 1.
pub fn build_columns(table_type: TableType, specs: &[ColumnSpec]) -> Result<Vec<Column>, XBaseError> {
    if specs.is_empty() {
        return Err(XBaseError::SchemaError {
            details: "Table must have at least one column".to_string(),
        });
    }

    let mut columns = Vec::with_capacity(specs.len());
    let mut names = HashSet::new();
    let mut byte_pos = DELETION_FLAG_SIZE;

    for spec in specs {
        let pos = u16::try_from(byte_pos).map_err(|_| XBaseError::SchemaError {
            details: "Record length exceeds 65535 bytes".to_string(),
        })?;
        let column = spec.build(table_type, pos)?;
        if !names.insert(column.name.to_ascii_uppercase()) {
            return Err(XBaseError::SchemaError {
                details: format!("Duplicate column name: {}", column.name),
            });
        }
        byte_pos += column.length as usize;
        columns.push(column);
    }

    if byte_pos > u16::MAX as usize {
        return Err(XBaseError::SchemaError {
            details: "Record length exceeds 65535 bytes".to_string(),
        });
    }

    Ok(columns)
}

/// Record length implied by a column list, deletion flag included.
pub fn record_length(columns: &[Column]) -> usize {
    DELETION_FLAG_SIZE + columns.iter().map(|c| c.length as usize).sum::<usize>()
}
