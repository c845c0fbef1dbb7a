use std::{collections::BTreeMap, sync::Arc};

use crate::{
    storage::{codec, memo::MemoStore, schema::Column},
    types::{
        BlockIndex, RECORD_ACTIVE, RECORD_DELETED, RecordIndex,
        error::XBaseError,
        table_type::TableType,
        value::Value,
    },
};

/// One row of a table: the raw fixed-width slot plus its decoded values.
///
/// Values staged with [`Record::set`] are encoded into the buffer right away,
/// so a codec error surfaces at the assignment. Memo payloads are held back
/// until the record is written, when they are appended to the memo file and
/// their block pointers patched into the buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    index: RecordIndex,
    table_type: TableType,
    columns: Arc<[Column]>,
    buffer: Vec<u8>,
    values: Vec<Value>,
    pending_memos: BTreeMap<usize, Option<Vec<u8>>>,
    is_new: bool,
}

impl Record {
    /// An empty record: every column holds its dialect's null encoding.
    pub(crate) fn blank(
        index: RecordIndex,
        table_type: TableType,
        columns: Arc<[Column]>,
        record_length: usize,
    ) -> Result<Self, XBaseError> {
        let mut buffer = vec![b' '; record_length];
        buffer[0] = RECORD_ACTIVE;
        let mut values = Vec::with_capacity(columns.len());
        for column in columns.iter() {
            let slot = &mut buffer[column.range()];
            if column.is_memo() {
                codec::encode_memo_pointer(column, table_type, None, slot)?;
                values.push(Value::Null);
            } else {
                codec::encode(column, table_type, &Value::Null, slot)?;
                values.push(codec::decode(column, table_type, slot)?);
            }
        }
        Ok(Self {
            index,
            table_type,
            columns,
            buffer,
            values,
            pending_memos: BTreeMap::new(),
            is_new: true,
        })
    }

    /// Decode a record slot read from disk. `read_memo` dereferences memo
    /// pointers and is only called for non-blank ones.
    pub(crate) fn from_bytes<F>(
        index: RecordIndex,
        table_type: TableType,
        columns: Arc<[Column]>,
        buffer: Vec<u8>,
        mut read_memo: F,
    ) -> Result<Self, XBaseError>
    where
        F: FnMut(&Column, BlockIndex) -> Result<Vec<u8>, XBaseError>,
    {
        let mut values = Vec::with_capacity(columns.len());
        for column in columns.iter() {
            let slot = buffer.get(column.range()).ok_or_else(|| XBaseError::Codec {
                column: column.name.clone(),
                details: "slot extends past record end".to_string(),
            })?;
            let value = if column.is_memo() {
                match codec::decode_memo_pointer(column, table_type, slot)? {
                    Some(block) => codec::memo_value(column.field_type, read_memo(column, block)?),
                    None => Value::Null,
                }
            } else {
                codec::decode(column, table_type, slot)?
            };
            values.push(value);
        }
        Ok(Self {
            index,
            table_type,
            columns,
            buffer,
            values,
            pending_memos: BTreeMap::new(),
            is_new: false,
        })
    }

    pub fn index(&self) -> RecordIndex {
        self.index
    }

    /// True for an appended record that has not been written yet.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub(crate) fn mark_stored(&mut self) {
        self.is_new = false;
    }

    pub fn is_deleted(&self) -> bool {
        self.buffer[0] == RECORD_DELETED
    }

    pub fn set_deleted(&mut self, deleted: bool) -> &mut Self {
        self.buffer[0] = if deleted { RECORD_DELETED } else { RECORD_ACTIVE };
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.column_index(name).map(|i| &self.values[i])
    }

    pub fn get_value(&self, column_index: usize) -> Option<&Value> {
        self.values.get(column_index)
    }

    /// The record as stored, deletion flag first.
    pub fn raw(&self) -> &[u8] {
        &self.buffer
    }

    pub fn raw_field(&self, name: &str) -> Option<&[u8]> {
        self.column_index(name)
            .map(|i| &self.buffer[self.columns[i].range()])
    }

    pub fn has_pending_memos(&self) -> bool {
        !self.pending_memos.is_empty()
    }

    /// Stage a value. Non-memo values are encoded immediately and the stored
    /// value becomes what a later read will return.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self, XBaseError> {
        let value = value.into();
        let index = self
            .column_index(name)
            .ok_or_else(|| XBaseError::ColumnNotFound {
                name: name.to_string(),
            })?;
        let column = &self.columns[index];

        if column.is_memo() {
            let payload = codec::memo_payload(column, &value)?;
            if let (Some(bytes), Some(kind)) = (&payload, self.table_type.memo_kind()) {
                codec::check_memo_payload(column, kind, bytes)?;
            }
            self.values[index] = match &payload {
                Some(bytes) => codec::memo_value(column.field_type, bytes.clone()),
                None => Value::Null,
            };
            self.pending_memos.insert(index, payload);
            return Ok(self);
        }

        let mut slot = vec![0u8; column.length as usize];
        codec::encode(column, self.table_type, &value, &mut slot)?;
        let normalized = codec::decode(column, self.table_type, &slot)?;
        self.buffer[column.range()].copy_from_slice(&slot);
        self.values[index] = normalized;
        Ok(self)
    }

    /// Append staged memo payloads and patch their pointers into the buffer.
    /// The buffer is only touched once every append has succeeded.
    pub(crate) fn flush_memos(&mut self, store: Option<&mut MemoStore>) -> Result<(), XBaseError> {
        if self.pending_memos.is_empty() {
            return Ok(());
        }

        let mut pointers = Vec::with_capacity(self.pending_memos.len());
        let mut store = store;
        for (&index, payload) in &self.pending_memos {
            let column = &self.columns[index];
            let block = match payload {
                None => None,
                Some(bytes) => {
                    let store = store.as_deref_mut().ok_or_else(|| {
                        XBaseError::UnsupportedOperation {
                            details: format!("table has no memo file for column '{}'", column.name),
                        }
                    })?;
                    Some(store.append_with_type(bytes, column.field_type.is_text_memo())?)
                }
            };
            pointers.push((index, block));
        }

        let mut buffer = self.buffer.clone();
        for (index, block) in pointers {
            let column = &self.columns[index];
            codec::encode_memo_pointer(column, self.table_type, block, &mut buffer[column.range()])?;
        }
        self.buffer = buffer;
        self.pending_memos.clear();
        Ok(())
    }
}
