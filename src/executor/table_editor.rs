use std::{
    fs::File,
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
    sync::Arc,
};

use chrono::Local;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    executor::table_reader::read_record,
    storage::{
        edit_session::{EditSession, SessionPhase},
        header::Header,
        memo::MemoStore,
        schema::Column,
    },
    types::{
        EOF_MARKER, RECORD_ACTIVE, RECORD_DELETED, RecordIndex,
        error::XBaseError,
        record::Record,
    },
};

/// Mutates an existing table through a private working copy.
///
/// Nothing written here is visible in the original file until
/// [`TableEditor::save`] succeeds.
pub struct TableEditor {
    session: EditSession,
    header: Header,
    columns: Arc<[Column]>,
    config: Config,
    next_append: RecordIndex,
}

impl TableEditor {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, XBaseError> {
        Self::open_with_config(path, Config::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: Config) -> Result<Self, XBaseError> {
        let path = path.as_ref();
        // Opening a pipe or device to parse the header would block.
        if !std::fs::metadata(path)?.is_file() {
            return Err(XBaseError::UnsupportedOperation {
                details: format!("{} is not a regular file", path.display()),
            });
        }

        let header = Header::from_reader(&mut File::open(path)?)?;
        let memo_kind = header
            .version
            .memo_kind()
            .filter(|_| header.has_memo_columns());
        let session = EditSession::open(path, memo_kind, config.clone())?;
        let columns: Arc<[Column]> = Arc::from(header.columns.clone());

        debug!(path = %path.display(), records = header.record_count, "opened table for editing");
        Ok(Self {
            session,
            next_append: header.record_count,
            header,
            columns,
            config,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Record count including appends not yet saved.
    pub fn record_count(&self) -> u32 {
        self.header.record_count
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase()
    }

    /// A blank record bound to the next free index. It only becomes part of
    /// the table once passed to [`TableEditor::write_record`].
    ///
    /// Each call reserves a new index, so records taken together must be
    /// written in the order they were appended.
    pub fn append_record(&mut self) -> Result<Record, XBaseError> {
        let index = self.next_append.max(self.header.record_count);
        let record = Record::blank(
            index,
            self.header.version,
            Arc::clone(&self.columns),
            self.header.record_length as usize,
        )?;
        self.next_append = index + 1;
        Ok(record)
    }

    /// Read a record as this session currently sees it.
    pub fn record(&mut self, index: RecordIndex) -> Result<Record, XBaseError> {
        if let Some(copy) = self.session.existing_working_copy() {
            return read_record(
                &mut copy.table,
                &self.header,
                &self.columns,
                copy.memo.as_mut(),
                copy.memo_path.as_deref(),
                index,
            );
        }

        let mut file = File::open(self.session.original_path())?;
        let expected_memo = self
            .header
            .version
            .memo_kind()
            .filter(|_| self.header.has_memo_columns())
            .map(|kind| {
                (
                    kind,
                    self.session
                        .original_memo_path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| MemoStore::memo_path(self.session.original_path(), kind)),
                )
            });
        let mut memo = match &expected_memo {
            Some((kind, memo_path)) if memo_path.exists() => Some(MemoStore::open(memo_path, *kind)?),
            _ => None,
        };
        read_record(
            &mut file,
            &self.header,
            &self.columns,
            memo.as_mut(),
            expected_memo.as_ref().map(|(_, p)| p.as_path()),
            index,
        )
    }

    /// Write a record into the working copy. Staged memo payloads are
    /// appended first so a failed memo write leaves the record slot alone.
    pub fn write_record(&mut self, record: &mut Record) -> Result<(), XBaseError> {
        let index = record.index();
        if record.is_new() && index != self.header.record_count {
            return Err(XBaseError::UnsupportedOperation {
                details: format!(
                    "appended record {} must be written at the end of the table ({} records)",
                    index, self.header.record_count
                ),
            });
        }
        if index > self.header.record_count {
            return Err(XBaseError::RecordOutOfBounds {
                index,
                count: self.header.record_count,
            });
        }
        if record.raw().len() != self.header.record_length as usize {
            return Err(XBaseError::UnsupportedOperation {
                details: format!(
                    "record is {} bytes but the table expects {}",
                    record.raw().len(),
                    self.header.record_length
                ),
            });
        }

        let copy = self.session.working_copy()?;
        record.flush_memos(copy.memo.as_mut())?;

        copy.table.seek(SeekFrom::Start(self.header.record_offset(index)))?;
        copy.table.write_all(record.raw())?;

        if index == self.header.record_count {
            if self.config.write_eof_marker {
                copy.table.write_all(&[EOF_MARKER])?;
            }
            self.header.record_count += 1;
            debug!(index, "appended record");
        } else {
            debug!(index, "rewrote record");
        }
        copy.table.flush()?;
        record.mark_stored();
        Ok(())
    }

    fn set_deletion_flag(&mut self, index: RecordIndex, flag: u8) -> Result<(), XBaseError> {
        if index >= self.header.record_count {
            return Err(XBaseError::RecordOutOfBounds {
                index,
                count: self.header.record_count,
            });
        }
        let offset = self.header.record_offset(index);
        let copy = self.session.working_copy()?;
        copy.table.seek(SeekFrom::Start(offset))?;
        copy.table.write_all(&[flag])?;
        copy.table.flush()?;
        Ok(())
    }

    pub fn delete_record(&mut self, index: RecordIndex) -> Result<(), XBaseError> {
        self.set_deletion_flag(index, RECORD_DELETED)
    }

    pub fn undelete_record(&mut self, index: RecordIndex) -> Result<(), XBaseError> {
        self.set_deletion_flag(index, RECORD_ACTIVE)
    }

    /// Drop deleted records from the working copy, compacting the rest in
    /// order. Memo blocks they referenced are left in place. Returns the
    /// number of records removed.
    pub fn pack(&mut self) -> Result<u32, XBaseError> {
        let record_length = self.header.record_length as usize;
        let count = self.header.record_count;
        let header = self.header.clone();
        let copy = self.session.working_copy()?;

        let mut buffer = vec![0u8; record_length];
        let mut kept: u32 = 0;
        for index in 0..count {
            copy.table.seek(SeekFrom::Start(header.record_offset(index)))?;
            copy.table.read_exact(&mut buffer)?;
            if buffer[0] == RECORD_DELETED {
                continue;
            }
            if kept != index {
                copy.table.seek(SeekFrom::Start(header.record_offset(kept)))?;
                copy.table.write_all(&buffer)?;
            }
            kept += 1;
        }

        let mut end = header.record_offset(kept);
        if self.config.write_eof_marker {
            copy.table.seek(SeekFrom::Start(end))?;
            copy.table.write_all(&[EOF_MARKER])?;
            end += 1;
        }
        copy.table.set_len(end)?;
        copy.table.flush()?;

        let removed = count - kept;
        self.header.record_count = kept;
        self.next_append = kept;
        info!(removed, remaining = kept, "packed table");
        Ok(removed)
    }

    /// Publish the working copy over the original. Without prior writes
    /// this does nothing.
    pub fn save(&mut self) -> Result<&mut Self, XBaseError> {
        if self.session.phase() != SessionPhase::Cloned {
            return Ok(self);
        }
        self.header.last_update = Some(Local::now().date_naive());
        if let Err(e) = self.session.finalize(&self.header) {
            warn!(error = %e, "save failed, working copy discarded");
            if let Err(reload) = self.reload_header() {
                warn!(error = %reload, "could not reload header after failed save");
            }
            return Err(e);
        }
        Ok(self)
    }

    fn reload_header(&mut self) -> Result<(), XBaseError> {
        self.header = Header::from_reader(&mut File::open(self.session.original_path())?)?;
        self.next_append = self.header.record_count;
        Ok(())
    }

    /// Discard unsaved edits. The editor accepts no further writes.
    pub fn close(&mut self) -> Result<(), XBaseError> {
        self.session.discard()
    }
}
