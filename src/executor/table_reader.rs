use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::NaiveDate;
use tracing::debug;

use crate::{
    executor::scan::{ScanIterator, Scanner},
    storage::{
        header::{Header, TableFlags},
        memo::MemoStore,
        schema::Column,
    },
    types::{
        RecordIndex,
        codepage::Codepage,
        error::XBaseError,
        record::Record,
        table_type::TableType,
    },
};

/// Read a single record slot and decode it, dereferencing memo pointers.
pub(crate) fn read_record(
    file: &mut File,
    header: &Header,
    columns: &Arc<[Column]>,
    memo: Option<&mut MemoStore>,
    memo_path: Option<&Path>,
    index: RecordIndex,
) -> Result<Record, XBaseError> {
    if index >= header.record_count {
        return Err(XBaseError::RecordOutOfBounds {
            index,
            count: header.record_count,
        });
    }

    let mut buffer = vec![0u8; header.record_length as usize];
    file.seek(SeekFrom::Start(header.record_offset(index)))?;
    file.read_exact(&mut buffer)?;

    let mut memo = memo;
    Record::from_bytes(
        index,
        header.version,
        Arc::clone(columns),
        buffer,
        |_column, block| match memo.as_deref_mut() {
            Some(store) => store.read(block),
            None => Err(XBaseError::MemoFileMissing {
                path: memo_path.map(Path::to_path_buf).unwrap_or_default(),
            }),
        },
    )
}

/// Read-only access to an existing table and its memo file.
pub struct TableReader {
    path: PathBuf,
    header: Header,
    columns: Arc<[Column]>,
    file: File,
    memo: Option<MemoStore>,
    memo_path: Option<PathBuf>,
    position: RecordIndex,
}

impl TableReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, XBaseError> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let header = Header::from_reader(&mut file)?;
        let columns: Arc<[Column]> = Arc::from(header.columns.clone());

        let (memo, memo_path) = match header.version.memo_kind() {
            Some(kind) if header.has_memo_columns() => {
                match MemoStore::find_memo_path(path, kind) {
                    Some(memo_path) => (Some(MemoStore::open(&memo_path, kind)?), Some(memo_path)),
                    None => {
                        debug!(table = %path.display(), "memo file not found");
                        (None, Some(MemoStore::memo_path(path, kind)))
                    }
                }
            }
            _ => (None, None),
        };

        debug!(
            path = %path.display(),
            version = ?header.version,
            records = header.record_count,
            columns = columns.len(),
            "opened table"
        );

        Ok(Self {
            path: path.to_path_buf(),
            header,
            columns,
            file,
            memo,
            memo_path,
            position: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.header.column(name)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn record_count(&self) -> u32 {
        self.header.record_count
    }

    pub fn version(&self) -> TableType {
        self.header.version
    }

    pub fn codepage(&self) -> Codepage {
        self.header.codepage
    }

    pub fn language_code(&self) -> u8 {
        self.header.language_code()
    }

    pub fn flags(&self) -> TableFlags {
        self.header.flags
    }

    pub fn is_foxpro(&self) -> bool {
        self.header.version.is_foxpro()
    }

    pub fn header_length(&self) -> u16 {
        self.header.header_length
    }

    pub fn record_length(&self) -> u16 {
        self.header.record_length
    }

    pub fn is_in_transaction(&self) -> bool {
        self.header.flags.contains(TableFlags::INCOMPLETE_TRANSACTION)
    }

    pub fn is_encrypted(&self) -> bool {
        self.header.flags.contains(TableFlags::ENCRYPTED)
    }

    pub fn mdx_flag(&self) -> u8 {
        self.header.flags.mdx_byte()
    }

    pub fn last_update(&self) -> Option<NaiveDate> {
        self.header.last_update
    }

    pub fn memo_path(&self) -> Option<&Path> {
        self.memo_path.as_deref()
    }

    /// Random access by record index.
    pub fn record(&mut self, index: RecordIndex) -> Result<Record, XBaseError> {
        read_record(
            &mut self.file,
            &self.header,
            &self.columns,
            self.memo.as_mut(),
            self.memo_path.as_deref(),
            index,
        )
    }

    /// Next record of the sequential scan, `None` past the last one.
    pub fn next_record(&mut self) -> Result<Option<Record>, XBaseError> {
        if self.position >= self.header.record_count {
            return Ok(None);
        }
        let record = self.record(self.position)?;
        self.position += 1;
        Ok(Some(record))
    }

    /// Restart the sequential scan at the first record.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    pub fn position(&self) -> RecordIndex {
        self.position
    }

    pub fn records(&mut self) -> ScanIterator<'_, Self> {
        self.rewind();
        ScanIterator::new(self)
    }
}

impl Scanner for TableReader {
    fn scan(&mut self) -> Result<Option<Record>, XBaseError> {
        self.next_record()
    }

    fn scan_batch(&mut self, batch_size: usize) -> Result<Vec<Record>, XBaseError> {
        let mut batch = Vec::with_capacity(batch_size);
        while batch.len() < batch_size {
            match self.next_record()? {
                Some(record) => batch.push(record),
                None => break,
            }
        }
        Ok(batch)
    }

    fn reset(&mut self) -> Result<(), XBaseError> {
        self.rewind();
        Ok(())
    }
}
