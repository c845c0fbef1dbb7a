use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::{
    config::Config,
    storage::{
        header::Header,
        memo::MemoStore,
        schema::{self, ColumnSpec},
    },
    types::{EOF_MARKER, error::XBaseError},
};

/// Builds a brand-new table file with zero records.
///
/// Columns are accumulated with [`TableCreator::add_column`] and validated
/// in full by [`TableCreator::save`] before anything touches the disk.
pub struct TableCreator {
    path: PathBuf,
    header: Header,
    columns: Vec<ColumnSpec>,
    config: Config,
}

impl TableCreator {
    pub fn new<P: AsRef<Path>>(path: P, header: Header) -> Self {
        Self::with_config(path, header, Config::default())
    }

    pub fn with_config<P: AsRef<Path>>(path: P, header: Header, config: Config) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            header,
            columns: Vec::new(),
            config,
        }
    }

    pub fn add_column(&mut self, column: ColumnSpec) -> &mut Self {
        self.columns.push(column);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate the accumulated columns into a complete header.
    pub fn build_header(&self) -> Result<Header, XBaseError> {
        let columns = schema::build_columns(self.header.version, &self.columns)?;
        let mut header = self.header.clone();
        header.record_count = 0;
        header.set_columns(columns)?;
        Ok(header)
    }

    fn memo_bytes(&self, header: &Header) -> Result<Option<Vec<u8>>, XBaseError> {
        match header.version.memo_kind() {
            Some(kind) if header.has_memo_columns() => Ok(Some(MemoStore::empty_file_bytes(
                kind,
                self.config.memo_block_size,
            )?)),
            _ => Ok(None),
        }
    }

    fn table_bytes(&self, header: &Header) -> Vec<u8> {
        let mut bytes = header.to_bytes();
        if self.config.write_eof_marker {
            bytes.push(EOF_MARKER);
        }
        bytes
    }

    /// Create the table (and its memo file when a memo column exists).
    /// Returns the validated header.
    pub fn save(&self) -> Result<Header, XBaseError> {
        let header = self.build_header()?;
        let table_bytes = self.table_bytes(&header);
        let memo_bytes = self.memo_bytes(&header)?;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        if let Err(e) = file.write_all(&table_bytes).and_then(|_| file.flush()) {
            drop(file);
            let _ = fs::remove_file(&self.path);
            return Err(e.into());
        }

        if let (Some(bytes), Some(kind)) = (memo_bytes, header.version.memo_kind()) {
            let memo_path = MemoStore::memo_path(&self.path, kind);
            if let Err(e) = fs::write(&memo_path, &bytes) {
                drop(file);
                let _ = fs::remove_file(&self.path);
                return Err(e.into());
            }
            debug!(path = %memo_path.display(), "created memo file");
        }

        info!(
            path = %self.path.display(),
            version = ?header.version,
            columns = header.columns.len(),
            header_length = header.header_length,
            record_length = header.record_length,
            "created table"
        );
        Ok(header)
    }

    /// Write the new table to arbitrary sinks with plain sequential writes.
    /// `memo` is required when the table has memo columns.
    pub fn write_to<W: Write, M: Write>(
        &self,
        table: &mut W,
        memo: Option<&mut M>,
    ) -> Result<Header, XBaseError> {
        let header = self.build_header()?;
        let memo_bytes = self.memo_bytes(&header)?;
        if memo_bytes.is_some() && memo.is_none() {
            return Err(XBaseError::UnsupportedOperation {
                details: "table has memo columns but no memo writer was given".to_string(),
            });
        }

        table.write_all(&self.table_bytes(&header))?;
        table.flush()?;
        if let (Some(bytes), Some(memo)) = (memo_bytes, memo) {
            memo.write_all(&bytes)?;
            memo.flush()?;
        }
        Ok(header)
    }
}
