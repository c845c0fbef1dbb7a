use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tempfile::TempDir;

use crate::{
    executor::create_table::TableCreator,
    storage::{header::Header, schema::ColumnSpec},
    types::error::XBaseError,
};

/// A table path inside a private temporary directory, removed on drop.
pub struct TempTable {
    dir: TempDir,
    pub path: PathBuf,
}

impl TempTable {
    pub fn new() -> io::Result<Self> {
        Self::with_name("test.dbf")
    }

    pub fn with_name(file_name: &str) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("xbase_test").tempdir()?;
        let path = dir.path().join(file_name);
        Ok(Self { dir, path })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Path of another file next to the table.
    pub fn sibling(&self, file_name: &str) -> PathBuf {
        self.dir.path().join(file_name)
    }

    /// Create the table with the given columns.
    pub fn create(&self, header: Header, columns: &[ColumnSpec]) -> Result<Header, XBaseError> {
        let mut creator = TableCreator::new(&self.path, header);
        for column in columns {
            creator.add_column(column.clone());
        }
        creator.save()
    }

    /// File names currently in the directory, sorted.
    pub fn files(&self) -> io::Result<Vec<String>> {
        let mut names = fs::read_dir(self.dir.path())?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<io::Result<Vec<_>>>()?;
        names.sort();
        Ok(names)
    }
}
