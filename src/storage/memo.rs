use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::types::{BlockIndex, EOF_MARKER, error::XBaseError, table_type::MemoKind};

const DBASE3_BLOCK_SIZE: u32 = 512;
const DBASE4_DEFAULT_BLOCK_SIZE: u32 = 512;
const FOXPRO_DEFAULT_BLOCK_SIZE: u32 = 64;
const FOXPRO_HEADER_SIZE: u32 = 512;
const DBASE4_ENTRY_SIGNATURE: [u8; 4] = [0xFF, 0xFF, 0x08, 0x00];
const ENTRY_HEADER_SIZE: usize = 8;
const FOXPRO_TYPE_PICTURE: u32 = 0;
const FOXPRO_TYPE_TEXT: u32 = 1;

/// Whether `data` survives a dBase III entry, which ends at the first
/// `0x1A 0x1A`. A trailing `0x1A` would pair with the terminator.
pub fn terminated_entry_safe(data: &[u8]) -> bool {
    data.last() != Some(&EOF_MARKER)
        && !data.windows(2).any(|w| w[0] == EOF_MARKER && w[1] == EOF_MARKER)
}

/// Append-only block storage behind memo-type columns.
///
/// Entries are never rewritten: a changed memo value is appended as a new
/// entry and the record's pointer moves to it.
pub struct MemoStore {
    file: File,
    path: PathBuf,
    kind: MemoKind,
    block_size: u32,
    next_free: BlockIndex,
}

impl MemoStore {
    /// Companion memo path for a table, matching the case of its extension.
    pub fn memo_path(table_path: &Path, kind: MemoKind) -> PathBuf {
        let extension = match kind {
            MemoKind::DBase3 | MemoKind::DBase4 => "dbt",
            MemoKind::FoxPro => "fpt",
        };
        let upper = table_path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| !e.is_empty() && e.chars().all(|c| !c.is_ascii_lowercase()));
        if upper {
            table_path.with_extension(extension.to_ascii_uppercase())
        } else {
            table_path.with_extension(extension)
        }
    }

    /// The memo file of an existing table, trying both extension cases.
    pub fn find_memo_path(table_path: &Path, kind: MemoKind) -> Option<PathBuf> {
        let preferred = Self::memo_path(table_path, kind);
        if preferred.is_file() {
            return Some(preferred);
        }
        let extension = preferred.extension()?.to_str()?;
        let alternate = if extension.chars().any(|c| c.is_ascii_lowercase()) {
            preferred.with_extension(extension.to_ascii_uppercase())
        } else {
            preferred.with_extension(extension.to_ascii_lowercase())
        };
        alternate.is_file().then_some(alternate)
    }

    pub fn default_block_size(kind: MemoKind) -> u32 {
        match kind {
            MemoKind::DBase3 => DBASE3_BLOCK_SIZE,
            MemoKind::DBase4 => DBASE4_DEFAULT_BLOCK_SIZE,
            MemoKind::FoxPro => FOXPRO_DEFAULT_BLOCK_SIZE,
        }
    }

    fn resolve_block_size(kind: MemoKind, requested: Option<u16>) -> Result<u32, XBaseError> {
        let block_size = match (kind, requested) {
            (MemoKind::DBase3, _) | (_, None) => return Ok(Self::default_block_size(kind)),
            (_, Some(size)) => size as u32,
        };
        let minimum = match kind {
            MemoKind::DBase4 => 32,
            _ => ENTRY_HEADER_SIZE as u32,
        };
        if block_size < minimum {
            return Err(XBaseError::SchemaError {
                details: format!("Memo block size {} is below {}", block_size, minimum),
            });
        }
        Ok(block_size)
    }

    fn first_data_block(kind: MemoKind, block_size: u32) -> BlockIndex {
        match kind {
            MemoKind::DBase3 | MemoKind::DBase4 => 1,
            MemoKind::FoxPro => FOXPRO_HEADER_SIZE.div_ceil(block_size),
        }
    }

    /// Bytes of an empty memo file: the header block(s) only.
    pub fn empty_file_bytes(kind: MemoKind, block_size: Option<u16>) -> Result<Vec<u8>, XBaseError> {
        let block_size = Self::resolve_block_size(kind, block_size)?;
        let next_free = Self::first_data_block(kind, block_size);
        let mut header = vec![0u8; (next_free * block_size) as usize];
        match kind {
            MemoKind::DBase3 => {
                header[..4].copy_from_slice(&next_free.to_le_bytes());
            }
            MemoKind::DBase4 => {
                header[..4].copy_from_slice(&next_free.to_le_bytes());
                header[20..22].copy_from_slice(&(block_size as u16).to_le_bytes());
            }
            MemoKind::FoxPro => {
                header[..4].copy_from_slice(&next_free.to_be_bytes());
                header[6..8].copy_from_slice(&(block_size as u16).to_be_bytes());
            }
        }
        Ok(header)
    }

    /// Create (or truncate) a memo file holding only its header.
    pub fn create<P: AsRef<Path>>(
        path: P,
        kind: MemoKind,
        block_size: Option<u16>,
    ) -> Result<Self, XBaseError> {
        let path = path.as_ref();
        let bytes = Self::empty_file_bytes(kind, block_size)?;
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .truncate(true)
            .open(path)?;
        file.write_all(&bytes)?;
        file.flush()?;
        debug!(path = %path.display(), ?kind, "created memo file");
        Self::from_file(file, path, kind)
    }

    /// Open an existing memo file read-only.
    pub fn open<P: AsRef<Path>>(path: P, kind: MemoKind) -> Result<Self, XBaseError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::from_file(file, path, kind)
    }

    /// Open an existing memo file for appending.
    pub fn open_writable<P: AsRef<Path>>(path: P, kind: MemoKind) -> Result<Self, XBaseError> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Self::from_file(file, path, kind)
    }

    fn from_file(mut file: File, path: &Path, kind: MemoKind) -> Result<Self, XBaseError> {
        let mut header = [0u8; 22];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header).map_err(|_| XBaseError::CorruptedMemo {
            block: 0,
            reason: "memo header too short".to_string(),
        })?;

        let (next_free, block_size) = match kind {
            MemoKind::DBase3 => (
                u32::from_le_bytes([header[0], header[1], header[2], header[3]]),
                DBASE3_BLOCK_SIZE,
            ),
            MemoKind::DBase4 => {
                let size = u16::from_le_bytes([header[20], header[21]]) as u32;
                (
                    u32::from_le_bytes([header[0], header[1], header[2], header[3]]),
                    if size == 0 { DBASE4_DEFAULT_BLOCK_SIZE } else { size },
                )
            }
            MemoKind::FoxPro => {
                let size = u16::from_be_bytes([header[6], header[7]]) as u32;
                (
                    u32::from_be_bytes([header[0], header[1], header[2], header[3]]),
                    if size == 0 { FOXPRO_DEFAULT_BLOCK_SIZE } else { size },
                )
            }
        };

        // Never trust a stale next-free pointer over the actual file length.
        let file_blocks = file.metadata()?.len().div_ceil(block_size as u64) as u32;
        let next_free = next_free
            .max(file_blocks)
            .max(Self::first_data_block(kind, block_size));

        Ok(Self {
            file,
            path: path.to_path_buf(),
            kind,
            block_size,
            next_free,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> MemoKind {
        self.kind
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn next_free_block(&self) -> BlockIndex {
        self.next_free
    }

    /// Append a text payload at the end of the file.
    pub fn append(&mut self, data: &[u8]) -> Result<BlockIndex, XBaseError> {
        self.append_with_type(data, true)
    }

    /// Append a payload; `text` selects the FoxPro entry type.
    pub fn append_with_type(&mut self, data: &[u8], text: bool) -> Result<BlockIndex, XBaseError> {
        let mut entry = Vec::with_capacity(data.len() + ENTRY_HEADER_SIZE);
        match self.kind {
            MemoKind::DBase3 => {
                if !terminated_entry_safe(data) {
                    return Err(XBaseError::UnsupportedOperation {
                        details: "dBase III memo entries cannot contain 0x1A 0x1A".to_string(),
                    });
                }
                entry.extend_from_slice(data);
                entry.extend_from_slice(&[EOF_MARKER, EOF_MARKER]);
            }
            MemoKind::DBase4 => {
                let total = u32::try_from(data.len() + ENTRY_HEADER_SIZE).map_err(|_| {
                    XBaseError::UnsupportedOperation {
                        details: "memo payload exceeds 4 GiB".to_string(),
                    }
                })?;
                entry.extend_from_slice(&DBASE4_ENTRY_SIGNATURE);
                entry.extend_from_slice(&total.to_le_bytes());
                entry.extend_from_slice(data);
            }
            MemoKind::FoxPro => {
                let length = u32::try_from(data.len()).map_err(|_| XBaseError::UnsupportedOperation {
                    details: "memo payload exceeds 4 GiB".to_string(),
                })?;
                let entry_type = if text { FOXPRO_TYPE_TEXT } else { FOXPRO_TYPE_PICTURE };
                entry.extend_from_slice(&entry_type.to_be_bytes());
                entry.extend_from_slice(&length.to_be_bytes());
                entry.extend_from_slice(data);
            }
        }

        let blocks = (entry.len() as u64).div_ceil(self.block_size as u64) as u32;
        entry.resize((blocks * self.block_size) as usize, 0);

        let block = self.next_free;
        self.file
            .seek(SeekFrom::Start(block as u64 * self.block_size as u64))?;
        self.file.write_all(&entry)?;

        self.next_free = block + blocks;
        self.write_next_free()?;
        debug!(block, blocks, bytes = data.len(), "appended memo entry");
        Ok(block)
    }

    fn write_next_free(&mut self) -> Result<(), XBaseError> {
        let raw = match self.kind {
            MemoKind::DBase3 | MemoKind::DBase4 => self.next_free.to_le_bytes(),
            MemoKind::FoxPro => self.next_free.to_be_bytes(),
        };
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&raw)?;
        self.file.flush()?;
        Ok(())
    }

    /// Read the payload of the entry starting at `block`.
    pub fn read(&mut self, block: BlockIndex) -> Result<Vec<u8>, XBaseError> {
        let file_len = self.file.metadata()?.len();
        let offset = block as u64 * self.block_size as u64;
        if block < Self::first_data_block(self.kind, self.block_size) || offset >= file_len {
            return Err(XBaseError::CorruptedMemo {
                block,
                reason: format!("block outside memo file of {} bytes", file_len),
            });
        }
        self.file.seek(SeekFrom::Start(offset))?;

        if self.kind == MemoKind::DBase3 {
            return self.read_terminated(block, file_len - offset);
        }

        let mut entry_header = [0u8; ENTRY_HEADER_SIZE];
        self.file.read_exact(&mut entry_header)?;
        let length = match self.kind {
            MemoKind::DBase4 => {
                if entry_header[..4] != DBASE4_ENTRY_SIGNATURE {
                    return Err(XBaseError::CorruptedMemo {
                        block,
                        reason: "missing entry signature".to_string(),
                    });
                }
                let total = u32::from_le_bytes([
                    entry_header[4],
                    entry_header[5],
                    entry_header[6],
                    entry_header[7],
                ]) as u64;
                total.saturating_sub(ENTRY_HEADER_SIZE as u64)
            }
            _ => u32::from_be_bytes([
                entry_header[4],
                entry_header[5],
                entry_header[6],
                entry_header[7],
            ]) as u64,
        };

        if offset + ENTRY_HEADER_SIZE as u64 + length > file_len {
            return Err(XBaseError::CorruptedMemo {
                block,
                reason: format!("entry of {} bytes runs past end of file", length),
            });
        }
        let mut data = vec![0u8; length as usize];
        self.file.read_exact(&mut data)?;
        Ok(data)
    }

    fn read_terminated(&mut self, block: BlockIndex, available: u64) -> Result<Vec<u8>, XBaseError> {
        let mut data = Vec::new();
        let mut chunk = vec![0u8; self.block_size as usize];
        let mut remaining = available;
        while remaining > 0 {
            let want = chunk.len().min(remaining as usize);
            self.file.read_exact(&mut chunk[..want])?;
            remaining -= want as u64;
            let search_from = data.len().saturating_sub(1);
            data.extend_from_slice(&chunk[..want]);
            if let Some(pos) = data[search_from..]
                .windows(2)
                .position(|w| w[0] == EOF_MARKER && w[1] == EOF_MARKER)
            {
                data.truncate(search_from + pos);
                return Ok(data);
            }
        }
        debug!(block, "memo entry without terminator, read to end of file");
        Ok(data)
    }

    pub fn sync(&self) -> Result<(), XBaseError> {
        self.file.sync_all()?;
        Ok(())
    }
}
