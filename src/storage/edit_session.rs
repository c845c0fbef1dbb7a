use std::{
    fs::{self, File, OpenOptions},
    io::{Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{
    config::Config,
    storage::{header::Header, memo::MemoStore},
    types::{error::XBaseError, table_type::MemoKind},
};

/// Where an edit session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Original parsed, nothing written yet.
    Opened,
    /// Writes go to a private working copy.
    Cloned,
    /// The working copy replaced the original. A further write clones again.
    Finalized,
    /// The working copy was deleted without being published.
    Discarded,
}

/// Private copy of the table (and memo) that receives every write.
pub struct WorkingCopy {
    pub table_path: PathBuf,
    pub table: File,
    pub memo_path: Option<PathBuf>,
    pub memo: Option<MemoStore>,
}

enum SessionState {
    Opened,
    Cloned(WorkingCopy),
    Finalized,
    Discarded,
}

/// Clone-and-swap protocol over one table file.
///
/// The original is only ever read until [`EditSession::finalize`] renames the
/// working copy over it. [`EditSession::discard`] deletes the working copy.
/// Dropping a session that still holds a working copy discards it.
pub struct EditSession {
    original: PathBuf,
    original_memo: Option<PathBuf>,
    memo_kind: Option<MemoKind>,
    config: Config,
    state: SessionState,
}

impl EditSession {
    /// `memo_kind` is set when the table has memo-backed columns.
    pub fn open<P: AsRef<Path>>(
        original: P,
        memo_kind: Option<MemoKind>,
        config: Config,
    ) -> Result<Self, XBaseError> {
        let original = original.as_ref().to_path_buf();
        let metadata = fs::metadata(&original)?;
        if !metadata.is_file() {
            return Err(XBaseError::UnsupportedOperation {
                details: format!(
                    "{} is not a regular file; edits are published by rename",
                    original.display()
                ),
            });
        }
        let original_memo = memo_kind.and_then(|kind| MemoStore::find_memo_path(&original, kind));

        Ok(Self {
            original,
            original_memo,
            memo_kind,
            config,
            state: SessionState::Opened,
        })
    }

    pub fn original_path(&self) -> &Path {
        &self.original
    }

    pub fn original_memo_path(&self) -> Option<&Path> {
        self.original_memo.as_deref()
    }

    pub fn phase(&self) -> SessionPhase {
        match self.state {
            SessionState::Opened => SessionPhase::Opened,
            SessionState::Cloned(_) => SessionPhase::Cloned,
            SessionState::Finalized => SessionPhase::Finalized,
            SessionState::Discarded => SessionPhase::Discarded,
        }
    }

    /// Sibling path used for the working copy of `path`.
    pub fn clone_path(path: &Path, prefix: &str) -> PathBuf {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!("{}{}", prefix, file_name))
    }

    /// The working copy, cloning the original on first use.
    pub fn working_copy(&mut self) -> Result<&mut WorkingCopy, XBaseError> {
        if let SessionState::Discarded = self.state {
            return Err(XBaseError::UnsupportedOperation {
                details: "edit session was discarded".to_string(),
            });
        }
        if !matches!(self.state, SessionState::Cloned(_)) {
            let copy = self.clone_original()?;
            self.state = SessionState::Cloned(copy);
        }
        match &mut self.state {
            SessionState::Cloned(copy) => Ok(copy),
            _ => unreachable!("state set to Cloned above"),
        }
    }

    /// The working copy if one exists, without cloning.
    pub fn existing_working_copy(&mut self) -> Option<&mut WorkingCopy> {
        match &mut self.state {
            SessionState::Cloned(copy) => Some(copy),
            _ => None,
        }
    }

    fn clone_original(&self) -> Result<WorkingCopy, XBaseError> {
        let table_path = Self::clone_path(&self.original, &self.config.clone_prefix);
        if table_path.exists() {
            warn!(path = %table_path.display(), "overwriting stale working copy");
        }

        fs::copy(&self.original, &table_path).map_err(|source| {
            let _ = fs::remove_file(&table_path);
            XBaseError::CloneFailed {
                path: self.original.clone(),
                source,
            }
        })?;

        let memo_path = self.memo_kind.map(|kind| match &self.original_memo {
            Some(memo) => Self::clone_path(memo, &self.config.clone_prefix),
            None => Self::clone_path(
                &MemoStore::memo_path(&self.original, kind),
                &self.config.clone_prefix,
            ),
        });

        let opened = self.open_working_files(&table_path, memo_path.as_deref());
        match opened {
            Ok((table, memo)) => {
                info!(
                    original = %self.original.display(),
                    clone = %table_path.display(),
                    "cloned table for editing"
                );
                Ok(WorkingCopy {
                    table_path,
                    table,
                    memo_path,
                    memo,
                })
            }
            Err(e) => {
                let _ = fs::remove_file(&table_path);
                if let Some(memo_path) = &memo_path {
                    let _ = fs::remove_file(memo_path);
                }
                Err(e)
            }
        }
    }

    fn open_working_files(
        &self,
        table_path: &Path,
        memo_path: Option<&Path>,
    ) -> Result<(File, Option<MemoStore>), XBaseError> {
        let table = OpenOptions::new().read(true).write(true).open(table_path)?;

        let memo = match (self.memo_kind, memo_path, &self.original_memo) {
            (Some(kind), Some(memo_path), Some(original_memo)) => {
                fs::copy(original_memo, memo_path).map_err(|source| XBaseError::CloneFailed {
                    path: original_memo.clone(),
                    source,
                })?;
                Some(MemoStore::open_writable(memo_path, kind)?)
            }
            (Some(kind), Some(memo_path), None) => {
                debug!(path = %memo_path.display(), "original has no memo file, starting a new one");
                Some(MemoStore::create(memo_path, kind, self.config.memo_block_size)?)
            }
            _ => None,
        };

        Ok((table, memo))
    }

    /// Write `header`'s fixed block into the working copy and rename the copy
    /// over the original. A session without a working copy has nothing to
    /// publish and returns immediately.
    pub fn finalize(&mut self, header: &Header) -> Result<(), XBaseError> {
        let copy = match std::mem::replace(&mut self.state, SessionState::Finalized) {
            SessionState::Cloned(copy) => copy,
            other => {
                self.state = other;
                return Ok(());
            }
        };

        match self.publish(copy, header) {
            Ok(memo_target) => {
                if memo_target.is_some() {
                    self.original_memo = memo_target;
                }
                info!(path = %self.original.display(), records = header.record_count, "saved table");
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Discarded;
                Err(e)
            }
        }
    }

    fn publish(&self, mut copy: WorkingCopy, header: &Header) -> Result<Option<PathBuf>, XBaseError> {
        let cleanup = |copy: &WorkingCopy| {
            let _ = fs::remove_file(&copy.table_path);
            if let Some(memo_path) = &copy.memo_path {
                let _ = fs::remove_file(memo_path);
            }
        };

        let prepared = (|| -> Result<(), XBaseError> {
            copy.table.seek(SeekFrom::Start(0))?;
            copy.table.write_all(&header.fixed_bytes())?;
            copy.table.flush()?;
            if self.config.sync_on_save {
                copy.table.sync_all()?;
                if let Some(memo) = &copy.memo {
                    memo.sync()?;
                }
            }
            Ok(())
        })();
        if let Err(e) = prepared {
            cleanup(&copy);
            return Err(e);
        }

        // The memo is renamed first. If the table rename then fails, the
        // original memo has already been replaced; it only ever grows, so the
        // old table stays readable against it.
        let mut memo_target = None;
        if let (Some(memo_path), Some(kind)) = (&copy.memo_path, self.memo_kind) {
            let target = self
                .original_memo
                .clone()
                .unwrap_or_else(|| MemoStore::memo_path(&self.original, kind));
            if let Err(source) = fs::rename(memo_path, &target) {
                cleanup(&copy);
                return Err(XBaseError::PersistFailed {
                    path: target,
                    source,
                });
            }
            memo_target = Some(target);
        }

        if let Err(source) = fs::rename(&copy.table_path, &self.original) {
            let _ = fs::remove_file(&copy.table_path);
            if let Some(memo) = &memo_target {
                warn!(
                    memo = %memo.display(),
                    "table rename failed after the memo file was replaced; original table kept"
                );
            }
            return Err(XBaseError::PersistFailed {
                path: self.original.clone(),
                source,
            });
        }

        Ok(memo_target)
    }

    /// Delete the working copy, leaving the original untouched.
    pub fn discard(&mut self) -> Result<(), XBaseError> {
        match std::mem::replace(&mut self.state, SessionState::Discarded) {
            SessionState::Cloned(copy) => {
                let WorkingCopy {
                    table_path,
                    table,
                    memo_path,
                    memo,
                } = copy;
                drop(table);
                drop(memo);
                fs::remove_file(&table_path)?;
                if let Some(memo_path) = memo_path {
                    if memo_path.exists() {
                        fs::remove_file(&memo_path)?;
                    }
                }
                info!(path = %self.original.display(), "discarded unsaved edits");
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl Drop for EditSession {
    fn drop(&mut self) {
        if let SessionState::Cloned(_) = self.state {
            warn!(path = %self.original.display(), "edit session dropped without save or close");
            if let Err(e) = self.discard() {
                warn!(error = %e, "failed to remove working copy");
            }
        }
    }
}
