//! File-backed journal.

use crate::backend::JournalBackend;
use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A journal stored in a single OS file.
///
/// # Durability
///
/// - `sync()` calls `File::sync_all()`
/// - `replace()` writes a sibling temp file, syncs it, and renames it over
///   the journal, so a crash leaves either the old or the new journal
#[derive(Debug)]
pub struct FileJournal {
    path: PathBuf,
    file: RwLock<File>,
    size: u64,
}

impl FileJournal {
    /// Opens or creates the journal file at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let file = Self::open_file(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            size,
        })
    }

    /// Returns the journal path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_file(path: &Path) -> StoreResult<File> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?)
    }

    fn temp_path(&self) -> StoreResult<PathBuf> {
        let name = self
            .path
            .file_name()
            .ok_or_else(|| StoreError::InvalidPath(self.path.display().to_string()))?;
        let mut temp = name.to_os_string();
        temp.push(".tmp");
        Ok(self.path.with_file_name(temp))
    }

    #[cfg(unix)]
    fn sync_parent(&self) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            File::open(parent)?.sync_all()?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_parent(&self) -> StoreResult<()> {
        Ok(())
    }
}

impl JournalBackend for FileJournal {
    fn read_all(&self) -> StoreResult<Vec<u8>> {
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(0))?;
        let mut buffer = Vec::with_capacity(usize::try_from(self.size).unwrap_or(0));
        file.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StoreResult<u64> {
        let offset = self.size;
        if data.is_empty() {
            return Ok(offset);
        }
        let mut file = self.file.write();
        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        self.size += data.len() as u64;
        Ok(offset)
    }

    fn sync(&mut self) -> StoreResult<()> {
        let mut file = self.file.write();
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    fn size(&self) -> StoreResult<u64> {
        Ok(self.size)
    }

    fn replace(&mut self, data: &[u8]) -> StoreResult<()> {
        let temp_path = self.temp_path()?;
        {
            let mut temp = File::create(&temp_path)?;
            temp.write_all(data)?;
            temp.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;
        self.sync_parent()?;

        *self.file.write() = Self::open_file(&self.path)?;
        self.size = data.len() as u64;
        Ok(())
    }
}
