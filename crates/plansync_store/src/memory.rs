//! In-memory journal for tests and ephemeral stores.

use crate::backend::JournalBackend;
use crate::error::StoreResult;
use parking_lot::RwLock;
use std::sync::Arc;

/// An in-memory journal.
///
/// Clones share the same buffer, so a test can keep a handle, drop the store
/// and reopen a new store over the same bytes to exercise replay.
///
/// ```rust
/// use plansync_store::{JournalBackend, MemoryJournal};
///
/// let mut journal = MemoryJournal::new();
/// let offset = journal.append(b"frame").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(journal.size().unwrap(), 5);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryJournal {
    data: Arc<RwLock<Vec<u8>>>,
}

impl MemoryJournal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a journal holding pre-existing bytes.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Returns a copy of the journal bytes.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl JournalBackend for MemoryJournal {
    fn read_all(&self) -> StoreResult<Vec<u8>> {
        Ok(self.data.read().clone())
    }

    fn append(&mut self, new_data: &[u8]) -> StoreResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn sync(&mut self) -> StoreResult<()> {
        Ok(())
    }

    fn size(&self) -> StoreResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn replace(&mut self, new_data: &[u8]) -> StoreResult<()> {
        let mut data = self.data.write();
        data.clear();
        data.extend_from_slice(new_data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_read() {
        let mut journal = MemoryJournal::new();
        assert_eq!(journal.append(b"hello").unwrap(), 0);
        assert_eq!(journal.append(b" world").unwrap(), 5);
        assert_eq!(journal.read_all().unwrap(), b"hello world");
    }

    #[test]
    fn clones_share_bytes() {
        let mut journal = MemoryJournal::new();
        let handle = journal.clone();
        journal.append(b"abc").unwrap();
        assert_eq!(handle.data(), b"abc");
    }

    #[test]
    fn replace_discards_old_bytes() {
        let mut journal = MemoryJournal::with_data(b"old contents".to_vec());
        journal.replace(b"new").unwrap();
        assert_eq!(journal.size().unwrap(), 3);
        assert_eq!(journal.read_all().unwrap(), b"new");
    }
}
