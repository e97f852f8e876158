//! Journal backend trait definition.

use crate::error::StoreResult;

/// Byte storage underneath the journal.
///
/// Backends are opaque byte stores. The store owns framing and entry
/// encoding; backends only append, read back and atomically replace bytes.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_all` returns every byte appended since the last `replace`
/// - `replace` is atomic: readers see either the old or the new contents
/// - Backends must be `Send + Sync`
pub trait JournalBackend: Send + Sync {
    /// Reads the entire journal.
    fn read_all(&self) -> StoreResult<Vec<u8>>;

    /// Appends data to the end of the journal. Returns the write offset.
    fn append(&mut self, data: &[u8]) -> StoreResult<u64>;

    /// Makes all appended data durable.
    fn sync(&mut self) -> StoreResult<()>;

    /// Returns the current journal size in bytes.
    fn size(&self) -> StoreResult<u64>;

    /// Atomically replaces the journal contents.
    ///
    /// Used by compaction and by torn-tail repair on open.
    fn replace(&mut self, data: &[u8]) -> StoreResult<()>;
}
