//! Journal framing and entries.
//!
//! The journal is an append-only sequence of frames:
//!
//! ```text
//! | magic "PSJ1" (4) | kind (1) | len (4, LE) | payload (len) | crc32 (4, LE) |
//! ```
//!
//! The CRC covers `kind`, `len` and `payload`. Payloads are CBOR-encoded
//! [`JournalEntry`] values.
//!
//! Replay stops at a torn tail (an incomplete or checksum-failing last frame)
//! and reports the length of the good prefix. A bad frame followed by more
//! data is corruption.

mod entry;
mod frame;

pub use entry::{EntryKind, JournalEntry};
pub use frame::{compute_crc32, encode_frame, Frame, FrameReader, FRAME_MAGIC};
