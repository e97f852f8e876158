//! Frame encoding and the replay reader.

use crate::error::{StoreError, StoreResult};

/// Magic bytes opening every frame.
pub const FRAME_MAGIC: [u8; 4] = *b"PSJ1";

/// magic (4) + kind (1) + length (4)
const HEADER_SIZE: usize = 9;

const CRC_SIZE: usize = 4;

/// Encodes one frame.
pub fn encode_frame(kind: u8, payload: &[u8]) -> StoreResult<Vec<u8>> {
    let len = u32::try_from(payload.len())
        .map_err(|_| StoreError::codec(format!("payload too large: {} bytes", payload.len())))?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    frame.extend_from_slice(&FRAME_MAGIC);
    frame.push(kind);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(payload);
    let crc = compute_crc32(&frame[FRAME_MAGIC.len()..]);
    frame.extend_from_slice(&crc.to_le_bytes());
    Ok(frame)
}

/// A decoded frame borrowed from the journal bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Offset of the frame in the journal.
    pub offset: usize,
    /// Entry kind byte.
    pub kind: u8,
    /// Entry payload.
    pub payload: &'a [u8],
}

/// Reads frames from a journal image.
///
/// # Error Handling
///
/// - An incomplete header or payload at the end is a torn tail: iteration ends
/// - A CRC mismatch on the last frame is a torn tail: iteration ends
/// - A CRC mismatch with more bytes after the frame is corruption
/// - Invalid magic is corruption
#[derive(Debug)]
pub struct FrameReader<'a> {
    data: &'a [u8],
    pos: usize,
    torn: bool,
    finished: bool,
}

impl<'a> FrameReader<'a> {
    /// Creates a reader over the full journal bytes.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            torn: false,
            finished: false,
        }
    }

    /// Length of the prefix made of good frames read so far.
    #[must_use]
    pub fn valid_len(&self) -> usize {
        self.pos
    }

    /// Returns true if reading stopped at a torn tail.
    #[must_use]
    pub fn torn_tail(&self) -> bool {
        self.torn
    }

    /// Reads the next frame.
    ///
    /// Returns `Ok(None)` at the end of the journal or at a torn tail.
    pub fn next_frame(&mut self) -> StoreResult<Option<Frame<'a>>> {
        if self.finished {
            return Ok(None);
        }
        let start = self.pos;
        let remaining = self.data.len() - start;
        if remaining == 0 {
            self.finished = true;
            return Ok(None);
        }
        if remaining < HEADER_SIZE {
            return Ok(self.stop_torn());
        }

        let header = &self.data[start..start + HEADER_SIZE];
        if header[0..4] != FRAME_MAGIC {
            self.finished = true;
            return Err(StoreError::corrupted(format!(
                "invalid magic at offset {start}"
            )));
        }
        let kind = header[4];
        let len = u32::from_le_bytes([header[5], header[6], header[7], header[8]]) as usize;

        let payload_start = start + HEADER_SIZE;
        let end = payload_start
            .checked_add(len)
            .and_then(|p| p.checked_add(CRC_SIZE));
        let end = match end {
            Some(end) if end <= self.data.len() => end,
            _ => return Ok(self.stop_torn()),
        };

        let crc_offset = end - CRC_SIZE;
        let stored = u32::from_le_bytes([
            self.data[crc_offset],
            self.data[crc_offset + 1],
            self.data[crc_offset + 2],
            self.data[crc_offset + 3],
        ]);
        let computed = compute_crc32(&self.data[start + FRAME_MAGIC.len()..crc_offset]);
        if stored != computed {
            if end == self.data.len() {
                return Ok(self.stop_torn());
            }
            self.finished = true;
            return Err(StoreError::corrupted(format!(
                "checksum mismatch at offset {start}: expected {stored:#010x}, got {computed:#010x}"
            )));
        }

        self.pos = end;
        Ok(Some(Frame {
            offset: start,
            kind,
            payload: &self.data[payload_start..crc_offset],
        }))
    }

    fn stop_torn(&mut self) -> Option<Frame<'a>> {
        self.torn = true;
        self.finished = true;
        None
    }
}

/// Computes the IEEE CRC32 of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn journal(frames: &[(u8, &[u8])]) -> Vec<u8> {
        frames
            .iter()
            .flat_map(|(kind, payload)| encode_frame(*kind, payload).unwrap())
            .collect()
    }

    fn read_all(data: &[u8]) -> StoreResult<(Vec<(u8, Vec<u8>)>, usize, bool)> {
        let mut reader = FrameReader::new(data);
        let mut out = Vec::new();
        while let Some(frame) = reader.next_frame()? {
            out.push((frame.kind, frame.payload.to_vec()));
        }
        Ok((out, reader.valid_len(), reader.torn_tail()))
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }

    #[test]
    fn reads_every_frame() {
        let data = journal(&[(1, b"one"), (2, b""), (3, b"three")]);
        let (frames, valid, torn) = read_all(&data).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2], (3, b"three".to_vec()));
        assert_eq!(valid, data.len());
        assert!(!torn);
    }

    #[test]
    fn empty_journal() {
        let (frames, valid, torn) = read_all(&[]).unwrap();
        assert!(frames.is_empty());
        assert_eq!(valid, 0);
        assert!(!torn);
    }

    #[test]
    fn truncated_tail_is_torn() {
        let data = journal(&[(1, b"one"), (2, b"two")]);
        let first_len = encode_frame(1, b"one").unwrap().len();

        for cut in [first_len + 3, first_len + HEADER_SIZE + 1, data.len() - 1] {
            let (frames, valid, torn) = read_all(&data[..cut]).unwrap();
            assert_eq!(frames.len(), 1, "cut at {cut}");
            assert_eq!(valid, first_len);
            assert!(torn);
        }
    }

    #[test]
    fn bad_checksum_on_last_frame_is_torn() {
        let mut data = journal(&[(1, b"one"), (2, b"two")]);
        let last = data.len() - 1;
        data[last] ^= 0xFF;
        let (frames, _, torn) = read_all(&data).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(torn);
    }

    #[test]
    fn bad_checksum_mid_journal_is_corruption() {
        let mut data = journal(&[(1, b"one"), (2, b"two")]);
        data[HEADER_SIZE] ^= 0xFF; // first payload byte
        assert!(matches!(read_all(&data), Err(StoreError::Corrupted(_))));
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut data = journal(&[(1, b"one")]);
        data[0] = b'X';
        assert!(matches!(read_all(&data), Err(StoreError::Corrupted(_))));
    }
}
