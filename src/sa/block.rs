//! SA blocks.
//!
//! ```text
//! varint uncompressed length
//! varint stored length          equal to the uncompressed length when raw
//! varint entry count
//! entry count x (varint position delta, varint offset delta)
//! stored bytes
//! ```

use std::io::{Read, Write};

use crate::error::Error;
use crate::format::binary_io::{BinaryRead, BinaryWrite};

use super::BLOCK_COMPRESSION_LEVEL;

/// One position and the offset of its record inside the uncompressed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    position: i32,
    offset: u32,
}

/// Accumulates records on the write path; holds one decoded block on the read
/// path. Buffers are reused across blocks.
#[derive(Debug)]
pub struct SaBlock {
    capacity: usize,
    data: Vec<u8>,
    entries: Vec<Entry>,
    scratch: Vec<u8>,
}

impl SaBlock {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            data: Vec::new(),
            entries: Vec::new(),
            scratch: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Uncompressed bytes held.
    #[must_use]
    pub fn num_bytes(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn first_position(&self) -> Option<i32> {
        self.entries.first().map(|e| e.position)
    }

    #[must_use]
    pub fn last_position(&self) -> Option<i32> {
        self.entries.last().map(|e| e.position)
    }

    /// An empty block accepts any record, however large.
    #[must_use]
    pub fn has_room(&self, num_bytes: usize) -> bool {
        self.data.is_empty() || self.data.len() + num_bytes <= self.capacity
    }

    /// Appends a record. Positions must increase; the writer enforces that
    /// before calling.
    pub fn add(&mut self, position: i32, record: &[u8]) -> Result<(), Error> {
        let offset = u32::try_from(self.data.len())
            .map_err(|_| Error::Validation("SA block exceeds 4 GiB".to_string()))?;
        self.entries.push(Entry { position, offset });
        self.data.extend_from_slice(record);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.entries.clear();
    }

    /// Compresses and writes the block, then clears it. Returns the number of
    /// bytes written.
    pub fn write_to<W: Write>(&mut self, writer: &mut W) -> Result<u64, Error> {
        let compressed = zstd::bulk::compress(&self.data, BLOCK_COMPRESSION_LEVEL)?;
        let stored: &[u8] = if compressed.len() < self.data.len() {
            &compressed
        } else {
            &self.data
        };

        let out = &mut self.scratch;
        out.clear();
        out.write_opt_usize(self.data.len())?;
        out.write_opt_usize(stored.len())?;
        out.write_opt_usize(self.entries.len())?;

        let mut prev_position = 0i32;
        let mut prev_offset = 0u32;
        for entry in &self.entries {
            out.write_opt_u32(entry.position.wrapping_sub(prev_position) as u32)?;
            out.write_opt_u32(entry.offset - prev_offset)?;
            prev_position = entry.position;
            prev_offset = entry.offset;
        }
        out.extend_from_slice(stored);

        writer.write_all(out)?;
        let written = out.len() as u64;
        self.clear();
        Ok(written)
    }

    /// Replaces the contents with the next block from `reader`.
    pub fn load<R: Read>(&mut self, reader: &mut R) -> Result<(), Error> {
        self.clear();

        let uncompressed_len = reader.read_opt_usize()?;
        let stored_len = reader.read_opt_usize()?;
        let count = reader.read_opt_usize()?;

        let mut position = 0i32;
        let mut offset = 0u32;
        for _ in 0..count {
            let position_delta = reader.read_opt_u32()?;
            let offset_delta = reader.read_opt_u32()?;
            position = i32::try_from(i64::from(position) + i64::from(position_delta))
                .map_err(|_| Error::Format("SA block position overflows".to_string()))?;
            offset = offset
                .checked_add(offset_delta)
                .ok_or_else(|| Error::Format("SA block offset overflows".to_string()))?;
            if offset as usize > uncompressed_len {
                return Err(Error::Format(format!(
                    "SA block offset {offset} lies beyond its {uncompressed_len} bytes"
                )));
            }
            self.entries.push(Entry { position, offset });
        }

        self.scratch.resize(stored_len, 0);
        reader.read_exact(&mut self.scratch)?;

        if stored_len == uncompressed_len {
            self.data.extend_from_slice(&self.scratch);
        } else {
            self.data = zstd::bulk::decompress(&self.scratch, uncompressed_len)?;
        }

        if self.data.len() != uncompressed_len {
            return Err(Error::Format(format!(
                "SA block decompressed to {} bytes, expected {uncompressed_len}",
                self.data.len()
            )));
        }
        Ok(())
    }

    /// The encoded record at exactly `position`.
    #[must_use]
    pub fn record(&self, position: i32) -> Option<&[u8]> {
        let i = self
            .entries
            .binary_search_by_key(&position, |e| e.position)
            .ok()?;
        let start = self.entries[i].offset as usize;
        let end = self
            .entries
            .get(i + 1)
            .map_or(self.data.len(), |next| next.offset as usize);
        self.data.get(start..end)
    }

    /// Positions held, in order.
    pub fn positions(&self) -> impl Iterator<Item = i32> + '_ {
        self.entries.iter().map(|e| e.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressible_block_round_trip() {
        let mut block = SaBlock::new(1 << 20);
        let record = vec![b'x'; 200];
        for (i, position) in [100, 105, 9000].into_iter().enumerate() {
            let mut bytes = record.clone();
            bytes[0] = i as u8;
            block.add(position, &bytes).unwrap();
        }
        assert_eq!(block.first_position(), Some(100));
        assert_eq!(block.last_position(), Some(9000));

        let mut file = Vec::new();
        let written = block.write_to(&mut file).unwrap();
        assert_eq!(written, file.len() as u64);
        assert!(block.is_empty());
        assert!(file.len() < 600, "block should compress, got {} bytes", file.len());

        let mut loaded = SaBlock::new(0);
        loaded.load(&mut file.as_slice()).unwrap();
        assert_eq!(loaded.positions().collect::<Vec<_>>(), vec![100, 105, 9000]);
        assert_eq!(loaded.record(105).unwrap()[0], 1);
        assert_eq!(loaded.record(9000).unwrap().len(), 200);
        assert!(loaded.record(101).is_none());
    }

    #[test]
    fn incompressible_block_is_stored_raw() {
        let mut block = SaBlock::new(1 << 20);
        block.add(7, &[1, 2, 3]).unwrap();

        let mut file = Vec::new();
        block.write_to(&mut file).unwrap();
        // uncompressed length, stored length, count, one entry, 3 raw bytes
        assert_eq!(file, vec![3, 3, 1, 7, 0, 1, 2, 3]);

        let mut loaded = SaBlock::new(0);
        loaded.load(&mut file.as_slice()).unwrap();
        assert_eq!(loaded.record(7), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn capacity_is_checked_but_empty_block_takes_anything() {
        let mut block = SaBlock::new(10);
        assert!(block.has_room(100));
        block.add(1, &[0; 8]).unwrap();
        assert!(block.has_room(2));
        assert!(!block.has_room(3));
    }

    #[test]
    fn decompressed_size_mismatch_is_detected() {
        let mut block = SaBlock::new(1 << 20);
        block.add(1, &[b'a'; 100]).unwrap();
        let mut file = Vec::new();
        block.write_to(&mut file).unwrap();
        // claim one byte more than was compressed
        assert_eq!(file[0], 100);
        file[0] = 101;

        let mut loaded = SaBlock::new(0);
        let err = loaded.load(&mut file.as_slice()).unwrap_err();
        assert!(matches!(err, Error::Format(_)), "{err}");
    }

    #[test]
    fn consecutive_blocks_share_buffers() {
        let mut block = SaBlock::new(1 << 20);
        let mut file = Vec::new();
        block.add(1, b"first").unwrap();
        block.write_to(&mut file).unwrap();
        block.add(50, b"second").unwrap();
        block.write_to(&mut file).unwrap();

        let mut reader = file.as_slice();
        let mut loaded = SaBlock::new(0);
        loaded.load(&mut reader).unwrap();
        assert_eq!(loaded.record(1), Some(&b"first"[..]));
        loaded.load(&mut reader).unwrap();
        assert_eq!(loaded.record(50), Some(&b"second"[..]));
        assert!(loaded.record(1).is_none());
        assert!(reader.is_empty());
    }
}
