//! Binary reference sequence files: a header of chromosome names followed by
//! independently zstd-compressed per-chromosome sequences.

pub mod reader;
pub mod writer;

/// Read-only access to one chromosome's bases using 1-based coordinates.
pub trait SequenceProvider {
    /// Returns `length` bases starting at `start`, or None if any part of the
    /// range lies outside the sequence.
    fn bases(&self, start: u32, length: usize) -> Option<&[u8]>;

    /// Number of bases in the sequence.
    fn len(&self) -> u32;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
