//! SA store writer.

use std::io::Write;

use log::debug;

use crate::chromosome::Chromosome;
use crate::context::BuildContext;
use crate::error::Error;

use super::DEFAULT_BLOCK_CAPACITY;
use super::block::SaBlock;
use super::header::SaHeader;
use super::index::{BlockRef, ChromosomeIndex, SaIndex};
use super::record::SaRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaWriteStats {
    pub num_records: usize,
    pub num_blocks: usize,
    pub num_chromosomes: usize,
    pub num_ref_minor: usize,
    /// Size of the store stream, header included.
    pub num_bytes: u64,
}

/// Streams records into blocks. Records arrive chromosome by chromosome with
/// strictly increasing positions; the index is only written by [`finish`].
///
/// [`finish`]: SaWriter::finish
pub struct SaWriter<W: Write> {
    writer: W,
    file_position: u64,
    reference_id: u32,
    block: SaBlock,
    record_buf: Vec<u8>,
    finished: Vec<ChromosomeIndex>,
    current: Option<ChromosomeIndex>,
    last_position: i32,
    context: BuildContext,
    stats: SaWriteStats,
}

impl<W: Write> SaWriter<W> {
    pub fn new(writer: W, header: &SaHeader) -> Result<Self, Error> {
        Self::with_block_capacity(writer, header, DEFAULT_BLOCK_CAPACITY)
    }

    pub fn with_block_capacity(
        mut writer: W,
        header: &SaHeader,
        block_capacity: usize,
    ) -> Result<Self, Error> {
        let mut header_bytes = Vec::new();
        header.write(&mut header_bytes)?;
        writer.write_all(&header_bytes)?;

        Ok(Self {
            writer,
            file_position: header_bytes.len() as u64,
            reference_id: header.reference_id,
            block: SaBlock::new(block_capacity),
            record_buf: Vec::new(),
            finished: Vec::new(),
            current: None,
            last_position: 0,
            context: BuildContext::new(),
            stats: SaWriteStats::default(),
        })
    }

    pub fn write<R: SaRecord>(
        &mut self,
        chromosome: &Chromosome,
        position: i32,
        record: &R,
    ) -> Result<(), Error> {
        if position < 1 {
            return Err(Error::Validation(format!(
                "SA positions are 1-based, got {position} on {}",
                chromosome.display_name()
            )));
        }

        let same_chromosome = self
            .current
            .as_ref()
            .is_some_and(|c| c.ref_index == chromosome.ref_index);
        if !same_chromosome {
            self.start_chromosome(chromosome)?;
        } else if position <= self.last_position {
            return Err(Error::UnsortedInput(format!(
                "SA positions must strictly increase: {}:{position} follows {}",
                chromosome.display_name(),
                self.last_position
            )));
        }

        self.record_buf.clear();
        record.write_to(&mut self.record_buf)?;
        if !self.block.has_room(self.record_buf.len()) {
            self.flush_block()?;
        }
        self.block.add(position, &self.record_buf)?;
        self.last_position = position;
        self.stats.num_records += 1;

        if record.is_ref_minor() {
            if let Some(current) = self.current.as_mut() {
                current.ref_minor_positions.push(position);
            }
            self.stats.num_ref_minor += 1;
        }
        Ok(())
    }

    fn start_chromosome(&mut self, chromosome: &Chromosome) -> Result<(), Error> {
        if self.context.is_processed(chromosome.ref_index) {
            return Err(Error::UnsortedInput(format!(
                "chromosome {} reappears after other chromosomes",
                chromosome.display_name()
            )));
        }
        self.close_chromosome()?;
        self.context
            .mark_processed(chromosome.ref_index, chromosome.display_name())?;
        self.current = Some(ChromosomeIndex::new(chromosome.ref_index));
        self.last_position = 0;
        Ok(())
    }

    fn close_chromosome(&mut self) -> Result<(), Error> {
        self.flush_block()?;
        if let Some(done) = self.current.take() {
            self.finished.push(done);
        }
        Ok(())
    }

    fn flush_block(&mut self) -> Result<(), Error> {
        let (Some(first_position), Some(last_position)) =
            (self.block.first_position(), self.block.last_position())
        else {
            return Ok(());
        };
        let Some(current) = self.current.as_mut() else {
            return Ok(());
        };

        let num_records = self.block.len();
        let file_offset = self.file_position;
        let written = self.block.write_to(&mut self.writer)?;
        self.file_position += written;

        current.blocks.push(BlockRef {
            first_position,
            last_position,
            file_offset,
        });
        self.stats.num_blocks += 1;
        debug!(
            "flushed SA block: ref {} positions {first_position}-{last_position}, {num_records} records, {written} bytes",
            current.ref_index
        );
        Ok(())
    }

    /// Flushes the last block, writes the index and hands back the store
    /// stream.
    pub fn finish<I: Write>(mut self, index_writer: &mut I) -> Result<(W, SaWriteStats), Error> {
        self.close_chromosome()?;
        self.writer.flush()?;

        let mut stats = self.stats;
        stats.num_chromosomes = self.finished.len();
        stats.num_bytes = self.file_position;

        let index = SaIndex::new(self.reference_id, self.finished)?;
        index.write(index_writer)?;
        index_writer.flush()?;

        Ok((self.writer, stats))
    }
}
