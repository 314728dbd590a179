//! SA index: per chromosome, the span and file offset of every block plus the
//! reference-minor positions. Written to its own stream once all blocks have
//! been flushed.

use std::io::{Read, Write};

use crate::error::Error;
use crate::format::binary_io::{BinaryRead, BinaryWrite};
use crate::format::common_header::{FileType, read_common_header, write_common_header};

/// Closed position range covered by one block and where the block starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRef {
    pub first_position: i32,
    pub last_position: i32,
    pub file_offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromosomeIndex {
    pub ref_index: u16,
    pub blocks: Vec<BlockRef>,
    pub ref_minor_positions: Vec<i32>,
}

impl ChromosomeIndex {
    #[must_use]
    pub fn new(ref_index: u16) -> Self {
        Self {
            ref_index,
            blocks: Vec::new(),
            ref_minor_positions: Vec::new(),
        }
    }

    /// The block whose span contains `position`.
    #[must_use]
    pub fn find_block(&self, position: i32) -> Option<&BlockRef> {
        let i = self.blocks.partition_point(|b| b.last_position < position);
        self.blocks
            .get(i)
            .filter(|block| block.first_position <= position)
    }

    #[must_use]
    pub fn is_ref_minor(&self, position: i32) -> bool {
        self.ref_minor_positions.binary_search(&position).is_ok()
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        writer.write_opt_u32(u32::from(self.ref_index))?;

        writer.write_opt_usize(self.blocks.len())?;
        let mut prev_start = 0i32;
        let mut prev_offset = 0u64;
        for block in &self.blocks {
            writer.write_opt_u32(block.first_position.wrapping_sub(prev_start) as u32)?;
            writer.write_opt_u32(block.last_position.wrapping_sub(block.first_position) as u32)?;
            writer.write_opt_u64(block.file_offset.wrapping_sub(prev_offset))?;
            prev_start = block.first_position;
            prev_offset = block.file_offset;
        }

        writer.write_opt_usize(self.ref_minor_positions.len())?;
        let mut prev = 0i32;
        for &position in &self.ref_minor_positions {
            writer.write_opt_u32(position.wrapping_sub(prev) as u32)?;
            prev = position;
        }
        Ok(())
    }

    fn read<R: Read>(reader: &mut R) -> Result<Self, Error> {
        let ref_index = reader.read_opt_u32()?;
        let ref_index = u16::try_from(ref_index)
            .map_err(|_| Error::Format(format!("SA index ref index {ref_index} exceeds u16")))?;

        let num_blocks = reader.read_opt_usize()?;
        let mut blocks = Vec::with_capacity(num_blocks.min(1 << 16));
        let mut start = 0i32;
        let mut offset = 0u64;
        for _ in 0..num_blocks {
            start = add_delta(start, reader.read_opt_u32()?)?;
            let last_position = add_delta(start, reader.read_opt_u32()?)?;
            offset = offset
                .checked_add(reader.read_opt_u64()?)
                .ok_or_else(|| Error::Format("SA index file offset overflows".to_string()))?;
            blocks.push(BlockRef {
                first_position: start,
                last_position,
                file_offset: offset,
            });
        }

        let num_ref_minor = reader.read_opt_usize()?;
        let mut ref_minor_positions = Vec::with_capacity(num_ref_minor.min(1 << 20));
        let mut position = 0i32;
        for _ in 0..num_ref_minor {
            position = add_delta(position, reader.read_opt_u32()?)?;
            ref_minor_positions.push(position);
        }

        Ok(Self {
            ref_index,
            blocks,
            ref_minor_positions,
        })
    }
}

fn add_delta(base: i32, delta: u32) -> Result<i32, Error> {
    i32::try_from(i64::from(base) + i64::from(delta))
        .map_err(|_| Error::Format("SA index position overflows".to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaIndex {
    pub reference_id: u32,
    chromosomes: Vec<ChromosomeIndex>,
}

impl SaIndex {
    /// Chromosomes are kept sorted by ref index; a ref index may appear once.
    pub fn new(reference_id: u32, mut chromosomes: Vec<ChromosomeIndex>) -> Result<Self, Error> {
        chromosomes.sort_by_key(|c| c.ref_index);
        if let Some(pair) = chromosomes
            .windows(2)
            .find(|pair| pair[0].ref_index == pair[1].ref_index)
        {
            return Err(Error::Validation(format!(
                "ref index {} appears more than once in the SA index",
                pair[0].ref_index
            )));
        }
        Ok(Self {
            reference_id,
            chromosomes,
        })
    }

    #[must_use]
    pub fn get(&self, ref_index: u16) -> Option<&ChromosomeIndex> {
        self.chromosomes
            .binary_search_by_key(&ref_index, |c| c.ref_index)
            .ok()
            .map(|i| &self.chromosomes[i])
    }

    #[must_use]
    pub fn chromosomes(&self) -> &[ChromosomeIndex] {
        &self.chromosomes
    }

    pub fn into_chromosomes(self) -> Vec<ChromosomeIndex> {
        self.chromosomes
    }

    #[must_use]
    pub fn num_blocks(&self) -> usize {
        self.chromosomes.iter().map(|c| c.blocks.len()).sum()
    }

    #[must_use]
    pub fn is_ref_minor(&self, ref_index: u16, position: i32) -> bool {
        self.get(ref_index)
            .is_some_and(|c| c.is_ref_minor(position))
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        write_common_header(writer, FileType::SupplementaryIndex)?;
        writer.write_u32(self.reference_id)?;
        writer.write_opt_usize(self.chromosomes.len())?;
        for chromosome in &self.chromosomes {
            chromosome.write(writer)?;
        }
        Ok(())
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self, Error> {
        read_common_header(reader, FileType::SupplementaryIndex)?;
        let reference_id = reader.read_u32()?;
        let count = reader.read_opt_usize()?;
        let mut chromosomes = Vec::with_capacity(count.min(1 << 10));
        for _ in 0..count {
            chromosomes.push(ChromosomeIndex::read(reader)?);
        }
        Self::new(reference_id, chromosomes)
    }
}
