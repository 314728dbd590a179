//! Concatenation of per-chromosome SA stores into one store.
//!
//! Each part's block data is copied verbatim after the first part's header;
//! only the index offsets change.

use std::io::{self, Read, Seek, Write};

use log::info;

use crate::context::BuildContext;
use crate::error::Error;

use super::header::SaHeader;
use super::index::{ChromosomeIndex, SaIndex};

/// One store and its index.
pub struct SaPart<S, I> {
    /// Used in error messages.
    pub name: String,
    pub store: S,
    pub index: I,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConcatStats {
    pub num_parts: usize,
    pub num_chromosomes: usize,
    pub num_blocks: usize,
    pub num_bytes: u64,
}

/// Parts must be supplied in ascending reference order and may not share a
/// chromosome.
pub fn concat_stores<S, I, W, X>(
    parts: impl IntoIterator<Item = SaPart<S, I>>,
    mut writer: W,
    index_writer: &mut X,
) -> Result<(W, ConcatStats), Error>
where
    S: Read + Seek,
    I: Read,
    W: Write,
    X: Write,
{
    let mut header: Option<SaHeader> = None;
    let mut context = BuildContext::new();
    let mut chromosomes: Vec<ChromosomeIndex> = Vec::new();
    let mut file_position = 0u64;
    let mut stats = ConcatStats::default();

    for mut part in parts {
        let part_header = SaHeader::read(&mut part.store)?;
        let data_start = part.store.stream_position()?;
        let part_index = SaIndex::read(&mut part.index)?;
        if part_index.reference_id != part_header.reference_id {
            return Err(Error::Format(format!(
                "{}: index reference id {} does not match store reference id {}",
                part.name, part_index.reference_id, part_header.reference_id
            )));
        }

        match &header {
            None => {
                let mut bytes = Vec::new();
                part_header.write(&mut bytes)?;
                writer.write_all(&bytes)?;
                file_position = bytes.len() as u64;
                header = Some(part_header);
            }
            Some(first) if !first.is_compatible(&part_header) => {
                return Err(Error::Validation(format!(
                    "{}: header differs from the first part ({} vs {})",
                    part.name, part_header.data_source, first.data_source
                )));
            }
            Some(_) => {}
        }

        let mut part_chromosomes = part_index.into_chromosomes();
        for chromosome in &mut part_chromosomes {
            context.mark_processed(chromosome.ref_index, &part.name)?;
            if let Some(previous) = chromosomes.last() {
                if chromosome.ref_index < previous.ref_index {
                    return Err(Error::UnsortedInput(format!(
                        "{}: ref index {} follows ref index {}",
                        part.name, chromosome.ref_index, previous.ref_index
                    )));
                }
            }

            for block in &mut chromosome.blocks {
                let relative = block.file_offset.checked_sub(data_start).ok_or_else(|| {
                    Error::Format(format!(
                        "{}: block offset {} lies inside the header",
                        part.name, block.file_offset
                    ))
                })?;
                block.file_offset = file_position + relative;
            }
            stats.num_blocks += chromosome.blocks.len();
            chromosomes.push(chromosome.clone());
        }

        let copied = io::copy(&mut part.store, &mut writer)?;
        file_position += copied;
        stats.num_parts += 1;
    }

    let Some(header) = header else {
        return Err(Error::Validation("no SA stores to concatenate".to_string()));
    };

    writer.flush()?;
    stats.num_chromosomes = chromosomes.len();
    stats.num_bytes = file_position;

    SaIndex::new(header.reference_id, chromosomes)?.write(index_writer)?;
    index_writer.flush()?;

    info!(
        "concatenated {} SA stores: {} chromosomes, {} blocks, {} bytes",
        stats.num_parts, stats.num_chromosomes, stats.num_blocks, stats.num_bytes
    );
    Ok((writer, stats))
}
