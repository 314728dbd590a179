//! Transcript cache serializer.
//!
//! Layout inside one zstd stream:
//!
//! ```text
//! header
//! genes        count, items, guard
//! regions      count, items, guard
//! miRNAs       count, items, guard
//! peptides     count, items, guard
//! regulatory   num refs, (count, items) per ref, guard
//! transcripts  num refs, (count, items) per ref, guard
//! ```
//!
//! Transcripts refer to genes, regions, miRNAs and peptides by table index.

use std::io::Write;

use crate::error::Error;
use crate::format::binary_io::BinaryWrite;
use crate::format::common_header::write_guard;
use crate::intervals::IntervalForest;
use crate::regulatory::RegulatoryRegion;
use crate::transcript::types::{Gene, GenomicInterval, Transcript, TranscriptRegion};

use super::header::CacheHeader;
use super::staging::{CacheData, IndexTable};

pub const CACHE_COMPRESSION_LEVEL: i32 = 19;

pub struct CacheWriter;

impl CacheWriter {
    /// Serializes the staged data and returns the underlying writer once the
    /// compressed stream has been finalized.
    pub fn write<W: Write>(writer: W, header: &CacheHeader, data: &CacheData) -> Result<W, Error> {
        let mut encoder = zstd::stream::write::Encoder::new(writer, CACHE_COMPRESSION_LEVEL)?;

        header.write(&mut encoder)?;
        write_table(&mut encoder, &data.genes, write_gene)?;
        write_table(&mut encoder, &data.regions, write_region)?;
        write_table(&mut encoder, &data.mirnas, write_mirna)?;
        write_table(&mut encoder, &data.peptide_seqs, |w, seq| {
            w.write_opt_string(seq)
        })?;

        write_forest(&mut encoder, &data.regulatory_regions, write_regulatory_region)?;
        write_forest(&mut encoder, &data.transcripts, |w, transcript| {
            write_transcript(w, transcript, data)
        })?;

        Ok(encoder.finish()?)
    }
}

fn write_table<W: Write, T>(
    writer: &mut W,
    table: &IndexTable<T>,
    write_item: impl Fn(&mut W, &T) -> Result<(), Error>,
) -> Result<(), Error>
where
    T: Eq + std::hash::Hash + Clone,
{
    writer.write_opt_usize(table.len())?;
    for item in table.items() {
        write_item(writer, item)?;
    }
    write_guard(writer)
}

fn write_forest<W: Write, T>(
    writer: &mut W,
    forest: &IntervalForest<T>,
    mut write_item: impl FnMut(&mut W, &T) -> Result<(), Error>,
) -> Result<(), Error> {
    writer.write_opt_usize(forest.num_refs())?;
    for array in forest.arrays() {
        writer.write_opt_usize(array.len())?;
        for value in array.values() {
            write_item(writer, value)?;
        }
    }
    write_guard(writer)
}

fn write_gene<W: Write>(writer: &mut W, gene: &Gene) -> Result<(), Error> {
    writer.write_opt_u32(u32::from(gene.chromosome_index))?;
    writer.write_opt_i32(gene.start)?;
    writer.write_opt_i32(gene.end)?;
    writer.write_u8(gene.strand.to_byte())?;
    writer.write_opt_string(&gene.symbol)?;
    writer.write_opt_string(&gene.entrez_gene_id)?;
    writer.write_opt_string(&gene.ensembl_id)?;
    writer.write_opt_i32(gene.hgnc_id.unwrap_or(-1))
}

fn write_region<W: Write>(writer: &mut W, region: &TranscriptRegion) -> Result<(), Error> {
    writer.write_u8(region.region_type.to_byte())?;
    writer.write_opt_u32(u32::from(region.id))?;
    writer.write_opt_i32(region.start)?;
    writer.write_opt_i32(region.end)?;
    writer.write_opt_i32(region.cdna_start)?;
    writer.write_opt_i32(region.cdna_end)
}

fn write_mirna<W: Write>(writer: &mut W, mirna: &GenomicInterval) -> Result<(), Error> {
    writer.write_opt_i32(mirna.start)?;
    writer.write_opt_i32(mirna.end)
}

fn write_regulatory_region<W: Write>(
    writer: &mut W,
    region: &RegulatoryRegion,
) -> Result<(), Error> {
    writer.write_opt_u32(u32::from(region.chromosome_index))?;
    writer.write_opt_i32(region.start)?;
    writer.write_opt_i32(region.end)?;
    writer.write_opt_string(&region.id)?;
    writer.write_u8(region.region_type.to_byte())
}

fn write_transcript<W: Write>(
    writer: &mut W,
    transcript: &Transcript,
    data: &CacheData,
) -> Result<(), Error> {
    writer.write_opt_u32(u32::from(transcript.chromosome_index))?;
    writer.write_opt_i32(transcript.start)?;
    writer.write_opt_i32(transcript.end)?;
    writer.write_opt_string(&transcript.id)?;
    writer.write_u8(transcript.version)?;
    writer.write_u16(transcript.flags().encode())?;
    writer.write_u8(transcript.strand.to_byte())?;

    let gene_index = table_index(&data.genes, transcript.gene.as_ref(), "gene", transcript)?;
    writer.write_opt_usize(gene_index)?;

    writer.write_opt_usize(transcript.regions.len())?;
    for region in transcript.regions.iter() {
        writer.write_opt_usize(table_index(&data.regions, region, "region", transcript)?)?;
    }

    if let Some(translation) = &transcript.translation {
        let cr = &translation.coding_region;
        writer.write_opt_i32(cr.start)?;
        writer.write_opt_i32(cr.end)?;
        writer.write_opt_i32(cr.cdna_start)?;
        writer.write_opt_i32(cr.cdna_end)?;
        writer.write_opt_i32(cr.cds_length)?;
        writer.write_opt_string(&translation.protein_id)?;
        writer.write_u8(translation.protein_version)?;
        let peptide_index = table_index(
            &data.peptide_seqs,
            &translation.peptide_seq,
            "peptide",
            transcript,
        )?;
        writer.write_opt_usize(peptide_index)?;
    }

    if !transcript.mirnas.is_empty() {
        writer.write_opt_usize(transcript.mirnas.len())?;
        for mirna in transcript.mirnas.iter() {
            writer.write_opt_usize(table_index(&data.mirnas, mirna, "miRNA", transcript)?)?;
        }
    }

    Ok(())
}

/// Staging guarantees every lookup succeeds; a miss means the caller built the
/// tables by hand and left something out.
fn table_index<T: Eq + std::hash::Hash + Clone>(
    table: &IndexTable<T>,
    item: &T,
    what: &str,
    transcript: &Transcript,
) -> Result<usize, Error> {
    table.index_of(item).ok_or_else(|| {
        Error::Validation(format!(
            "transcript {} references a {what} missing from the staged tables",
            transcript.versioned_id()
        ))
    })
}
