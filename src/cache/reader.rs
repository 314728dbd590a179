//! Transcript cache reader.

use std::io::Read;
use std::sync::Arc;

use crate::error::Error;
use crate::format::binary_io::BinaryRead;
use crate::format::common_header::check_guard;
use crate::intervals::{IntervalArray, IntervalForest};
use crate::regulatory::{RegulatoryRegion, RegulatoryRegionType};
use crate::strand::Strand;
use crate::transcript::types::{
    CodingRegion, Gene, GenomicInterval, RegionType, Transcript, TranscriptFlags,
    TranscriptRegion, Translation,
};

use super::header::CacheHeader;

/// A fully loaded transcript cache.
pub struct TranscriptCache {
    pub header: CacheHeader,
    pub genes: Vec<Arc<Gene>>,
    pub regions: Vec<TranscriptRegion>,
    pub mirnas: Vec<GenomicInterval>,
    pub peptide_seqs: Vec<String>,
    pub transcripts: IntervalForest<Transcript>,
    pub regulatory_regions: IntervalForest<RegulatoryRegion>,
}

impl TranscriptCache {
    #[must_use]
    pub fn get_overlapping_transcripts(&self, ref_index: u16, start: i32, end: i32) -> Vec<&Transcript> {
        self.transcripts.overlapping_values(ref_index, start, end)
    }

    #[must_use]
    pub fn get_overlapping_regulatory_regions(
        &self,
        ref_index: u16,
        start: i32,
        end: i32,
    ) -> Vec<&RegulatoryRegion> {
        self.regulatory_regions.overlapping_values(ref_index, start, end)
    }
}

pub struct CacheReader;

impl CacheReader {
    pub fn read<R: Read>(reader: R) -> Result<TranscriptCache, Error> {
        let mut decoder = zstd::stream::read::Decoder::new(reader)?;
        let reader = &mut decoder;

        let header = CacheHeader::read(reader)?;
        let genes: Vec<Arc<Gene>> = read_table(reader, "genes", |r| Ok(Arc::new(read_gene(r)?)))?;
        let regions = read_table(reader, "transcript regions", read_region)?;
        let mirnas = read_table(reader, "miRNAs", read_mirna)?;
        let peptide_seqs = read_table(reader, "peptides", |r| r.read_opt_string())?;

        let regulatory_regions = read_forest(reader, "regulatory regions", read_regulatory_region)?;

        let tables = Tables {
            genes: &genes,
            regions: &regions,
            mirnas: &mirnas,
            peptide_seqs: &peptide_seqs,
        };
        let transcripts = read_forest(reader, "transcripts", |r| read_transcript(r, &tables))?;

        Ok(TranscriptCache {
            header,
            genes,
            regions,
            mirnas,
            peptide_seqs,
            transcripts,
            regulatory_regions,
        })
    }
}

struct Tables<'a> {
    genes: &'a [Arc<Gene>],
    regions: &'a [TranscriptRegion],
    mirnas: &'a [GenomicInterval],
    peptide_seqs: &'a [String],
}

fn read_table<R: Read, T>(
    reader: &mut R,
    section: &str,
    mut read_item: impl FnMut(&mut R) -> Result<T, Error>,
) -> Result<Vec<T>, Error> {
    let count = reader.read_opt_usize()?;
    let mut items = Vec::with_capacity(count.min(1 << 20));
    for _ in 0..count {
        items.push(read_item(reader)?);
    }
    check_guard(reader, section)?;
    Ok(items)
}

fn read_forest<R: Read, T>(
    reader: &mut R,
    section: &str,
    mut read_item: impl FnMut(&mut R) -> Result<T, Error>,
) -> Result<IntervalForest<T>, Error>
where
    T: crate::intervals::Span,
{
    let num_refs = reader.read_opt_usize()?;
    let mut arrays = Vec::with_capacity(num_refs.min(1 << 16));
    for _ in 0..num_refs {
        let count = reader.read_opt_usize()?;
        let mut values = Vec::with_capacity(count.min(1 << 20));
        for _ in 0..count {
            values.push(read_item(reader)?);
        }
        arrays.push(IntervalArray::from_values(values));
    }
    check_guard(reader, section)?;
    Ok(IntervalForest::new(arrays))
}

fn read_ref_index<R: Read>(reader: &mut R) -> Result<u16, Error> {
    let value = reader.read_opt_u32()?;
    u16::try_from(value).map_err(|_| Error::Format(format!("reference index {value} exceeds u16")))
}

fn read_gene<R: Read>(reader: &mut R) -> Result<Gene, Error> {
    Ok(Gene {
        chromosome_index: read_ref_index(reader)?,
        start: reader.read_opt_i32()?,
        end: reader.read_opt_i32()?,
        strand: Strand::try_from(reader.read_u8()?)?,
        symbol: reader.read_opt_string()?,
        entrez_gene_id: reader.read_opt_string()?,
        ensembl_id: reader.read_opt_string()?,
        hgnc_id: match reader.read_opt_i32()? {
            -1 => None,
            id => Some(id),
        },
    })
}

fn read_region<R: Read>(reader: &mut R) -> Result<TranscriptRegion, Error> {
    let region_type = RegionType::try_from(reader.read_u8()?)?;
    let id = reader.read_opt_u32()?;
    Ok(TranscriptRegion {
        region_type,
        id: u16::try_from(id)
            .map_err(|_| Error::Format(format!("region ID {id} exceeds u16")))?,
        start: reader.read_opt_i32()?,
        end: reader.read_opt_i32()?,
        cdna_start: reader.read_opt_i32()?,
        cdna_end: reader.read_opt_i32()?,
    })
}

fn read_mirna<R: Read>(reader: &mut R) -> Result<GenomicInterval, Error> {
    Ok(GenomicInterval {
        start: reader.read_opt_i32()?,
        end: reader.read_opt_i32()?,
    })
}

fn read_regulatory_region<R: Read>(reader: &mut R) -> Result<RegulatoryRegion, Error> {
    Ok(RegulatoryRegion {
        chromosome_index: read_ref_index(reader)?,
        start: reader.read_opt_i32()?,
        end: reader.read_opt_i32()?,
        id: reader.read_opt_string()?,
        region_type: RegulatoryRegionType::try_from(reader.read_u8()?)?,
    })
}

fn lookup<'a, T>(table: &'a [T], index: usize, what: &str, transcript_id: &str) -> Result<&'a T, Error> {
    table.get(index).ok_or_else(|| {
        Error::Format(format!(
            "transcript {transcript_id} references {what} {index} but only {} exist",
            table.len()
        ))
    })
}

fn read_transcript<R: Read>(reader: &mut R, tables: &Tables<'_>) -> Result<Transcript, Error> {
    let chromosome_index = read_ref_index(reader)?;
    let start = reader.read_opt_i32()?;
    let end = reader.read_opt_i32()?;
    let id = reader.read_opt_string()?;
    let version = reader.read_u8()?;
    let flags = TranscriptFlags::decode(reader.read_u16()?)?;
    let strand = Strand::try_from(reader.read_u8()?)?;

    let gene = Arc::clone(lookup(tables.genes, reader.read_opt_usize()?, "gene", &id)?);

    let num_regions = reader.read_opt_usize()?;
    let mut regions = Vec::with_capacity(num_regions.min(1 << 16));
    for _ in 0..num_regions {
        regions.push(*lookup(tables.regions, reader.read_opt_usize()?, "region", &id)?);
    }

    let translation = if flags.has_translation {
        let coding_region = CodingRegion {
            start: reader.read_opt_i32()?,
            end: reader.read_opt_i32()?,
            cdna_start: reader.read_opt_i32()?,
            cdna_end: reader.read_opt_i32()?,
            cds_length: reader.read_opt_i32()?,
        };
        let protein_id = reader.read_opt_string()?;
        let protein_version = reader.read_u8()?;
        let peptide_seq = lookup(tables.peptide_seqs, reader.read_opt_usize()?, "peptide", &id)?;
        Some(Translation {
            coding_region,
            protein_id,
            protein_version,
            peptide_seq: peptide_seq.clone(),
        })
    } else {
        None
    };

    let mut mirnas = Vec::new();
    if flags.has_mirnas {
        let count = reader.read_opt_usize()?;
        for _ in 0..count {
            mirnas.push(*lookup(tables.mirnas, reader.read_opt_usize()?, "miRNA", &id)?);
        }
    }

    Ok(Transcript {
        chromosome_index,
        start,
        end,
        id,
        version,
        source: flags.source,
        strand,
        is_canonical: flags.is_canonical,
        gene,
        regions: regions.into(),
        translation,
        mirnas: mirnas.into(),
    })
}
