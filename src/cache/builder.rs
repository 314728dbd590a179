//! End-to-end transcript cache build from imported drafts.

use std::io::Write;

use log::info;

use crate::error::Error;
use crate::regulatory::RegulatoryRegion;
use crate::transcript::canonical::CanonicalSelector;
use crate::transcript::types::TranscriptDraft;

use super::header::CacheHeader;
use super::staging::CacheData;
use super::writer::CacheWriter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheBuildStats {
    pub num_transcripts: usize,
    pub num_canonical: usize,
    pub num_regulatory_regions: usize,
    pub num_genes: usize,
    pub num_regions: usize,
    pub num_mirnas: usize,
    pub num_peptides: usize,
}

/// Marks canonical transcripts, freezes the drafts, stages the unique tables
/// and writes the cache. Nothing is written unless every step succeeds.
pub fn build_cache<W: Write>(
    writer: W,
    header: &CacheHeader,
    mut transcripts: Vec<TranscriptDraft>,
    regulatory_regions: Vec<RegulatoryRegion>,
    selector: &CanonicalSelector,
    num_refs: usize,
) -> Result<(W, CacheBuildStats), Error> {
    let num_canonical = selector.mark_canonical(&mut transcripts)?;
    info!(
        "marked {num_canonical} of {} transcripts canonical",
        transcripts.len()
    );

    let stats_base = CacheBuildStats {
        num_transcripts: transcripts.len(),
        num_canonical,
        num_regulatory_regions: regulatory_regions.len(),
        ..CacheBuildStats::default()
    };

    let frozen = transcripts.into_iter().map(TranscriptDraft::freeze).collect();
    let data = CacheData::stage(frozen, regulatory_regions, num_refs)?;
    let stats = CacheBuildStats {
        num_genes: data.genes.len(),
        num_regions: data.regions.len(),
        num_mirnas: data.mirnas.len(),
        num_peptides: data.peptide_seqs.len(),
        ..stats_base
    };

    let writer = CacheWriter::write(writer, header, &data)?;
    Ok((writer, stats))
}
