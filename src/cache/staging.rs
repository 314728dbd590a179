//! Staging: deduplicates the shared sub-objects of all transcripts and groups
//! transcripts and regulatory regions into per-chromosome interval arrays.

use std::collections::HashMap;
use std::hash::Hash;

use log::info;

use crate::error::Error;
use crate::intervals::IntervalForest;
use crate::regulatory::RegulatoryRegion;
use crate::transcript::types::{Gene, GenomicInterval, Transcript, TranscriptRegion};

/// Insertion-ordered set that hands out stable indices.
#[derive(Debug, Clone)]
pub struct IndexTable<T> {
    items: Vec<T>,
    positions: HashMap<T, usize>,
}

impl<T> Default for IndexTable<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<T: Eq + Hash + Clone> IndexTable<T> {
    /// Returns the index of `item`, adding it if it is new.
    pub fn insert(&mut self, item: &T) -> usize {
        if let Some(&index) = self.positions.get(item) {
            return index;
        }
        let index = self.items.len();
        self.items.push(item.clone());
        self.positions.insert(item.clone(), index);
        index
    }

    #[must_use]
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.positions.get(item).copied()
    }

    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Everything the cache writer needs, with referential completeness
/// guaranteed: every gene, region, miRNA and peptide referenced by a staged
/// transcript is present in its table.
pub struct CacheData {
    pub genes: IndexTable<Gene>,
    pub regions: IndexTable<TranscriptRegion>,
    pub mirnas: IndexTable<GenomicInterval>,
    pub peptide_seqs: IndexTable<String>,
    pub transcripts: IntervalForest<Transcript>,
    pub regulatory_regions: IntervalForest<RegulatoryRegion>,
}

impl CacheData {
    pub fn stage(
        mut transcripts: Vec<Transcript>,
        regulatory_regions: Vec<RegulatoryRegion>,
        num_refs: usize,
    ) -> Result<Self, Error> {
        // deterministic table order regardless of input order
        transcripts.sort_by(|a, b| {
            (a.chromosome_index, a.start, a.end, &a.id, a.version).cmp(&(
                b.chromosome_index,
                b.start,
                b.end,
                &b.id,
                b.version,
            ))
        });

        let mut genes = IndexTable::default();
        let mut regions = IndexTable::default();
        let mut mirnas = IndexTable::default();
        let mut peptide_seqs = IndexTable::default();

        for transcript in &transcripts {
            genes.insert(transcript.gene.as_ref());
            for region in transcript.regions.iter() {
                regions.insert(region);
            }
            for mirna in transcript.mirnas.iter() {
                mirnas.insert(mirna);
            }
            if let Some(translation) = &transcript.translation {
                peptide_seqs.insert(&translation.peptide_seq);
            }
        }

        let num_transcripts = transcripts.len();
        let transcripts =
            IntervalForest::group(transcripts, num_refs, |t| t.chromosome_index).map_err(|t| {
                Error::Validation(format!(
                    "transcript {} is on ref index {} but only {num_refs} references exist",
                    t.versioned_id(),
                    t.chromosome_index
                ))
            })?;

        let num_regulatory = regulatory_regions.len();
        let regulatory_regions =
            IntervalForest::group(regulatory_regions, num_refs, |r| r.chromosome_index).map_err(
                |r| {
                    Error::Validation(format!(
                        "regulatory region {} is on ref index {} but only {num_refs} references exist",
                        r.id, r.chromosome_index
                    ))
                },
            )?;

        info!(
            "staged {num_transcripts} transcripts, {num_regulatory} regulatory regions; unique: {} genes, {} regions, {} miRNAs, {} peptides",
            genes.len(),
            regions.len(),
            mirnas.len(),
            peptide_seqs.len()
        );

        Ok(Self {
            genes,
            regions,
            mirnas,
            peptide_seqs,
            transcripts,
            regulatory_regions,
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use crate::strand::Strand;
    use crate::transcript::types::{
        CodingRegion, Gene, GenomicInterval, RegionType, Source, Transcript, TranscriptRegion,
        Translation,
    };

    pub fn gene(symbol: &str, entrez: &str) -> Arc<Gene> {
        Arc::new(Gene {
            chromosome_index: 0,
            start: 100,
            end: 1000,
            strand: Strand::Forward,
            symbol: symbol.to_string(),
            entrez_gene_id: entrez.to_string(),
            ensembl_id: String::new(),
            hgnc_id: Some(42),
        })
    }

    pub fn exon(id: u16, start: i32, end: i32, cdna_start: i32) -> TranscriptRegion {
        TranscriptRegion {
            region_type: RegionType::Exon,
            id,
            start,
            end,
            cdna_start,
            cdna_end: cdna_start + (end - start),
        }
    }

    pub fn transcript(
        id: &str,
        chromosome_index: u16,
        gene: &Arc<Gene>,
        regions: Vec<TranscriptRegion>,
        peptide: Option<&str>,
    ) -> Transcript {
        let start = regions.first().map_or(0, |r| r.start);
        let end = regions.last().map_or(0, |r| r.end);
        Transcript {
            chromosome_index,
            start,
            end,
            id: id.to_string(),
            version: 1,
            source: Source::RefSeq,
            strand: Strand::Forward,
            is_canonical: false,
            gene: Arc::clone(gene),
            regions: regions.into(),
            translation: peptide.map(|p| Translation {
                coding_region: CodingRegion {
                    start: start + 10,
                    end: end - 10,
                    cdna_start: 11,
                    cdna_end: 40,
                    cds_length: 30,
                },
                protein_id: format!("NP_{id}"),
                protein_version: 2,
                peptide_seq: p.to_string(),
            }),
            mirnas: vec![GenomicInterval::new(start + 1, start + 20)].into(),
        }
    }
}
