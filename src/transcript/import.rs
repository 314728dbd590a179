//! Import of raw transcript fragments from JSON-lines dumps.
//!
//! Each line holds one transcript with its gene, exons, introns, cDNA maps and
//! optional coding region. Regions are rebuilt and validated as each line is
//! read, so a malformed transcript aborts the import immediately.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io::BufRead;
use std::sync::Arc;

use log::debug;
use serde::Deserialize;

use crate::chromosome::ChromosomeMap;
use crate::error::Error;
use crate::strand::Strand;

use super::regions::{build_regions, validate_regions};
use super::types::{
    CdnaMap, CodingRegion, Gene, GenomicInterval, Source, TranscriptDraft, Translation,
    versioned_id,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneRecord {
    start: i32,
    end: i32,
    strand: Option<String>,
    symbol: String,
    #[serde(default)]
    entrez_gene_id: String,
    #[serde(default)]
    ensembl_id: String,
    hgnc_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CodingRegionRecord {
    start: i32,
    end: i32,
    cdna_start: i32,
    cdna_end: i32,
    cds_length: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptRecord {
    id: String,
    #[serde(default)]
    version: u8,
    chromosome: String,
    start: i32,
    end: i32,
    strand: String,
    gene: GeneRecord,
    #[serde(default)]
    exons: Vec<GenomicInterval>,
    #[serde(default)]
    introns: Vec<GenomicInterval>,
    #[serde(default)]
    cdna_maps: Vec<CdnaMap>,
    coding_region: Option<CodingRegionRecord>,
    protein_id: Option<String>,
    #[serde(default)]
    protein_version: u8,
    peptide_seq: Option<String>,
    #[serde(default)]
    mirnas: Vec<GenomicInterval>,
}

/// Shares one `Arc<Gene>` among all transcripts of a gene and rejects two
/// different genes claiming the same ID on the same chromosome.
#[derive(Default)]
struct GeneTable {
    by_id: HashMap<(u16, String), Arc<Gene>>,
}

impl GeneTable {
    fn intern(&mut self, gene: Gene, source: Source) -> Result<Arc<Gene>, Error> {
        let id = match source {
            Source::Ensembl => gene.ensembl_id.clone(),
            Source::RefSeq => gene.entrez_gene_id.clone(),
        };
        if id.is_empty() {
            return Ok(Arc::new(gene));
        }

        match self.by_id.entry((gene.chromosome_index, id)) {
            Entry::Occupied(entry) => {
                if **entry.get() != gene {
                    return Err(Error::Validation(format!(
                        "multiple genes match ID {}: {} and {}",
                        entry.key().1,
                        entry.get().symbol,
                        gene.symbol
                    )));
                }
                Ok(Arc::clone(entry.get()))
            }
            Entry::Vacant(entry) => Ok(Arc::clone(entry.insert(Arc::new(gene)))),
        }
    }
}

/// Reads every transcript from a JSON-lines dump. Blank lines and lines
/// starting with `#` are skipped.
pub fn read_transcripts<R: BufRead>(
    reader: R,
    chromosomes: &ChromosomeMap,
    source: Source,
) -> Result<Vec<TranscriptDraft>, Error> {
    let mut genes = GeneTable::default();
    let mut transcripts = Vec::new();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let record: TranscriptRecord = serde_json::from_str(trimmed).map_err(|e| {
            Error::Parse(format!("transcript dump line {}: {e}", line_number + 1))
        })?;
        transcripts.push(to_draft(record, chromosomes, source, &mut genes)?);
    }

    debug!(
        "imported {} transcripts sharing {} genes",
        transcripts.len(),
        genes.by_id.len()
    );
    Ok(transcripts)
}

fn to_draft(
    record: TranscriptRecord,
    chromosomes: &ChromosomeMap,
    source: Source,
    genes: &mut GeneTable,
) -> Result<TranscriptDraft, Error> {
    let chromosome_index = chromosomes.resolve(&record.chromosome)?.ref_index;
    let strand: Strand = record.strand.parse()?;

    let gene_strand = match record.gene.strand.as_deref() {
        Some(s) => s.parse()?,
        None => strand,
    };
    let gene = genes.intern(
        Gene {
            chromosome_index,
            start: record.gene.start,
            end: record.gene.end,
            strand: gene_strand,
            symbol: record.gene.symbol,
            entrez_gene_id: record.gene.entrez_gene_id,
            ensembl_id: record.gene.ensembl_id,
            hgnc_id: record.gene.hgnc_id,
        },
        source,
    )?;

    let regions = build_regions(&record.cdna_maps, &record.exons, &record.introns, strand);
    let transcript_id = versioned_id(&record.id, record.version);
    validate_regions(
        &transcript_id,
        &regions,
        &record.exons,
        &record.introns,
        &record.cdna_maps,
    )?;

    let translation = record.coding_region.map(|cr| Translation {
        coding_region: CodingRegion {
            start: cr.start,
            end: cr.end,
            cdna_start: cr.cdna_start,
            cdna_end: cr.cdna_end,
            cds_length: cr.cds_length,
        },
        protein_id: record.protein_id.unwrap_or_default(),
        protein_version: record.protein_version,
        peptide_seq: record.peptide_seq.unwrap_or_default(),
    });

    Ok(TranscriptDraft {
        chromosome_index,
        start: record.start,
        end: record.end,
        id: record.id,
        version: record.version,
        source,
        strand,
        gene,
        regions,
        translation,
        mirnas: record.mirnas,
        is_canonical: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chromosome::test_chromosome;
    use crate::transcript::types::RegionType;
    use std::io::Cursor;

    fn chromosomes() -> ChromosomeMap {
        ChromosomeMap::new(vec![
            test_chromosome("chr1", 0, 1_000_000),
            test_chromosome("chr17", 1, 1_000_000),
        ])
        .unwrap()
    }

    const TP53_LIKE: &str = r#"{"id":"NM_000546","version":6,"chromosome":"chr17","start":100,"end":250,"strand":"-","gene":{"start":100,"end":250,"symbol":"TP53","entrezGeneId":"7157","hgncId":11998},"exons":[{"start":100,"end":150},{"start":200,"end":250}],"introns":[{"start":151,"end":199}],"cdnaMaps":[{"start":100,"end":150,"cdnaStart":52,"cdnaEnd":102},{"start":200,"end":250,"cdnaStart":1,"cdnaEnd":51}],"codingRegion":{"start":120,"end":230,"cdnaStart":20,"cdnaEnd":82,"cdsLength":63},"proteinId":"NP_000537","proteinVersion":3,"peptideSeq":"MEEPQSDPSVEPPLSQETFSDLWKLL"}"#;

    #[test]
    fn imports_transcript_with_regions() {
        let input = format!("# dump\n{TP53_LIKE}\n\n");
        let transcripts =
            read_transcripts(Cursor::new(input), &chromosomes(), Source::RefSeq).unwrap();
        assert_eq!(transcripts.len(), 1);

        let t = &transcripts[0];
        assert_eq!(t.versioned_id(), "NM_000546.6");
        assert_eq!(t.chromosome_index, 1);
        assert_eq!(t.strand, Strand::Reverse);
        assert_eq!(t.gene.strand, Strand::Reverse);
        assert_eq!(t.regions.len(), 3);
        assert_eq!(t.regions[1].region_type, RegionType::Intron);
        assert_eq!(t.cds_length(), 63);
        let translation = t.translation.as_ref().unwrap();
        assert_eq!(translation.protein_id, "NP_000537");
        assert_eq!(translation.protein_version, 3);
    }

    #[test]
    fn transcripts_of_one_gene_share_it() {
        let second = TP53_LIKE.replace("NM_000546", "NM_001126112");
        let input = format!("{TP53_LIKE}\n{second}\n");
        let transcripts =
            read_transcripts(Cursor::new(input), &chromosomes(), Source::RefSeq).unwrap();
        assert!(Arc::ptr_eq(&transcripts[0].gene, &transcripts[1].gene));
    }

    #[test]
    fn conflicting_gene_records_are_rejected() {
        let second = TP53_LIKE
            .replace("NM_000546", "NM_001126112")
            .replace("\"TP53\"", "\"TP53X\"");
        let input = format!("{TP53_LIKE}\n{second}\n");
        let err =
            read_transcripts(Cursor::new(input), &chromosomes(), Source::RefSeq).unwrap_err();
        assert!(err.to_string().contains("multiple genes match ID 7157"));
    }

    #[test]
    fn malformed_regions_abort_import() {
        let broken = TP53_LIKE.replace(r#""introns":[{"start":151,"end":199}]"#, r#""introns":[]"#);
        let err =
            read_transcripts(Cursor::new(broken), &chromosomes(), Source::RefSeq).unwrap_err();
        assert!(matches!(err, Error::RegionIntegrity { .. }));
    }

    #[test]
    fn unknown_chromosome_and_bad_json() {
        let unknown = TP53_LIKE.replace("chr17", "chrUn");
        assert!(read_transcripts(Cursor::new(unknown), &chromosomes(), Source::RefSeq).is_err());

        let err = read_transcripts(Cursor::new("{not json"), &chromosomes(), Source::RefSeq)
            .unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
