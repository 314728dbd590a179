//! Canonical transcript selection.
//!
//! One transcript per gene is canonical. Candidates are restricted to trusted
//! accession prefixes and ranked by LRG membership, CDS length, transcript
//! length and finally the lowest accession number.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::io::BufRead;

use log::debug;

use crate::error::Error;

use super::types::{Source, TranscriptDraft};

const TRUSTED_PREFIXES: [&str; 3] = ["ENST", "NM_", "NR_"];

/// Snapshot of the fields that decide canonical status.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TranscriptMetadata {
    transcript_id: String,
    accession_number: u32,
    transcript_length: i32,
    cds_length: i32,
    is_lrg: bool,
}

impl TranscriptMetadata {
    fn is_trusted(&self) -> bool {
        TRUSTED_PREFIXES
            .iter()
            .any(|prefix| self.transcript_id.starts_with(prefix))
    }

    /// Best candidate sorts first. The transcript ID breaks any remaining tie
    /// so the result never depends on hash order.
    fn rank(a: &Self, b: &Self) -> Ordering {
        b.is_lrg
            .cmp(&a.is_lrg)
            .then_with(|| b.cds_length.cmp(&a.cds_length))
            .then_with(|| b.transcript_length.cmp(&a.transcript_length))
            .then_with(|| a.accession_number.cmp(&b.accession_number))
            .then_with(|| a.transcript_id.cmp(&b.transcript_id))
    }
}

pub struct CanonicalSelector {
    lrg_transcript_ids: HashSet<String>,
}

impl CanonicalSelector {
    /// `lrg_transcript_ids` holds transcript accessions that have an LRG
    /// record. Versions are dropped: an LRG pins one version, the cache may
    /// carry a later one.
    #[must_use]
    pub fn new(lrg_transcript_ids: HashSet<String>) -> Self {
        let lrg_transcript_ids = lrg_transcript_ids
            .iter()
            .map(|id| unversioned(id).to_string())
            .collect();
        Self { lrg_transcript_ids }
    }

    /// Resets every canonical flag, then marks the winner of each gene.
    /// Returns the number of transcripts marked canonical.
    pub fn mark_canonical(&self, transcripts: &mut [TranscriptDraft]) -> Result<usize, Error> {
        let gene_keys = transcripts
            .iter()
            .map(gene_key)
            .collect::<Result<Vec<_>, Error>>()?;

        let mut by_gene: BTreeMap<u64, HashSet<TranscriptMetadata>> = BTreeMap::new();
        for (transcript, &key) in transcripts.iter().zip(&gene_keys) {
            by_gene.entry(key).or_default().insert(self.metadata(transcript));
        }

        // winners are per gene: one transcript ID may appear under several genes
        let mut winners: BTreeMap<u64, String> = BTreeMap::new();
        for (&key, candidates) in &by_gene {
            let mut trusted: Vec<&TranscriptMetadata> =
                candidates.iter().filter(|m| m.is_trusted()).collect();
            trusted.sort_by(|a, b| TranscriptMetadata::rank(a, b));

            match trusted.first() {
                Some(winner) => {
                    winners.insert(key, winner.transcript_id.clone());
                }
                None => debug!("gene {key} has no trusted transcripts"),
            }
        }

        let mut num_marked = 0;
        for (transcript, key) in transcripts.iter_mut().zip(&gene_keys) {
            let versioned_id = transcript.versioned_id();
            transcript.is_canonical = winners.get(key) == Some(&versioned_id);
            if transcript.is_canonical {
                num_marked += 1;
            }
        }

        Ok(num_marked)
    }

    fn metadata(&self, transcript: &TranscriptDraft) -> TranscriptMetadata {
        let transcript_id = transcript.versioned_id();
        TranscriptMetadata {
            accession_number: accession_number(&transcript.id),
            transcript_length: transcript.transcript_length(),
            cds_length: transcript.cds_length(),
            is_lrg: self.lrg_transcript_ids.contains(unversioned(&transcript.id)),
            transcript_id,
        }
    }
}

fn gene_key(transcript: &TranscriptDraft) -> Result<u64, Error> {
    let gene_id = match transcript.source {
        Source::Ensembl => &transcript.gene.ensembl_id,
        Source::RefSeq => &transcript.gene.entrez_gene_id,
    };
    normalize_gene_id(gene_id)
}

fn unversioned(id: &str) -> &str {
    id.split_once('.').map_or(id, |(accession, _)| accession)
}

/// Converts an Entrez or Ensembl gene ID into an integer grouping key.
pub fn normalize_gene_id(gene_id: &str) -> Result<u64, Error> {
    if gene_id.is_empty() {
        return Err(Error::UnparseableGeneId(gene_id.to_string()));
    }
    let digits = gene_id.strip_prefix("ENSG").unwrap_or(gene_id);
    digits
        .parse::<u64>()
        .map_err(|_| Error::UnparseableGeneId(gene_id.to_string()))
}

/// Reads transcript IDs with an LRG record, one per line. Versions are
/// stripped.
pub fn read_lrg_transcript_ids<R: BufRead>(reader: R) -> Result<HashSet<String>, Error> {
    let mut ids = HashSet::new();
    for line in reader.lines() {
        let line = line?;
        let id = line.trim();
        if id.is_empty() || id.starts_with('#') {
            continue;
        }
        ids.insert(unversioned(id).to_string());
    }
    Ok(ids)
}

/// Numeric part of an accession such as `NM_000546` or `ENST00000269305`.
/// Accessions without digits sort last.
fn accession_number(id: &str) -> u32 {
    let digits: String = unversioned(id)
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strand::Strand;
    use crate::transcript::types::{CodingRegion, Gene, Translation};
    use std::sync::Arc;

    fn gene(entrez: &str) -> Arc<Gene> {
        Arc::new(Gene {
            chromosome_index: 0,
            start: 1,
            end: 10_000,
            strand: Strand::Forward,
            symbol: format!("G{entrez}"),
            entrez_gene_id: entrez.to_string(),
            ensembl_id: String::new(),
            hgnc_id: None,
        })
    }

    fn transcript(
        id: &str,
        version: u8,
        gene: &Arc<Gene>,
        start: i32,
        end: i32,
        cds_length: i32,
    ) -> TranscriptDraft {
        let translation = (cds_length > 0).then(|| Translation {
            coding_region: CodingRegion {
                start,
                end,
                cdna_start: 1,
                cdna_end: cds_length,
                cds_length,
            },
            protein_id: "NP_1".to_string(),
            protein_version: 1,
            peptide_seq: "M".to_string(),
        });
        TranscriptDraft {
            chromosome_index: 0,
            start,
            end,
            id: id.to_string(),
            version,
            source: Source::RefSeq,
            strand: Strand::Forward,
            gene: Arc::clone(gene),
            regions: Vec::new(),
            translation,
            mirnas: Vec::new(),
            is_canonical: false,
        }
    }

    fn canonical_ids(transcripts: &[TranscriptDraft]) -> Vec<String> {
        transcripts
            .iter()
            .filter(|t| t.is_canonical)
            .map(TranscriptDraft::versioned_id)
            .collect()
    }

    #[test]
    fn longest_cds_wins() {
        let g = gene("7157");
        let mut transcripts = vec![
            transcript("NM_000546", 6, &g, 100, 2000, 1182),
            transcript("NM_001126112", 3, &g, 100, 2500, 1182 - 3),
        ];
        let selector = CanonicalSelector::new(HashSet::new());
        assert_eq!(selector.mark_canonical(&mut transcripts).unwrap(), 1);
        assert_eq!(canonical_ids(&transcripts), vec!["NM_000546.6"]);
    }

    #[test]
    fn lrg_list_skips_comments_and_blanks() {
        let list = "# transcripts with LRG records\nNM_000546.6\n\n  NM_000059.3  \n";
        let ids = read_lrg_transcript_ids(std::io::Cursor::new(list)).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("NM_000546"));
        assert!(ids.contains("NM_000059"));
    }

    #[test]
    fn lrg_beats_longer_cds() {
        let g = gene("7157");
        let mut transcripts = vec![
            transcript("NM_000546", 6, &g, 100, 2000, 900),
            transcript("NM_001126112", 3, &g, 100, 2500, 1182),
        ];
        let lrg: HashSet<String> = ["NM_000546".to_string()].into_iter().collect();
        CanonicalSelector::new(lrg)
            .mark_canonical(&mut transcripts)
            .unwrap();
        assert_eq!(canonical_ids(&transcripts), vec!["NM_000546.6"]);
    }

    #[test]
    fn lrg_matches_across_versions() {
        let g = gene("7157");
        let mut transcripts = vec![
            transcript("NM_000546", 6, &g, 100, 900, 0),
            transcript("NM_001126112", 2, &g, 100, 2000, 0),
        ];
        let lrg = read_lrg_transcript_ids(std::io::Cursor::new("NM_000546.5\n")).unwrap();
        CanonicalSelector::new(lrg)
            .mark_canonical(&mut transcripts)
            .unwrap();
        assert_eq!(canonical_ids(&transcripts), vec!["NM_000546.6"]);

        // a versioned set handed straight to the selector behaves the same
        let lrg: HashSet<String> = ["NM_000546.5".to_string()].into_iter().collect();
        CanonicalSelector::new(lrg)
            .mark_canonical(&mut transcripts)
            .unwrap();
        assert_eq!(canonical_ids(&transcripts), vec!["NM_000546.6"]);
    }

    #[test]
    fn shared_transcript_is_judged_per_gene() {
        let g1 = gene("10");
        let g2 = gene("20");
        let mut transcripts = vec![
            transcript("NM_000001", 1, &g1, 100, 900, 300),
            transcript("NM_000001", 1, &g2, 100, 900, 300),
            transcript("NM_000002", 1, &g2, 100, 1200, 900),
        ];
        let count = CanonicalSelector::new(HashSet::new())
            .mark_canonical(&mut transcripts)
            .unwrap();

        assert_eq!(count, 2);
        let flags: Vec<bool> = transcripts.iter().map(|t| t.is_canonical).collect();
        assert_eq!(flags, vec![true, false, true]);
    }

    #[test]
    fn transcript_length_breaks_cds_tie() {
        let g = gene("1");
        let mut transcripts = vec![
            transcript("NM_000002", 1, &g, 100, 900, 300),
            transcript("NM_000003", 1, &g, 100, 1200, 300),
        ];
        CanonicalSelector::new(HashSet::new())
            .mark_canonical(&mut transcripts)
            .unwrap();
        assert_eq!(canonical_ids(&transcripts), vec!["NM_000003.1"]);
    }

    #[test]
    fn smallest_accession_breaks_full_tie() {
        let g = gene("1");
        let mut transcripts = vec![
            transcript("NM_000020", 1, &g, 100, 900, 300),
            transcript("NM_000010", 2, &g, 100, 900, 300),
            transcript("NM_000015", 1, &g, 100, 900, 300),
        ];
        CanonicalSelector::new(HashSet::new())
            .mark_canonical(&mut transcripts)
            .unwrap();
        assert_eq!(canonical_ids(&transcripts), vec!["NM_000010.2"]);
    }

    #[test]
    fn untrusted_prefixes_are_never_canonical() {
        let g = gene("5");
        let mut transcripts = vec![
            transcript("XM_000001", 1, &g, 100, 5000, 3000),
            transcript("XR_000002", 1, &g, 100, 5000, 0),
        ];
        let count = CanonicalSelector::new(HashSet::new())
            .mark_canonical(&mut transcripts)
            .unwrap();
        assert_eq!(count, 0);

        // with one trusted candidate the predicted one still loses
        transcripts.push(transcript("NR_000100", 1, &g, 100, 200, 0));
        CanonicalSelector::new(HashSet::new())
            .mark_canonical(&mut transcripts)
            .unwrap();
        assert_eq!(canonical_ids(&transcripts), vec!["NR_000100.1"]);
    }

    #[test]
    fn one_canonical_per_gene_and_flags_reset() {
        let g1 = gene("10");
        let g2 = gene("20");
        let mut transcripts = vec![
            transcript("NM_000100", 1, &g1, 100, 900, 300),
            transcript("NM_000200", 1, &g2, 100, 900, 300),
            transcript("NM_000201", 1, &g2, 100, 800, 300),
        ];
        transcripts[2].is_canonical = true;

        let count = CanonicalSelector::new(HashSet::new())
            .mark_canonical(&mut transcripts)
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(canonical_ids(&transcripts), vec!["NM_000100.1", "NM_000200.1"]);

        // running twice gives the same answer
        let again = CanonicalSelector::new(HashSet::new())
            .mark_canonical(&mut transcripts)
            .unwrap();
        assert_eq!(again, 2);
    }

    #[test]
    fn ensembl_gene_ids_are_normalized() {
        assert_eq!(normalize_gene_id("ENSG00000141510").unwrap(), 141_510);
        assert_eq!(normalize_gene_id("7157").unwrap(), 7157);
        assert!(matches!(
            normalize_gene_id(""),
            Err(Error::UnparseableGeneId(_))
        ));
        assert!(normalize_gene_id("LOC123").is_err());
    }

    #[test]
    fn unparseable_gene_id_is_fatal() {
        let g = gene("");
        let mut transcripts = vec![transcript("NM_000001", 1, &g, 1, 10, 0)];
        assert!(
            CanonicalSelector::new(HashSet::new())
                .mark_canonical(&mut transcripts)
                .is_err()
        );
    }

    #[test]
    fn accession_numbers() {
        assert_eq!(accession_number("NM_000546"), 546);
        assert_eq!(accession_number("ENST00000269305.8"), 269_305);
        assert_eq!(accession_number("LRG"), u32::MAX);
    }
}
