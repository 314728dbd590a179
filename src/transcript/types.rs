//! Transcript data model: raw input fragments, the mutable draft used while
//! building, and the frozen transcript written to the cache.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::Error;
use crate::intervals::Span;
use crate::strand::Strand;

/// Annotation source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Source {
    RefSeq = 0,
    Ensembl = 1,
}

impl Source {
    #[must_use]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Source {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::RefSeq),
            1 => Ok(Self::Ensembl),
            _ => Err(Error::Parse(format!("invalid source byte: {value}"))),
        }
    }
}

impl FromStr for Source {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "refseq" => Ok(Self::RefSeq),
            "ensembl" => Ok(Self::Ensembl),
            _ => Err(Error::Parse(format!("unrecognized transcript source: {s}"))),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RefSeq => write!(f, "RefSeq"),
            Self::Ensembl => write!(f, "Ensembl"),
        }
    }
}

/// Type of a transcript region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RegionType {
    Exon = 0,
    Intron = 1,
    Gap = 2,
}

impl RegionType {
    #[must_use]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for RegionType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Exon),
            1 => Ok(Self::Intron),
            2 => Ok(Self::Gap),
            _ => Err(Error::Parse(format!("invalid region type byte: {value}"))),
        }
    }
}

impl fmt::Display for RegionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exon => write!(f, "Exon"),
            Self::Intron => write!(f, "Intron"),
            Self::Gap => write!(f, "Gap"),
        }
    }
}

/// A closed genomic interval. Used for raw exons, raw introns and miRNAs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct GenomicInterval {
    pub start: i32,
    pub end: i32,
}

impl GenomicInterval {
    #[must_use]
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }
}

impl Span for GenomicInterval {
    fn start(&self) -> i32 {
        self.start
    }
    fn end(&self) -> i32 {
        self.end
    }
}

/// An aligned block mapping genomic coordinates onto cDNA coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdnaMap {
    pub start: i32,
    pub end: i32,
    pub cdna_start: i32,
    pub cdna_end: i32,
}

/// A region within a transcript mapping genomic to cDNA coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TranscriptRegion {
    pub region_type: RegionType,
    /// Exon or intron number, counted 5'→3' along the transcript.
    pub id: u16,
    pub start: i32,
    pub end: i32,
    pub cdna_start: i32,
    pub cdna_end: i32,
}

impl fmt::Display for TranscriptRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}-{} cDNA {}-{}",
            self.region_type, self.id, self.start, self.end, self.cdna_start, self.cdna_end
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Gene {
    pub chromosome_index: u16,
    pub start: i32,
    pub end: i32,
    pub strand: Strand,
    pub symbol: String,
    pub entrez_gene_id: String,
    pub ensembl_id: String,
    pub hgnc_id: Option<i32>,
}

impl Span for Gene {
    fn start(&self) -> i32 {
        self.start
    }
    fn end(&self) -> i32 {
        self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CodingRegion {
    pub start: i32,
    pub end: i32,
    pub cdna_start: i32,
    pub cdna_end: i32,
    pub cds_length: i32,
}

/// Coding region together with its protein product.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Translation {
    pub coding_region: CodingRegion,
    pub protein_id: String,
    pub protein_version: u8,
    pub peptide_seq: String,
}

/// Mutable transcript used during the staging passes. Only the canonical flag
/// and the gene handle change after construction.
#[derive(Debug, Clone)]
pub struct TranscriptDraft {
    pub chromosome_index: u16,
    pub start: i32,
    pub end: i32,
    pub id: String,
    pub version: u8,
    pub source: Source,
    pub strand: Strand,
    pub gene: Arc<Gene>,
    pub regions: Vec<TranscriptRegion>,
    pub translation: Option<Translation>,
    pub mirnas: Vec<GenomicInterval>,
    pub is_canonical: bool,
}

impl TranscriptDraft {
    /// Identifier with its version suffix, e.g. `NM_000546.6`.
    #[must_use]
    pub fn versioned_id(&self) -> String {
        versioned_id(&self.id, self.version)
    }

    #[must_use]
    pub fn transcript_length(&self) -> i32 {
        self.end - self.start + 1
    }

    #[must_use]
    pub fn cds_length(&self) -> i32 {
        self.translation
            .as_ref()
            .map_or(0, |t| t.coding_region.cds_length)
    }

    /// Ends the staging phase.
    #[must_use]
    pub fn freeze(self) -> Transcript {
        Transcript {
            chromosome_index: self.chromosome_index,
            start: self.start,
            end: self.end,
            id: self.id,
            version: self.version,
            source: self.source,
            strand: self.strand,
            is_canonical: self.is_canonical,
            gene: self.gene,
            regions: self.regions.into(),
            translation: self.translation,
            mirnas: self.mirnas.into(),
        }
    }
}

/// Immutable transcript as stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub chromosome_index: u16,
    pub start: i32,
    pub end: i32,
    pub id: String,
    pub version: u8,
    pub source: Source,
    pub strand: Strand,
    pub is_canonical: bool,
    pub gene: Arc<Gene>,
    pub regions: Arc<[TranscriptRegion]>,
    pub translation: Option<Translation>,
    pub mirnas: Arc<[GenomicInterval]>,
}

const SOURCE_SHIFT: u16 = 8;
const SOURCE_MASK: u16 = 0x300;
const CODING_REGION_FLAG: u16 = 0x400;
const CANONICAL_FLAG: u16 = 0x800;
const MIRNA_FLAG: u16 = 0x1000;

/// Decoded transcript flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptFlags {
    pub source: Source,
    pub has_translation: bool,
    pub is_canonical: bool,
    pub has_mirnas: bool,
}

impl TranscriptFlags {
    #[must_use]
    pub fn encode(self) -> u16 {
        let mut flags = u16::from(self.source.to_byte()) << SOURCE_SHIFT;
        if self.has_translation {
            flags |= CODING_REGION_FLAG;
        }
        if self.is_canonical {
            flags |= CANONICAL_FLAG;
        }
        if self.has_mirnas {
            flags |= MIRNA_FLAG;
        }
        flags
    }

    pub fn decode(flags: u16) -> Result<Self, Error> {
        Ok(Self {
            source: Source::try_from(((flags & SOURCE_MASK) >> SOURCE_SHIFT) as u8)?,
            has_translation: flags & CODING_REGION_FLAG != 0,
            is_canonical: flags & CANONICAL_FLAG != 0,
            has_mirnas: flags & MIRNA_FLAG != 0,
        })
    }
}

impl Transcript {
    #[must_use]
    pub fn versioned_id(&self) -> String {
        versioned_id(&self.id, self.version)
    }

    #[must_use]
    pub fn flags(&self) -> TranscriptFlags {
        TranscriptFlags {
            source: self.source,
            has_translation: self.translation.is_some(),
            is_canonical: self.is_canonical,
            has_mirnas: !self.mirnas.is_empty(),
        }
    }
}

impl Span for Transcript {
    fn start(&self) -> i32 {
        self.start
    }
    fn end(&self) -> i32 {
        self.end
    }
}

pub(crate) fn versioned_id(id: &str, version: u8) -> String {
    if version == 0 {
        id.to_string()
    } else {
        format!("{id}.{version}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn flag_word_layout() {
        let flags = TranscriptFlags {
            source: Source::Ensembl,
            has_translation: true,
            is_canonical: true,
            has_mirnas: false,
        };
        assert_eq!(flags.encode(), 0x100 | 0x400 | 0x800);
        assert_eq!(TranscriptFlags::decode(flags.encode()).unwrap(), flags);
    }

    #[test]
    fn invalid_source_bits() {
        assert!(TranscriptFlags::decode(0x300).is_err());
    }

    #[test]
    fn versioned_ids() {
        assert_eq!(versioned_id("NM_000546", 6), "NM_000546.6");
        assert_eq!(versioned_id("ENST00000269305", 0), "ENST00000269305");
    }

    #[test]
    fn region_equality_is_structural() {
        let a = TranscriptRegion {
            region_type: RegionType::Exon,
            id: 1,
            start: 100,
            end: 150,
            cdna_start: 1,
            cdna_end: 51,
        };
        let b = a;
        let mut c = a;
        c.cdna_end = 52;

        let set: HashSet<TranscriptRegion> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&b));
    }

    #[test]
    fn gene_equality_is_structural() {
        let gene = Gene {
            chromosome_index: 16,
            start: 7_661_779,
            end: 7_687_538,
            strand: Strand::Reverse,
            symbol: "TP53".to_string(),
            entrez_gene_id: "7157".to_string(),
            ensembl_id: "ENSG00000141510".to_string(),
            hgnc_id: Some(11_998),
        };
        let mut other = gene.clone();
        assert_eq!(gene, other);

        let set: HashSet<Gene> = [gene.clone(), other.clone()].into_iter().collect();
        assert_eq!(set.len(), 1);

        other.hgnc_id = None;
        assert_ne!(gene, other);
    }

    #[test]
    fn source_parsing() {
        assert_eq!("RefSeq".parse::<Source>().unwrap(), Source::RefSeq);
        assert_eq!("ensembl".parse::<Source>().unwrap(), Source::Ensembl);
        assert!("gencode".parse::<Source>().is_err());
        assert!(RegionType::try_from(3).is_err());
    }
}
