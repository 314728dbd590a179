//! gnomAD allele frequency records.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::chromosome::Chromosome;
use crate::error::Error;
use crate::reference::SequenceProvider;
use crate::variant;

use super::MergeableRecord;

/// Which gnomAD call set a record came from. Records of different data types
/// describe disjoint sample sets and can be summed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    Genome,
    Exome,
    Control,
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "genome" | "genomes" => Ok(Self::Genome),
            "exome" | "exomes" => Ok(Self::Exome),
            "control" | "controls" => Ok(Self::Control),
            _ => Err(Error::Parse(format!("unknown gnomAD data type: {s}"))),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Genome => write!(f, "genome"),
            Self::Exome => write!(f, "exome"),
            Self::Control => write!(f, "control"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Population {
    All,
    Afr,
    Amr,
    Eas,
    Fin,
    Nfe,
    Asj,
    Sas,
    Oth,
    Male,
    Female,
    Controls,
}

pub const NUM_POPULATIONS: usize = 12;

impl Population {
    pub const ALL: [Population; NUM_POPULATIONS] = [
        Self::All,
        Self::Afr,
        Self::Amr,
        Self::Eas,
        Self::Fin,
        Self::Nfe,
        Self::Asj,
        Self::Sas,
        Self::Oth,
        Self::Male,
        Self::Female,
        Self::Controls,
    ];

    /// Prefix of this population's keys in the JSON payload.
    #[must_use]
    pub fn json_prefix(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Afr => "afr",
            Self::Amr => "amr",
            Self::Eas => "eas",
            Self::Fin => "fin",
            Self::Nfe => "nfe",
            Self::Asj => "asj",
            Self::Sas => "sas",
            Self::Oth => "oth",
            Self::Male => "male",
            Self::Female => "female",
            Self::Controls => "controlsAll",
        }
    }

    /// Suffix of this population's `AN_`, `AC_` and `HC_` columns.
    #[must_use]
    pub fn column_suffix(self) -> &'static str {
        match self {
            Self::Controls => "controls_all",
            other => other.json_prefix(),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Nullable allele number, allele count and homozygote count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AlleleCounts {
    pub allele_number: Option<i32>,
    pub allele_count: Option<i32>,
    pub hom_count: Option<i32>,
}

impl AlleleCounts {
    #[must_use]
    pub fn new(allele_number: Option<i32>, allele_count: Option<i32>, hom_count: Option<i32>) -> Self {
        Self {
            allele_number,
            allele_count,
            hom_count,
        }
    }

    /// An allele number of zero carries no information.
    #[must_use]
    pub fn is_informative(&self) -> bool {
        self.allele_number.is_some_and(|an| an > 0)
    }

    /// Allele frequency rounded to six decimals.
    #[must_use]
    pub fn frequency(&self) -> Option<f64> {
        let an = self.allele_number.filter(|&an| an > 0)?;
        let ac = self.allele_count?;
        Some(round6(f64::from(ac) / f64::from(an)))
    }

    pub fn sum(&self, other: &Self) -> Result<Self, Error> {
        Ok(Self {
            allele_number: add_nullable(self.allele_number, other.allele_number)?,
            allele_count: add_nullable(self.allele_count, other.allele_count)?,
            hom_count: add_nullable(self.hom_count, other.hom_count)?,
        })
    }
}

/// Missing plus missing stays missing; otherwise a missing operand counts as
/// zero.
pub fn add_nullable(a: Option<i32>, b: Option<i32>) -> Result<Option<i32>, Error> {
    match (a, b) {
        (None, None) => Ok(None),
        (a, b) => {
            let (a, b) = (a.unwrap_or(0), b.unwrap_or(0));
            a.checked_add(b)
                .map(Some)
                .ok_or_else(|| Error::Merge(format!("count overflow: {a} + {b}")))
        }
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct GnomadItem {
    pub chromosome: Arc<Chromosome>,
    pub position: i32,
    pub ref_allele: String,
    pub alt_allele: String,
    pub depth: Option<i32>,
    counts: [AlleleCounts; NUM_POPULATIONS],
    pub has_failed_filters: bool,
    pub is_low_complexity_region: bool,
    pub data_type: DataType,
}

impl GnomadItem {
    /// Populations without a positive allele number are cleared.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        chromosome: Arc<Chromosome>,
        position: i32,
        ref_allele: String,
        alt_allele: String,
        depth: Option<i32>,
        mut counts: [AlleleCounts; NUM_POPULATIONS],
        has_failed_filters: bool,
        is_low_complexity_region: bool,
        data_type: DataType,
    ) -> Self {
        for population in &mut counts {
            if !population.is_informative() {
                *population = AlleleCounts::default();
            }
        }

        Self {
            chromosome,
            position,
            ref_allele,
            alt_allele,
            depth,
            counts,
            has_failed_filters,
            is_low_complexity_region,
            data_type,
        }
    }

    #[must_use]
    pub fn counts(&self, population: Population) -> &AlleleCounts {
        &self.counts[population.index()]
    }

    /// Mean depth per sample: total depth over the number of sampled
    /// chromosome pairs.
    #[must_use]
    pub fn coverage(&self) -> Option<i32> {
        let depth = self.depth?;
        let an = self.counts(Population::All).allele_number.filter(|&an| an > 0)?;
        Some((f64::from(depth) / (f64::from(an) / 2.0)).round() as i32)
    }

    #[must_use]
    pub fn is_snv(&self) -> bool {
        self.ref_allele.len() == 1 && self.alt_allele.len() == 1
    }

    /// JSON payload stored for this allele.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(&JsonPayload(self)).map_err(|e| {
            Error::Format(format!(
                "unable to serialize gnomAD record at {}:{}: {e}",
                self.chromosome.display_name(),
                self.position
            ))
        })
    }

    fn with_alleles(&self, position: i32, ref_allele: String, alt_allele: String) -> Self {
        Self {
            position,
            ref_allele,
            alt_allele,
            ..self.clone()
        }
    }
}

impl MergeableRecord for GnomadItem {
    fn ref_index(&self) -> u16 {
        self.chromosome.ref_index
    }

    fn position(&self) -> i32 {
        self.position
    }

    fn ref_allele(&self) -> &str {
        &self.ref_allele
    }

    fn alt_allele(&self) -> &str {
        &self.alt_allele
    }

    fn is_informative(&self) -> bool {
        self.counts(Population::All).is_informative()
    }

    fn normalized<S: SequenceProvider + ?Sized>(self, sequence: &S) -> Self {
        let (position, ref_allele, alt_allele) =
            variant::normalize(self.position, &self.ref_allele, &self.alt_allele, sequence);
        if position == self.position && ref_allele == self.ref_allele && alt_allele == self.alt_allele {
            return self;
        }
        self.with_alleles(position, ref_allele, alt_allele)
    }

    fn merge(&self, other: &Self) -> Result<Self, Error> {
        if self.chromosome.ref_index != other.chromosome.ref_index
            || self.position != other.position
            || self.ref_allele != other.ref_allele
            || self.alt_allele != other.alt_allele
        {
            return Err(Error::Merge(format!(
                "unequal variants {}:{} {}>{} and {}:{} {}>{}",
                self.chromosome.display_name(),
                self.position,
                self.ref_allele,
                self.alt_allele,
                other.chromosome.display_name(),
                other.position,
                other.ref_allele,
                other.alt_allele
            )));
        }
        if self.data_type == other.data_type {
            return Err(Error::Merge(format!(
                "two {} records for {}:{} {}>{}",
                self.data_type,
                self.chromosome.display_name(),
                self.position,
                self.ref_allele,
                self.alt_allele
            )));
        }

        let mut counts = [AlleleCounts::default(); NUM_POPULATIONS];
        for (i, merged) in counts.iter_mut().enumerate() {
            *merged = self.counts[i].sum(&other.counts[i])?;
        }

        Ok(Self::new(
            Arc::clone(&self.chromosome),
            self.position,
            self.ref_allele.clone(),
            self.alt_allele.clone(),
            add_nullable(self.depth, other.depth)?,
            counts,
            self.has_failed_filters || other.has_failed_filters,
            self.is_low_complexity_region || other.is_low_complexity_region,
            self.data_type,
        ))
    }
}

/// Serializes the populated fields in a fixed order.
struct JsonPayload<'a>(&'a GnomadItem);

impl Serialize for JsonPayload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let item = self.0;
        let mut map = serializer.serialize_map(None)?;

        if let Some(coverage) = item.coverage() {
            map.serialize_entry("coverage", &coverage)?;
        }
        if item.has_failed_filters {
            map.serialize_entry("failedFilter", &true)?;
        }
        if item.is_low_complexity_region {
            map.serialize_entry("lowComplexityRegion", &true)?;
        }

        for population in Population::ALL {
            let counts = item.counts(population);
            if !counts.is_informative() {
                continue;
            }
            let prefix = population.json_prefix();
            if let Some(af) = counts.frequency() {
                map.serialize_entry(&format!("{prefix}Af"), &af)?;
            }
            map.serialize_entry(&format!("{prefix}An"), &counts.allele_number)?;
            if let Some(ac) = counts.allele_count {
                map.serialize_entry(&format!("{prefix}Ac"), &ac)?;
            }
            if let Some(hc) = counts.hom_count {
                map.serialize_entry(&format!("{prefix}Hc"), &hc)?;
            }
        }

        map.end()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::chromosome::test_chromosome;

    pub fn chr1() -> Arc<Chromosome> {
        Arc::new(test_chromosome("chr1", 0, 100_000))
    }

    pub fn item(
        chromosome: &Arc<Chromosome>,
        position: i32,
        ref_allele: &str,
        alt_allele: &str,
        ac: i32,
        an: i32,
        data_type: DataType,
    ) -> GnomadItem {
        let mut counts = [AlleleCounts::default(); NUM_POPULATIONS];
        counts[Population::All.index()] = AlleleCounts::new(Some(an), Some(ac), Some(0));
        GnomadItem::new(
            Arc::clone(chromosome),
            position,
            ref_allele.to_string(),
            alt_allele.to_string(),
            Some(an * 10),
            counts,
            false,
            false,
            data_type,
        )
    }
}
