//! Regulatory regions and their JSON-lines import.

use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

use serde::Deserialize;

use crate::chromosome::ChromosomeMap;
use crate::error::Error;
use crate::intervals::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RegulatoryRegionType {
    Promoter = 0,
    Enhancer = 1,
    PromoterFlankingRegion = 2,
    CtcfBindingSite = 3,
    TfBindingSite = 4,
    OpenChromatinRegion = 5,
}

impl RegulatoryRegionType {
    #[must_use]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for RegulatoryRegionType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Promoter),
            1 => Ok(Self::Enhancer),
            2 => Ok(Self::PromoterFlankingRegion),
            3 => Ok(Self::CtcfBindingSite),
            4 => Ok(Self::TfBindingSite),
            5 => Ok(Self::OpenChromatinRegion),
            _ => Err(Error::Parse(format!(
                "invalid regulatory region type byte: {value}"
            ))),
        }
    }
}

impl FromStr for RegulatoryRegionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "promoter" => Ok(Self::Promoter),
            "enhancer" => Ok(Self::Enhancer),
            "promoter_flanking_region" => Ok(Self::PromoterFlankingRegion),
            "CTCF_binding_site" => Ok(Self::CtcfBindingSite),
            "TF_binding_site" => Ok(Self::TfBindingSite),
            "open_chromatin_region" => Ok(Self::OpenChromatinRegion),
            _ => Err(Error::Parse(format!("unknown regulatory region type: {s}"))),
        }
    }
}

impl fmt::Display for RegulatoryRegionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Promoter => "promoter",
            Self::Enhancer => "enhancer",
            Self::PromoterFlankingRegion => "promoter_flanking_region",
            Self::CtcfBindingSite => "CTCF_binding_site",
            Self::TfBindingSite => "TF_binding_site",
            Self::OpenChromatinRegion => "open_chromatin_region",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegulatoryRegion {
    pub chromosome_index: u16,
    pub start: i32,
    pub end: i32,
    pub id: String,
    pub region_type: RegulatoryRegionType,
}

impl Span for RegulatoryRegion {
    fn start(&self) -> i32 {
        self.start
    }
    fn end(&self) -> i32 {
        self.end
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegulatoryRecord {
    chromosome: String,
    start: i32,
    end: i32,
    id: String,
    #[serde(rename = "type")]
    region_type: String,
}

/// Reads regulatory regions from a JSON-lines dump.
pub fn read_regulatory_regions<R: BufRead>(
    reader: R,
    chromosomes: &ChromosomeMap,
) -> Result<Vec<RegulatoryRegion>, Error> {
    let mut regions = Vec::new();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let record: RegulatoryRecord = serde_json::from_str(trimmed).map_err(|e| {
            Error::Parse(format!("regulatory dump line {}: {e}", line_number + 1))
        })?;
        if record.end < record.start {
            return Err(Error::Parse(format!(
                "regulatory region {} ends ({}) before it starts ({})",
                record.id, record.end, record.start
            )));
        }

        regions.push(RegulatoryRegion {
            chromosome_index: chromosomes.resolve(&record.chromosome)?.ref_index,
            start: record.start,
            end: record.end,
            id: record.id,
            region_type: record.region_type.parse()?,
        });
    }

    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chromosome::test_chromosome;
    use std::io::Cursor;

    #[test]
    fn reads_regions() {
        let chromosomes = ChromosomeMap::new(vec![test_chromosome("chr1", 0, 10_000)]).unwrap();
        let input = r#"{"chromosome":"1","start":10,"end":600,"id":"ENSR00000000001","type":"CTCF_binding_site"}
{"chromosome":"chr1","start":900,"end":1200,"id":"ENSR00000000002","type":"promoter"}"#;

        let regions = read_regulatory_regions(Cursor::new(input), &chromosomes).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].region_type, RegulatoryRegionType::CtcfBindingSite);
        assert_eq!(regions[1].chromosome_index, 0);
        assert_eq!(regions[1].region_type.to_string(), "promoter");
    }

    #[test]
    fn rejects_inverted_interval_and_unknown_type() {
        let chromosomes = ChromosomeMap::new(vec![test_chromosome("chr1", 0, 10_000)]).unwrap();
        let inverted = r#"{"chromosome":"1","start":600,"end":10,"id":"R1","type":"enhancer"}"#;
        assert!(read_regulatory_regions(Cursor::new(inverted), &chromosomes).is_err());

        let unknown = r#"{"chromosome":"1","start":1,"end":10,"id":"R1","type":"silencer"}"#;
        assert!(read_regulatory_regions(Cursor::new(unknown), &chromosomes).is_err());
    }

    #[test]
    fn type_bytes_round_trip() {
        for byte in 0..6u8 {
            let region_type = RegulatoryRegionType::try_from(byte).unwrap();
            assert_eq!(region_type.to_byte(), byte);
            assert_eq!(
                region_type.to_string().parse::<RegulatoryRegionType>().unwrap(),
                region_type
            );
        }
        assert!(RegulatoryRegionType::try_from(6).is_err());
    }
}
