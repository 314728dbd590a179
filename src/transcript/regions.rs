//! Transcript region reconstruction.
//!
//! cDNA maps are the authoritative exon blocks: they carry both genomic and
//! cDNA coordinates. Holes between consecutive maps become gaps, which are then
//! classified against the exon and intron interval sets and given cDNA
//! coordinates from their flanking exons. Exon and intron numbers run 5'→3'
//! along the transcript, so they descend in genomic order on the reverse strand.

use log::error;

use crate::error::Error;
use crate::intervals::{Interval, IntervalArray};
use crate::strand::Strand;

use super::types::{CdnaMap, GenomicInterval, RegionType, TranscriptRegion};

/// Build the ordered, gap-filled region array for one transcript.
#[must_use]
pub fn build_regions(
    cdna_maps: &[CdnaMap],
    exons: &[GenomicInterval],
    introns: &[GenomicInterval],
    strand: Strand,
) -> Vec<TranscriptRegion> {
    let mut regions = add_gaps(cdna_maps);

    let intron_index = numbered_intervals(introns, strand);
    let exon_index = numbered_intervals(exons, strand);

    // order matters: true gaps are claimed by introns before the exon passes run
    relabel(&mut regions, &intron_index, RegionType::Gap, RegionType::Intron);
    relabel(&mut regions, &exon_index, RegionType::Exon, RegionType::Exon);
    relabel(&mut regions, &exon_index, RegionType::Gap, RegionType::Gap);

    assign_flanking_cdna(&mut regions, RegionType::Intron, strand);
    assign_flanking_cdna(&mut regions, RegionType::Gap, strand);

    regions
}

/// Sorts the cDNA maps and inserts a gap wherever two maps are not adjacent.
fn add_gaps(cdna_maps: &[CdnaMap]) -> Vec<TranscriptRegion> {
    let mut sorted = cdna_maps.to_vec();
    sorted.sort_by_key(|m| (m.start, m.end));

    let mut regions = Vec::with_capacity(sorted.len() * 2);
    let mut previous_end: Option<i32> = None;

    for map in &sorted {
        if let Some(prev_end) = previous_end {
            if map.start - prev_end - 1 > 0 {
                regions.push(TranscriptRegion {
                    region_type: RegionType::Gap,
                    id: 0,
                    start: prev_end + 1,
                    end: map.start - 1,
                    cdna_start: 0,
                    cdna_end: 0,
                });
            }
        }

        regions.push(TranscriptRegion {
            region_type: RegionType::Exon,
            id: 0,
            start: map.start,
            end: map.end,
            cdna_start: map.cdna_start,
            cdna_end: map.cdna_end,
        });
        previous_end = Some(map.end);
    }

    regions
}

/// Numbers intervals 1..N in genomic order, or N..1 on the reverse strand.
fn numbered_intervals(intervals: &[GenomicInterval], strand: Strand) -> IntervalArray<u16> {
    let mut sorted = intervals.to_vec();
    sorted.sort_by_key(|iv| (iv.start, iv.end));

    let count = sorted.len();
    IntervalArray::new(
        sorted
            .into_iter()
            .enumerate()
            .map(|(i, iv)| {
                let id = if strand.is_reverse() { count - i } else { i + 1 };
                Interval::new(iv.start, iv.end, id as u16)
            })
            .collect(),
    )
}

/// Every region of type `from` whose midpoint lies inside an interval of
/// `index` takes that interval's number and becomes type `to`.
fn relabel(
    regions: &mut [TranscriptRegion],
    index: &IntervalArray<u16>,
    from: RegionType,
    to: RegionType,
) {
    for region in regions.iter_mut().filter(|r| r.region_type == from) {
        let midpoint = region.start + ((region.end - region.start) >> 1);
        if let Some(interval) = index.first_overlapping(midpoint, midpoint) {
            region.region_type = to;
            region.id = interval.value;
        }
    }
}

/// Derives cDNA coordinates for non-exonic regions from the nearest exon on
/// each side. On the forward strand the upstream exon supplies cDNA start; on
/// the reverse strand it supplies cDNA end.
fn assign_flanking_cdna(regions: &mut [TranscriptRegion], target: RegionType, strand: Strand) {
    for i in 0..regions.len() {
        if regions[i].region_type != target {
            continue;
        }

        let previous_exon = regions[..i]
            .iter()
            .rev()
            .find(|r| r.region_type == RegionType::Exon)
            .copied();
        let next_exon = regions[i + 1..]
            .iter()
            .find(|r| r.region_type == RegionType::Exon)
            .copied();

        let region = &mut regions[i];
        if let Some(exon) = previous_exon {
            if strand.is_reverse() {
                region.cdna_end = exon.cdna_start;
            } else {
                region.cdna_start = exon.cdna_end;
            }
        }
        if let Some(exon) = next_exon {
            if strand.is_reverse() {
                region.cdna_start = exon.cdna_end;
            } else {
                region.cdna_end = exon.cdna_start;
            }
        }
    }
}

/// Checks the region invariants. On failure the complete input and output
/// state is logged before the error is returned.
pub fn validate_regions(
    transcript_id: &str,
    regions: &[TranscriptRegion],
    exons: &[GenomicInterval],
    introns: &[GenomicInterval],
    cdna_maps: &[CdnaMap],
) -> Result<(), Error> {
    let Some(reason) = find_violation(regions) else {
        return Ok(());
    };

    error!("invalid transcript regions for {transcript_id}: {reason}");
    for region in regions {
        error!("  region: {region}");
    }
    for exon in exons {
        error!("  exon: {}-{}", exon.start, exon.end);
    }
    for intron in introns {
        error!("  intron: {}-{}", intron.start, intron.end);
    }
    for map in cdna_maps {
        error!(
            "  cDNA map: {}-{} cDNA {}-{}",
            map.start, map.end, map.cdna_start, map.cdna_end
        );
    }

    Err(Error::RegionIntegrity {
        transcript_id: transcript_id.to_string(),
        reason,
    })
}

fn find_violation(regions: &[TranscriptRegion]) -> Option<String> {
    let mut previous: Option<&TranscriptRegion> = None;

    for (i, region) in regions.iter().enumerate() {
        if region.id == 0 {
            return Some(format!("region {i} ({region}) has no ID"));
        }
        if region.cdna_start < 1 || region.cdna_end < 1 {
            return Some(format!("region {i} ({region}) has no cDNA coordinates"));
        }
        if let Some(prev) = previous {
            if region.start != prev.end + 1 {
                return Some(format!(
                    "region {i} starts at {} but the previous region ends at {}",
                    region.start, prev.end
                ));
            }
        }
        previous = Some(region);
    }

    None
}
