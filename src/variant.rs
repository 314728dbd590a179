//! Allele trimming and left alignment.
//!
//! Positions are 1-based. After trimming, an insertion's start is the base
//! immediately after the insertion point and a deletion's start is its first
//! deleted base.

use crate::reference::SequenceProvider;

/// Furthest distance a variant may be rotated upstream. The source merger
/// uses the same distance as its flush threshold: no record can move further
/// back than this once normalized.
pub const MAX_UPSTREAM_LENGTH: i32 = 500;

/// Removes the shared prefix (advancing the start) and then the shared suffix.
/// Identical alleles are returned untouched.
#[must_use]
pub fn trim(start: i32, ref_allele: &str, alt_allele: &str) -> (i32, String, String) {
    if ref_allele == alt_allele {
        return (start, ref_allele.to_string(), alt_allele.to_string());
    }

    let r = ref_allele.as_bytes();
    let a = alt_allele.as_bytes();

    let prefix = r.iter().zip(a).take_while(|(x, y)| x == y).count();
    let (r, a) = (&r[prefix..], &a[prefix..]);

    let suffix = r
        .iter()
        .rev()
        .zip(a.iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let (r, a) = (&r[..r.len() - suffix], &a[..a.len() - suffix]);

    (
        start + prefix as i32,
        String::from_utf8_lossy(r).into_owned(),
        String::from_utf8_lossy(a).into_owned(),
    )
}

/// Shifts a trimmed insertion or deletion to its leftmost equivalent position.
/// SNVs, MNVs, complex substitutions and deletions whose ref allele does not
/// match the reference come back unchanged.
#[must_use]
pub fn left_align<S: SequenceProvider + ?Sized>(
    start: i32,
    ref_allele: &str,
    alt_allele: &str,
    sequence: &S,
) -> (i32, String, String) {
    let unchanged = || (start, ref_allele.to_string(), alt_allele.to_string());

    let is_deletion = alt_allele.is_empty() && !ref_allele.is_empty();
    let is_insertion = ref_allele.is_empty() && !alt_allele.is_empty();
    if !(is_deletion || is_insertion) || start < 1 {
        return unchanged();
    }

    let allele = if is_deletion { ref_allele } else { alt_allele };
    if !allele.is_ascii() {
        return unchanged();
    }

    if is_deletion {
        let observed = sequence.bases(start as u32, ref_allele.len());
        if observed != Some(ref_allele.as_bytes()) {
            return unchanged();
        }
    }

    let mut rotated = allele.as_bytes().to_vec();
    let mut position = start;
    let mut shifted = 0;
    while shifted < MAX_UPSTREAM_LENGTH && position > 1 {
        let Some(&[upstream]) = sequence.bases((position - 1) as u32, 1) else {
            break;
        };
        if rotated.last() != Some(&upstream) {
            break;
        }
        rotated.rotate_right(1);
        position -= 1;
        shifted += 1;
    }

    let rotated = String::from_utf8_lossy(&rotated).into_owned();
    if is_deletion {
        (position, rotated, String::new())
    } else {
        (position, String::new(), rotated)
    }
}

/// Trims and then left aligns.
#[must_use]
pub fn normalize<S: SequenceProvider + ?Sized>(
    start: i32,
    ref_allele: &str,
    alt_allele: &str,
    sequence: &S,
) -> (i32, String, String) {
    let (start, ref_allele, alt_allele) = trim(start, ref_allele, alt_allele);
    left_align(start, &ref_allele, &alt_allele, sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::reader::ChromosomeData;

    // positions 501.. spell ATGTGTTGTTATTCTGTGTGCAT
    fn reference() -> ChromosomeData {
        let mut sequence = vec![b'A'; 500];
        sequence.extend_from_slice(b"ATGTGTTGTTATTCTGTGTGCAT");
        ChromosomeData {
            ref_index: 0,
            sequence,
        }
    }

    fn owned(start: i32, r: &str, a: &str) -> (i32, String, String) {
        (start, r.to_string(), a.to_string())
    }

    #[test]
    fn trim_prefix_then_suffix() {
        assert_eq!(trim(100, "AT", "A"), owned(101, "T", ""));
        assert_eq!(trim(100, "A", "AT"), owned(101, "", "T"));
        assert_eq!(trim(100, "ACGT", "AGGT"), owned(101, "C", "G"));
        // prefix wins when both ends could claim the same base
        assert_eq!(trim(100, "AA", "A"), owned(101, "A", ""));
    }

    #[test]
    fn trim_leaves_identical_alleles_alone() {
        assert_eq!(trim(100, "ACG", "ACG"), owned(100, "ACG", "ACG"));
        assert_eq!(trim(100, "", ""), owned(100, "", ""));
    }

    #[test]
    fn dinucleotide_deletion_moves_through_repeat() {
        let reference = reference();
        assert_eq!(left_align(519, "TG", "", &reference), owned(515, "TG", ""));
    }

    #[test]
    fn deletion_rotates_allele() {
        let reference = reference();
        assert_eq!(left_align(511, "ATT", "", &reference), owned(509, "TTA", ""));
        assert_eq!(left_align(508, "GTT", "", &reference), owned(504, "TGT", ""));
    }

    #[test]
    fn insertion_rotates_allele() {
        let reference = reference();
        assert_eq!(left_align(507, "", "GT", &reference), owned(502, "", "TG"));
    }

    #[test]
    fn rotation_is_capped_by_upstream_limit() {
        // an A inserted after the poly-A run could travel all the way to the start
        let reference = reference();
        let (position, _, alt) = left_align(501, "", "A", &reference);
        assert_eq!(position, 1);
        assert_eq!(alt, "A");

        let mut long = ChromosomeData {
            ref_index: 0,
            sequence: vec![b'C'; 1000],
        };
        long.sequence.push(b'G');
        let (position, _, _) = left_align(1001, "", "C", &long);
        assert_eq!(position, 1001 - MAX_UPSTREAM_LENGTH);
    }

    #[test]
    fn mismatched_deletion_is_not_rotated() {
        let reference = reference();
        assert_eq!(left_align(519, "CC", "", &reference), owned(519, "CC", ""));
    }

    #[test]
    fn substitutions_are_not_aligned() {
        let reference = reference();
        assert_eq!(left_align(519, "T", "C", &reference), owned(519, "T", "C"));
        assert_eq!(left_align(519, "TG", "CA", &reference), owned(519, "TG", "CA"));
    }

    #[test]
    fn normalize_trims_before_aligning() {
        let reference = reference();
        // VCF-style padded deletion of TG at 519
        assert_eq!(normalize(518, "GTG", "G", &reference), owned(515, "TG", ""));
    }
}
