//! Genome assembly identification and reference ID computation.

use std::fmt;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GenomeAssembly {
    Unknown = 0,
    GRCh37 = 1,
    GRCh38 = 2,
    /// Revised Cambridge Reference Sequence (mitochondrial only).
    Rcrs = 3,
}

impl GenomeAssembly {
    #[must_use]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Assemblies that carry no nuclear sequence and therefore never conflict
    /// with another source's assembly.
    #[must_use]
    pub fn is_assembly_neutral(self) -> bool {
        matches!(self, Self::Unknown | Self::Rcrs)
    }
}

impl TryFrom<u8> for GenomeAssembly {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GenomeAssembly::Unknown),
            1 => Ok(GenomeAssembly::GRCh37),
            2 => Ok(GenomeAssembly::GRCh38),
            3 => Ok(GenomeAssembly::Rcrs),
            _ => Err(Error::Parse(format!(
                "invalid genome assembly byte: {value}"
            ))),
        }
    }
}

impl std::str::FromStr for GenomeAssembly {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "grch37" => Ok(GenomeAssembly::GRCh37),
            "grch38" => Ok(GenomeAssembly::GRCh38),
            "rcrs" => Ok(GenomeAssembly::Rcrs),
            "unknown" => Ok(GenomeAssembly::Unknown),
            _ => Err(Error::Parse(format!("unrecognized genome assembly: {s}"))),
        }
    }
}

/// Verifies that every non-neutral assembly in `assemblies` is the same one.
pub fn check_consistent(assemblies: &[GenomeAssembly]) -> Result<Option<GenomeAssembly>, Error> {
    let mut seen: Option<GenomeAssembly> = None;
    for &assembly in assemblies.iter().filter(|a| !a.is_assembly_neutral()) {
        match seen {
            Some(previous) if previous != assembly => {
                return Err(Error::Validation(format!(
                    "inconsistent genome assemblies: {previous} and {assembly}"
                )));
            }
            _ => seen = Some(assembly),
        }
    }
    Ok(seen)
}

/// Compute a deterministic reference ID from the assembly and patch level.
///
/// The ID is the first 4 bytes (LE) of the SHA-256 hash of `"<assembly>.p<patch_level>"`.
/// Caches and SA stores embed it so they can be matched against the reference
/// file they were built with.
#[must_use]
pub fn compute_reference_id(assembly: GenomeAssembly, patch_level: u8) -> u32 {
    use sha2::{Digest, Sha256};
    let input = format!("{assembly}.p{patch_level}");
    let hash = Sha256::digest(input.as_bytes());
    u32::from_le_bytes([hash[0], hash[1], hash[2], hash[3]])
}

impl fmt::Display for GenomeAssembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenomeAssembly::Unknown => write!(f, "Unknown"),
            GenomeAssembly::GRCh37 => write!(f, "GRCh37"),
            GenomeAssembly::GRCh38 => write!(f, "GRCh38"),
            GenomeAssembly::Rcrs => write!(f, "rCRS"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_round_trip() {
        for assembly in [
            GenomeAssembly::Unknown,
            GenomeAssembly::GRCh37,
            GenomeAssembly::GRCh38,
            GenomeAssembly::Rcrs,
        ] {
            let back = GenomeAssembly::try_from(assembly.to_byte()).unwrap();
            assert_eq!(assembly, back);
        }
        assert!(GenomeAssembly::try_from(4).is_err());
    }

    #[test]
    fn reference_id_depends_on_assembly_and_patch() {
        let id = compute_reference_id(GenomeAssembly::GRCh38, 14);
        assert_eq!(id, compute_reference_id(GenomeAssembly::GRCh38, 14));
        assert_ne!(id, compute_reference_id(GenomeAssembly::GRCh38, 13));
        assert_ne!(id, compute_reference_id(GenomeAssembly::GRCh37, 14));
    }

    #[test]
    fn parse_from_string() {
        assert_eq!(
            "grch38".parse::<GenomeAssembly>().unwrap(),
            GenomeAssembly::GRCh38
        );
        assert_eq!("rCRS".parse::<GenomeAssembly>().unwrap(), GenomeAssembly::Rcrs);
        assert!("hg19".parse::<GenomeAssembly>().is_err());
    }

    #[test]
    fn consistency_ignores_neutral_assemblies() {
        let result = check_consistent(&[
            GenomeAssembly::Rcrs,
            GenomeAssembly::GRCh38,
            GenomeAssembly::Unknown,
            GenomeAssembly::GRCh38,
        ])
        .unwrap();
        assert_eq!(result, Some(GenomeAssembly::GRCh38));

        assert_eq!(check_consistent(&[GenomeAssembly::Rcrs]).unwrap(), None);
        assert!(check_consistent(&[GenomeAssembly::GRCh37, GenomeAssembly::GRCh38]).is_err());
    }
}
