//! Records stored in the SA store.

use std::io::Read;

use crate::error::Error;
use crate::format::binary_io::{BinaryRead, BinaryWrite};

/// A value that can be packed into an SA block.
pub trait SaRecord: Sized {
    fn write_to(&self, buf: &mut Vec<u8>) -> Result<(), Error>;

    /// Decodes one record, advancing `bytes` past it.
    fn read_from(bytes: &mut &[u8]) -> Result<Self, Error>;

    /// Whether the position's major allele differs from the reference base.
    fn is_ref_minor(&self) -> bool {
        false
    }
}

/// Annotation for one allele at a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaAllele {
    pub ref_allele: String,
    pub alt_allele: String,
    pub json: String,
}

/// Every annotated allele at one genomic position.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SaPosition {
    pub alleles: Vec<SaAllele>,
    pub ref_minor: bool,
}

impl SaPosition {
    #[must_use]
    pub fn find(&self, ref_allele: &str, alt_allele: &str) -> Option<&SaAllele> {
        self.alleles
            .iter()
            .find(|a| a.ref_allele == ref_allele && a.alt_allele == alt_allele)
    }
}

impl SaRecord for SaPosition {
    fn write_to(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        buf.write_opt_usize(self.alleles.len())?;
        for allele in &self.alleles {
            buf.write_opt_string(&allele.ref_allele)?;
            buf.write_opt_string(&allele.alt_allele)?;
            buf.write_opt_string(&allele.json)?;
        }
        buf.write_bool(self.ref_minor)
    }

    fn read_from(bytes: &mut &[u8]) -> Result<Self, Error> {
        let reader: &mut dyn Read = bytes;
        let count = reader.read_opt_usize()?;
        let mut alleles = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            alleles.push(SaAllele {
                ref_allele: reader.read_opt_string()?,
                alt_allele: reader.read_opt_string()?,
                json: reader.read_opt_string()?,
            });
        }
        Ok(Self {
            alleles,
            ref_minor: reader.read_bool()?,
        })
    }

    fn is_ref_minor(&self) -> bool {
        self.ref_minor
    }
}
