//! SA store header.

use std::io::{Read, Write};

use crate::data_source::DataSourceVersion;
use crate::error::Error;
use crate::format::binary_io::{BinaryRead, BinaryWrite};
use crate::format::common_header::{FileType, read_common_header, write_common_header};
use crate::genome_assembly::GenomeAssembly;

/// Layout version of the JSON payloads.
pub const SA_SCHEMA_VERSION: u16 = 22;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaHeader {
    /// Key under which the annotator nests this source's JSON.
    pub json_key: String,
    pub data_source: DataSourceVersion,
    pub assembly: GenomeAssembly,
    pub reference_id: u32,
    /// Records apply only to the exact allele rather than to the position.
    pub match_by_allele: bool,
    /// The JSON payload is an array of per-allele objects.
    pub is_array: bool,
    pub schema_version: u16,
    /// Seconds since the Unix epoch.
    pub creation_time: u64,
}

impl SaHeader {
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        write_common_header(writer, FileType::SupplementaryAnnotation)?;
        writer.write_opt_string(&self.json_key)?;
        self.data_source.write(writer)?;
        writer.write_u8(self.assembly.to_byte())?;
        writer.write_u32(self.reference_id)?;
        writer.write_bool(self.match_by_allele)?;
        writer.write_bool(self.is_array)?;
        writer.write_u16(self.schema_version)?;
        writer.write_u64(self.creation_time)?;
        Ok(())
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self, Error> {
        read_common_header(reader, FileType::SupplementaryAnnotation)?;
        Ok(Self {
            json_key: reader.read_opt_string()?,
            data_source: DataSourceVersion::read(reader)?,
            assembly: GenomeAssembly::try_from(reader.read_u8()?)?,
            reference_id: reader.read_u32()?,
            match_by_allele: reader.read_bool()?,
            is_array: reader.read_bool()?,
            schema_version: reader.read_u16()?,
            creation_time: reader.read_u64()?,
        })
    }

    /// Headers of stores that may be concatenated: everything except the
    /// creation time agrees.
    #[must_use]
    pub fn is_compatible(&self, other: &Self) -> bool {
        self.json_key == other.json_key
            && self.data_source == other.data_source
            && self.assembly == other.assembly
            && self.reference_id == other.reference_id
            && self.match_by_allele == other.match_by_allele
            && self.is_array == other.is_array
            && self.schema_version == other.schema_version
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> Result<u64, Error> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        Ok(buf.len() as u64)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn header() -> SaHeader {
        SaHeader {
            json_key: "gnomad".to_string(),
            data_source: DataSourceVersion {
                name: "gnomAD".to_string(),
                version: "2.0.2".to_string(),
                release_date: "2017-10-05".to_string(),
                description: "allele frequencies".to_string(),
            },
            assembly: GenomeAssembly::GRCh37,
            reference_id: 0x1234_5678,
            match_by_allele: true,
            is_array: false,
            schema_version: SA_SCHEMA_VERSION,
            creation_time: 1_700_000_000,
        }
    }
}
