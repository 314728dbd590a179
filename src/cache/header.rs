//! Transcript cache header.

use std::io::{Read, Write};

use crate::error::Error;
use crate::format::binary_io::{BinaryRead, BinaryWrite};
use crate::format::common_header::{FileType, read_common_header, write_common_header};
use crate::genome_assembly::GenomeAssembly;
use crate::transcript::types::Source;

/// ASCII tag following the common header of every transcript cache.
pub const CACHE_IDENTIFIER: &str = "AnnocacheTranscripts";

/// Fields specific to transcript caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptCacheHeader {
    pub vep_version: u16,
    /// Seconds since the Unix epoch.
    pub vep_release_time: u64,
    pub reference_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHeader {
    pub data_version: u16,
    pub source: Source,
    /// Seconds since the Unix epoch.
    pub creation_time: u64,
    pub assembly: GenomeAssembly,
    pub custom: TranscriptCacheHeader,
}

impl CacheHeader {
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        write_common_header(writer, FileType::TranscriptCache)?;
        writer.write_prefixed_string(CACHE_IDENTIFIER)?;
        writer.write_u16(self.data_version)?;
        writer.write_u8(self.source.to_byte())?;
        writer.write_u64(self.creation_time)?;
        writer.write_u8(self.assembly.to_byte())?;

        writer.write_u16(self.custom.vep_version)?;
        writer.write_u64(self.custom.vep_release_time)?;
        writer.write_u32(self.custom.reference_id)?;
        Ok(())
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self, Error> {
        read_common_header(reader, FileType::TranscriptCache)?;

        let identifier = reader.read_prefixed_string()?;
        if identifier != CACHE_IDENTIFIER {
            return Err(Error::Format(format!(
                "unexpected cache identifier: expected {CACHE_IDENTIFIER}, got {identifier}"
            )));
        }

        Ok(Self {
            data_version: reader.read_u16()?,
            source: Source::try_from(reader.read_u8()?)?,
            creation_time: reader.read_u64()?,
            assembly: GenomeAssembly::try_from(reader.read_u8()?)?,
            custom: TranscriptCacheHeader {
                vep_version: reader.read_u16()?,
                vep_release_time: reader.read_u64()?,
                reference_id: reader.read_u32()?,
            },
        })
    }
}
