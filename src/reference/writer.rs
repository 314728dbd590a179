//! Writer for binary reference sequence files.
//!
//! ```text
//! [common header][u64 file length][u8 assembly][u8 patch level][u32 reference id]
//! [u32 chromosome count][count × (names, u32 length, u64 data offset)]
//! [count × (u32 compressed length, zstd bases)]
//! ```

use std::io::Write;

use crate::chromosome::Chromosome;
use crate::error::Error;
use crate::format::binary_io::BinaryWrite;
use crate::format::common_header::{FileType, write_common_header};
use crate::genome_assembly::{GenomeAssembly, compute_reference_id};

const SEQUENCE_COMPRESSION_LEVEL: i32 = 21;

pub struct ReferenceWriter;

impl ReferenceWriter {
    /// `chromosomes[i]` describes `sequences[i]`. Returns the file length.
    pub fn write<W: Write>(
        writer: &mut W,
        assembly: GenomeAssembly,
        patch_level: u8,
        chromosomes: &[Chromosome],
        sequences: &[Vec<u8>],
    ) -> Result<u64, Error> {
        if chromosomes.len() != sequences.len() {
            return Err(Error::Validation(format!(
                "{} chromosomes but {} sequences",
                chromosomes.len(),
                sequences.len()
            )));
        }

        let blocks = sequences
            .iter()
            .map(|bases| Ok(zstd::encode_all(bases.as_slice(), SEQUENCE_COMPRESSION_LEVEL)?))
            .collect::<Result<Vec<_>, Error>>()?;

        // Offsets are fixed width, so a first pass with zeros sizes the header.
        let layout = |offsets: &[u64], file_length: u64| -> Result<Vec<u8>, Error> {
            let mut header = Vec::new();
            write_common_header(&mut header, FileType::Reference)?;
            header.write_u64(file_length)?;
            header.write_u8(assembly.to_byte())?;
            header.write_u8(patch_level)?;
            header.write_u32(compute_reference_id(assembly, patch_level))?;
            header.write_u32(u32::try_from(chromosomes.len()).map_err(|_| {
                Error::Validation("too many chromosomes for one reference".to_string())
            })?)?;
            for (chromosome, &offset) in chromosomes.iter().zip(offsets) {
                header.write_prefixed_string(&chromosome.ucsc_name)?;
                header.write_prefixed_string(&chromosome.ensembl_name)?;
                header.write_prefixed_string(&chromosome.refseq_accession)?;
                header.write_u32(chromosome.length)?;
                header.write_u64(offset)?;
            }
            Ok(header)
        };

        let header_len = layout(&vec![0; blocks.len()], 0)?.len() as u64;
        let mut offsets = Vec::with_capacity(blocks.len());
        let mut file_length = header_len;
        for block in &blocks {
            offsets.push(file_length);
            file_length += 4 + block.len() as u64;
        }

        writer.write_all(&layout(&offsets, file_length)?)?;
        for block in &blocks {
            writer.write_u32(u32::try_from(block.len()).map_err(|_| {
                Error::Validation("compressed chromosome exceeds 4 GiB".to_string())
            })?)?;
            writer.write_all(block)?;
        }
        Ok(file_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chromosome::test_chromosome;

    #[test]
    fn file_length_matches() {
        let chroms = vec![test_chromosome("chr1", 0, 4), test_chromosome("chr2", 1, 6)];
        let mut buf = Vec::new();
        let length = ReferenceWriter::write(
            &mut buf,
            GenomeAssembly::GRCh38,
            14,
            &chroms,
            &[b"ACGT".to_vec(), b"GGCCAA".to_vec()],
        )
        .unwrap();

        assert_eq!(length, buf.len() as u64);
        assert_eq!(&buf[8..10], &1u16.to_le_bytes());
        let stored = u64::from_le_bytes(buf[12..20].try_into().unwrap());
        assert_eq!(stored, length);
    }

    #[test]
    fn mismatched_counts_error() {
        let chroms = vec![test_chromosome("chr1", 0, 4)];
        let result = ReferenceWriter::write(&mut Vec::new(), GenomeAssembly::GRCh38, 14, &chroms, &[]);
        assert!(result.is_err());
    }
}
