//! Reader for binary reference sequence files.

use std::io::{Read, Seek, SeekFrom};

use crate::chromosome::{Chromosome, ChromosomeMap};
use crate::error::Error;
use crate::format::binary_io::BinaryRead;
use crate::format::common_header::{FileType, read_common_header};
use crate::genome_assembly::GenomeAssembly;
use crate::reference::SequenceProvider;

/// One chromosome's decompressed bases.
pub struct ChromosomeData {
    pub ref_index: u16,
    pub sequence: Vec<u8>,
}

impl ChromosomeData {
    /// Extract a substring at 0-based offset with given length, clipped at the
    /// chromosome end. Returns None if the offset is out of bounds.
    #[must_use]
    pub fn substring(&self, offset: i64, length: usize) -> Option<&[u8]> {
        let num_bases = self.sequence.len() as i64;
        if offset < 0 || length < 1 || offset >= num_bases {
            return None;
        }

        let start = offset as usize;
        let end = (start + length).min(self.sequence.len());
        Some(&self.sequence[start..end])
    }
}

impl SequenceProvider for ChromosomeData {
    fn bases(&self, start: u32, length: usize) -> Option<&[u8]> {
        if start == 0 {
            return None;
        }
        self.substring(i64::from(start) - 1, length)
            .filter(|bases| bases.len() == length)
    }

    fn len(&self) -> u32 {
        self.sequence.len() as u32
    }
}

/// Reads the reference header once; chromosomes are then loaded on demand.
pub struct ReferenceReader {
    pub assembly: GenomeAssembly,
    pub patch_level: u8,
    pub reference_id: u32,
    pub chromosomes: ChromosomeMap,
    offsets: Vec<u64>,
}

impl ReferenceReader {
    /// Read and parse a reference file header.
    pub fn from_reader<R: Read + Seek>(reader: &mut R) -> Result<Self, Error> {
        read_common_header(reader, FileType::Reference)?;

        let _file_length = reader.read_u64()?;
        let assembly = GenomeAssembly::try_from(reader.read_u8()?)?;
        let patch_level = reader.read_u8()?;
        let reference_id = reader.read_u32()?;
        let chrom_count = reader.read_u32()?;

        let mut chromosomes = Vec::with_capacity(chrom_count as usize);
        let mut offsets = Vec::with_capacity(chrom_count as usize);

        for i in 0..chrom_count as usize {
            let ucsc_name = reader.read_prefixed_string()?;
            let ensembl_name = reader.read_prefixed_string()?;
            let refseq_accession = reader.read_prefixed_string()?;
            let length = reader.read_u32()?;
            let offset = reader.read_u64()?;

            let ref_index = u16::try_from(i)
                .map_err(|_| Error::Validation(format!("chromosome index {i} exceeds u16::MAX")))?;

            chromosomes.push(Chromosome {
                ucsc_name,
                ensembl_name,
                refseq_accession,
                length,
                ref_index,
            });
            offsets.push(offset);
        }

        Ok(ReferenceReader {
            assembly,
            patch_level,
            reference_id,
            chromosomes: ChromosomeMap::new(chromosomes)?,
            offsets,
        })
    }

    /// Load a chromosome's bases by reference index.
    pub fn load_chromosome<R: Read + Seek>(
        &self,
        reader: &mut R,
        ref_index: u16,
    ) -> Result<ChromosomeData, Error> {
        let offset = self
            .offsets
            .get(usize::from(ref_index))
            .copied()
            .ok_or_else(|| {
                Error::Validation(format!(
                    "chromosome index {ref_index} out of range (count: {})",
                    self.offsets.len()
                ))
            })?;

        reader.seek(SeekFrom::Start(offset))?;
        let compressed_size = reader.read_u32()?;
        let mut compressed = vec![0u8; compressed_size as usize];
        reader.read_exact(&mut compressed)?;

        let sequence = zstd::decode_all(compressed.as_slice())?;
        Ok(ChromosomeData {
            ref_index,
            sequence,
        })
    }

    /// Look up a chromosome index by any of its names.
    #[must_use]
    pub fn get_index(&self, name: &str) -> Option<u16> {
        self.chromosomes.get(name).map(|c| c.ref_index)
    }
}

#[cfg(test)]
pub(crate) fn make_reference_file(sequences: &[(&str, &[u8])]) -> Vec<u8> {
    use crate::chromosome::test_chromosome;
    use crate::reference::writer::ReferenceWriter;
    use std::io::Cursor;

    let chroms: Vec<Chromosome> = sequences
        .iter()
        .enumerate()
        .map(|(i, (name, seq))| test_chromosome(name, i as u16, seq.len() as u32))
        .collect();
    let bases: Vec<Vec<u8>> = sequences.iter().map(|(_, seq)| seq.to_vec()).collect();

    let mut buf = Cursor::new(Vec::new());
    ReferenceWriter::write(&mut buf, GenomeAssembly::GRCh38, 14, &chroms, &bases)
        .expect("failed to write test reference file");
    buf.into_inner()
}
