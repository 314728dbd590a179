//! SA store reader.
//!
//! A reader owns its stream and keeps one decoded block plus the last query
//! result. It is not meant to be shared: give each thread its own reader.

use std::io::{Read, Seek, SeekFrom};

use log::trace;

use crate::error::Error;

use super::block::SaBlock;
use super::header::SaHeader;
use super::index::SaIndex;
use super::record::SaRecord;

struct LastQuery<R> {
    ref_index: u16,
    position: i32,
    record: Option<R>,
}

pub struct SaReader<S, R> {
    stream: S,
    header: SaHeader,
    index: SaIndex,
    block: SaBlock,
    block_offset: Option<u64>,
    last_query: Option<LastQuery<R>>,
    num_block_loads: usize,
}

impl<S: Read + Seek, R: SaRecord> SaReader<S, R> {
    pub fn open<I: Read>(mut stream: S, mut index_stream: I) -> Result<Self, Error> {
        let header = SaHeader::read(&mut stream)?;
        let index = SaIndex::read(&mut index_stream)?;
        if index.reference_id != header.reference_id {
            return Err(Error::Format(format!(
                "SA index reference id {} does not match store reference id {}",
                index.reference_id, header.reference_id
            )));
        }

        Ok(Self {
            stream,
            header,
            index,
            block: SaBlock::new(0),
            block_offset: None,
            last_query: None,
            num_block_loads: 0,
        })
    }

    #[must_use]
    pub fn header(&self) -> &SaHeader {
        &self.header
    }

    #[must_use]
    pub fn index(&self) -> &SaIndex {
        &self.index
    }

    #[must_use]
    pub fn is_ref_minor(&self, ref_index: u16, position: i32) -> bool {
        self.index.is_ref_minor(ref_index, position)
    }

    /// Number of blocks decoded so far.
    #[must_use]
    pub fn num_block_loads(&self) -> usize {
        self.num_block_loads
    }

    /// The record stored at exactly this position, if any.
    pub fn get_annotation(&mut self, ref_index: u16, position: i32) -> Result<Option<&R>, Error> {
        let cached = self
            .last_query
            .as_ref()
            .is_some_and(|q| q.ref_index == ref_index && q.position == position);

        if !cached {
            // drop the stale entry first so a failed lookup never serves it
            self.last_query = None;
            let record = self.load_record(ref_index, position)?;
            self.last_query = Some(LastQuery {
                ref_index,
                position,
                record,
            });
        }

        Ok(self.last_query.as_ref().and_then(|q| q.record.as_ref()))
    }

    fn load_record(&mut self, ref_index: u16, position: i32) -> Result<Option<R>, Error> {
        let file_offset = match self
            .index
            .get(ref_index)
            .and_then(|c| c.find_block(position))
        {
            Some(block) => block.file_offset,
            None => return Ok(None),
        };

        if self.block_offset != Some(file_offset) {
            self.block_offset = None;
            self.stream.seek(SeekFrom::Start(file_offset))?;
            self.block.load(&mut self.stream)?;
            self.block_offset = Some(file_offset);
            self.num_block_loads += 1;
            trace!("loaded SA block at offset {file_offset}");
        }

        match self.block.record(position) {
            Some(mut bytes) => Ok(Some(R::read_from(&mut bytes)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;

    use super::*;
    use crate::chromosome::test_chromosome;
    use crate::sa::header::fixtures::header;
    use crate::sa::record::{SaAllele, SaPosition};
    use crate::sa::writer::SaWriter;

    fn record(position: i32) -> SaPosition {
        SaPosition {
            alleles: vec![SaAllele {
                ref_allele: "A".to_string(),
                alt_allele: "G".to_string(),
                json: format!(r#""position":{position},"allAf":0.{position}"#),
            }],
            ref_minor: position % 7 == 0,
        }
    }

    type MemReader = SaReader<Cursor<Vec<u8>>, SaPosition>;

    /// Writes every third position in [1, 3000] on two chromosomes using tiny
    /// blocks so that queries cross many block boundaries.
    fn build() -> (MemReader, Vec<i32>) {
        let chr1 = test_chromosome("chr1", 0, 10_000);
        let chr3 = test_chromosome("chr3", 2, 10_000);
        let positions: Vec<i32> = (1..=3000).step_by(3).collect();

        let mut writer = SaWriter::with_block_capacity(Vec::new(), &header(), 512).unwrap();
        for chromosome in [&chr1, &chr3] {
            for &position in &positions {
                writer.write(chromosome, position, &record(position)).unwrap();
            }
        }
        let mut index = Vec::new();
        let (store, stats) = writer.finish(&mut index).unwrap();
        assert!(stats.num_blocks > 20);

        let reader = SaReader::open(Cursor::new(store), index.as_slice()).unwrap();
        (reader, positions)
    }

    #[test]
    fn random_order_queries_return_written_records() {
        let (mut reader, positions) = build();
        let mut queries: Vec<(u16, i32)> = positions
            .iter()
            .flat_map(|&p| [(0u16, p), (2u16, p)])
            .collect();
        queries.shuffle(&mut StdRng::seed_from_u64(42));

        for (ref_index, position) in queries {
            let found = reader.get_annotation(ref_index, position).unwrap();
            assert_eq!(found, Some(&record(position)), "{ref_index}:{position}");
        }
    }

    #[test]
    fn unwritten_positions_are_absent() {
        let (mut reader, positions) = build();
        let (min, max) = (positions[0], *positions.last().unwrap());
        for position in min..=max {
            if position % 3 != 1 {
                assert!(reader.get_annotation(0, position).unwrap().is_none(), "{position}");
            }
        }
        assert!(reader.get_annotation(0, max + 1).unwrap().is_none());
        assert!(reader.get_annotation(1, min).unwrap().is_none());
    }

    #[test]
    fn repeated_queries_reuse_cached_block() {
        let (mut reader, _) = build();
        for _ in 0..100 {
            assert!(reader.get_annotation(0, 1501).unwrap().is_some());
        }
        assert_eq!(reader.num_block_loads(), 1);

        // other positions in the same block do not reload it either
        let block = *reader.index().get(0).unwrap().find_block(1501).unwrap();
        assert!(reader.get_annotation(0, block.first_position).unwrap().is_some());
        assert!(reader.get_annotation(0, block.last_position).unwrap().is_some());
        assert_eq!(reader.num_block_loads(), 1);

        reader.get_annotation(0, block.last_position + 3).unwrap();
        assert_eq!(reader.num_block_loads(), 2);
    }

    #[test]
    fn ref_minor_positions_come_from_index() {
        let (reader, _) = build();
        assert!(reader.is_ref_minor(0, 7));
        assert!(!reader.is_ref_minor(0, 4));
        assert!(reader.is_ref_minor(2, 2989));
        assert_eq!(reader.header().json_key, "gnomad");
    }

    #[test]
    fn mismatched_index_is_rejected() {
        let chr1 = test_chromosome("chr1", 0, 100);
        let mut writer = SaWriter::new(Vec::new(), &header()).unwrap();
        writer.write(&chr1, 1, &record(1)).unwrap();
        let (store, _) = writer.finish(&mut Vec::new()).unwrap();

        let mut other = header();
        other.reference_id += 1;
        let mut writer = SaWriter::new(Vec::new(), &other).unwrap();
        writer.write(&chr1, 1, &record(1)).unwrap();
        let mut wrong_index = Vec::new();
        writer.finish(&mut wrong_index).unwrap();

        let result: Result<MemReader, _> = SaReader::open(Cursor::new(store), wrong_index.as_slice());
        assert!(matches!(result, Err(Error::Format(_))));
    }
}
