//! Heap-based merge of position-sorted sources for one chromosome.
//!
//! Every step pulls all records sharing the smallest pending position from
//! every source, normalizes them and pushes them onto a min-heap. Because
//! normalization can move a record upstream by at most
//! [`MAX_UPSTREAM_LENGTH`] bases, a heap position further than that behind the
//! read position can no longer receive records and is resolved.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};
use std::iter::Peekable;

use log::debug;

use crate::error::Error;
use crate::reference::SequenceProvider;
use crate::variant::MAX_UPSTREAM_LENGTH;

use super::MergeableRecord;

struct HeapEntry<T> {
    position: i32,
    source: usize,
    sequence: u64,
    item: T,
}

impl<T> HeapEntry<T> {
    fn key(&self) -> (i32, usize, u64) {
        (self.position, self.source, self.sequence)
    }
}

impl<T> PartialEq for HeapEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<T> Eq for HeapEntry<T> {}

impl<T> PartialOrd for HeapEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for HeapEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub num_read: usize,
    pub num_emitted: usize,
    pub num_merged: usize,
    /// Conflicting records plus collapsed exact duplicates.
    pub num_conflicting: usize,
    pub num_uninformative: usize,
}

/// Yields merged records in position order. Within one position, alleles come
/// out in the order they were first seen.
pub struct SourceMerger<'a, T, I, S: ?Sized>
where
    I: Iterator<Item = Result<T, Error>>,
{
    sources: Vec<Peekable<I>>,
    last_positions: Vec<i32>,
    sequence: &'a S,
    ref_index: Option<u16>,
    heap: BinaryHeap<Reverse<HeapEntry<T>>>,
    next_sequence: u64,
    ready: VecDeque<T>,
    done: bool,
    stats: MergeStats,
}

impl<'a, T, I, S> SourceMerger<'a, T, I, S>
where
    T: MergeableRecord,
    I: Iterator<Item = Result<T, Error>>,
    S: SequenceProvider + ?Sized,
{
    /// `sequence` is the reference for the chromosome all sources cover.
    pub fn new(sources: Vec<I>, sequence: &'a S) -> Self {
        let num_sources = sources.len();
        Self {
            sources: sources.into_iter().map(Iterator::peekable).collect(),
            last_positions: vec![i32::MIN; num_sources],
            sequence,
            ref_index: None,
            heap: BinaryHeap::new(),
            next_sequence: 0,
            ready: VecDeque::new(),
            done: false,
            stats: MergeStats::default(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    /// Reads the next position from the sources and resolves whatever the
    /// heap can release. Returns false once every source is exhausted.
    fn advance(&mut self) -> Result<bool, Error> {
        let mut min_position: Option<i32> = None;
        for source in &mut self.sources {
            if matches!(source.peek(), Some(Err(_))) {
                if let Some(Err(e)) = source.next() {
                    return Err(e);
                }
            }
            if let Some(Ok(item)) = source.peek() {
                let position = item.position();
                min_position = Some(min_position.map_or(position, |p| p.min(position)));
            }
        }

        let Some(current) = min_position else {
            while let Some(position) = self.heap_min() {
                self.resolve_position(position)?;
            }
            return Ok(false);
        };

        for index in 0..self.sources.len() {
            while let Some(Ok(item)) = self.sources[index].peek() {
                if item.position() != current {
                    break;
                }
                let Some(Ok(item)) = self.sources[index].next() else {
                    break;
                };
                self.accept(index, item)?;
            }
        }

        while let Some(position) = self.heap_min() {
            if position + MAX_UPSTREAM_LENGTH >= current {
                break;
            }
            self.resolve_position(position)?;
        }
        Ok(true)
    }

    fn accept(&mut self, source: usize, item: T) -> Result<(), Error> {
        let position = item.position();
        if position < self.last_positions[source] {
            return Err(Error::UnsortedInput(format!(
                "source {source} is not sorted: position {position} follows {}",
                self.last_positions[source]
            )));
        }
        self.last_positions[source] = position;

        match self.ref_index {
            None => self.ref_index = Some(item.ref_index()),
            Some(expected) if expected != item.ref_index() => {
                return Err(Error::Validation(format!(
                    "merged sources must cover one chromosome: ref index {} follows {expected}",
                    item.ref_index()
                )));
            }
            Some(_) => {}
        }

        self.stats.num_read += 1;
        let item = item.normalized(self.sequence);
        self.heap.push(Reverse(HeapEntry {
            position: item.position(),
            source,
            sequence: self.next_sequence,
            item,
        }));
        self.next_sequence += 1;
        Ok(())
    }

    fn heap_min(&self) -> Option<i32> {
        self.heap.peek().map(|Reverse(entry)| entry.position)
    }

    /// Pops every record at `position` and queues the merged result.
    fn resolve_position(&mut self, position: i32) -> Result<(), Error> {
        let mut per_source: Vec<Vec<T>> = vec![Vec::new(); self.sources.len()];
        while self.heap_min() == Some(position) {
            if let Some(Reverse(entry)) = self.heap.pop() {
                per_source[entry.source].push(entry.item);
            }
        }

        // alleles in first-seen order, one slot per (ref, alt)
        let mut alleles: Vec<T> = Vec::new();
        for items in per_source {
            let before = items.len();
            let items = remove_conflicting(items);
            self.stats.num_conflicting += before - items.len();

            for item in items {
                let existing = alleles.iter_mut().find(|a| {
                    a.ref_allele() == item.ref_allele() && a.alt_allele() == item.alt_allele()
                });
                match existing {
                    Some(existing) => {
                        *existing = existing.merge(&item)?;
                        self.stats.num_merged += 1;
                    }
                    None => alleles.push(item),
                }
            }
        }

        for allele in alleles {
            if allele.is_informative() {
                self.stats.num_emitted += 1;
                self.ready.push_back(allele);
            } else {
                self.stats.num_uninformative += 1;
            }
        }
        Ok(())
    }
}

/// Within one source and position: exact duplicates collapse to one record,
/// while differing records for the same (ref, alt) are all discarded.
pub fn remove_conflicting<T: MergeableRecord>(items: Vec<T>) -> Vec<T> {
    let mut kept: Vec<T> = Vec::with_capacity(items.len());
    let mut conflicting: Vec<(String, String)> = Vec::new();

    for item in items {
        let same_key = |other: &T| {
            other.ref_allele() == item.ref_allele() && other.alt_allele() == item.alt_allele()
        };
        match kept.iter().find(|k| same_key(*k)) {
            Some(existing) if *existing == item => {}
            Some(_) => conflicting.push((item.ref_allele().to_string(), item.alt_allele().to_string())),
            None => kept.push(item),
        }
    }

    if !conflicting.is_empty() {
        debug!("removing {} conflicting allele(s)", conflicting.len());
        kept.retain(|k| {
            !conflicting
                .iter()
                .any(|(r, a)| k.ref_allele() == r.as_str() && k.alt_allele() == a.as_str())
        });
    }
    kept
}

impl<T, I, S> Iterator for SourceMerger<'_, T, I, S>
where
    T: MergeableRecord,
    I: Iterator<Item = Result<T, Error>>,
    S: SequenceProvider + ?Sized,
{
    type Item = Result<T, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some(Ok(item));
            }
            if self.done {
                return None;
            }
            match self.advance() {
                Ok(true) => {}
                Ok(false) => self.done = true,
                Err(e) => {
                    self.done = true;
                    self.ready.clear();
                    return Some(Err(e));
                }
            }
        }
    }
}
