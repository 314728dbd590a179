//! Per-run build state owned by the top-level orchestrator.

use std::collections::BTreeSet;

use crate::error::Error;

/// Tracks which chromosomes a build run has already produced output for, so
/// that no chromosome is written twice into one cache or store.
#[derive(Debug, Default)]
pub struct BuildContext {
    processed_chromosomes: BTreeSet<u16>,
}

impl BuildContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `ref_index` as processed. Seeing it a second time is an error.
    pub fn mark_processed(&mut self, ref_index: u16, name: &str) -> Result<(), Error> {
        if !self.processed_chromosomes.insert(ref_index) {
            return Err(Error::Validation(format!(
                "chromosome {name} (ref index {ref_index}) was already processed in this run"
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn is_processed(&self, ref_index: u16) -> bool {
        self.processed_chromosomes.contains(&ref_index)
    }

    #[must_use]
    pub fn num_processed(&self) -> usize {
        self.processed_chromosomes.len()
    }
}
