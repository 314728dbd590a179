//! Chromosome representation and name resolution.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chromosome {
    pub ucsc_name: String,
    pub ensembl_name: String,
    pub refseq_accession: String,
    pub length: u32,
    pub ref_index: u16,
}

impl Chromosome {
    pub fn validate(&self) -> Result<(), Error> {
        if self.ucsc_name.is_empty()
            && self.ensembl_name.is_empty()
            && self.refseq_accession.is_empty()
        {
            return Err(Error::Validation(format!(
                "chromosome at ref_index {} has no name fields set",
                self.ref_index
            )));
        }
        Ok(())
    }

    /// Returns all non-empty name fields for this chromosome.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        [
            self.ucsc_name.as_str(),
            self.ensembl_name.as_str(),
            self.refseq_accession.as_str(),
        ]
        .into_iter()
        .filter(|name| !name.is_empty())
        .collect()
    }

    /// The name used in logs and file names: UCSC style when available.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.names().first().copied().unwrap_or("")
    }
}

/// Resolves any known chromosome name to a shared [`Chromosome`].
#[derive(Debug, Clone, Default)]
pub struct ChromosomeMap {
    chromosomes: Vec<Arc<Chromosome>>,
    by_name: HashMap<String, usize>,
}

impl ChromosomeMap {
    pub fn new(chromosomes: Vec<Chromosome>) -> Result<Self, Error> {
        let mut by_name = HashMap::new();
        let mut shared = Vec::with_capacity(chromosomes.len());

        for (i, chromosome) in chromosomes.into_iter().enumerate() {
            chromosome.validate()?;
            if usize::from(chromosome.ref_index) != i {
                return Err(Error::Validation(format!(
                    "chromosome {} has ref_index {} but is stored at position {i}",
                    chromosome.display_name(),
                    chromosome.ref_index
                )));
            }
            for name in chromosome.names() {
                by_name.insert(name.to_string(), i);
            }
            shared.push(Arc::new(chromosome));
        }

        Ok(Self {
            chromosomes: shared,
            by_name,
        })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Chromosome>> {
        self.by_name.get(name).map(|&i| &self.chromosomes[i])
    }

    #[must_use]
    pub fn get_by_index(&self, ref_index: u16) -> Option<&Arc<Chromosome>> {
        self.chromosomes.get(usize::from(ref_index))
    }

    /// Like [`get`](Self::get) but an unknown name is a parse error.
    pub fn resolve(&self, name: &str) -> Result<&Arc<Chromosome>, Error> {
        self.get(name)
            .ok_or_else(|| Error::Parse(format!("unknown chromosome: '{name}'")))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chromosomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chromosomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Chromosome>> {
        self.chromosomes.iter()
    }
}

#[cfg(test)]
pub(crate) fn test_chromosome(ucsc_name: &str, ref_index: u16, length: u32) -> Chromosome {
    Chromosome {
        ucsc_name: ucsc_name.to_string(),
        ensembl_name: ucsc_name.trim_start_matches("chr").to_string(),
        refseq_accession: String::new(),
        length,
        ref_index,
    }
}
