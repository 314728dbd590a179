//! Reader for intermediate gnomAD frequency TSVs.
//!
//! ```text
//! #dataType=genome
//! #CHROM	POS	REF	ALT	DP	FILTER	LCR	AN_all	AC_all	HC_all	AN_afr	...
//! chr1	13372	G	C	2130	PASS	.	2198	1	0	...
//! ```
//!
//! Columns are located by name; any subpopulation column may be absent. `.`
//! and empty fields are missing values.

use std::collections::HashMap;
use std::io::{BufRead, Lines};
use std::sync::Arc;

use crate::chromosome::{Chromosome, ChromosomeMap};
use crate::error::Error;

use super::gnomad::{AlleleCounts, DataType, GnomadItem, NUM_POPULATIONS, Population};

const COLUMN_HEADER_PREFIX: &str = "#CHROM";

#[derive(Debug, Clone, Copy)]
struct PopulationColumns {
    allele_number: Option<usize>,
    allele_count: Option<usize>,
    hom_count: Option<usize>,
}

#[derive(Debug, Clone)]
struct Columns {
    chrom: usize,
    pos: usize,
    ref_allele: usize,
    alt_allele: usize,
    depth: Option<usize>,
    filter: Option<usize>,
    lcr: Option<usize>,
    populations: [PopulationColumns; NUM_POPULATIONS],
}

impl Columns {
    fn parse(header_line: &str) -> Result<Self, Error> {
        let positions: HashMap<&str, usize> = header_line
            .trim_start_matches('#')
            .split('\t')
            .enumerate()
            .map(|(i, name)| (name.trim(), i))
            .collect();

        let required = |name: &str| {
            positions
                .get(name)
                .copied()
                .ok_or_else(|| Error::Parse(format!("gnomAD TSV is missing the {name} column")))
        };
        let optional = |name: &str| positions.get(name).copied();

        let populations = Population::ALL.map(|population| {
            let suffix = population.column_suffix();
            PopulationColumns {
                allele_number: optional(&format!("AN_{suffix}")),
                allele_count: optional(&format!("AC_{suffix}")),
                hom_count: optional(&format!("HC_{suffix}")),
            }
        });

        Ok(Self {
            chrom: required("CHROM")?,
            pos: required("POS")?,
            ref_allele: required("REF")?,
            alt_allele: required("ALT")?,
            depth: optional("DP"),
            filter: optional("FILTER"),
            lcr: optional("LCR"),
            populations,
        })
    }
}

/// Streams [`GnomadItem`]s from one TSV. Stops after the first error.
pub struct GnomadTsvReader<'a, R: BufRead> {
    lines: Lines<R>,
    line_number: usize,
    chromosomes: &'a ChromosomeMap,
    last_chromosome: Option<Arc<Chromosome>>,
    columns: Columns,
    data_type: DataType,
    header: Vec<(String, String)>,
    failed: bool,
}

impl<'a, R: BufRead> GnomadTsvReader<'a, R> {
    /// Reads the header block and the column header line.
    pub fn new(reader: R, chromosomes: &'a ChromosomeMap) -> Result<Self, Error> {
        let mut lines = reader.lines();
        let mut line_number = 0;
        let mut header = Vec::new();

        let columns = loop {
            let Some(line) = lines.next() else {
                return Err(Error::Parse(
                    "gnomAD TSV ended before the #CHROM column header".to_string(),
                ));
            };
            let line = line?;
            line_number += 1;

            if line.starts_with(COLUMN_HEADER_PREFIX) {
                break Columns::parse(&line)?;
            }
            let Some(entry) = line.strip_prefix('#') else {
                return Err(Error::Parse(format!(
                    "gnomAD TSV line {line_number}: data before the #CHROM column header"
                )));
            };
            if let Some((key, value)) = entry.split_once('=') {
                header.push((key.trim().to_string(), value.trim().to_string()));
            }
        };

        let data_type: DataType = header
            .iter()
            .find(|(key, _)| key == "dataType")
            .ok_or_else(|| Error::Parse("gnomAD TSV header has no dataType entry".to_string()))?
            .1
            .parse()?;

        Ok(Self {
            lines,
            line_number,
            chromosomes,
            last_chromosome: None,
            columns,
            data_type,
            header,
            failed: false,
        })
    }

    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// A `#key=value` entry from the header block.
    #[must_use]
    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.header
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn chromosome(&mut self, name: &str) -> Result<Arc<Chromosome>, Error> {
        if let Some(last) = &self.last_chromosome {
            if last.names().contains(&name) {
                return Ok(Arc::clone(last));
            }
        }
        let chromosome = Arc::clone(self.chromosomes.resolve(name)?);
        self.last_chromosome = Some(Arc::clone(&chromosome));
        Ok(chromosome)
    }

    fn parse_line(&mut self, line: &str) -> Result<GnomadItem, Error> {
        let row = Row {
            fields: line.split('\t').collect(),
            line_number: self.line_number,
        };
        let columns = &self.columns;

        let chrom = row.get(columns.chrom)?.to_string();
        let position: i32 = row.get(columns.pos)?.parse().map_err(|_| {
            Error::Parse(format!(
                "gnomAD TSV line {}: invalid position",
                row.line_number
            ))
        })?;
        let ref_allele = row.get(columns.ref_allele)?.to_string();
        let alt_allele = row.get(columns.alt_allele)?.to_string();
        let depth = row.int(columns.depth)?;

        let has_failed_filters = match columns.filter {
            Some(index) => !matches!(row.get(index)?, "PASS" | "." | ""),
            None => false,
        };
        let is_low_complexity_region = match columns.lcr {
            Some(index) => matches!(row.get(index)?, "1" | "true" | "TRUE" | "LCR"),
            None => false,
        };

        let mut counts = [AlleleCounts::default(); NUM_POPULATIONS];
        for (slot, population) in counts.iter_mut().zip(&columns.populations) {
            *slot = AlleleCounts::new(
                row.int(population.allele_number)?,
                row.int(population.allele_count)?,
                row.int(population.hom_count)?,
            );
        }

        let data_type = self.data_type;
        let chromosome = self.chromosome(&chrom)?;
        Ok(GnomadItem::new(
            chromosome,
            position,
            ref_allele,
            alt_allele,
            depth,
            counts,
            has_failed_filters,
            is_low_complexity_region,
            data_type,
        ))
    }
}

/// The tab-separated fields of one data line.
struct Row<'l> {
    fields: Vec<&'l str>,
    line_number: usize,
}

impl<'l> Row<'l> {
    fn get(&self, index: usize) -> Result<&'l str, Error> {
        self.fields.get(index).copied().ok_or_else(|| {
            Error::Parse(format!(
                "gnomAD TSV line {}: expected at least {} fields, found {}",
                self.line_number,
                index + 1,
                self.fields.len()
            ))
        })
    }

    /// An optional column holding a nullable integer.
    fn int(&self, index: Option<usize>) -> Result<Option<i32>, Error> {
        match index {
            Some(index) => parse_nullable(self.get(index)?, self.line_number),
            None => Ok(None),
        }
    }
}

fn parse_nullable(value: &str, line_number: usize) -> Result<Option<i32>, Error> {
    match value.trim() {
        "" | "." => Ok(None),
        v => v.parse().map(Some).map_err(|_| {
            Error::Parse(format!("gnomAD TSV line {line_number}: invalid integer '{v}'"))
        }),
    }
}

impl<R: BufRead> Iterator for GnomadTsvReader<'_, R> {
    type Item = Result<GnomadItem, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e.into()));
                }
            };
            self.line_number += 1;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let result = self.parse_line(&line);
            if result.is_err() {
                self.failed = true;
            }
            return Some(result);
        }
    }
}
