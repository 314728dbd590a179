//! Parallel per-chromosome SA store builds followed by one sequential
//! concatenation.
//!
//! Each worker owns its reference file handle, its TSV readers and its
//! temporary output, so workers share nothing mutable. The concatenation must
//! run in reference order because block offsets only ever grow.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::chromosome::{Chromosome, ChromosomeMap};
use crate::error::Error;
use crate::format::text::open_text;
use crate::merge::gnomad::{GnomadItem, Population};
use crate::merge::tsv::GnomadTsvReader;
use crate::merge::{MergeStats, SourceMerger};
use crate::perf::Benchmark;
use crate::reference::SequenceProvider;
use crate::reference::reader::ReferenceReader;
use crate::sa::concat::{ConcatStats, SaPart, concat_stores};
use crate::sa::{
    DEFAULT_BLOCK_CAPACITY, INDEX_EXTENSION, SA_EXTENSION, SaAllele, SaHeader, SaPosition,
    SaWriteStats, SaWriter,
};

/// Workers mostly wait on disk reads, so more threads rarely help.
pub const DEFAULT_NUM_THREADS: usize = 4;

/// Summed SNV alternate allele frequency above which a position is
/// reference-minor.
pub const REF_MINOR_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub num_threads: usize,
    pub block_capacity: usize,
    /// Parent directory for per-chromosome temporary files. Defaults to the
    /// system temporary directory.
    pub temp_dir: Option<PathBuf>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            num_threads: DEFAULT_NUM_THREADS,
            block_capacity: DEFAULT_BLOCK_CAPACITY,
            temp_dir: None,
        }
    }
}

/// The input files covering one chromosome.
#[derive(Debug, Clone)]
pub struct ChromosomeJob {
    pub chromosome: Arc<Chromosome>,
    pub genome: Option<PathBuf>,
    pub exome: Option<PathBuf>,
}

impl ChromosomeJob {
    fn inputs(&self) -> impl Iterator<Item = &Path> {
        self.genome.iter().chain(self.exome.iter()).map(PathBuf::as_path)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionStats {
    pub num_positions: usize,
    pub num_alleles: usize,
    pub num_ref_minor: usize,
    /// Alleles dropped because their ref allele disagrees with the reference.
    pub num_ref_mismatches: usize,
}

#[derive(Debug, Clone)]
pub struct ChromosomeSummary {
    pub chromosome: Arc<Chromosome>,
    pub positions: PositionStats,
    pub merge: MergeStats,
    pub write: SaWriteStats,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub chromosomes: Vec<ChromosomeSummary>,
    pub concat: ConcatStats,
    pub store_path: PathBuf,
    pub index_path: PathBuf,
}

/// The `chr…` component of names such as `gnomad.genomes.r2.0.2.chr1_noVEP.tsv.gz`.
#[must_use]
pub fn chromosome_component(file_name: &str) -> Option<&str> {
    file_name
        .split('.')
        .find(|component| component.starts_with("chr"))
        .and_then(|component| component.split('_').next())
}

fn is_tsv(file_name: &str) -> bool {
    file_name.ends_with(".tsv") || file_name.ends_with(".tsv.gz")
}

/// Maps chromosome name to TSV path for every input file in `dir`.
pub fn list_inputs(dir: &Path) -> Result<BTreeMap<String, PathBuf>, Error> {
    let mut inputs = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !path.is_file() || !is_tsv(file_name) {
            continue;
        }
        let Some(chrom) = chromosome_component(file_name) else {
            warn!("skipping {file_name}: no chr component in the file name");
            continue;
        };
        if let Some(previous) = inputs.insert(chrom.to_string(), path.clone()) {
            return Err(Error::Validation(format!(
                "{} and {} both hold {chrom}",
                previous.display(),
                path.display()
            )));
        }
    }

    if inputs.is_empty() {
        return Err(Error::Validation(format!(
            "{} does not contain any TSV files",
            dir.display()
        )));
    }
    Ok(inputs)
}

/// Pairs genome and exome inputs by chromosome. A chromosome present in only
/// one directory is built from that source alone. Jobs come back in
/// reference order.
pub fn pair_inputs(
    genome_dir: &Path,
    exome_dir: &Path,
    chromosomes: &ChromosomeMap,
) -> Result<Vec<ChromosomeJob>, Error> {
    let genome = list_inputs(genome_dir)?;
    let mut exome = list_inputs(exome_dir)?;

    let mut jobs: BTreeMap<u16, ChromosomeJob> = BTreeMap::new();
    for (name, genome_path) in genome {
        let chromosome = Arc::clone(chromosomes.resolve(&name)?);
        let exome_path = exome.remove(&name);
        jobs.insert(
            chromosome.ref_index,
            ChromosomeJob {
                chromosome,
                genome: Some(genome_path),
                exome: exome_path,
            },
        );
    }
    for (name, exome_path) in exome {
        let chromosome = Arc::clone(chromosomes.resolve(&name)?);
        jobs.insert(
            chromosome.ref_index,
            ChromosomeJob {
                chromosome,
                genome: None,
                exome: Some(exome_path),
            },
        );
    }

    Ok(jobs.into_values().collect())
}

/// Groups merged items by position and writes one [`SaPosition`] per
/// position. Items whose ref allele disagrees with `sequence` are dropped.
pub fn write_positions<I, S, W>(
    items: I,
    chromosome: &Chromosome,
    sequence: &S,
    writer: &mut SaWriter<W>,
) -> Result<PositionStats, Error>
where
    I: IntoIterator<Item = Result<GnomadItem, Error>>,
    S: SequenceProvider + ?Sized,
    W: std::io::Write,
{
    let mut stats = PositionStats::default();
    let mut pending: Vec<GnomadItem> = Vec::new();

    for item in items {
        let item = item?;
        if item.chromosome.ref_index != chromosome.ref_index {
            return Err(Error::Validation(format!(
                "{} holds a record on {} at {}",
                chromosome.display_name(),
                item.chromosome.display_name(),
                item.position
            )));
        }
        if pending.first().is_some_and(|p| p.position != item.position) {
            flush_position(&mut pending, chromosome, writer, &mut stats)?;
        }
        if matches_reference(&item, sequence) {
            pending.push(item);
        } else {
            debug!(
                "{}:{} ref allele {} disagrees with the reference",
                chromosome.display_name(),
                item.position,
                item.ref_allele
            );
            stats.num_ref_mismatches += 1;
        }
    }
    flush_position(&mut pending, chromosome, writer, &mut stats)?;
    Ok(stats)
}

fn matches_reference<S: SequenceProvider + ?Sized>(item: &GnomadItem, sequence: &S) -> bool {
    if item.ref_allele.is_empty() {
        return true;
    }
    let Ok(start) = u32::try_from(item.position) else {
        return false;
    };
    sequence
        .bases(start, item.ref_allele.len())
        .is_some_and(|bases| bases.eq_ignore_ascii_case(item.ref_allele.as_bytes()))
}

fn flush_position<W: std::io::Write>(
    pending: &mut Vec<GnomadItem>,
    chromosome: &Chromosome,
    writer: &mut SaWriter<W>,
    stats: &mut PositionStats,
) -> Result<(), Error> {
    let Some(position) = pending.first().map(|item| item.position) else {
        return Ok(());
    };

    let alt_frequency: f64 = pending
        .iter()
        .filter(|item| item.is_snv())
        .filter_map(|item| item.counts(Population::All).frequency())
        .sum();
    let ref_minor = alt_frequency > REF_MINOR_THRESHOLD;

    let alleles = pending
        .drain(..)
        .map(|item| {
            Ok(SaAllele {
                json: item.to_json()?,
                ref_allele: item.ref_allele,
                alt_allele: item.alt_allele,
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    stats.num_positions += 1;
    stats.num_alleles += alleles.len();
    if ref_minor {
        stats.num_ref_minor += 1;
    }
    writer.write(chromosome, position, &SaPosition { alleles, ref_minor })
}

fn part_paths(dir: &Path, chromosome: &Chromosome) -> (PathBuf, PathBuf) {
    let name = chromosome.display_name();
    (
        dir.join(format!("{name}.{SA_EXTENSION}")),
        dir.join(format!("{name}.{INDEX_EXTENSION}")),
    )
}

fn build_chromosome(
    job: &ChromosomeJob,
    reference_path: &Path,
    reference: &ReferenceReader,
    header: &SaHeader,
    block_capacity: usize,
    out_dir: &Path,
) -> Result<ChromosomeSummary, Error> {
    let benchmark = Benchmark::start();
    let chromosome = &job.chromosome;

    let mut reference_file = BufReader::new(File::open(reference_path)?);
    let sequence = reference.load_chromosome(&mut reference_file, chromosome.ref_index)?;

    let mut readers = Vec::new();
    for path in job.inputs() {
        let reader = GnomadTsvReader::new(open_text(path)?, &reference.chromosomes)
            .map_err(|e| Error::Parse(format!("{}: {e}", path.display())))?;
        debug!("{}: {} data", path.display(), reader.data_type());
        readers.push(reader);
    }

    let mut merger = SourceMerger::new(readers, &sequence);
    let (store_path, index_path) = part_paths(out_dir, chromosome);
    let mut writer = SaWriter::with_block_capacity(
        BufWriter::new(File::create(&store_path)?),
        header,
        block_capacity,
    )?;

    let positions = write_positions(&mut merger, chromosome, &sequence, &mut writer)?;
    let mut index_writer = BufWriter::new(File::create(&index_path)?);
    let (_, write) = writer.finish(&mut index_writer)?;

    if positions.num_ref_mismatches > 0 {
        warn!(
            "{}: dropped {} alleles whose ref allele disagrees with the reference",
            chromosome.display_name(),
            positions.num_ref_mismatches
        );
    }
    info!(
        "{}: {}",
        chromosome.display_name(),
        benchmark.summary(positions.num_positions, "positions")
    );

    Ok(ChromosomeSummary {
        chromosome: Arc::clone(chromosome),
        positions,
        merge: merger.stats(),
        write,
        elapsed: benchmark.elapsed(),
    })
}

/// Builds one merged SA store from per-chromosome gnomAD TSVs. Output goes to
/// `<out_dir>/<stem>.nsa` and `<out_dir>/<stem>.nsa.idx`. Any worker failure
/// aborts the batch before concatenation.
pub fn build_gnomad_store(
    reference_path: &Path,
    reference: &ReferenceReader,
    jobs: &[ChromosomeJob],
    header: &SaHeader,
    out_dir: &Path,
    stem: &str,
    options: &BatchOptions,
) -> Result<BatchSummary, Error> {
    let temp = match &options.temp_dir {
        Some(dir) => tempfile::tempdir_in(dir)?,
        None => tempfile::tempdir()?,
    };
    debug!("per-chromosome stores go to {}", temp.path().display());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.num_threads.max(1))
        .build()
        .map_err(|e| Error::Validation(format!("failed to initialize thread pool: {e}")))?;

    info!(
        "building {} chromosomes with {} threads",
        jobs.len(),
        options.num_threads.max(1)
    );
    let mut chromosomes = pool.install(|| {
        jobs.par_iter()
            .map(|job| {
                build_chromosome(
                    job,
                    reference_path,
                    reference,
                    header,
                    options.block_capacity,
                    temp.path(),
                )
            })
            .collect::<Result<Vec<_>, Error>>()
    })?;
    chromosomes.sort_by_key(|summary| summary.chromosome.ref_index);

    let mut parts = Vec::with_capacity(chromosomes.len());
    for summary in &chromosomes {
        let (store_path, index_path) = part_paths(temp.path(), &summary.chromosome);
        parts.push(SaPart {
            name: summary.chromosome.display_name().to_string(),
            store: BufReader::new(File::open(store_path)?),
            index: BufReader::new(File::open(index_path)?),
        });
    }

    let store_path = out_dir.join(format!("{stem}.{SA_EXTENSION}"));
    let index_path = out_dir.join(format!("{stem}.{SA_EXTENSION}.{INDEX_EXTENSION}"));
    let mut index_writer = BufWriter::new(File::create(&index_path)?);
    let (_, concat) = concat_stores(
        parts,
        BufWriter::new(File::create(&store_path)?),
        &mut index_writer,
    )?;

    Ok(BatchSummary {
        chromosomes,
        concat,
        store_path,
        index_path,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::chromosome::test_chromosome;
    use crate::merge::gnomad::DataType;
    use crate::merge::gnomad::fixtures::item;
    use crate::reference::reader::{ChromosomeData, make_reference_file};
    use crate::sa::SaReader;
    use crate::sa::header::fixtures::header;

    #[test]
    fn chromosome_component_from_file_names() {
        assert_eq!(
            chromosome_component("gnomad.exomes.r2.1.sites.grch38.chr1_noVEP.tsv.gz"),
            Some("chr1")
        );
        assert_eq!(chromosome_component("chr18.tsv"), Some("chr18"));
        assert_eq!(chromosome_component("genomes.tsv"), None);
    }

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn inputs_pair_by_chromosome() {
        let chromosomes = ChromosomeMap::new(vec![
            test_chromosome("chr1", 0, 1000),
            test_chromosome("chr2", 1, 1000),
            test_chromosome("chrX", 2, 1000),
        ])
        .unwrap();
        let genome = tempfile::tempdir().unwrap();
        let exome = tempfile::tempdir().unwrap();
        write_file(genome.path(), "g.chrX.tsv", "");
        write_file(genome.path(), "g.chr1.tsv.gz", "");
        write_file(genome.path(), "gnomad.version", "");
        write_file(exome.path(), "e.chr1_noVEP.tsv", "");
        write_file(exome.path(), "e.chr2.tsv", "");

        let jobs = pair_inputs(genome.path(), exome.path(), &chromosomes).unwrap();
        let summary: Vec<(&str, bool, bool)> = jobs
            .iter()
            .map(|j| (j.chromosome.ucsc_name.as_str(), j.genome.is_some(), j.exome.is_some()))
            .collect();
        assert_eq!(
            summary,
            vec![("chr1", true, true), ("chr2", false, true), ("chrX", true, false)]
        );
    }

    #[test]
    fn directory_without_tsvs_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "gnomad.version", "");
        let err = list_inputs(dir.path()).unwrap_err();
        assert!(err.to_string().contains("does not contain any TSV files"));
    }

    #[test]
    fn positions_group_alleles_and_flag_ref_minor() {
        let chr1 = Arc::new(test_chromosome("chr1", 0, 20));
        let sequence = ChromosomeData {
            ref_index: 0,
            sequence: b"ACGTACGTACGTACGTACGT".to_vec(),
        };
        let items = vec![
            // 0.4 + 0.2 = 0.6 > 0.5
            item(&chr1, 2, "C", "A", 4, 10, DataType::Genome),
            item(&chr1, 2, "C", "T", 2, 10, DataType::Genome),
            // ref mismatch: position 3 holds G
            item(&chr1, 3, "T", "A", 1, 10, DataType::Genome),
            item(&chr1, 5, "A", "G", 1, 10, DataType::Genome),
            item(&chr1, 6, "", "TT", 9, 10, DataType::Genome),
        ];

        let mut writer = SaWriter::new(Vec::new(), &header()).unwrap();
        let stats =
            write_positions(items.into_iter().map(Ok), &chr1, &sequence, &mut writer).unwrap();
        assert_eq!(
            stats,
            PositionStats {
                num_positions: 3,
                num_alleles: 4,
                num_ref_minor: 1,
                num_ref_mismatches: 1,
            }
        );

        let mut index = Vec::new();
        let (store, _) = writer.finish(&mut index).unwrap();
        let mut reader: SaReader<_, SaPosition> =
            SaReader::open(Cursor::new(store), index.as_slice()).unwrap();

        let position = reader.get_annotation(0, 2).unwrap().cloned().unwrap();
        assert!(position.ref_minor);
        assert_eq!(position.alleles.len(), 2);
        assert!(position.find("C", "T").unwrap().json.contains(r#""allAc":2"#));
        assert!(reader.is_ref_minor(0, 2));

        assert!(reader.get_annotation(0, 3).unwrap().is_none());
        // insertion frequency does not count toward ref minor
        let insertion = reader.get_annotation(0, 6).unwrap().cloned().unwrap();
        assert!(!insertion.ref_minor);
    }

    #[test]
    fn records_from_another_chromosome_are_rejected() {
        let chr1 = test_chromosome("chr1", 0, 20);
        let chr2 = Arc::new(test_chromosome("chr2", 1, 20));
        let sequence = ChromosomeData {
            ref_index: 0,
            sequence: b"ACGTACGTACGTACGTACGT".to_vec(),
        };
        let items = vec![Ok(item(&chr2, 2, "C", "A", 1, 10, DataType::Genome))];
        let mut writer = SaWriter::new(Vec::new(), &header()).unwrap();
        let err = write_positions(items, &chr1, &sequence, &mut writer).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    const GENOME_CHR1: &str = "\
#dataType=genome
#CHROM\tPOS\tREF\tALT\tDP\tFILTER\tAN_all\tAC_all\tHC_all
chr1\t2\tC\tA\t100\tPASS\t20\t4\t1
chr1\t5\tA\tG\t100\tPASS\t20\t1\t0
";
    const EXOME_CHR1: &str = "\
#dataType=exome
#CHROM\tPOS\tREF\tALT\tDP\tFILTER\tAN_all\tAC_all\tHC_all
chr1\t2\tC\tA\t50\tAC0\t10\t2\t0
chr1\t9\tA\tT\t50\tPASS\t10\t8\t3
";
    const EXOME_CHR2: &str = "\
#dataType=exome
#CHROM\tPOS\tREF\tALT\tDP\tFILTER\tAN_all\tAC_all\tHC_all
chr2\t3\tT\tC\t50\tPASS\t10\t1\t0
";

    #[test]
    fn batch_builds_one_store_for_all_chromosomes() {
        let work = tempfile::tempdir().unwrap();
        let reference_path = work.path().join("ref.dat");
        fs::write(
            &reference_path,
            make_reference_file(&[("chr1", b"ACGTACGTACGT"), ("chr2", b"TTTTAAAA")]),
        )
        .unwrap();
        let reference =
            ReferenceReader::from_reader(&mut BufReader::new(File::open(&reference_path).unwrap()))
                .unwrap();

        let genome = work.path().join("genome");
        let exome = work.path().join("exome");
        let out = work.path().join("out");
        for dir in [&genome, &exome, &out] {
            fs::create_dir(dir).unwrap();
        }
        write_file(&genome, "gnomad.genomes.chr1.tsv", GENOME_CHR1);
        write_file(&exome, "gnomad.exomes.chr1.tsv", EXOME_CHR1);
        write_file(&exome, "gnomad.exomes.chr2.tsv", EXOME_CHR2);

        let jobs = pair_inputs(&genome, &exome, &reference.chromosomes).unwrap();
        let mut sa_header = header();
        sa_header.reference_id = reference.reference_id;
        let options = BatchOptions {
            num_threads: 2,
            block_capacity: 16,
            temp_dir: Some(work.path().to_path_buf()),
        };
        let summary = build_gnomad_store(
            &reference_path,
            &reference,
            &jobs,
            &sa_header,
            &out,
            "gnomAD_2.0.2",
            &options,
        )
        .unwrap();

        assert_eq!(summary.concat.num_parts, 2);
        assert_eq!(summary.chromosomes[0].merge.num_merged, 1);
        assert_eq!(summary.chromosomes[0].positions.num_positions, 3);
        assert_eq!(summary.chromosomes[1].positions.num_positions, 1);
        assert_eq!(summary.store_path, out.join("gnomAD_2.0.2.nsa"));
        assert_eq!(summary.index_path, out.join("gnomAD_2.0.2.nsa.idx"));

        let mut reader: SaReader<_, SaPosition> = SaReader::open(
            BufReader::new(File::open(&summary.store_path).unwrap()),
            BufReader::new(File::open(&summary.index_path).unwrap()),
        )
        .unwrap();

        let merged = reader.get_annotation(0, 2).unwrap().cloned().unwrap();
        let json = &merged.find("C", "A").unwrap().json;
        assert!(json.contains(r#""failedFilter":true"#), "{json}");
        assert!(json.contains(r#""allAn":30"#), "{json}");
        assert!(json.contains(r#""allAc":6"#), "{json}");
        assert!(reader.is_ref_minor(0, 9));
        assert!(reader.get_annotation(1, 3).unwrap().is_some());
        assert!(reader.get_annotation(1, 4).unwrap().is_none());
    }

    #[test]
    fn worker_failure_aborts_the_batch() {
        let work = tempfile::tempdir().unwrap();
        let reference_path = work.path().join("ref.dat");
        fs::write(&reference_path, make_reference_file(&[("chr1", b"ACGTACGTACGT")])).unwrap();
        let reference =
            ReferenceReader::from_reader(&mut BufReader::new(File::open(&reference_path).unwrap()))
                .unwrap();

        let genome = work.path().join("genome");
        fs::create_dir(&genome).unwrap();
        let unsorted = "#dataType=genome\n#CHROM\tPOS\tREF\tALT\tAN_all\tAC_all\nchr1\t5\tA\tG\t10\t1\nchr1\t2\tC\tA\t10\t1\n";
        let job = ChromosomeJob {
            chromosome: Arc::clone(reference.chromosomes.get_by_index(0).unwrap()),
            genome: Some(write_file(&genome, "g.chr1.tsv", unsorted)),
            exome: None,
        };

        let result = build_gnomad_store(
            &reference_path,
            &reference,
            &[job],
            &header(),
            work.path(),
            "gnomAD",
            &BatchOptions::default(),
        );
        assert!(matches!(result, Err(Error::UnsortedInput(_))));
        assert!(!work.path().join("gnomAD.nsa").exists());
    }
}
