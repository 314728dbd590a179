use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use clap::Parser;

use annocache::batch::{BatchOptions, DEFAULT_NUM_THREADS, build_gnomad_store, pair_inputs};
use annocache::cli;
use annocache::data_source::read_paired_versions;
use annocache::perf::format_elapsed;
use annocache::reference::reader::ReferenceReader;
use annocache::sa::header::SA_SCHEMA_VERSION;
use annocache::sa::{DEFAULT_BLOCK_CAPACITY, SaHeader};

/// Key under which the annotator nests gnomAD annotations.
const GNOMAD_JSON_KEY: &str = "gnomad";

#[derive(Parser)]
#[command(
    name = "create_gnomad",
    about = "Merge gnomAD genome and exome frequencies into one SA store"
)]
struct Cli {
    /// Path to the binary reference sequence file
    #[arg(short = 'r', long = "ref")]
    reference: PathBuf,

    /// Directory with per-chromosome genome TSVs and one .version file
    #[arg(short = 'g', long = "genome")]
    genome: PathBuf,

    /// Directory with per-chromosome exome TSVs and one .version file
    #[arg(short = 'e', long = "exome")]
    exome: PathBuf,

    /// Output directory
    #[arg(short = 'o', long = "out")]
    out: PathBuf,

    /// Directory for per-chromosome temporary stores
    #[arg(short = 't', long = "temp")]
    temp: Option<PathBuf>,

    /// Number of chromosomes processed concurrently
    #[arg(long = "threads", default_value_t = DEFAULT_NUM_THREADS)]
    threads: usize,
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    let start = Instant::now();
    let cli_args = Cli::parse();

    cli::banner("Create gnomAD");

    // ── Configuration ────────────────────────────────────
    cli::section("Configuration");

    for (name, dir) in [
        ("genome", &cli_args.genome),
        ("exome", &cli_args.exome),
        ("output", &cli_args.out),
    ] {
        if !dir.is_dir() {
            bail!("{name} directory not found: {}", dir.display());
        }
    }
    if cli_args.threads == 0 {
        bail!("--threads must be at least 1");
    }

    let version = read_paired_versions(&cli_args.genome, &cli_args.exome)?;
    cli::kv("Data source", &version.name);
    cli::kv("Version", &version.version);
    cli::kv("Release date", &version.release_date);
    cli::kv("Threads", &cli_args.threads.to_string());

    eprintln!();

    // ── Load Reference ───────────────────────────────────
    cli::section("Reference");

    let ref_file = File::open(&cli_args.reference)
        .with_context(|| format!("failed to open reference: {}", cli_args.reference.display()))?;
    let reference = ReferenceReader::from_reader(&mut BufReader::new(ref_file))?;

    cli::kv("Chromosomes", &reference.chromosomes.len().to_string());
    cli::kv("Assembly", &reference.assembly.to_string());

    let jobs = pair_inputs(&cli_args.genome, &cli_args.exome, &reference.chromosomes)?;
    let num_paired = jobs
        .iter()
        .filter(|job| job.genome.is_some() && job.exome.is_some())
        .count();
    cli::kv("Input chromosomes", &jobs.len().to_string());
    if num_paired < jobs.len() {
        cli::warning(&format!(
            "{} chromosomes have only genome or only exome data",
            jobs.len() - num_paired
        ));
    }

    eprintln!();

    // ── Build ────────────────────────────────────────────
    cli::section("Build");

    let creation_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the Unix epoch")?
        .as_secs();
    let stem = format!("{}_{}", version.name, version.version);
    let header = SaHeader {
        json_key: GNOMAD_JSON_KEY.to_string(),
        data_source: version,
        assembly: reference.assembly,
        reference_id: reference.reference_id,
        match_by_allele: true,
        is_array: false,
        schema_version: SA_SCHEMA_VERSION,
        creation_time,
    };
    let options = BatchOptions {
        num_threads: cli_args.threads,
        block_capacity: DEFAULT_BLOCK_CAPACITY,
        temp_dir: cli_args.temp.clone(),
    };

    let summary = build_gnomad_store(
        &cli_args.reference,
        &reference,
        &jobs,
        &header,
        &cli_args.out,
        &stem,
        &options,
    )?;

    cli::table_row(
        "Name",
        &["Positions", "Merged", "Ref minor", "Blocks", "Time"].map(String::from),
    );
    let mut num_ref_mismatches = 0;
    for chromosome in &summary.chromosomes {
        num_ref_mismatches += chromosome.positions.num_ref_mismatches;
        cli::table_row(
            chromosome.chromosome.display_name(),
            &[
                chromosome.positions.num_positions.to_string(),
                chromosome.merge.num_merged.to_string(),
                chromosome.positions.num_ref_minor.to_string(),
                chromosome.write.num_blocks.to_string(),
                format_elapsed(chromosome.elapsed),
            ],
        );
    }
    eprintln!();

    if num_ref_mismatches > 0 {
        cli::warning(&format!(
            "dropped {num_ref_mismatches} alleles whose ref allele disagrees with the reference"
        ));
    }
    cli::kv("Blocks", &summary.concat.num_blocks.to_string());
    cli::success(&format!("wrote {}", summary.store_path.display()));
    cli::success(&format!("wrote {}", summary.index_path.display()));

    cli::print_summary(start);
    Ok(())
}
