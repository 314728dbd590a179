use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use clap::Parser;

use annocache::cache::builder::build_cache;
use annocache::cache::header::{CacheHeader, TranscriptCacheHeader};
use annocache::cache::{CACHE_DATA_VERSION, CACHE_EXTENSION};
use annocache::cli;
use annocache::config::CacheConfig;
use annocache::format::text::open_text;
use annocache::genome_assembly::check_consistent;
use annocache::perf::Benchmark;
use annocache::reference::reader::ReferenceReader;
use annocache::regulatory::read_regulatory_regions;
use annocache::transcript::canonical::{CanonicalSelector, read_lrg_transcript_ids};
use annocache::transcript::import::read_transcripts;

#[derive(Parser)]
#[command(name = "create_cache", about = "Create an annocache transcript cache file")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Output directory
    #[arg(short = 'o', long = "out")]
    out: PathBuf,

    /// Path to the binary reference sequence file
    #[arg(short = 'r', long = "ref")]
    reference: PathBuf,
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    let start = Instant::now();
    let cli_args = Cli::parse();

    cli::banner("Create Cache");

    // ── Configuration ────────────────────────────────────
    cli::section("Configuration");

    let config = CacheConfig::from_file(&cli_args.config)?;
    let assembly = config.assembly()?;
    let source = config.source()?;

    cli::kv("Config", &cli_args.config.display().to_string());
    cli::kv("Assembly", &assembly.to_string());
    cli::kv("Source", &source.to_string());
    cli::kv(
        "VEP",
        &format!("v{} ({})", config.vep_version, config.vep_release_date),
    );
    for (name, path) in config.input_files() {
        if !path.is_file() {
            bail!("{name} file not found: {}", path.display());
        }
        cli::kv(name, &path.display().to_string());
    }
    if !cli_args.out.is_dir() {
        bail!("output directory not found: {}", cli_args.out.display());
    }

    eprintln!();

    // ── Load Reference ───────────────────────────────────
    cli::section("Reference");

    let ref_file = File::open(&cli_args.reference)
        .with_context(|| format!("failed to open reference: {}", cli_args.reference.display()))?;
    let reference = ReferenceReader::from_reader(&mut BufReader::new(ref_file))?;
    check_consistent(&[assembly, reference.assembly])
        .context("reference does not match the configured assembly")?;

    cli::kv("Chromosomes", &reference.chromosomes.len().to_string());
    cli::kv("Assembly", &reference.assembly.to_string());

    eprintln!();

    // ── Import ───────────────────────────────────────────
    cli::section("Import");

    let benchmark = Benchmark::start();
    let transcripts = read_transcripts(
        open_text(&config.transcripts)?,
        &reference.chromosomes,
        source,
    )
    .with_context(|| format!("failed to import {}", config.transcripts.display()))?;
    cli::kv("Transcripts", &benchmark.summary(transcripts.len(), "transcripts"));

    let regulatory_regions = match &config.regulatory_regions {
        Some(path) => read_regulatory_regions(open_text(path)?, &reference.chromosomes)
            .with_context(|| format!("failed to import {}", path.display()))?,
        None => Vec::new(),
    };
    cli::kv("Regulatory regions", &regulatory_regions.len().to_string());

    let lrg_ids = match &config.lrg_transcripts {
        Some(path) => read_lrg_transcript_ids(open_text(path)?)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => HashSet::new(),
    };
    cli::kv("LRG transcripts", &lrg_ids.len().to_string());

    eprintln!();

    // ── Cache ────────────────────────────────────────────
    cli::section("Cache");

    let creation_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the Unix epoch")?
        .as_secs();
    let header = CacheHeader {
        data_version: CACHE_DATA_VERSION,
        source,
        creation_time,
        assembly,
        custom: TranscriptCacheHeader {
            vep_version: config.vep_version,
            vep_release_time: config.vep_release_time()?,
            reference_id: reference.reference_id,
        },
    };

    let out_path = cli_args
        .out
        .join(format!("{source}{}.{CACHE_EXTENSION}", config.vep_version));
    let out_file = File::create(&out_path)
        .with_context(|| format!("failed to create {}", out_path.display()))?;

    let (mut writer, stats) = build_cache(
        BufWriter::new(out_file),
        &header,
        transcripts,
        regulatory_regions,
        &CanonicalSelector::new(lrg_ids),
        reference.chromosomes.len(),
    )?;
    writer.flush()?;

    cli::kv("Canonical", &stats.num_canonical.to_string());
    cli::kv("Genes", &stats.num_genes.to_string());
    cli::kv("Regions", &stats.num_regions.to_string());
    cli::kv("miRNAs", &stats.num_mirnas.to_string());
    cli::kv("Peptides", &stats.num_peptides.to_string());
    if stats.num_canonical == 0 && stats.num_transcripts > 0 {
        cli::warning("no transcript was marked canonical");
    }
    cli::success(&format!("wrote {}", out_path.display()));

    cli::print_summary(start);
    Ok(())
}
