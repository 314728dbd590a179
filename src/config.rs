use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::data_source::{date_to_unix_seconds, validate_date};
use crate::genome_assembly::GenomeAssembly;
use crate::transcript::types::Source;

/// Inputs and provenance for one transcript cache build.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    pub genome_assembly: String,
    pub source: String,
    pub vep_version: u16,
    pub vep_release_date: String,
    pub transcripts: PathBuf,
    pub regulatory_regions: Option<PathBuf>,
    pub lrg_transcripts: Option<PathBuf>,
}

impl CacheConfig {
    /// Relative input paths are resolved against the config file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let mut config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config.validate()?;

        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.assembly()?;
        self.source()?;
        validate_date(&self.vep_release_date)
            .with_context(|| format!("invalid VEP release date: '{}'", self.vep_release_date))?;
        if self.vep_version == 0 {
            bail!("VEP version must be positive");
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.transcripts);
        if let Some(p) = self.regulatory_regions.as_mut() {
            resolve(p);
        }
        if let Some(p) = self.lrg_transcripts.as_mut() {
            resolve(p);
        }
    }

    pub fn assembly(&self) -> Result<GenomeAssembly> {
        self.genome_assembly
            .parse::<GenomeAssembly>()
            .with_context(|| format!("invalid genome assembly: '{}'", self.genome_assembly))
    }

    pub fn source(&self) -> Result<Source> {
        self.source
            .parse::<Source>()
            .with_context(|| format!("invalid transcript source: '{}'", self.source))
    }

    /// VEP release date as seconds since the Unix epoch.
    pub fn vep_release_time(&self) -> Result<u64> {
        Ok(date_to_unix_seconds(&self.vep_release_date)?)
    }

    /// Iterate all input files uniformly as (name, path) pairs.
    pub fn input_files(&self) -> impl Iterator<Item = (&str, &Path)> {
        std::iter::once(("transcripts", self.transcripts.as_path()))
            .chain(
                self.regulatory_regions
                    .as_deref()
                    .map(|p| ("regulatory regions", p)),
            )
            .chain(self.lrg_transcripts.as_deref().map(|p| ("LRG transcripts", p)))
    }
}
