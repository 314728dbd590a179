//! Data-source provenance read from `.version` side-car files.
//!
//! ```text
//! NAME=gnomAD
//! VERSION=2.0.2
//! DATE=2017-10-05
//! DESCRIPTION=Allele frequencies from the genome aggregation database
//! ```

use std::fmt;
use std::fs;
use std::io::{BufRead, Read, Write};
use std::path::{Path, PathBuf};

use log::warn;

use crate::error::Error;
use crate::format::binary_io::{BinaryRead, BinaryWrite};

pub const VERSION_FILE_EXTENSION: &str = "version";

/// Name, version and release date of an annotation source. Equality ignores
/// the free-text description.
#[derive(Debug, Clone, Eq)]
pub struct DataSourceVersion {
    pub name: String,
    pub version: String,
    /// `YYYY-MM-DD`
    pub release_date: String,
    pub description: String,
}

impl PartialEq for DataSourceVersion {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.version == other.version
            && self.release_date == other.release_date
    }
}

impl DataSourceVersion {
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, Error> {
        let mut name = None;
        let mut version = None;
        let mut release_date = None;
        let mut description = String::new();

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(Error::Parse(format!("expected KEY=VALUE in version file, got: {line}")));
            };
            let value = value.trim().to_string();

            match key.trim() {
                "NAME" => name = Some(value),
                "VERSION" => version = Some(value),
                "DATE" => {
                    validate_date(&value)?;
                    release_date = Some(value);
                }
                "DESCRIPTION" => description = value,
                other => warn!("ignoring unknown version file key: {other}"),
            }
        }

        let missing = |key: &str| Error::Parse(format!("version file is missing the {key} entry"));
        Ok(Self {
            name: name.ok_or_else(|| missing("NAME"))?,
            version: version.ok_or_else(|| missing("VERSION"))?,
            release_date: release_date.ok_or_else(|| missing("DATE"))?,
            description,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let file = fs::File::open(path)?;
        Self::parse(std::io::BufReader::new(file))
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        writer.write_opt_string(&self.name)?;
        writer.write_opt_string(&self.version)?;
        writer.write_opt_string(&self.release_date)?;
        writer.write_opt_string(&self.description)
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self, Error> {
        Ok(Self {
            name: reader.read_opt_string()?,
            version: reader.read_opt_string()?,
            release_date: reader.read_opt_string()?,
            description: reader.read_opt_string()?,
        })
    }
}

impl fmt::Display for DataSourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dataSource={},version:{},release date:{}",
            self.name, self.version, self.release_date
        )
    }
}

/// Accepts `YYYY-MM-DD` with a plausible month and day.
pub fn validate_date(date: &str) -> Result<(), Error> {
    let invalid = || Error::Parse(format!("invalid release date (expected YYYY-MM-DD): {date}"));

    let parts: Vec<&str> = date.split('-').collect();
    let [year, month, day] = parts.as_slice() else {
        return Err(invalid());
    };
    if year.len() != 4 || month.len() != 2 || day.len() != 2 {
        return Err(invalid());
    }

    let year: u32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;
    if year == 0 || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(invalid());
    }
    Ok(())
}

/// Seconds from the Unix epoch to midnight UTC of a `YYYY-MM-DD` date.
pub fn date_to_unix_seconds(date: &str) -> Result<u64, Error> {
    validate_date(date)?;
    let mut fields = date.split('-').map(|f| f.parse::<i64>().unwrap_or_default());
    let (year, month, day) = (
        fields.next().unwrap_or_default(),
        fields.next().unwrap_or_default(),
        fields.next().unwrap_or_default(),
    );

    // days from civil, with March as the first month of the year
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let year_of_era = year - era * 400;
    let shifted_month = (month + 9) % 12;
    let day_of_year = (153 * shifted_month + 2) / 5 + day - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    let days = era * 146_097 + day_of_era - 719_468;

    u64::try_from(days * 86_400)
        .map_err(|_| Error::Parse(format!("release date precedes 1970-01-01: {date}")))
}

/// Returns the single `.version` file in `dir`.
pub fn find_version_file(dir: &Path) -> Result<PathBuf, Error> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == VERSION_FILE_EXTENSION) {
            found.push(path);
        }
    }

    match found.len() {
        1 => Ok(found.remove(0)),
        0 => Err(Error::Validation(format!(
            "no .version file found in {}",
            dir.display()
        ))),
        n => Err(Error::Validation(format!(
            "only one .version file should exist in {}, found {n}",
            dir.display()
        ))),
    }
}

/// Loads the version of each directory and requires them to agree.
pub fn read_paired_versions(first: &Path, second: &Path) -> Result<DataSourceVersion, Error> {
    let a = DataSourceVersion::from_file(&find_version_file(first)?)?;
    let b = DataSourceVersion::from_file(&find_version_file(second)?)?;
    if a != b {
        return Err(Error::VersionMismatch(format!(
            "{} ({}) differs from {} ({})",
            first.display(),
            a,
            second.display(),
            b
        )));
    }
    Ok(a)
}
