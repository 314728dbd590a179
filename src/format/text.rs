//! Opening line-oriented text inputs that may be gzip or bgzip compressed.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::Error;

/// Opens `path` for line reading. Files ending in `.gz` are decompressed;
/// multi-member (bgzip) archives are read to the end.
pub fn open_text(path: &Path) -> Result<Box<dyn BufRead + Send>, Error> {
    let file = File::open(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open {}: {e}", path.display()),
        ))
    })?;

    let is_gzip = path.extension().is_some_and(|ext| ext == "gz");
    if is_gzip {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}
