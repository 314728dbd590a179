//! Error types for the annocache library.

use thiserror::Error;

/// Errors that can occur while building or reading annotation caches.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A parse error occurred while reading input data.
    #[error("{0}")]
    Parse(String),

    /// A validation constraint was violated.
    #[error("{0}")]
    Validation(String),

    /// A binary stream is corrupt: bad signature, guard mismatch, size mismatch.
    #[error("{0}")]
    Format(String),

    /// Transcript regions are not contiguous or carry invalid coordinates.
    /// Always fatal: the upstream fragment data is malformed.
    #[error("transcript {transcript_id} has invalid regions: {reason}")]
    RegionIntegrity {
        transcript_id: String,
        reason: String,
    },

    /// A gene identifier could not be normalized to an integer key.
    #[error("unable to convert gene ID '{0}' to an integer")]
    UnparseableGeneId(String),

    /// Two records could not be merged.
    #[error("merge conflict: {0}")]
    Merge(String),

    /// Records were supplied out of genomic order.
    #[error("{0}")]
    UnsortedInput(String),

    /// Paired data sources disagree on their version metadata.
    #[error("version mismatch: {0}")]
    VersionMismatch(String),
}
