//! Supplementary annotation (SA) store: position-keyed records packed into
//! independently compressed blocks, with a separate index of block spans and
//! reference-minor positions per chromosome.

pub mod block;
pub mod concat;
pub mod header;
pub mod index;
pub mod reader;
pub mod record;
pub mod writer;

pub use header::SaHeader;
pub use index::SaIndex;
pub use reader::SaReader;
pub use record::{SaAllele, SaPosition, SaRecord};
pub use writer::{SaWriteStats, SaWriter};

/// Uncompressed block capacity.
pub const DEFAULT_BLOCK_CAPACITY: usize = 8 * 1024 * 1024;

/// zstd level used for SA blocks.
pub const BLOCK_COMPRESSION_LEVEL: i32 = 17;

pub const SA_EXTENSION: &str = "nsa";
pub const INDEX_EXTENSION: &str = "idx";
