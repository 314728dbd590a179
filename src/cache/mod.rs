//! Transcript cache: staging, serialization and read-back.

pub mod builder;
pub mod header;
pub mod reader;
pub mod staging;
pub mod writer;

/// Layout version of the serialized cache body.
pub const CACHE_DATA_VERSION: u16 = 1;

pub const CACHE_EXTENSION: &str = "transcripts.ndb";
