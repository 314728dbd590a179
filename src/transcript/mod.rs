//! Transcripts: raw fragment import, region reconstruction and canonical
//! selection.

pub mod canonical;
pub mod import;
pub mod regions;
pub mod types;
