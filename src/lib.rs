//! annocache: builds indexed transcript caches and block-compressed
//! supplementary annotation stores for variant annotation.

pub mod error;

pub mod batch;
pub mod cache;
pub mod chromosome;
pub mod cli;
pub mod config;
pub mod context;
pub mod data_source;
pub mod format;
pub mod genome_assembly;
pub mod intervals;
pub mod merge;
pub mod perf;
pub mod reference;
pub mod regulatory;
pub mod sa;
pub mod strand;
pub mod transcript;
pub mod variant;
