//! Merging of position-sorted annotation sources.

pub mod gnomad;
pub mod merger;
pub mod tsv;

use crate::error::Error;
use crate::reference::SequenceProvider;

pub use merger::{MergeStats, SourceMerger};

/// A per-allele record that can be combined with its counterpart from another
/// source.
pub trait MergeableRecord: Clone + PartialEq {
    fn ref_index(&self) -> u16;
    fn position(&self) -> i32;
    fn ref_allele(&self) -> &str;
    fn alt_allele(&self) -> &str;

    /// Records without information are dropped instead of stored.
    fn is_informative(&self) -> bool;

    /// The record with trimmed and left-aligned alleles.
    fn normalized<S: SequenceProvider + ?Sized>(self, sequence: &S) -> Self;

    /// Combines the same allele from two sources.
    fn merge(&self, other: &Self) -> Result<Self, Error>;
}
