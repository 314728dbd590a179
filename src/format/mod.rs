//! On-disk building blocks shared by the reference, cache and SA file types.

pub mod binary_io;
pub mod common_header;
pub mod text;
