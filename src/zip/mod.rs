//! ZIP metadata parsing.
//!
//! Metadata parsers are a pluggable capability: anything implementing
//! [`MetadataParser`] can be handed a [`ByteSource`] and return one
//! [`MetadataRecord`] per archive entry. [`ZipParser`] is the bundled
//! implementation.
//!
//! ## Architecture
//!
//! - [`structures`]: ZIP format elements (EOCD, file headers) and the record types
//! - [`extra`]: decoding of extra-field sub-records
//! - [`parser`]: the central directory walker
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Only the Central Directory is consulted; entry data is never read.

mod extra;
mod parser;
mod structures;

pub use extra::{Zip64Needs, Zip64Values, decode_extra_fields};
pub use parser::ZipParser;
pub use structures::*;

use crate::io::ByteSource;

/// Capability turning a byte source into per-entry metadata.
pub trait MetadataParser: Send + Sync {
    /// Parse `source` into one record per archive entry.
    ///
    /// An input that is not a well-formed archive yields an empty vector;
    /// errors are reserved for failures unrelated to the archive's shape.
    fn parse(&self, source: &mut dyn ByteSource) -> anyhow::Result<Vec<MetadataRecord>>;
}
