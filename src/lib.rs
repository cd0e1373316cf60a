//! # zipmeta
//!
//! An HTTP service exposing metadata extracted from staged zip archives.
//!
//! Archives are memory-mapped and handed to a metadata parser through
//! zero-copy, offset-composable views; the parser's per-entry records are
//! folded into a JSON document keyed by entry name.
//!
//! ## Features
//!
//! - Memory-mapped byte sources with shared, reference-counted mappings
//! - Pluggable metadata parser behind the [`MetadataParser`] capability
//! - Bundled central directory parser with ZIP64 and extra-field decoding
//! - Duplicate-key promotion, so repeated entry names are never dropped
//!
//! ## Example
//!
//! ```no_run
//! use zipmeta::MetadataPipeline;
//!
//! let pipeline = MetadataPipeline::with_zip_parser("/tmp/");
//! match pipeline.process("sample-id") {
//!     Ok(body) => println!("{}", body),
//!     Err(err) => eprintln!("{} {}", err.status(), err),
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod results;
pub mod server;
pub mod zip;

pub use cli::Cli;
pub use error::ZipMetaError;
pub use io::{ByteSource, FileView, MappedFile, SubView};
pub use pipeline::MetadataPipeline;
pub use results::{ResultSet, ResultValue};
pub use server::{Server, ServerConfig};
pub use zip::{MetadataParser, MetadataRecord, ZipParser};
