//! ZIP archive decoding.
//!
//! - [`structures`]: records of the ZIP format (EOCD, ZIP64 EOCD, file headers)
//! - [`parser`]: reading those records from a [`ReadAt`](crate::io::ReadAt) source
//! - [`archive`]: entries that decode their own content, and the [`ZipDecoder`] used
//!   by sessions to turn archive bytes into [`ArchiveEntry`](crate::loader::ArchiveEntry) values
//!
//! STORED and DEFLATE entries are supported, ZIP64 included. Encryption, multi-disk
//! archives and other compression methods are rejected.

mod archive;
mod parser;
mod structures;

pub use archive::{ZipArchive, ZipDecoder, ZipEntry};
pub use parser::ZipParser;
pub use structures::*;
