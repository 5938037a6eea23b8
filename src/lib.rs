//! # zipframe
//!
//! Render a ZIP archive of web content inside an isolated surface as if its files were
//! served by a real origin.
//!
//! The archive is extracted into an in-memory [`ContentStore`]. Its entry document
//! (the shortest path ending in `index.html`) is rewritten so that resource references
//! point at [`ResourceHandle`]s, and the surface's request primitives are wrapped so that
//! requests made at runtime are answered from the store, relative to the directory of the
//! document being shown.
//!
//! ## Features
//!
//! - ZIP decoding with STORED and DEFLATE entries, ZIP64 and CRC-32 checks
//! - Filesystem-like path resolution with `..` clamped at the archive root
//! - Interception of both fetch-style and open/send-style request primitives, with
//!   passthrough to the real primitive for anything not in the archive
//! - In-archive navigation with history
//! - Cancellation of superseded loads and full teardown on surface unload
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use zipframe::{MemorySurface, Session};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bytes = tokio::fs::read("site.zip").await?;
//!
//!     let surface = Arc::new(MemorySurface::default());
//!     let session = Session::new(surface.clone());
//!
//!     let outcome = session.load_archive(bytes).await;
//!     if outcome.success {
//!         println!("{}", surface.document());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod handle;
pub mod intercept;
pub mod io;
pub mod loader;
pub mod mime;
pub mod origin;
pub mod path;
pub mod rewrite;
pub mod session;
pub mod store;
pub mod surface;
pub mod zip;

pub use cli::Cli;
pub use config::{FrameConfig, NetworkConfig};
pub use error::{FrameError, LoadOutcome};
pub use handle::{HandleRegistry, ResourceHandle};
pub use intercept::InterceptorGuard;
pub use io::{MemoryReader, ReadAt};
pub use loader::{ArchiveDecoder, ArchiveEntry, ArchiveLoader, LoadedArchive};
pub use origin::VirtualOrigin;
pub use rewrite::{DocumentRewriter, RewriteReport};
pub use session::{Session, SessionState};
pub use store::{ContentStore, StoredResource};
pub use surface::{ExecutionContext, MemorySurface, Surface};
pub use zip::{ZipArchive, ZipDecoder};
