//! Populating a [`ContentStore`] from decoded archive entries.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::error::FrameError;
use crate::store::ContentStore;

/// One decoded archive entry.
#[async_trait]
pub trait ArchiveEntry: Send + Sync {
    /// Path as recorded in the archive.
    fn path(&self) -> &str;

    fn is_directory(&self) -> bool;

    /// Decode the full content of the entry.
    async fn bytes(&self) -> Result<Vec<u8>>;

    /// Decode the content as (lossy) UTF-8 text.
    async fn text(&self) -> Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Turns raw archive bytes into entries.
#[async_trait]
pub trait ArchiveDecoder: Send + Sync {
    /// Cheap check on the leading bytes, run before anything is torn down for a load.
    fn recognizes(&self, bytes: &[u8]) -> bool {
        !bytes.is_empty()
    }

    async fn decode(&self, bytes: Arc<[u8]>) -> Result<Vec<Box<dyn ArchiveEntry>>>;
}

/// A fully populated store together with its chosen entry document.
#[derive(Debug)]
pub struct LoadedArchive {
    pub store: ContentStore,
    pub entry_path: String,
}

/// Materializes entries into a fresh store and picks the entry document.
///
/// The store is built privately and only handed out once complete, so a failed load
/// never exposes a partial store.
#[derive(Debug, Clone)]
pub struct ArchiveLoader {
    entry_suffix: String,
}

impl ArchiveLoader {
    pub fn new(entry_suffix: impl Into<String>) -> Self {
        Self {
            entry_suffix: entry_suffix.into().to_ascii_lowercase(),
        }
    }

    pub async fn load(
        &self,
        entries: Vec<Box<dyn ArchiveEntry>>,
    ) -> Result<LoadedArchive, FrameError> {
        let mut store = ContentStore::new();

        for entry in entries {
            if entry.is_directory() {
                continue;
            }
            let path = normalize_entry_path(entry.path());
            if path.is_empty() {
                continue;
            }

            let bytes = entry.bytes().await.map_err(FrameError::decode)?;
            debug!(path, size = bytes.len(), "stored archive entry");
            store.put(path, bytes);
        }

        let entry_path = select_entry_point(store.paths(), &self.entry_suffix)
            .ok_or_else(|| FrameError::MissingEntryPoint(self.entry_suffix.clone()))?;

        Ok(LoadedArchive { store, entry_path })
    }
}

impl Default for ArchiveLoader {
    fn default() -> Self {
        Self::new("index.html")
    }
}

/// Archive paths are already relative; only leading separators are removed.
pub fn normalize_entry_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Pick the entry document among `paths`: keys whose lowercase form ends with `suffix`.
///
/// Ties go to the shortest path, then the lexicographically smallest, so the choice is
/// stable regardless of archive order.
pub fn select_entry_point<'a>(
    paths: impl Iterator<Item = &'a str>,
    suffix: &str,
) -> Option<String> {
    let suffix = suffix.to_ascii_lowercase();
    paths
        .filter(|path| path.to_ascii_lowercase().ends_with(&suffix))
        .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
        .map(str::to_string)
}
