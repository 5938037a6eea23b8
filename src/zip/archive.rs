//! Decoding archive members into memory.

use std::io::Read;
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use flate2::Crc;
use flate2::read::DeflateDecoder;

use crate::io::{MemoryReader, ReadAt};
use crate::loader::{ArchiveDecoder, ArchiveEntry};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, EndOfCentralDirectory, LFH_SIGNATURE, ZipFileEntry};

/// ZIP archive reader producing [`ArchiveEntry`] values
pub struct ZipArchive<R: ReadAt> {
    parser: Arc<ZipParser<R>>,
}

impl<R: ReadAt + 'static> ZipArchive<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: Arc::new(ZipParser::new(reader)),
        }
    }

    /// List all entries in the archive
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files().await
    }

    /// List all entries, each able to decode its own content
    pub async fn entries(&self) -> Result<Vec<ZipEntry<R>>> {
        let files = self.parser.list_files().await?;
        Ok(files
            .into_iter()
            .map(|entry| ZipEntry {
                parser: self.parser.clone(),
                entry,
            })
            .collect())
    }

    /// Extract one entry's data to memory, inflating and checking its CRC-32
    pub async fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        extract(&self.parser, entry).await
    }
}

/// A single archive member bound to the parser that listed it
pub struct ZipEntry<R: ReadAt> {
    parser: Arc<ZipParser<R>>,
    entry: ZipFileEntry,
}

#[async_trait]
impl<R: ReadAt + 'static> ArchiveEntry for ZipEntry<R> {
    fn path(&self) -> &str {
        &self.entry.file_name
    }

    fn is_directory(&self) -> bool {
        self.entry.is_directory
    }

    async fn bytes(&self) -> Result<Vec<u8>> {
        extract(&self.parser, &self.entry).await
    }
}

async fn extract<R: ReadAt>(parser: &ZipParser<R>, entry: &ZipFileEntry) -> Result<Vec<u8>> {
    if entry.is_encrypted() {
        bail!("Encrypted entries are not supported: {}", entry.file_name);
    }

    let data_offset = parser.data_offset(entry).await?;
    // Sizes come from the central directory and must fit in what is actually there
    let available = parser.reader().size().saturating_sub(data_offset);
    if entry.compressed_size > available {
        bail!(
            "Compressed size of {} ({} bytes) exceeds the {} bytes left in the archive",
            entry.file_name,
            entry.compressed_size,
            available
        );
    }
    let mut raw = vec![0u8; entry.compressed_size as usize];
    parser.reader().read_at(data_offset, &mut raw).await?;

    let data = match entry.compression_method {
        CompressionMethod::Stored => raw,
        CompressionMethod::Deflate => {
            // One byte past the declared size is enough to detect a mismatch
            let mut data = Vec::new();
            DeflateDecoder::new(raw.as_slice())
                .take(entry.uncompressed_size.saturating_add(1))
                .read_to_end(&mut data)?;
            data
        }
        CompressionMethod::Unknown(_) => bail!(
            "Unsupported compression method {} for {} (only STORED and DEFLATE are supported)",
            entry.compression_method.as_u16(),
            entry.file_name
        ),
    };

    if data.len() as u64 != entry.uncompressed_size {
        bail!(
            "Size mismatch for {}: expected {} bytes, got {}",
            entry.file_name,
            entry.uncompressed_size,
            data.len()
        );
    }

    let mut crc = Crc::new();
    crc.update(&data);
    if crc.sum() != entry.crc32 {
        bail!("CRC-32 mismatch for {}", entry.file_name);
    }

    Ok(data)
}

/// [`ArchiveDecoder`] for ZIP archives held in memory
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipDecoder;

#[async_trait]
impl ArchiveDecoder for ZipDecoder {
    /// Local file header or, for an archive with no entries, the end of central directory.
    fn recognizes(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(LFH_SIGNATURE) || bytes.starts_with(EndOfCentralDirectory::SIGNATURE)
    }

    async fn decode(&self, bytes: Arc<[u8]>) -> Result<Vec<Box<dyn ArchiveEntry>>> {
        let archive = ZipArchive::new(Arc::new(MemoryReader::new(bytes)));
        let entries = archive.entries().await?;
        Ok(entries
            .into_iter()
            .map(|entry| Box::new(entry) as Box<dyn ArchiveEntry>)
            .collect())
    }
}
