use super::ReadAt;
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::sync::Arc;

/// Random access over an archive already held in memory
pub struct MemoryReader {
    data: Arc<[u8]>,
}

impl MemoryReader {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl ReadAt for MemoryReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let size = self.data.len() as u64;
        if offset > size {
            bail!("Read at offset {} past end of archive ({} bytes)", offset, size);
        }

        let start = offset as usize;
        let end = (start + buf.len()).min(self.data.len());
        if end - start < buf.len() {
            bail!(
                "Unexpected end of archive: wanted {} bytes at offset {}",
                buf.len(),
                offset
            );
        }

        buf.copy_from_slice(&self.data[start..end]);
        Ok(buf.len())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_at() {
        let reader = MemoryReader::new(b"0123456789".to_vec());
        let mut buf = [0u8; 4];
        assert_eq!(reader.read_at(3, &mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"3456");
        assert_eq!(reader.size(), 10);
    }

    #[tokio::test]
    async fn test_short_read_is_an_error() {
        let reader = MemoryReader::new(b"abc".to_vec());
        let mut buf = [0u8; 4];
        assert!(reader.read_at(1, &mut buf).await.is_err());
        assert!(reader.read_at(10, &mut buf).await.is_err());
    }
}
