//! In-memory ZIP archives for tests.

#![allow(dead_code)]

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::Crc;
use flate2::write::DeflateEncoder;

const STORED: u16 = 0;
const DEFLATE: u16 = 8;

struct Member {
    name: String,
    method: u16,
    crc: u32,
    size: u32,
    data: Vec<u8>,
    /// Compressed size claimed through a ZIP64 extra field in the central directory.
    zip64_compressed: Option<u64>,
}

/// Builds a ZIP archive entry by entry.
#[derive(Default)]
pub struct ZipBuilder {
    members: Vec<Member>,
    comment: Vec<u8>,
    zip64: bool,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(mut self, name: &str, content: impl AsRef<[u8]>) -> Self {
        let content = content.as_ref();
        self.members.push(Member {
            name: name.to_string(),
            method: STORED,
            crc: crc32(content),
            size: content.len() as u32,
            data: content.to_vec(),
            zip64_compressed: None,
        });
        self
    }

    pub fn deflated(mut self, name: &str, content: impl AsRef<[u8]>) -> Self {
        let content = content.as_ref();
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content).unwrap();
        self.members.push(Member {
            name: name.to_string(),
            method: DEFLATE,
            crc: crc32(content),
            size: content.len() as u32,
            data: encoder.finish().unwrap(),
            zip64_compressed: None,
        });
        self
    }

    pub fn directory(mut self, name: &str) -> Self {
        self.members.push(Member {
            name: format!("{}/", name.trim_end_matches('/')),
            method: STORED,
            crc: 0,
            size: 0,
            data: Vec::new(),
            zip64_compressed: None,
        });
        self
    }

    /// Declare a different uncompressed size for the last entry.
    pub fn declared_size(mut self, size: u32) -> Self {
        if let Some(member) = self.members.last_mut() {
            member.size = size;
        }
        self
    }

    /// Make the central directory claim `size` compressed bytes for the last entry,
    /// through a ZIP64 extra field.
    pub fn zip64_compressed_size(mut self, size: u64) -> Self {
        if let Some(member) = self.members.last_mut() {
            member.zip64_compressed = Some(size);
        }
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = comment.as_bytes().to_vec();
        self
    }

    /// Write a ZIP64 end of central directory, saturating the classic record.
    pub fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut offsets = Vec::new();

        for member in &self.members {
            offsets.push(out.len() as u32);
            out.extend_from_slice(b"PK\x03\x04");
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(member.method).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0x21).unwrap();
            out.write_u32::<LittleEndian>(member.crc).unwrap();
            out.write_u32::<LittleEndian>(member.data.len() as u32).unwrap();
            out.write_u32::<LittleEndian>(member.size).unwrap();
            out.write_u16::<LittleEndian>(member.name.len() as u16).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.extend_from_slice(member.name.as_bytes());
            out.extend_from_slice(&member.data);
        }

        let cd_offset = out.len() as u32;
        for (member, offset) in self.members.iter().zip(&offsets) {
            out.extend_from_slice(b"PK\x01\x02");
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(member.method).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0x21).unwrap();
            out.write_u32::<LittleEndian>(member.crc).unwrap();
            let compressed = match member.zip64_compressed {
                Some(_) => 0xFFFF_FFFF,
                None => member.data.len() as u32,
            };
            out.write_u32::<LittleEndian>(compressed).unwrap();
            out.write_u32::<LittleEndian>(member.size).unwrap();
            out.write_u16::<LittleEndian>(member.name.len() as u16).unwrap();
            let extra_len = if member.zip64_compressed.is_some() { 12 } else { 0 };
            out.write_u16::<LittleEndian>(extra_len).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(*offset).unwrap();
            out.extend_from_slice(member.name.as_bytes());
            if let Some(size) = member.zip64_compressed {
                out.write_u16::<LittleEndian>(0x0001).unwrap();
                out.write_u16::<LittleEndian>(8).unwrap();
                out.write_u64::<LittleEndian>(size).unwrap();
            }
        }
        let cd_size = out.len() as u32 - cd_offset;
        let count = self.members.len() as u16;

        if self.zip64 {
            let eocd64_offset = out.len() as u64;
            out.extend_from_slice(b"PK\x06\x06");
            out.write_u64::<LittleEndian>(44).unwrap();
            out.write_u16::<LittleEndian>(45).unwrap();
            out.write_u16::<LittleEndian>(45).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u64::<LittleEndian>(count as u64).unwrap();
            out.write_u64::<LittleEndian>(count as u64).unwrap();
            out.write_u64::<LittleEndian>(cd_size as u64).unwrap();
            out.write_u64::<LittleEndian>(cd_offset as u64).unwrap();

            out.extend_from_slice(b"PK\x06\x07");
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u64::<LittleEndian>(eocd64_offset).unwrap();
            out.write_u32::<LittleEndian>(1).unwrap();
        }

        let (count, cd_size, cd_offset) = if self.zip64 {
            (0xFFFF, 0xFFFF_FFFF, 0xFFFF_FFFF)
        } else {
            (count, cd_size, cd_offset)
        };
        out.extend_from_slice(b"PK\x05\x06");
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(count).unwrap();
        out.write_u16::<LittleEndian>(count).unwrap();
        out.write_u32::<LittleEndian>(cd_size).unwrap();
        out.write_u32::<LittleEndian>(cd_offset).unwrap();
        out.write_u16::<LittleEndian>(self.comment.len() as u16).unwrap();
        out.extend_from_slice(&self.comment);

        out
    }
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}
