//! Shared fixtures: in-memory archive builder and a staged router.

#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use std::path::Path;

use zipmeta::{Server, ServerConfig};

/// One stored entry of a synthetic archive.
pub struct Entry<'a> {
    pub name: &'a str,
    pub data: &'a [u8],
    pub extra: Vec<u8>,
}

impl<'a> Entry<'a> {
    pub fn new(name: &'a str, data: &'a [u8]) -> Self {
        Self {
            name,
            data,
            extra: Vec::new(),
        }
    }

    pub fn with_extra(mut self, tag: u16, payload: &[u8]) -> Self {
        self.extra.write_u16::<LittleEndian>(tag).unwrap();
        self.extra
            .write_u16::<LittleEndian>(payload.len() as u16)
            .unwrap();
        self.extra.extend_from_slice(payload);
        self
    }
}

/// Build a stored (uncompressed) archive with a central directory.
pub fn build_archive(entries: &[Entry<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut offsets = Vec::new();

    for entry in entries {
        offsets.push(out.len() as u32);
        out.extend_from_slice(b"PK\x03\x04");
        out.write_u16::<LittleEndian>(20).unwrap(); // version needed
        out.write_u16::<LittleEndian>(0).unwrap(); // flags
        out.write_u16::<LittleEndian>(0).unwrap(); // stored
        out.write_u16::<LittleEndian>(0x6000).unwrap(); // 12:00:00
        out.write_u16::<LittleEndian>(0x46de).unwrap(); // 2015-06-30
        out.write_u32::<LittleEndian>(0).unwrap(); // crc32
        out.write_u32::<LittleEndian>(entry.data.len() as u32).unwrap();
        out.write_u32::<LittleEndian>(entry.data.len() as u32).unwrap();
        out.write_u16::<LittleEndian>(entry.name.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.extend_from_slice(entry.name.as_bytes());
        out.extend_from_slice(entry.data);
    }

    let cd_offset = out.len() as u32;
    for (entry, offset) in entries.iter().zip(&offsets) {
        out.extend_from_slice(b"PK\x01\x02");
        out.write_u16::<LittleEndian>(0x0314).unwrap(); // UNIX, 2.0
        out.write_u16::<LittleEndian>(20).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0x6000).unwrap();
        out.write_u16::<LittleEndian>(0x46de).unwrap();
        out.write_u32::<LittleEndian>(0).unwrap();
        out.write_u32::<LittleEndian>(entry.data.len() as u32).unwrap();
        out.write_u32::<LittleEndian>(entry.data.len() as u32).unwrap();
        out.write_u16::<LittleEndian>(entry.name.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(entry.extra.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap(); // comment length
        out.write_u16::<LittleEndian>(0).unwrap(); // disk number start
        out.write_u16::<LittleEndian>(0).unwrap(); // internal attributes
        out.write_u32::<LittleEndian>(0o100644 << 16).unwrap();
        out.write_u32::<LittleEndian>(*offset).unwrap();
        out.extend_from_slice(entry.name.as_bytes());
        out.extend_from_slice(&entry.extra);
    }
    let cd_size = out.len() as u32 - cd_offset;

    out.extend_from_slice(b"PK\x05\x06");
    out.write_u16::<LittleEndian>(0).unwrap();
    out.write_u16::<LittleEndian>(0).unwrap();
    out.write_u16::<LittleEndian>(entries.len() as u16).unwrap();
    out.write_u16::<LittleEndian>(entries.len() as u16).unwrap();
    out.write_u32::<LittleEndian>(cd_size).unwrap();
    out.write_u32::<LittleEndian>(cd_offset).unwrap();
    out.write_u16::<LittleEndian>(0).unwrap();
    out
}

/// Move the EOCD values of `archive` into a ZIP64 record and saturate the
/// EOCD. The locator points at `eocd64_offset` when given.
pub fn into_zip64(mut archive: Vec<u8>, eocd64_offset: Option<u64>) -> Vec<u8> {
    let eocd = archive.split_off(archive.len() - 22);
    let entries = u16::from_le_bytes([eocd[10], eocd[11]]) as u64;
    let cd_size = u32::from_le_bytes([eocd[12], eocd[13], eocd[14], eocd[15]]) as u64;
    let cd_offset = u32::from_le_bytes([eocd[16], eocd[17], eocd[18], eocd[19]]) as u64;

    let record_offset = archive.len() as u64;
    archive.extend_from_slice(b"PK\x06\x06");
    archive.write_u64::<LittleEndian>(44).unwrap();
    archive.write_u16::<LittleEndian>(45).unwrap();
    archive.write_u16::<LittleEndian>(45).unwrap();
    archive.write_u32::<LittleEndian>(0).unwrap();
    archive.write_u32::<LittleEndian>(0).unwrap();
    archive.write_u64::<LittleEndian>(entries).unwrap();
    archive.write_u64::<LittleEndian>(entries).unwrap();
    archive.write_u64::<LittleEndian>(cd_size).unwrap();
    archive.write_u64::<LittleEndian>(cd_offset).unwrap();

    archive.extend_from_slice(b"PK\x06\x07");
    archive.write_u32::<LittleEndian>(0).unwrap();
    archive
        .write_u64::<LittleEndian>(eocd64_offset.unwrap_or(record_offset))
        .unwrap();
    archive.write_u32::<LittleEndian>(1).unwrap();

    archive.extend_from_slice(b"PK\x05\x06");
    archive.write_u32::<LittleEndian>(0).unwrap();
    archive.write_u16::<LittleEndian>(0xFFFF).unwrap();
    archive.write_u16::<LittleEndian>(0xFFFF).unwrap();
    archive.write_u32::<LittleEndian>(0xFFFF_FFFF).unwrap();
    archive.write_u32::<LittleEndian>(0xFFFF_FFFF).unwrap();
    archive.write_u16::<LittleEndian>(0).unwrap();
    archive
}

pub fn stage(dir: &Path, id: &str, content: &[u8]) {
    std::fs::write(dir.join(id), content).expect("stage sample");
}

/// Router serving a fresh staging directory.
pub fn staged_router(expose_diagnostics: bool) -> (tempfile::TempDir, axum::Router) {
    let dir = tempfile::tempdir().expect("staging dir");
    let config = ServerConfig {
        staging_dir: dir.path().to_path_buf(),
        workers: 2,
        expose_diagnostics,
    };
    let router = Server::new(config).router();
    (dir, router)
}
